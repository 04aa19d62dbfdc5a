//! Monitor session: the active swap chain of one virtual monitor.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::PumpConfig;
use crate::device::DeviceFactory;
use crate::pump::{FrameCapturePump, PumpExit};
use crate::sink::FrameSink;
use crate::stats::PumpStatsSnapshot;
use crate::swap_chain::{BufferSignal, SwapChain};
use crate::types::AdapterLuid;
use crate::PumpResult;

/// Whether the session currently owns a pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No swap chain assigned.
    #[default]
    Idle,

    /// A pump owns the assigned swap chain.
    Active,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Active => "Active",
        }
    }
}

#[derive(Default)]
struct SessionInner {
    pump: Option<FrameCapturePump>,
    last_exit: Option<PumpExit>,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        if self.pump.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    /// Join the current pump, if any.
    fn teardown(&mut self) {
        if let Some(pump) = self.pump.take() {
            let exit = pump.stop();
            debug!(%exit, "Previous pump torn down");
            self.last_exit = Some(exit);
        }
    }
}

/// Holds at most one [`FrameCapturePump`] for a monitor.
///
/// Every transition runs under one lock and tears the old pump down
/// (joining its worker) before taking ownership of anything new, so at most
/// one worker thread is alive per session.
pub struct MonitorSession<F, K> {
    factory: F,
    sink: Arc<K>,
    config: PumpConfig,
    inner: Mutex<SessionInner>,
}

impl<F, K> MonitorSession<F, K>
where
    F: DeviceFactory,
    K: FrameSink,
{
    pub fn new(factory: F, sink: Arc<K>, config: PumpConfig) -> Self {
        Self {
            factory,
            sink,
            config,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    /// Replace the active swap chain.
    ///
    /// If no device can be opened on `adapter`, the swap chain is deleted so
    /// the host generates a new one, the session stays idle and the error is
    /// returned.
    #[instrument(name = "assign_swap_chain", skip_all, fields(%adapter))]
    pub fn assign_swap_chain<C, S>(
        &self,
        swap_chain: C,
        adapter: AdapterLuid,
        signal: S,
    ) -> PumpResult<()>
    where
        C: SwapChain<F::Device>,
        S: BufferSignal,
    {
        let mut inner = self.inner.lock();
        let previous = inner.state();
        inner.teardown();

        let device = match self.factory.open(adapter) {
            Ok(device) => device,
            Err(e) => {
                warn!("Device init failed, deleting swap chain: {}", e);
                let mut swap_chain = swap_chain;
                swap_chain.delete();
                log_transition(previous, SessionState::Idle);
                return Err(e);
            }
        };

        match FrameCapturePump::spawn(
            device,
            swap_chain,
            signal,
            Arc::clone(&self.sink),
            self.config.clone(),
        ) {
            Ok(pump) => {
                inner.pump = Some(pump);
                log_transition(previous, SessionState::Active);
                info!("Swap chain assigned");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start pump: {}", e);
                log_transition(previous, SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Tear down the active pump. Does nothing when idle.
    #[instrument(name = "unassign_swap_chain", skip(self))]
    pub fn unassign_swap_chain(&self) {
        let mut inner = self.inner.lock();
        if inner.pump.is_none() {
            return;
        }

        inner.teardown();
        log_transition(SessionState::Active, SessionState::Idle);
        info!("Swap chain unassigned");
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state()
    }

    /// Whether the active pump's worker is still processing frames.
    pub fn is_pump_running(&self) -> bool {
        self.inner
            .lock()
            .pump
            .as_ref()
            .map_or(false, FrameCapturePump::is_running)
    }

    /// Statistics of the active pump.
    pub fn stats(&self) -> Option<PumpStatsSnapshot> {
        self.inner.lock().pump.as_ref().map(FrameCapturePump::stats)
    }

    /// How the most recently torn-down pump ended.
    pub fn last_exit(&self) -> Option<PumpExit> {
        self.inner.lock().last_exit.clone()
    }

    pub fn sink(&self) -> &Arc<K> {
        &self.sink
    }

    pub fn config(&self) -> &PumpConfig {
        &self.config
    }
}

impl<F, K> Drop for MonitorSession<F, K> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.pump.is_some() {
            inner.teardown();
            debug!("Session dropped with an active pump");
        }
    }
}

fn log_transition(previous: SessionState, current: SessionState) {
    debug!(
        previous = previous.name(),
        current = current.name(),
        "State transition"
    );
}
