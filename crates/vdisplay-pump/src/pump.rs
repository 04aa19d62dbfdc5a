//! Frame capture pump: one swap chain, one dedicated worker thread.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::PumpConfig;
use crate::copy::copy_rows;
use crate::device::RenderDevice;
use crate::error::PumpError;
use crate::sink::FrameSink;
use crate::stats::{PumpStats, PumpStatsSnapshot};
use crate::swap_chain::{
    termination_requested, BufferSignal, DeleteOnExit, SwapChain, TerminationWaker, WaitOutcome,
};
use crate::types::{Acquire, AcquiredBuffer, MappedSurface, PixelBuffer, PixelFormat};
use crate::PumpResult;

/// How a pump worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// Termination was requested.
    Terminated,

    /// Binding the device or allocating the staging surface failed.
    SetupFailed(String),

    /// The swap chain failed to hand out a buffer.
    AcquireFailed(String),

    /// Waiting for the next buffer failed.
    WaitFailed(String),

    /// Copying, forwarding or finishing a frame failed.
    FrameFailed(String),

    /// The worker thread panicked.
    Panicked,
}

impl PumpExit {
    /// Whether the worker stopped because it was asked to.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated => write!(f, "terminated"),
            Self::SetupFailed(reason) => write!(f, "setup failed: {}", reason),
            Self::AcquireFailed(reason) => write!(f, "acquire failed: {}", reason),
            Self::WaitFailed(reason) => write!(f, "wait failed: {}", reason),
            Self::FrameFailed(reason) => write!(f, "frame failed: {}", reason),
            Self::Panicked => write!(f, "worker panicked"),
        }
    }
}

/// Owns one swap chain and the worker thread draining it.
///
/// Dropping the pump signals termination and blocks until the worker has
/// exited and deleted the swap chain.
pub struct FrameCapturePump {
    stop_tx: Option<Sender<()>>,
    waker: Option<TerminationWaker>,
    worker: Option<JoinHandle<PumpExit>>,
    stats: Arc<PumpStats>,
}

impl FrameCapturePump {
    /// Take ownership of the device, swap chain, buffer signal and sink and
    /// start the worker thread.
    ///
    /// The swap chain is deleted exactly once on every path: when the worker
    /// exits, or right here if the pump cannot be started.
    #[instrument(
        name = "pump_spawn",
        skip_all,
        fields(width = config.mode.width, height = config.mode.height)
    )]
    pub fn spawn<D, C, S, K>(
        device: D,
        swap_chain: C,
        signal: S,
        sink: Arc<K>,
        config: PumpConfig,
    ) -> PumpResult<Self>
    where
        D: RenderDevice,
        C: SwapChain<D>,
        S: BufferSignal,
        K: FrameSink,
    {
        let chain = DeleteOnExit::<D, C>::new(swap_chain);
        config.validate()?;

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let stats = Arc::new(PumpStats::new());
        let thread_name = config.thread_name.clone();
        let waker = signal.termination_waker();

        let worker = Worker {
            device,
            signal,
            sink,
            terminate: stop_rx,
            config,
            stats: Arc::clone(&stats),
        };

        // A failed spawn drops the closure, and with it the swap chain guard.
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || worker.run(chain))?;

        debug!("Pump worker started");

        Ok(Self {
            stop_tx: Some(stop_tx),
            waker,
            worker: Some(handle),
            stats,
        })
    }

    /// Current statistics.
    pub fn stats(&self) -> PumpStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the worker thread is still processing frames.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Signal termination, wait for the worker and report how it ended.
    pub fn stop(mut self) -> PumpExit {
        self.shutdown().unwrap_or(PumpExit::Terminated)
    }

    #[instrument(name = "pump_stop", skip(self))]
    fn shutdown(&mut self) -> Option<PumpExit> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }

        let handle = self.worker.take()?;
        let exit = handle.join().unwrap_or(PumpExit::Panicked);

        if exit == PumpExit::Panicked {
            warn!("Pump worker panicked");
        } else {
            debug!(%exit, "Pump worker joined");
        }

        Some(exit)
    }
}

impl Drop for FrameCapturePump {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// State moved onto the worker thread.
struct Worker<D, S, K> {
    device: D,
    signal: S,
    sink: Arc<K>,
    terminate: Receiver<()>,
    config: PumpConfig,
    stats: Arc<PumpStats>,
}

impl<D, S, K> Worker<D, S, K>
where
    D: RenderDevice,
    S: BufferSignal,
    K: FrameSink,
{
    fn run<C: SwapChain<D>>(mut self, mut chain: DeleteOnExit<D, C>) -> PumpExit {
        let scope = self.device.enter_worker_thread();

        let exit = self.pump(chain.chain());
        if exit.is_clean() {
            info!("Pump worker exiting: {}", exit);
        } else {
            warn!("Pump worker exiting: {}", exit);
        }

        // Delete the swap chain before the thread registration is reverted.
        drop(chain);
        drop(scope);
        exit
    }

    fn pump<C: SwapChain<D>>(&mut self, chain: &mut C) -> PumpExit {
        if let Err(e) = chain.set_device(&self.device) {
            return PumpExit::SetupFailed(e.to_string());
        }

        let staging = match self.device.create_staging(&self.config.mode) {
            Ok(staging) => staging,
            Err(e) => return PumpExit::SetupFailed(e.to_string()),
        };

        match self.device.probe_encoder() {
            Some(encoder) => {
                info!(
                    codec = %encoder.codec,
                    transforms = encoder.hardware_transforms,
                    "Hardware encoder available"
                );
                self.stats.set_encoder_available(true);
            }
            None => debug!("No hardware encoder, raw readback only"),
        }

        info!(
            width = self.config.mode.width,
            height = self.config.mode.height,
            timeout_ms = self.config.wait_timeout.as_millis() as u64,
            "Pump loop started"
        );

        loop {
            if termination_requested(&self.terminate) {
                return PumpExit::Terminated;
            }

            match chain.acquire_buffer() {
                Ok(Acquire::Pending) => {
                    self.stats.record_pending();

                    match self.signal.wait(&self.terminate, self.config.wait_timeout) {
                        WaitOutcome::BufferAvailable => {}
                        WaitOutcome::TimedOut => self.stats.record_wait_timeout(),
                        WaitOutcome::Terminate => return PumpExit::Terminated,
                        WaitOutcome::Abandoned(reason) => return PumpExit::WaitFailed(reason),
                    }
                }
                Ok(Acquire::Ready(buffer)) => {
                    self.stats.record_acquired();

                    if let Err(e) = self.process_frame(buffer, &staging) {
                        return PumpExit::FrameFailed(e.to_string());
                    }

                    if let Err(e) = chain.finish_frame() {
                        return PumpExit::FrameFailed(e.to_string());
                    }
                }
                Err(e) => return PumpExit::AcquireFailed(e.to_string()),
            }
        }
    }

    /// Forward one acquired buffer if the sink wants it. The buffer is
    /// released on every path out of this function.
    fn process_frame(
        &self,
        buffer: AcquiredBuffer<D::Surface>,
        staging: &D::Staging,
    ) -> PumpResult<()> {
        let metadata = buffer.metadata();

        if !self.sink.should_forward(metadata.has_changed()) {
            trace!(
                dirty = metadata.dirty_rect_count,
                moves = metadata.move_region_count,
                "Frame skipped"
            );
            self.stats.record_skipped();
            buffer.release();
            return Ok(());
        }

        self.device.copy_to_staging(buffer.surface(), staging)?;

        let mode = self.config.mode;
        let len = mode.frame_len();
        let mut data = self.sink.allocate_buffer(len);
        if data.len() != len {
            return Err(PumpError::BufferSizeMismatch {
                expected: len,
                actual: data.len(),
            });
        }

        self.device
            .read_staging(staging, &mut |mapped: MappedSurface<'_>| {
                copy_rows(
                    mapped.data,
                    mapped.row_pitch,
                    &mut data,
                    mode.row_bytes(),
                    mode.height as usize,
                )
            })?;

        self.sink.accept(PixelBuffer {
            data,
            width: mode.width,
            height: mode.height,
            format: PixelFormat::Bgra8,
        });
        self.stats.record_forwarded(len);
        trace!(len, "Frame forwarded");

        buffer.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_display() {
        assert_eq!(PumpExit::Terminated.to_string(), "terminated");
        assert_eq!(
            PumpExit::AcquireFailed("device removed".into()).to_string(),
            "acquire failed: device removed"
        );
        assert!(PumpExit::Terminated.is_clean());
        assert!(!PumpExit::Panicked.is_clean());
    }
}
