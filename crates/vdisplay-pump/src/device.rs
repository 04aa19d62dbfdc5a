//! Render device boundary used by the pump for GPU readback.

use std::fmt;

use crate::types::{AdapterLuid, EncoderInfo, MappedSurface, MonitorMode};
use crate::PumpResult;

/// A render device bound to one adapter, owned by exactly one pump.
///
/// All methods are called from the pump's worker thread only.
pub trait RenderDevice: Send + 'static {
    /// Surface type handed out by the swap chain.
    type Surface;

    /// CPU-readable surface the frames are copied into.
    type Staging;

    /// Allocate a staging surface matching the mode.
    fn create_staging(&self, mode: &MonitorMode) -> PumpResult<Self::Staging>;

    /// GPU-side copy of an acquired surface into the staging surface.
    fn copy_to_staging(&self, surface: &Self::Surface, staging: &Self::Staging)
        -> PumpResult<()>;

    /// Map the staging surface, hand the mapping to `read` and unmap it
    /// again, whatever `read` returns.
    fn read_staging(
        &self,
        staging: &Self::Staging,
        read: &mut dyn FnMut(MappedSurface<'_>) -> PumpResult<()>,
    ) -> PumpResult<()>;

    /// Look for a hardware encoder usable with this device.
    fn probe_encoder(&self) -> Option<EncoderInfo> {
        None
    }

    /// Called once when the worker thread starts. The returned scope is
    /// dropped on the same thread when the worker exits.
    fn enter_worker_thread(&self) -> WorkerScope {
        WorkerScope::default()
    }
}

/// Opens render devices for adapter identities.
pub trait DeviceFactory: Send + Sync + 'static {
    type Device: RenderDevice;

    /// Resolve the adapter and create a device on it.
    fn open(&self, adapter: AdapterLuid) -> PumpResult<Self::Device>;
}

/// Per-thread registration reverted when the worker exits.
#[derive(Default)]
pub struct WorkerScope {
    on_exit: Option<Box<dyn FnOnce()>>,
}

impl WorkerScope {
    pub fn new(on_exit: impl FnOnce() + 'static) -> Self {
        Self {
            on_exit: Some(Box::new(on_exit)),
        }
    }
}

impl fmt::Debug for WorkerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerScope")
            .field("registered", &self.on_exit.is_some())
            .finish()
    }
}

impl Drop for WorkerScope {
    fn drop(&mut self) {
        if let Some(on_exit) = self.on_exit.take() {
            on_exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_worker_scope_runs_once_on_drop() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let scope = WorkerScope::new(move || counter.set(counter.get() + 1));
        assert_eq!(calls.get(), 0);
        drop(scope);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_default_scope_is_empty() {
        let scope = WorkerScope::default();
        assert_eq!(format!("{:?}", scope), "WorkerScope { registered: false }");
    }
}
