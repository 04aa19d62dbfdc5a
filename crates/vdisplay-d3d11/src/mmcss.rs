//! Multimedia class scheduler registration of the pump worker.

use tracing::{debug, warn};
use windows::core::w;
use windows::Win32::System::Threading::{
    AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW,
};

use vdisplay_pump::WorkerScope;

/// MMCSS task the worker thread joins.
pub const MMCSS_TASK: &str = "Distribution";

/// Register the calling thread with the "Distribution" task. The returned
/// scope reverts the registration on the same thread.
///
/// Failure only costs scheduling priority, so it is logged and ignored.
pub fn register_worker_thread() -> WorkerScope {
    let mut task_index = 0u32;
    match unsafe { AvSetMmThreadCharacteristicsW(w!("Distribution"), &mut task_index) } {
        Ok(handle) => {
            debug!(task = MMCSS_TASK, task_index, "Worker registered with MMCSS");
            WorkerScope::new(move || {
                if let Err(e) = unsafe { AvRevertMmThreadCharacteristics(handle) } {
                    warn!("Failed to revert MMCSS registration: {}", e);
                }
            })
        }
        Err(e) => {
            warn!("MMCSS registration failed: {}", e);
            WorkerScope::default()
        }
    }
}
