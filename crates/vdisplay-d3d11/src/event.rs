//! Buffer signal over the event handle the host hands out with a swap chain.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::warn;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    CloseHandle, FALSE, HANDLE, TRUE, WAIT_ABANDONED, WAIT_EVENT, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Threading::{CreateEventW, SetEvent, WaitForMultipleObjects};

use vdisplay_pump::{termination_requested, BufferSignal, PumpResult, TerminationWaker, WaitOutcome};

const BUFFER_READY: WAIT_EVENT = WAIT_OBJECT_0;
const TERMINATE: WAIT_EVENT = WAIT_EVENT(WAIT_OBJECT_0.0 + 1);

/// Manual-reset event created and closed by this crate.
#[derive(Debug)]
struct OwnedEvent(HANDLE);

// SAFETY: the handle is only closed in `Drop`, and setting or waiting on an
// event handle is allowed from any thread.
unsafe impl Send for OwnedEvent {}
unsafe impl Sync for OwnedEvent {}

impl OwnedEvent {
    fn manual_reset() -> PumpResult<Self> {
        let handle = unsafe { CreateEventW(None, TRUE, FALSE, PCWSTR::null())? };
        Ok(Self(handle))
    }

    fn set(&self) {
        if let Err(e) = unsafe { SetEvent(self.0) } {
            warn!("Failed to set termination event: {}", e.message());
        }
    }
}

impl Drop for OwnedEvent {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// Auto-reset event signalled by the host when a new buffer is ready.
///
/// Each wait also watches a termination event of its own. The pump sets it
/// through [`BufferSignal::termination_waker`] when it is stopped, so a
/// blocked wait returns immediately instead of running out its timeout.
#[derive(Debug)]
pub struct EventSignal {
    buffer: HANDLE,
    terminate: Arc<OwnedEvent>,
}

// SAFETY: the host keeps the buffer event alive for the lifetime of the swap
// chain and waiting on an event handle is allowed from any thread.
unsafe impl Send for EventSignal {}

impl EventSignal {
    /// Wrap a host-owned event handle. The handle is not closed on drop.
    ///
    /// # Safety
    ///
    /// `handle` must be a valid event handle that outlives this value.
    pub unsafe fn from_raw(handle: HANDLE) -> PumpResult<Self> {
        Ok(Self {
            buffer: handle,
            terminate: Arc::new(OwnedEvent::manual_reset()?),
        })
    }
}

impl BufferSignal for EventSignal {
    fn wait(&self, terminate: &Receiver<()>, timeout: Duration) -> WaitOutcome {
        if termination_requested(terminate) {
            return WaitOutcome::Terminate;
        }

        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX - 1);
        let handles = [self.buffer, self.terminate.0];
        let result = unsafe { WaitForMultipleObjects(&handles, FALSE, millis) };

        if result == TERMINATE || termination_requested(terminate) {
            WaitOutcome::Terminate
        } else if result == BUFFER_READY {
            WaitOutcome::BufferAvailable
        } else if result == WAIT_TIMEOUT {
            WaitOutcome::TimedOut
        } else if result == WAIT_ABANDONED {
            WaitOutcome::Abandoned("buffer event abandoned".to_string())
        } else {
            WaitOutcome::Abandoned(format!(
                "wait failed: {}",
                windows::core::Error::from_win32().message()
            ))
        }
    }

    fn termination_waker(&self) -> Option<TerminationWaker> {
        let event = Arc::clone(&self.terminate);
        Some(TerminationWaker::new(move || event.set()))
    }
}
