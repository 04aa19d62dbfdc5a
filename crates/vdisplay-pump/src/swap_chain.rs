//! Swap-chain boundary: the host-owned buffer ring and its availability signal.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::device::RenderDevice;
use crate::types::Acquire;
use crate::PumpResult;

/// Capability over a host swap-chain handle.
///
/// The pump owns the handle for its whole lifetime and is the only caller.
pub trait SwapChain<D: RenderDevice>: Send + 'static {
    /// Declare which device produces and copies the ring's surfaces.
    fn set_device(&mut self, device: &D) -> PumpResult<()>;

    /// Non-blocking request for the next buffer. `Ok(Acquire::Pending)`
    /// means nothing is available yet and is not an error.
    fn acquire_buffer(&mut self) -> PumpResult<Acquire<D::Surface>>;

    /// Scheduling hint that initial processing of the last frame is done.
    fn finish_frame(&mut self) -> PumpResult<()>;

    /// Ask the host to delete the handle so it generates a new one.
    ///
    /// Called exactly once, when the pump stops processing.
    fn delete(&mut self);
}

/// Result of waiting for the next buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The producer signalled a new buffer.
    BufferAvailable,

    /// The pump is being torn down.
    Terminate,

    /// Nothing happened within the timeout.
    TimedOut,

    /// The wait itself failed.
    Abandoned(String),
}

/// "New buffer available" signal provided by the host with the swap chain.
pub trait BufferSignal: Send + 'static {
    /// Block until a buffer is signalled, termination is requested or the
    /// timeout elapses.
    fn wait(&self, terminate: &Receiver<()>, timeout: Duration) -> WaitOutcome;

    /// Hook fired from the stopping thread after termination is requested.
    ///
    /// Signals whose wait cannot select on the termination channel return a
    /// waker that makes a blocked [`wait`](Self::wait) return
    /// [`WaitOutcome::Terminate`] without running out its timeout.
    fn termination_waker(&self) -> Option<TerminationWaker> {
        None
    }
}

/// Wakes a blocked [`BufferSignal::wait`] once termination is requested.
pub struct TerminationWaker(Box<dyn FnOnce() + Send>);

impl TerminationWaker {
    pub fn new(wake: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(wake))
    }

    pub fn wake(self) {
        (self.0)()
    }
}

impl fmt::Debug for TerminationWaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TerminationWaker")
    }
}

/// Whether the termination channel fired or its sender is gone.
pub fn termination_requested(terminate: &Receiver<()>) -> bool {
    match terminate.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

/// Buffer signal backed by a channel, with auto-reset event semantics.
#[derive(Debug, Clone)]
pub struct ChannelSignal {
    receiver: Receiver<()>,
}

impl ChannelSignal {
    /// Create a signal and the notifier the producer uses to set it.
    pub fn new() -> (BufferNotifier, Self) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        (BufferNotifier { sender }, Self { receiver })
    }
}

impl BufferSignal for ChannelSignal {
    fn wait(&self, terminate: &Receiver<()>, timeout: Duration) -> WaitOutcome {
        crossbeam_channel::select! {
            recv(terminate) -> _ => WaitOutcome::Terminate,
            recv(self.receiver) -> msg => match msg {
                Ok(()) => WaitOutcome::BufferAvailable,
                Err(_) => WaitOutcome::Abandoned("buffer signal disconnected".to_string()),
            },
            default(timeout) => WaitOutcome::TimedOut,
        }
    }
}

/// Producer side of a [`ChannelSignal`].
#[derive(Debug, Clone)]
pub struct BufferNotifier {
    sender: Sender<()>,
}

impl BufferNotifier {
    /// Set the signal. Setting an already set signal is a no-op.
    pub fn notify(&self) {
        let _ = self.sender.try_send(());
    }
}

/// Owns the swap chain and deletes it when dropped, on every exit path.
pub(crate) struct DeleteOnExit<D: RenderDevice, C: SwapChain<D>> {
    chain: C,
    _device: PhantomData<fn(&D)>,
}

impl<D: RenderDevice, C: SwapChain<D>> DeleteOnExit<D, C> {
    pub(crate) fn new(chain: C) -> Self {
        Self {
            chain,
            _device: PhantomData,
        }
    }

    pub(crate) fn chain(&mut self) -> &mut C {
        &mut self.chain
    }
}

impl<D: RenderDevice, C: SwapChain<D>> Drop for DeleteOnExit<D, C> {
    fn drop(&mut self) {
        self.chain.delete();
        debug!("Swap chain deleted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_wakes_waiter() {
        let (notifier, signal) = ChannelSignal::new();
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        notifier.notify();
        notifier.notify();

        assert_eq!(
            signal.wait(&stop_rx, Duration::from_millis(50)),
            WaitOutcome::BufferAvailable
        );
        // Auto-reset: the second notify collapsed into the first.
        assert_eq!(
            signal.wait(&stop_rx, Duration::from_millis(10)),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn test_signal_observes_termination() {
        let (_notifier, signal) = ChannelSignal::new();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        stop_tx.send(()).unwrap();

        assert_eq!(
            signal.wait(&stop_rx, Duration::from_secs(5)),
            WaitOutcome::Terminate
        );
    }

    #[test]
    fn test_dropped_notifier_abandons_wait() {
        let (notifier, signal) = ChannelSignal::new();
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        drop(notifier);

        assert!(matches!(
            signal.wait(&stop_rx, Duration::from_millis(50)),
            WaitOutcome::Abandoned(_)
        ));
    }

    #[test]
    fn test_channel_signal_needs_no_waker() {
        let (_notifier, signal) = ChannelSignal::new();
        assert!(signal.termination_waker().is_none());
    }

    #[test]
    fn test_termination_requested() {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        assert!(!termination_requested(&stop_rx));
        drop(stop_tx);
        assert!(termination_requested(&stop_rx));
    }
}
