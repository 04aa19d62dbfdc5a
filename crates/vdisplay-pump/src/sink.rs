//! External sink boundary: the consumer the pump forwards frames to.

use crate::types::PixelBuffer;

/// Consumer of captured frames.
///
/// Shared with the worker through an `Arc`; the pump calls the frame
/// operations from its worker thread only and never concurrently.
/// Implementations must not block indefinitely, or the producer's ring
/// backs up.
pub trait FrameSink: Send + Sync + 'static {
    /// Decide whether this frame is worth sending. The pump never overrides
    /// the answer.
    fn should_forward(&self, has_changed: bool) -> bool;

    /// Hand out a buffer of exactly `len` bytes for the pump to fill.
    fn allocate_buffer(&self, len: usize) -> Vec<u8>;

    /// Take ownership of a filled frame.
    fn accept(&self, frame: PixelBuffer);
}
