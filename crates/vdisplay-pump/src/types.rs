//! Data model shared by the pump, the session and their collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::BYTES_PER_PIXEL;

/// Locally unique identifier of a physical render adapter.
///
/// Opaque to the pump: it is only handed to a [`DeviceFactory`](crate::DeviceFactory).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterLuid {
    pub low_part: u32,
    pub high_part: i32,
}

impl AdapterLuid {
    /// Create an adapter identity from its two LUID halves.
    pub const fn new(low_part: u32, high_part: i32) -> Self {
        Self {
            low_part,
            high_part,
        }
    }

    /// Pack both halves into a single integer.
    pub fn as_u64(&self) -> u64 {
        (u64::from(self.high_part as u32) << 32) | u64::from(self.low_part)
    }
}

impl fmt::Display for AdapterLuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}", self.high_part as u32, self.low_part)
    }
}

/// Display mode negotiated for the monitor. Fixes the staging surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorMode {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Vertical refresh rate in Hz.
    pub refresh_hz: u32,
}

impl MonitorMode {
    pub const fn new(width: u32, height: u32, refresh_hz: u32) -> Self {
        Self {
            width,
            height,
            refresh_hz,
        }
    }

    /// Bytes in one tightly packed row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Bytes in one tightly packed frame.
    pub fn frame_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// Pixels scanned out per second.
    pub fn pixel_rate(&self) -> u64 {
        u64::from(self.refresh_hz) * u64::from(self.width) * u64::from(self.height)
    }
}

impl Default for MonitorMode {
    fn default() -> Self {
        Self::new(1920, 1080, 60)
    }
}

/// Change hints delivered with an acquired buffer.
///
/// Zero counts do not guarantee identical pixels and non-zero counts do not
/// guarantee a visible change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Number of dirty rectangles since the previous frame.
    pub dirty_rect_count: u32,

    /// Number of move regions since the previous frame.
    pub move_region_count: u32,
}

impl FrameMetadata {
    pub const fn new(dirty_rect_count: u32, move_region_count: u32) -> Self {
        Self {
            dirty_rect_count,
            move_region_count,
        }
    }

    /// Metadata for a frame the producer reports as unchanged.
    pub const fn unchanged() -> Self {
        Self::new(0, 0)
    }

    /// Whether the producer reported any change.
    pub fn has_changed(&self) -> bool {
        self.dirty_rect_count > 0 || self.move_region_count > 0
    }
}

/// A surface of the swap-chain ring held by the pump.
///
/// The reference is released when this value is dropped, so every path out
/// of the frame (forwarded, skipped or failed) gives the slot back exactly once.
#[derive(Debug)]
pub struct AcquiredBuffer<S> {
    surface: S,
    metadata: FrameMetadata,
}

impl<S> AcquiredBuffer<S> {
    pub fn new(surface: S, metadata: FrameMetadata) -> Self {
        Self { surface, metadata }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn metadata(&self) -> FrameMetadata {
        self.metadata
    }

    /// Give the surface back to the producer.
    pub fn release(self) {
        drop(self);
    }
}

/// Outcome of a non-blocking acquire.
#[derive(Debug)]
pub enum Acquire<S> {
    /// No buffer is available yet.
    Pending,

    /// A buffer was handed over.
    Ready(AcquiredBuffer<S>),
}

/// A staging surface mapped for CPU read.
#[derive(Debug, Clone, Copy)]
pub struct MappedSurface<'a> {
    /// Mapped bytes, starting at the first row.
    pub data: &'a [u8],

    /// Distance in bytes between the starts of two rows. May exceed the
    /// packed row width because of alignment padding.
    pub row_pitch: usize,
}

/// Channel order of forwarded pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Blue, green, red, alpha: the order the GPU surface produces.
    /// Forwarded as-is; reordering is left to the consumer.
    #[default]
    Bgra8,
}

/// A tightly packed frame filled by the pump and owned by the sink.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    /// Row-major pixels, `width * 4` bytes per row, no padding.
    pub data: Vec<u8>,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Channel order.
    pub format: PixelFormat,
}

impl PixelBuffer {
    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Borrow a single row.
    pub fn row(&self, index: usize) -> Option<&[u8]> {
        let stride = self.stride();
        self.data.get(index * stride..(index + 1) * stride)
    }
}

/// A hardware encoder found by the optional capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    /// Output codec name.
    pub codec: String,

    /// Number of hardware transforms that can produce the codec.
    pub hardware_transforms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_luid_display_and_packing() {
        let luid = AdapterLuid::new(0x1234, 1);
        assert_eq!(luid.to_string(), "00000001:00001234");
        assert_eq!(luid.as_u64(), 0x0000_0001_0000_1234);

        let negative = AdapterLuid::new(0, -1);
        assert_eq!(negative.as_u64(), 0xffff_ffff_0000_0000);
    }

    #[test]
    fn test_monitor_mode_sizes() {
        let mode = MonitorMode::default();
        assert_eq!(mode.row_bytes(), 1920 * 4);
        assert_eq!(mode.frame_len(), 1920 * 1080 * 4);
        assert_eq!(mode.pixel_rate(), 60 * 1920 * 1080);
    }

    #[test]
    fn test_frame_metadata_change_hint() {
        assert!(!FrameMetadata::unchanged().has_changed());
        assert!(FrameMetadata::new(1, 0).has_changed());
        assert!(FrameMetadata::new(0, 3).has_changed());
    }

    #[test]
    fn test_pixel_buffer_rows() {
        let buffer = PixelBuffer {
            data: (0..24).collect(),
            width: 3,
            height: 2,
            format: PixelFormat::Bgra8,
        };
        assert_eq!(buffer.stride(), 12);
        assert_eq!(buffer.row(1).map(|r| r[0]), Some(12));
        assert!(buffer.row(2).is_none());
    }
}
