//! Forwarded frame types.

use std::time::Instant;

use bytes::Bytes;

use vdisplay_pump::{PixelFormat, BYTES_PER_PIXEL};

/// Timestamp for a forwarded frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the sink accepted the frame.
    pub capture_time: Instant,

    /// Presentation timestamp in 100ns units since the sink was created.
    pub pts_100ns: u64,
}

impl CaptureTimestamp {
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let elapsed = capture_time.duration_since(start_time);

        Self {
            capture_time,
            pts_100ns: elapsed.as_nanos() as u64 / 100,
        }
    }

    /// Get the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts_100ns / 10_000
    }
}

/// A frame handed from the pump to the consumer.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Tightly packed pixels in `format` order.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Channel order of `data`. Always the GPU-native order.
    pub format: PixelFormat,

    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl CapturedFrame {
    /// Expected byte length for the given dimensions.
    pub fn buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Validate that the frame data matches its dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::buffer_size(self.width, self.height)
    }

    /// Pixel at `(x, y)` in `format` order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy of the pixels with blue and red swapped, for consumers that need
    /// red-green-blue-alpha order.
    pub fn to_rgba(&self) -> Bytes {
        let mut rgba = self.data.to_vec();
        match self.format {
            PixelFormat::Bgra8 => {
                for px in rgba.chunks_exact_mut(BYTES_PER_PIXEL) {
                    px.swap(0, 2);
                }
            }
        }
        Bytes::from(rgba)
    }
}
