//! Reference frame sink for the capture pump.
//!
//! [`ChannelSink`] decides which frames are worth sending, lends out pooled
//! buffers for the pump to fill and moves filled frames into a bounded
//! channel for a consumer thread.

mod channel;
mod config;
mod frame;
mod log;
mod pool;

pub use channel::{ChannelSink, SinkStatsSnapshot};
pub use config::SinkConfig;
pub use frame::{CaptureTimestamp, CapturedFrame};
pub use log::{LogKind, ParseLogKindError};
pub use pool::BufferPool;

use std::time::Duration;

/// Channel capacity for forwarded frames.
pub const FRAME_CHANNEL_CAPACITY: usize = 3;

/// Idle frames are resent after this long without a forwarded frame.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_secs(2);

/// Number of returned allocations kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 3;
