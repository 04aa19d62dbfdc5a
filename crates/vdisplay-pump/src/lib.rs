//! Frame capture pump for a virtual display adapter.
//!
//! A [`MonitorSession`] owns at most one [`FrameCapturePump`]. The pump
//! drains a host swap chain on a dedicated thread, reads each wanted frame
//! back from the GPU and hands the packed pixels to a [`FrameSink`].

mod config;
mod copy;
mod device;
mod error;
mod pump;
mod session;
mod sink;
mod stats;
mod swap_chain;
mod types;

pub mod synthetic;

pub use config::{duration_ms, PumpConfig, DEFAULT_THREAD_NAME};
pub use copy::copy_rows;
pub use device::{DeviceFactory, RenderDevice, WorkerScope};
pub use error::PumpError;
pub use pump::{FrameCapturePump, PumpExit};
pub use session::{MonitorSession, SessionState};
pub use sink::FrameSink;
pub use stats::{PumpStats, PumpStatsSnapshot};
pub use swap_chain::{
    termination_requested, BufferNotifier, BufferSignal, ChannelSignal, SwapChain,
    TerminationWaker, WaitOutcome,
};
pub use types::{
    Acquire, AcquiredBuffer, AdapterLuid, EncoderInfo, FrameMetadata, MappedSurface, MonitorMode,
    PixelBuffer, PixelFormat,
};

use std::time::Duration;

/// Bytes per pixel of every surface and forwarded buffer.
pub const BYTES_PER_PIXEL: usize = 4;

/// Default upper bound of the wait for a new buffer.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(16);

/// Result type for pump operations.
pub type PumpResult<T> = Result<T, PumpError>;
