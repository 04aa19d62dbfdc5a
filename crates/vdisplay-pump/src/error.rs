//! Error types for the capture pump.

use thiserror::Error;

use crate::types::AdapterLuid;

/// Errors that can occur while binding, pumping or tearing down a swap chain.
#[derive(Debug, Error)]
pub enum PumpError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// The render device could not be created for the adapter.
    #[error("Failed to initialize render device on adapter {adapter}: {message}")]
    DeviceInit { adapter: AdapterLuid, message: String },

    /// The adapter identity no longer resolves to a GPU.
    #[error("Render adapter {0} not found")]
    AdapterNotFound(AdapterLuid),

    /// The swap chain rejected a request.
    #[error("Swap chain error: {0}")]
    SwapChain(String),

    /// The device or its swap chain was lost.
    #[error("Render device lost")]
    DeviceLost,

    /// GPU-side copy into the staging surface failed.
    #[error("Surface copy failed: {0}")]
    SurfaceCopy(String),

    /// Mapping the staging surface for CPU read failed.
    #[error("Surface map failed: {0}")]
    SurfaceMap(String),

    /// The mapped surface does not have the expected layout.
    #[error("Invalid surface layout: {0}")]
    SurfaceLayout(String),

    /// The sink handed back a buffer of the wrong length.
    #[error("Sink returned a {actual} byte buffer, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Notifying the producer that the frame was processed failed.
    #[error("Finish-frame notification failed: {0}")]
    FinishFrame(String),

    /// The worker thread could not be started.
    #[error("Failed to spawn pump worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PumpError {
    /// Errors after which the adapter has to be re-resolved by the host.
    pub fn is_device_loss(&self) -> bool {
        matches!(
            self,
            Self::DeviceLost | Self::AdapterNotFound(_) | Self::DeviceInit { .. }
        )
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for PumpError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
