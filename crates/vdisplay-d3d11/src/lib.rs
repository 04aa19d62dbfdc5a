//! Direct3D 11 render device for the capture pump.
//!
//! Resolves a DXGI adapter by LUID, creates a BGRA-capable device on it and
//! implements [`vdisplay_pump::RenderDevice`] with a staging texture
//! readback. Also provides the host event-handle buffer signal, the
//! multimedia scheduler registration of the worker thread and the hardware
//! encoder probe. Everything here is Windows-only.

#[cfg(windows)]
mod device;
#[cfg(windows)]
mod encoder;
#[cfg(windows)]
mod event;
#[cfg(windows)]
mod mmcss;

#[cfg(windows)]
pub use device::{Direct3DDevice, Direct3DDeviceFactory, StagingTexture};
#[cfg(windows)]
pub use encoder::probe_h264_encoder;
#[cfg(windows)]
pub use event::EventSignal;
#[cfg(windows)]
pub use mmcss::{register_worker_thread, MMCSS_TASK};
