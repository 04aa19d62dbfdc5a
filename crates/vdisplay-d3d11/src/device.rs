//! Direct3D 11 device bound to one adapter.

use tracing::{debug, instrument, warn};
use windows::core::Interface;
use windows::Win32::Foundation::LUID;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_UNKNOWN;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAPPED_SUBRESOURCE,
    D3D11_MAP_READ, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory2, IDXGIAdapter, IDXGIDevice, IDXGIFactory4, IDXGIResource,
    DXGI_CREATE_FACTORY_FLAGS, DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET,
    DXGI_ERROR_NOT_FOUND,
};

use vdisplay_pump::{
    AdapterLuid, DeviceFactory, EncoderInfo, MappedSurface, MonitorMode, PumpError, PumpResult,
    RenderDevice, WorkerScope,
};

use crate::encoder::probe_h264_encoder;
use crate::mmcss::register_worker_thread;

/// Render device and immediate context on a specific adapter.
pub struct Direct3DDevice {
    adapter_luid: AdapterLuid,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    probe_encoder: bool,
    register_mmcss: bool,
}

// SAFETY: the device is created on a control-plane thread and then moved
// into exactly one pump worker, which is its only user from then on.
unsafe impl Send for Direct3DDevice {}

impl Direct3DDevice {
    /// Resolve the adapter by LUID and create a BGRA-capable device on it.
    #[instrument(name = "d3d11_init", skip_all, fields(adapter = %luid))]
    pub fn init(luid: AdapterLuid) -> PumpResult<Self> {
        let factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(DXGI_CREATE_FACTORY_FLAGS(0)) }
            .map_err(|e| init_error(luid, "CreateDXGIFactory2", e))?;

        let adapter: IDXGIAdapter = match unsafe {
            factory.EnumAdapterByLuid(LUID {
                LowPart: luid.low_part,
                HighPart: luid.high_part,
            })
        } {
            Ok(adapter) => adapter,
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => {
                return Err(PumpError::AdapterNotFound(luid));
            }
            Err(e) => return Err(init_error(luid, "EnumAdapterByLuid", e)),
        };

        let mut device = None;
        let mut context = None;

        unsafe {
            D3D11CreateDevice(
                &adapter,
                D3D_DRIVER_TYPE_UNKNOWN,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
        }
        .map_err(|e| init_error(luid, "D3D11CreateDevice", e))?;

        let device = device.ok_or_else(|| PumpError::DeviceInit {
            adapter: luid,
            message: "D3D11CreateDevice did not return a device".to_string(),
        })?;
        let context = context.ok_or_else(|| PumpError::DeviceInit {
            adapter: luid,
            message: "D3D11CreateDevice did not return a device context".to_string(),
        })?;

        debug!("Created D3D11 device");
        Ok(Self {
            adapter_luid: luid,
            device,
            context,
            probe_encoder: true,
            register_mmcss: true,
        })
    }

    pub fn adapter_luid(&self) -> AdapterLuid {
        self.adapter_luid
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    /// DXGI view of the device, as the host swap chain expects it.
    pub fn dxgi_device(&self) -> PumpResult<IDXGIDevice> {
        let dxgi: IDXGIDevice = self.device.cast()?;
        Ok(dxgi)
    }

    /// Classify a failed GPU call, detecting a removed or reset device.
    fn device_error(&self, err: windows::core::Error, wrap: fn(String) -> PumpError) -> PumpError {
        let code = err.code();
        if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET {
            let reason = unsafe { self.device.GetDeviceRemovedReason() };
            warn!(?reason, "D3D11 device lost");
            return PumpError::DeviceLost;
        }
        wrap(err.message().to_string())
    }
}

impl RenderDevice for Direct3DDevice {
    type Surface = IDXGIResource;
    type Staging = StagingTexture;

    fn create_staging(&self, mode: &MonitorMode) -> PumpResult<StagingTexture> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: mode.width,
            Height: mode.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };

        let mut texture = None;
        unsafe {
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture))?;
        }

        let texture = texture.ok_or_else(|| PumpError::WindowsApi {
            message: "Failed to create staging texture".to_string(),
            source: None,
        })?;

        debug!(width = mode.width, height = mode.height, "Created staging texture");
        Ok(StagingTexture {
            texture,
            width: mode.width,
            height: mode.height,
        })
    }

    fn copy_to_staging(&self, surface: &IDXGIResource, staging: &StagingTexture) -> PumpResult<()> {
        let texture: ID3D11Texture2D = surface
            .cast()
            .map_err(|e| PumpError::SurfaceCopy(e.message().to_string()))?;

        unsafe {
            self.context.CopyResource(&staging.texture, &texture);
        }
        Ok(())
    }

    fn read_staging(
        &self,
        staging: &StagingTexture,
        read: &mut dyn FnMut(MappedSurface<'_>) -> PumpResult<()>,
    ) -> PumpResult<()> {
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(&staging.texture, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
        }
        .map_err(|e| self.device_error(e, PumpError::SurfaceMap))?;

        let _unmap = UnmapOnDrop {
            context: &self.context,
            texture: &staging.texture,
        };

        if mapped.pData.is_null() {
            return Err(PumpError::SurfaceMap("mapping returned no data".to_string()));
        }

        // DepthPitch covers every row of a 2D subresource, padding included.
        let len = mapped.DepthPitch as usize;
        let data = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, len) };

        read(MappedSurface {
            data,
            row_pitch: mapped.RowPitch as usize,
        })
    }

    fn probe_encoder(&self) -> Option<EncoderInfo> {
        if self.probe_encoder {
            probe_h264_encoder()
        } else {
            None
        }
    }

    fn enter_worker_thread(&self) -> WorkerScope {
        if self.register_mmcss {
            register_worker_thread()
        } else {
            WorkerScope::default()
        }
    }
}

/// CPU-readable copy target sized for the monitor mode.
pub struct StagingTexture {
    texture: ID3D11Texture2D,
    width: u32,
    height: u32,
}

impl StagingTexture {
    pub fn texture(&self) -> &ID3D11Texture2D {
        &self.texture
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

struct UnmapOnDrop<'a> {
    context: &'a ID3D11DeviceContext,
    texture: &'a ID3D11Texture2D,
}

impl Drop for UnmapOnDrop<'_> {
    fn drop(&mut self) {
        unsafe {
            self.context.Unmap(self.texture, 0);
        }
    }
}

fn init_error(adapter: AdapterLuid, call: &str, err: windows::core::Error) -> PumpError {
    PumpError::DeviceInit {
        adapter,
        message: format!("{} failed: {}", call, err.message()),
    }
}

/// Opens a [`Direct3DDevice`] per swap-chain assignment.
#[derive(Debug, Clone)]
pub struct Direct3DDeviceFactory {
    probe_encoder: bool,
    register_mmcss: bool,
}

impl Default for Direct3DDeviceFactory {
    fn default() -> Self {
        Self {
            probe_encoder: true,
            register_mmcss: true,
        }
    }
}

impl Direct3DDeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the Media Foundation encoder probe.
    pub fn without_encoder_probe(mut self) -> Self {
        self.probe_encoder = false;
        self
    }

    /// Leave the worker thread's scheduling class alone.
    pub fn without_mmcss(mut self) -> Self {
        self.register_mmcss = false;
        self
    }
}

impl DeviceFactory for Direct3DDeviceFactory {
    type Device = Direct3DDevice;

    fn open(&self, adapter: AdapterLuid) -> PumpResult<Direct3DDevice> {
        let mut device = Direct3DDevice::init(adapter)?;
        device.probe_encoder = self.probe_encoder;
        device.register_mmcss = self.register_mmcss;
        Ok(device)
    }
}
