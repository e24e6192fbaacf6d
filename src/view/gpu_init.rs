use std::sync::Arc;

use wgpu::Device;

use crate::error::BackendError;

/// Device, queue and a not-yet-configured surface.
pub struct GpuContext {
    pub device: Arc<Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter: wgpu::Adapter,
    pub surface: wgpu::Surface<'static>,
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn request_adapter(instance: &wgpu::Instance, surface: &wgpu::Surface<'static>) -> Result<wgpu::Adapter, BackendError> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: Some(surface),
        })
        .await
        .map_err(|e| BackendError::Adapter(e.to_string()))
}

/// Shared device request for both platforms
async fn init_device_and_queue(adapter: &wgpu::Adapter) -> Result<(Arc<Device>, Arc<wgpu::Queue>), BackendError> {
    let limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::default(),
        })
        .await
        .map_err(|e| BackendError::Adapter(e.to_string()))?;

    Ok((Arc::new(device), Arc::new(queue)))
}

/// Surface configuration for the given size; prefers an sRGB format.
pub fn surface_config(
    adapter: &wgpu::Adapter,
    surface: &wgpu::Surface,
    width: u32,
    height: u32,
) -> Result<wgpu::SurfaceConfiguration, BackendError> {
    let caps = surface.get_capabilities(adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| BackendError::Surface("surface reports no texture formats".into()))?;
    let alpha_mode = caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto);

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}

/// Largest of `wanted` or 1 that the adapter can multisample `format` with.
pub fn supported_sample_count(adapter: &wgpu::Adapter, format: wgpu::TextureFormat, wanted: u32) -> u32 {
    let flags = adapter.get_texture_format_features(format).flags;
    if wanted > 1 && flags.sample_count_supported(wanted) {
        wanted
    } else {
        1
    }
}

#[cfg(target_arch = "wasm32")]
impl GpuContext {
    /// Connect to a page canvas (WASM)
    pub async fn connect_canvas(canvas: &web_sys::HtmlCanvasElement) -> Result<Self, BackendError> {
        let instance = instance();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| BackendError::Surface(e.to_string()))?;
        let adapter = request_adapter(&instance, &surface).await?;
        let (device, queue) = init_device_and_queue(&adapter).await?;
        Ok(GpuContext { device, queue, adapter, surface })
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl GpuContext {
    /// Connect to a window (Native)
    pub async fn connect_window(window: Arc<winit::window::Window>) -> Result<Self, BackendError> {
        let instance = instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::Surface(e.to_string()))?;
        let adapter = request_adapter(&instance, &surface).await?;
        let (device, queue) = init_device_and_queue(&adapter).await?;
        Ok(GpuContext { device, queue, adapter, surface })
    }
}
