//! Tier acquisition. Each probe owns the order in which its tier asks for
//! objects; nothing is handed out until the whole chain succeeded.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use chipview_core::backend::{BackendKind, BackendProbe, GraphicsBackend};
use chipview_core::error::RenderError;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tracing::{info, warn};
use wgpu::{Features, Limits, MemoryHints};
use winit::window::Window;

use super::backend::{validate_shaders, WgpuBackend};
use super::GraphicsContext;

/// Set once a tier has taken the page canvas for itself.
pub type CanvasClaim = Rc<Cell<bool>>;

/// WebGPU in the browser, Vulkan/Metal/DX12 natively.
pub struct ModernGpuProbe {
    window: Arc<Window>,
    canvas_claim: CanvasClaim,
}

impl ModernGpuProbe {
    pub fn new(window: Arc<Window>, canvas_claim: CanvasClaim) -> Self {
        Self { window, canvas_claim }
    }

    // adapter, device, shaders, then the surface: a canvas only ever hands
    // out one kind of context, so it is claimed last
    async fn acquire_context(window: Arc<Window>, canvas_claim: CanvasClaim) -> Result<GraphicsContext, RenderError> {
        let kind = BackendKind::ModernGpu;

        #[cfg(target_arch = "wasm32")]
        {
            if !wgpu::util::is_browser_webgpu_supported().await {
                return Err(RenderError::unavailable(kind, "WebGPU is not supported by this browser"));
            }
        }

        let instance =
            wgpu::Instance::new(&wgpu::InstanceDescriptor { backends: wgpu::Backends::PRIMARY, ..Default::default() });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| RenderError::unavailable(kind, "No device found"))?;
        info!("modern adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("chipview-modern"),
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::unavailable(kind, e.to_string()))?;

        // the surface format isn't known yet; either candidate links the same way
        validate_shaders(&device, kind, wgpu::TextureFormat::Bgra8Unorm).await?;

        wait_for_size(&window).await;
        let surface =
            instance.create_surface(window.clone()).map_err(|e| RenderError::unavailable(kind, e.to_string()))?;
        canvas_claim.set(true);
        let surface_config = surface_config(kind, &surface, &adapter, &window)?;
        surface.configure(&device, &surface_config);

        Ok(GraphicsContext { _instance: instance, device, queue, surface_config, surface })
    }
}

impl BackendProbe for ModernGpuProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::ModernGpu
    }

    fn acquire(&mut self) -> LocalBoxFuture<'_, Result<Box<dyn GraphicsBackend>, RenderError>> {
        let window = self.window.clone();
        let canvas_claim = self.canvas_claim.clone();
        async move {
            let gc = Self::acquire_context(window, canvas_claim).await?;
            Ok(Box::new(WgpuBackend::new(BackendKind::ModernGpu, gc)) as Box<dyn GraphicsBackend>)
        }
        .boxed_local()
    }
}

/// WebGL2 in the browser, OpenGL (ES) natively.
pub struct LegacyRasterProbe {
    window: Arc<Window>,
    canvas_claim: CanvasClaim,
}

impl LegacyRasterProbe {
    pub fn new(window: Arc<Window>, canvas_claim: CanvasClaim) -> Self {
        Self { window, canvas_claim }
    }

    // GL adapters come from a context, so the surface is created first
    async fn acquire_context(window: Arc<Window>, canvas_claim: CanvasClaim) -> Result<GraphicsContext, RenderError> {
        let kind = BackendKind::LegacyRaster;

        let instance =
            wgpu::Instance::new(&wgpu::InstanceDescriptor { backends: wgpu::Backends::GL, ..Default::default() });

        wait_for_size(&window).await;
        let target = surface_target(&window, canvas_claim.get())?;
        let surface = instance.create_surface(target).map_err(|e| RenderError::unavailable(kind, e.to_string()))?;
        canvas_claim.set(true);

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
        {
            Some(adapter) => adapter,
            None => {
                warn!("failed to find GL adapter, forcing fallback");
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::None,
                        force_fallback_adapter: true,
                        compatible_surface: Some(&surface),
                    })
                    .await
                    .ok_or_else(|| RenderError::unavailable(kind, "No device found"))?
            }
        };
        info!("legacy adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("chipview-legacy"),
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                    memory_hints: MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::unavailable(kind, e.to_string()))?;

        let surface_config = surface_config(kind, &surface, &adapter, &window)?;
        validate_shaders(&device, kind, surface_config.format).await?;
        surface.configure(&device, &surface_config);

        Ok(GraphicsContext { _instance: instance, device, queue, surface_config, surface })
    }
}

impl BackendProbe for LegacyRasterProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::LegacyRaster
    }

    fn acquire(&mut self) -> LocalBoxFuture<'_, Result<Box<dyn GraphicsBackend>, RenderError>> {
        let window = self.window.clone();
        let canvas_claim = self.canvas_claim.clone();
        async move {
            let gc = Self::acquire_context(window, canvas_claim).await?;
            Ok(Box::new(WgpuBackend::new(BackendKind::LegacyRaster, gc)) as Box<dyn GraphicsBackend>)
        }
        .boxed_local()
    }
}

/// A canvas reports 0x0 until layout has run.
async fn wait_for_size(window: &Window) {
    #[cfg(target_arch = "wasm32")]
    loop {
        use gloo_timers::future::TimeoutFuture;
        let size = window.inner_size();
        if size.width > 0 && size.height > 0 {
            break;
        }
        // roughly one frame
        TimeoutFuture::new(16).await;
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = window;
}

/// The window itself, unless an earlier tier already holds a context on its
/// canvas. A browser canvas never hands out a second kind of context, so the
/// legacy tier then draws into a fresh one put in its place.
fn surface_target(window: &Arc<Window>, claimed: bool) -> Result<wgpu::SurfaceTarget<'static>, RenderError> {
    #[cfg(target_arch = "wasm32")]
    if claimed {
        use winit::platform::web::WindowExtWebSys;

        let fresh = window
            .canvas()
            .and_then(|canvas| crate::helpers::replace_canvas(&canvas))
            .ok_or_else(|| RenderError::unavailable(BackendKind::LegacyRaster, "couldn't replace the claimed canvas"))?;
        warn!("canvas already holds a WebGPU context, drawing to a fresh one");
        return Ok(wgpu::SurfaceTarget::Canvas(fresh));
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = claimed;

    Ok(wgpu::SurfaceTarget::from(window.clone()))
}

fn surface_config(
    kind: BackendKind,
    surface: &wgpu::Surface<'_>,
    adapter: &wgpu::Adapter,
    window: &Window,
) -> Result<wgpu::SurfaceConfiguration, RenderError> {
    let capabilities = surface.get_capabilities(adapter);

    let format = capabilities
        .formats
        .iter()
        .copied()
        .find(|&fmt| fmt == wgpu::TextureFormat::Rgba8Unorm || fmt == wgpu::TextureFormat::Bgra8Unorm)
        .or_else(|| capabilities.formats.first().copied())
        .ok_or_else(|| RenderError::unavailable(kind, "adapter can't present to this surface"))?;

    let size = window.inner_size();
    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        desired_maximum_frame_latency: 2,
        alpha_mode: capabilities.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
    })
}
