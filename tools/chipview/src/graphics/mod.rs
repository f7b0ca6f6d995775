pub mod backend;
pub mod probe;

use std::sync::Arc;

use chipview_core::backend::{BackendKind, BackendProbe};
use chipview_core::config::BackendPreference;
use winit::window::Window;

pub use probe::{CanvasClaim, LegacyRasterProbe, ModernGpuProbe};

/// Everything one acquired tier renders with.
pub struct GraphicsContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub surface: wgpu::Surface<'static>,
}

impl GraphicsContext {
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }
}

/// The tiers to try, best first, filtered by the user's preference.
pub fn probes(window: Arc<Window>, preference: BackendPreference) -> Vec<Box<dyn BackendProbe>> {
    let canvas_claim = CanvasClaim::default();
    let all: [Box<dyn BackendProbe>; 2] = [
        Box::new(ModernGpuProbe::new(window.clone(), canvas_claim.clone())),
        Box::new(LegacyRasterProbe::new(window, canvas_claim)),
    ];

    all.into_iter().filter(|probe| preference.allows(probe.kind())).collect()
}

/// Shader text per tier. Stages are compiled one at a time so a failure
/// names the stage that broke.
#[derive(Copy, Clone, Debug)]
pub enum ShaderSet {
    Wgsl { vertex: &'static str, fragment: &'static str },
    Glsl { vertex: &'static str, fragment: &'static str },
}

impl ShaderSet {
    pub const fn for_tier(kind: BackendKind) -> Self {
        match kind {
            BackendKind::LegacyRaster => ShaderSet::Glsl {
                vertex: include_str!("shaders/quad.vert"),
                fragment: include_str!("shaders/quad.frag"),
            },
            _ => ShaderSet::Wgsl {
                vertex: include_str!("shaders/quad.vert.wgsl"),
                fragment: include_str!("shaders/quad.frag.wgsl"),
            },
        }
    }
}
