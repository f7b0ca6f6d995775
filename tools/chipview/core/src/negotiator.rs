use log::{error, info, warn};

use crate::backend::{BackendKind, BackendProbe, GraphicsBackend, NullBackend};
use crate::error::{RenderError, TierFailure};
use crate::frame::FrameDims;
use crate::resources::{RenderResources, ResourceBuilder};

/// A fully built tier: the backend and the resources it owns, together.
pub struct RenderHandle {
    backend: Box<dyn GraphicsBackend>,
    resources: Option<RenderResources>,
}

impl RenderHandle {
    /// Build the quad resources on a freshly acquired backend. On failure the
    /// backend is dropped with nothing allocated on it.
    pub fn build(mut backend: Box<dyn GraphicsBackend>, dims: FrameDims) -> Result<Self, RenderError> {
        let resources = ResourceBuilder::build(backend.as_mut(), dims)?;
        Ok(Self { backend, resources: Some(resources) })
    }

    /// The handle left behind once every tier has failed. It owns nothing and
    /// refuses every frame.
    pub fn inert() -> Self {
        Self { backend: Box::new(NullBackend), resources: None }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn resources(&self) -> Option<&RenderResources> {
        self.resources.as_ref()
    }

    pub fn live_resources(&self) -> usize {
        self.backend.live_resources()
    }

    /// Upload one framebuffer and draw the quad with it.
    pub fn submit_frame(&mut self, pixels: &[u8]) -> Result<(), RenderError> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| RenderError::SessionLost { reason: "render handle was torn down".into() })?;

        if pixels.len() != resources.dims.len() {
            return Err(RenderError::FrameSize { expected: resources.dims.len(), actual: pixels.len() });
        }

        self.backend.upload(resources.texture, &resources.upload_region(), pixels)?;
        self.backend.submit_frame(&resources.draw_call())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
    }

    /// Replace the resources with a set sized for a different framebuffer.
    pub fn rebuild(&mut self, dims: FrameDims) -> Result<(), RenderError> {
        self.teardown();
        self.resources = Some(ResourceBuilder::build(self.backend.as_mut(), dims)?);
        Ok(())
    }

    /// Release every resource. The handle is unusable afterwards.
    pub fn teardown(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.release(self.backend.as_mut());
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Tries each probe in priority order until one yields a complete handle.
pub struct Negotiator {
    probes: Vec<Box<dyn BackendProbe>>,
    active: Option<RenderHandle>,
}

impl Negotiator {
    pub fn new(probes: Vec<Box<dyn BackendProbe>>) -> Self {
        Self { probes, active: None }
    }

    pub fn active_kind(&self) -> BackendKind {
        self.active.as_ref().map_or(BackendKind::None, RenderHandle::kind)
    }

    pub fn active(&mut self) -> Option<&mut RenderHandle> {
        self.active.as_mut()
    }

    /// Hand the negotiated handle to the frame loop.
    pub fn take(&mut self) -> Option<RenderHandle> {
        self.active.take()
    }

    pub async fn negotiate(&mut self, dims: FrameDims) -> Result<&mut RenderHandle, RenderError> {
        // never hold two tiers' objects at once
        if let Some(mut previous) = self.active.take() {
            info!("tearing down {} before renegotiating", previous.kind());
            previous.teardown();
        }

        let mut attempts = Vec::new();

        for probe in self.probes.iter_mut() {
            let kind = probe.kind();
            info!("trying {kind} backend");

            let attempt = match probe.acquire().await {
                Ok(backend) => RenderHandle::build(backend, dims),
                Err(e) => Err(e),
            };

            match attempt {
                Ok(handle) => {
                    info!("rendering using {kind}");
                    return Ok(self.active.insert(handle));
                }
                Err(cause) => {
                    warn!("{kind} rejected: {cause}");
                    attempts.push(TierFailure { kind, cause });
                }
            }
        }

        let err = RenderError::NoBackendAvailable { attempts };
        error!("{}", err.chain());
        self.active = Some(RenderHandle::inert());
        Err(err)
    }
}
