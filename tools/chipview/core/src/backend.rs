//! The capability set every graphics tier exposes to the rest of the crate.
//!
//! Objects live inside the backend and are addressed by typed handles, so a
//! tier that is abandoned half-way can be asked to release exactly what it
//! handed out.

use std::collections::BTreeMap;
use std::fmt;

use futures::future::LocalBoxFuture;

use crate::error::RenderError;
use crate::quad::{VertexLayout, BUFFER_ALIGNMENT};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    ModernGpu,
    LegacyRaster,
    None,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::ModernGpu => f.write_str("modern GPU"),
            BackendKind::LegacyRaster => f.write_str("legacy raster"),
            BackendKind::None => f.write_str("no backend"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Buffer(BufferId),
    Texture(TextureId),
    Sampler(SamplerId),
    Pipeline(PipelineId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

#[derive(Copy, Clone, Debug)]
pub struct BufferDesc<'a> {
    pub label: &'static str,
    pub usage: BufferUsage,
    /// Allocation size, already rounded to the backend alignment.
    pub size: u64,
    /// Initial contents; may be shorter than `size`, the tail is zeroed.
    pub contents: &'a [u8],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// One 8-bit normalized channel.
    R8Unorm,
}

/// A sampled texture that is only ever written by uploads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SamplerDesc {
    pub label: &'static str,
    pub filter: FilterMode,
    pub address: AddressMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrontFace {
    Cw,
    Ccw,
}

#[derive(Copy, Clone, Debug)]
pub struct PipelineDesc<'a> {
    pub label: &'static str,
    pub vertex_layouts: &'a [VertexLayout],
    pub uniforms: BufferId,
    pub texture: TextureId,
    pub sampler: SamplerId,
    pub front_face: FrontFace,
    pub cull_back_faces: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureRegion {
    pub origin: [u32; 2],
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub pipeline: PipelineId,
    pub vertex_buffers: [BufferId; 2],
    pub index_buffer: BufferId,
    pub index_count: u32,
}

pub trait GraphicsBackend {
    fn kind(&self) -> BackendKind;

    fn buffer_alignment(&self) -> u64 {
        BUFFER_ALIGNMENT
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, RenderError>;
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, RenderError>;
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, RenderError>;

    /// Compile, link and bind everything the draw needs.
    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, RenderError>;

    fn upload(&mut self, texture: TextureId, region: &TextureRegion, bytes: &[u8]) -> Result<(), RenderError>;

    /// Record and submit one frame. Returns once host-side recording is done.
    fn submit_frame(&mut self, draw: &DrawCall) -> Result<(), RenderError>;

    /// The presentation surface changed size.
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn release(&mut self, id: ResourceId);

    /// Objects created and not yet released.
    fn live_resources(&self) -> usize;
}

/// Acquires one tier. A failed acquisition leaves nothing behind.
pub trait BackendProbe {
    fn kind(&self) -> BackendKind;
    fn acquire(&mut self) -> LocalBoxFuture<'_, Result<Box<dyn GraphicsBackend>, RenderError>>;
}

/// Handle-indexed object storage for backend implementations.
#[derive(Debug)]
pub struct Slots<T> {
    next: u32,
    items: BTreeMap<u32, T>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self { next: 1, items: BTreeMap::new() }
    }
}

impl<T> Slots<T> {
    pub fn insert(&mut self, item: T) -> u32 {
        let id = self.next;
        self.next += 1;
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The bottom tier: nothing can be drawn.
#[derive(Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    fn refuse<T>(&self) -> Result<T, RenderError> {
        Err(RenderError::unavailable(BackendKind::None, "no graphics backend is active"))
    }
}

impl GraphicsBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::None
    }

    fn create_buffer(&mut self, _desc: &BufferDesc<'_>) -> Result<BufferId, RenderError> {
        self.refuse()
    }

    fn create_texture(&mut self, _desc: &TextureDesc) -> Result<TextureId, RenderError> {
        self.refuse()
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Result<SamplerId, RenderError> {
        self.refuse()
    }

    fn create_pipeline(&mut self, _desc: &PipelineDesc<'_>) -> Result<PipelineId, RenderError> {
        self.refuse()
    }

    fn upload(&mut self, _texture: TextureId, _region: &TextureRegion, _bytes: &[u8]) -> Result<(), RenderError> {
        self.refuse()
    }

    fn submit_frame(&mut self, _draw: &DrawCall) -> Result<(), RenderError> {
        self.refuse()
    }

    fn release(&mut self, _id: ResourceId) {}

    fn live_resources(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_never_reuse_handles() {
        let mut slots = Slots::default();
        let a = slots.insert("a");
        let b = slots.insert("b");
        assert_ne!(a, b);
        assert_eq!(slots.remove(a), Some("a"));
        let c = slots.insert("c");
        assert_ne!(a, c);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.get(b), Some(&"b"));
    }

    #[test]
    fn null_backend_refuses_everything() {
        let mut null = NullBackend;
        let err = null
            .create_texture(&TextureDesc { label: "t", width: 1, height: 1, format: TextureFormat::R8Unorm })
            .unwrap_err();
        assert!(matches!(err, RenderError::BackendUnavailable { kind: BackendKind::None, .. }));
        assert_eq!(null.live_resources(), 0);
    }
}
