use log::{debug, warn};

use crate::backend::{
    AddressMode, BufferDesc, BufferId, BufferUsage, DrawCall, FilterMode, FrontFace, GraphicsBackend, PipelineDesc,
    PipelineId, ResourceId, SamplerDesc, SamplerId, TextureDesc, TextureFormat, TextureId, TextureRegion,
};
use crate::error::RenderError;
use crate::frame::FrameDims;
use crate::quad::{aligned_size, QuadUniforms, QUAD_COLORS, QUAD_INDICES, QUAD_VERTICES, VERTEX_LAYOUTS};

/// Everything one draw of the framebuffer quad needs, all owned by a single
/// backend. Only [`ResourceBuilder::build`] constructs it, and only once every
/// object exists.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderResources {
    pub positions: BufferId,
    pub colors: BufferId,
    pub indices: BufferId,
    pub uniforms: BufferId,
    pub texture: TextureId,
    pub sampler: SamplerId,
    pub pipeline: PipelineId,
    pub dims: FrameDims,
}

impl RenderResources {
    pub fn ids(&self) -> [ResourceId; 7] {
        [
            ResourceId::Pipeline(self.pipeline),
            ResourceId::Sampler(self.sampler),
            ResourceId::Texture(self.texture),
            ResourceId::Buffer(self.uniforms),
            ResourceId::Buffer(self.indices),
            ResourceId::Buffer(self.colors),
            ResourceId::Buffer(self.positions),
        ]
    }

    pub fn draw_call(&self) -> DrawCall {
        DrawCall {
            pipeline: self.pipeline,
            vertex_buffers: [self.positions, self.colors],
            index_buffer: self.indices,
            index_count: QUAD_INDICES.len() as u32,
        }
    }

    /// The whole texture, rows packed at one byte per pixel.
    pub fn upload_region(&self) -> TextureRegion {
        TextureRegion {
            origin: [0, 0],
            width: self.dims.width,
            height: self.dims.height,
            bytes_per_row: self.dims.width,
        }
    }

    pub fn release(self, backend: &mut dyn GraphicsBackend) {
        for id in self.ids() {
            backend.release(id);
        }
    }
}

/// Tracks what a build has created so far, to undo it on failure.
struct Transaction<'b> {
    backend: &'b mut dyn GraphicsBackend,
    created: Vec<ResourceId>,
}

impl<'b> Transaction<'b> {
    fn new(backend: &'b mut dyn GraphicsBackend) -> Self {
        Self { backend, created: Vec::with_capacity(7) }
    }

    fn buffer(&mut self, label: &'static str, usage: BufferUsage, contents: &[u8]) -> Result<BufferId, RenderError> {
        // rounded unconditionally: some backends misbehave on unaligned sizes
        let size = aligned_size(contents.len() as u64, self.backend.buffer_alignment());
        let id = self.backend.create_buffer(&BufferDesc { label, usage, size, contents })?;
        self.created.push(ResourceId::Buffer(id));
        Ok(id)
    }

    fn texture(&mut self, desc: &TextureDesc) -> Result<TextureId, RenderError> {
        let id = self.backend.create_texture(desc)?;
        self.created.push(ResourceId::Texture(id));
        Ok(id)
    }

    fn sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, RenderError> {
        let id = self.backend.create_sampler(desc)?;
        self.created.push(ResourceId::Sampler(id));
        Ok(id)
    }

    fn pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, RenderError> {
        let id = self.backend.create_pipeline(desc)?;
        self.created.push(ResourceId::Pipeline(id));
        Ok(id)
    }

    fn commit(mut self) {
        self.created.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.created.is_empty() {
            warn!("rolling back {} {} resources", self.created.len(), self.backend.kind());
        }
        while let Some(id) = self.created.pop() {
            self.backend.release(id);
        }
    }
}

pub struct ResourceBuilder;

impl ResourceBuilder {
    pub fn build(backend: &mut dyn GraphicsBackend, dims: FrameDims) -> Result<RenderResources, RenderError> {
        if dims.is_empty() {
            return Err(RenderError::resource("texture", format!("empty framebuffer {}x{}", dims.width, dims.height)));
        }

        let kind = backend.kind();
        let mut tx = Transaction::new(backend);

        let positions = tx.buffer("quad-positions", BufferUsage::Vertex, bytemuck::cast_slice(&QUAD_VERTICES))?;
        let colors = tx.buffer("quad-colors", BufferUsage::Vertex, bytemuck::cast_slice(&QUAD_COLORS))?;
        let indices = tx.buffer("quad-indices", BufferUsage::Index, bytemuck::cast_slice(&QUAD_INDICES))?;
        let uniforms = tx.buffer("quad-uniforms", BufferUsage::Uniform, bytemuck::bytes_of(&QuadUniforms::default()))?;

        let texture = tx.texture(&TextureDesc {
            label: "framebuffer",
            width: dims.width,
            height: dims.height,
            format: TextureFormat::R8Unorm,
        })?;

        let sampler = tx.sampler(&SamplerDesc {
            label: "framebuffer-sampler",
            filter: FilterMode::Nearest,
            address: AddressMode::Repeat,
        })?;

        let pipeline = tx.pipeline(&PipelineDesc {
            label: "quad-pipeline",
            vertex_layouts: &VERTEX_LAYOUTS,
            uniforms,
            texture,
            sampler,
            front_face: FrontFace::Cw,
            cull_back_faces: false,
        })?;

        tx.commit();
        debug!("{kind} resources built for {}x{} framebuffer", dims.width, dims.height);

        Ok(RenderResources { positions, colors, indices, uniforms, texture, sampler, pipeline, dims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, Slots};

    /// Records every descriptor and fails on request.
    #[derive(Default)]
    struct Recorder {
        live: Slots<&'static str>,
        buffer_sizes: Vec<(u64, usize)>,
        fail_at: Option<&'static str>,
    }

    impl Recorder {
        fn create(&mut self, label: &'static str) -> Result<u32, RenderError> {
            if self.fail_at == Some(label) {
                return Err(RenderError::resource("object", format!("refusing {label}")));
            }
            Ok(self.live.insert(label))
        }
    }

    impl GraphicsBackend for Recorder {
        fn kind(&self) -> BackendKind {
            BackendKind::ModernGpu
        }
        fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, RenderError> {
            self.buffer_sizes.push((desc.size, desc.contents.len()));
            self.create(desc.label).map(BufferId)
        }
        fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, RenderError> {
            self.create(desc.label).map(TextureId)
        }
        fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, RenderError> {
            assert_eq!(desc.filter, FilterMode::Nearest);
            assert_eq!(desc.address, AddressMode::Repeat);
            self.create(desc.label).map(SamplerId)
        }
        fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, RenderError> {
            assert_eq!(desc.vertex_layouts.len(), 2);
            assert!(!desc.cull_back_faces);
            self.create(desc.label).map(PipelineId)
        }
        fn upload(&mut self, _: TextureId, _: &TextureRegion, _: &[u8]) -> Result<(), RenderError> {
            Ok(())
        }
        fn submit_frame(&mut self, _: &DrawCall) -> Result<(), RenderError> {
            Ok(())
        }
        fn release(&mut self, id: ResourceId) {
            let raw = match id {
                ResourceId::Buffer(BufferId(raw))
                | ResourceId::Texture(TextureId(raw))
                | ResourceId::Sampler(SamplerId(raw))
                | ResourceId::Pipeline(PipelineId(raw)) => raw,
            };
            self.live.remove(raw);
        }
        fn live_resources(&self) -> usize {
            self.live.len()
        }
    }

    #[test]
    fn builds_all_seven_objects() {
        let mut backend = Recorder::default();
        let res = ResourceBuilder::build(&mut backend, FrameDims::new(64, 32)).unwrap();
        assert_eq!(backend.live_resources(), 7);
        assert_eq!(res.dims, FrameDims::new(64, 32));
        assert_eq!(res.draw_call().index_count, 6);
        assert_eq!(res.upload_region().bytes_per_row, 64);

        res.release(&mut backend);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn buffer_sizes_are_aligned() {
        let mut backend = Recorder::default();
        ResourceBuilder::build(&mut backend, FrameDims::new(64, 32)).unwrap();
        for (size, len) in &backend.buffer_sizes {
            assert_eq!(size % 4, 0);
            assert!(*size as usize >= *len);
        }
    }

    #[test]
    fn failure_rolls_back_partial_build() {
        for label in ["quad-colors", "framebuffer", "framebuffer-sampler", "quad-pipeline"] {
            let mut backend = Recorder { fail_at: Some(label), ..Default::default() };
            let err = ResourceBuilder::build(&mut backend, FrameDims::new(64, 32)).unwrap_err();
            assert!(matches!(err, RenderError::ResourceCreationFailure { .. }));
            assert_eq!(backend.live_resources(), 0, "leaked objects after failing at {label}");
        }
    }

    #[test]
    fn empty_framebuffer_is_refused_up_front() {
        let mut backend = Recorder::default();
        assert!(ResourceBuilder::build(&mut backend, FrameDims::new(0, 32)).is_err());
        assert!(backend.buffer_sizes.is_empty());
    }
}
