use std::sync::{Arc, Mutex};

use chipview_core::backend::{
    AddressMode, BackendKind, BufferDesc, BufferId, BufferUsage, DrawCall, FilterMode, FrontFace, GraphicsBackend,
    PipelineDesc, PipelineId, ResourceId, SamplerDesc, SamplerId, Slots, TextureDesc, TextureFormat, TextureId,
    TextureRegion,
};
use chipview_core::error::{RenderError, ShaderStage};
use chipview_core::quad::{AttributeFormat, VertexLayout, VERTEX_LAYOUTS};
use chipview_core::viewport::{fit_aspect, DISPLAY_ASPECT};
use tracing::{debug, error};

use super::{GraphicsContext, ShaderSet};

struct FrameTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct QuadPipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
}

/// One acquired wgpu tier. Validation errors land in `errors` through the
/// device's uncaptured-error hook and are checked after every call that can
/// raise one. Natively the hook fires before the call returns; in the browser
/// it may fire later, which is why probes run [`validate_shaders`] first.
pub struct WgpuBackend {
    kind: BackendKind,
    gc: GraphicsContext,
    shaders: ShaderSet,
    errors: Arc<Mutex<Option<String>>>,
    buffers: Slots<wgpu::Buffer>,
    textures: Slots<FrameTexture>,
    samplers: Slots<wgpu::Sampler>,
    pipelines: Slots<QuadPipeline>,
}

impl WgpuBackend {
    pub fn new(kind: BackendKind, gc: GraphicsContext) -> Self {
        let errors = Arc::new(Mutex::new(None));

        let sink = errors.clone();
        gc.device.on_uncaptured_error(Box::new(move |e| {
            error!("wgpu: {e}");
            if let Ok(mut slot) = sink.lock() {
                // keep the first one, later errors are usually fallout
                slot.get_or_insert_with(|| e.to_string());
            }
        }));

        Self {
            kind,
            gc,
            shaders: ShaderSet::for_tier(kind),
            errors,
            buffers: Slots::default(),
            textures: Slots::default(),
            samplers: Slots::default(),
            pipelines: Slots::default(),
        }
    }

    fn take_error(&self) -> Option<String> {
        self.errors.lock().ok().and_then(|mut slot| slot.take())
    }

    fn check(&self, what: &'static str) -> Result<(), RenderError> {
        match self.take_error() {
            Some(reason) => Err(RenderError::resource(what, reason)),
            None => Ok(()),
        }
    }

    fn shader_module(&self, stage: ShaderStage) -> Result<wgpu::ShaderModule, RenderError> {
        let module = shader_module(&self.gc.device, self.shaders, stage);
        match self.take_error() {
            Some(log) => Err(RenderError::ShaderCompileFailure { stage, log }),
            None => Ok(module),
        }
    }
}

/// Compile every stage and link them inside validation scopes. Browsers report
/// validation errors asynchronously, so this is the only place a broken shader
/// can be told apart from a later device loss.
pub async fn validate_shaders(
    device: &wgpu::Device,
    kind: BackendKind,
    format: wgpu::TextureFormat,
) -> Result<(), RenderError> {
    let shaders = ShaderSet::for_tier(kind);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let vertex = shader_module(device, shaders, ShaderStage::Vertex);
    scope_result(device.pop_error_scope().await, |log| RenderError::ShaderCompileFailure {
        stage: ShaderStage::Vertex,
        log,
    })?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let fragment = shader_module(device, shaders, ShaderStage::Fragment);
    scope_result(device.pop_error_scope().await, |log| RenderError::ShaderCompileFailure {
        stage: ShaderStage::Fragment,
        log,
    })?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let layouts = bind_group_layouts(device);
    let shape = PipelineShape {
        label: "quad-pipeline-check",
        vertex_layouts: &VERTEX_LAYOUTS,
        front_face: FrontFace::Cw,
        cull_back_faces: false,
        format,
    };
    let _pipeline = render_pipeline(device, &shape, &vertex, &fragment, &layouts);
    scope_result(device.pop_error_scope().await, |log| RenderError::ProgramLinkFailure { log })?;

    debug!("{kind} shaders validated");
    Ok(())
}

fn scope_result(error: Option<wgpu::Error>, into: impl FnOnce(String) -> RenderError) -> Result<(), RenderError> {
    match error {
        Some(e) => Err(into(e.to_string())),
        None => Ok(()),
    }
}

fn shader_module(device: &wgpu::Device, shaders: ShaderSet, stage: ShaderStage) -> wgpu::ShaderModule {
    let (label, source) = match (shaders, stage) {
        (ShaderSet::Wgsl { vertex, .. }, ShaderStage::Vertex) => ("quad.vert.wgsl", wgpu::ShaderSource::Wgsl(vertex.into())),
        (ShaderSet::Wgsl { fragment, .. }, ShaderStage::Fragment) => {
            ("quad.frag.wgsl", wgpu::ShaderSource::Wgsl(fragment.into()))
        }
        (ShaderSet::Glsl { vertex, .. }, ShaderStage::Vertex) => (
            "quad.vert",
            wgpu::ShaderSource::Glsl {
                shader: vertex.into(),
                stage: wgpu::naga::ShaderStage::Vertex,
                defines: Default::default(),
            },
        ),
        (ShaderSet::Glsl { fragment, .. }, ShaderStage::Fragment) => (
            "quad.frag",
            wgpu::ShaderSource::Glsl {
                shader: fragment.into(),
                stage: wgpu::naga::ShaderStage::Fragment,
                defines: Default::default(),
            },
        ),
    };

    device.create_shader_module(wgpu::ShaderModuleDescriptor { label: Some(label), source })
}

struct QuadLayouts {
    uniforms: wgpu::BindGroupLayout,
    texture: wgpu::BindGroupLayout,
}

fn bind_group_layouts(device: &wgpu::Device) -> QuadLayouts {
    let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quad-uniforms-bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quad-texture-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    });

    QuadLayouts { uniforms, texture }
}

struct PipelineShape<'a> {
    label: &'a str,
    vertex_layouts: &'a [VertexLayout],
    front_face: FrontFace,
    cull_back_faces: bool,
    format: wgpu::TextureFormat,
}

fn render_pipeline(
    device: &wgpu::Device,
    shape: &PipelineShape<'_>,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    layouts: &QuadLayouts,
) -> wgpu::RenderPipeline {
    let attributes: Vec<Vec<wgpu::VertexAttribute>> = shape.vertex_layouts.iter().map(vertex_attributes).collect();
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = shape
        .vertex_layouts
        .iter()
        .zip(&attributes)
        .map(|(layout, attributes)| wgpu::VertexBufferLayout {
            array_stride: layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("quad-pl"),
        bind_group_layouts: &[&layouts.uniforms, &layouts.texture],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(shape.label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: shape.format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: match shape.front_face {
                FrontFace::Cw => wgpu::FrontFace::Cw,
                FrontFace::Ccw => wgpu::FrontFace::Ccw,
            },
            cull_mode: shape.cull_back_faces.then_some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
    }
}

fn vertex_attributes(layout: &VertexLayout) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes
        .iter()
        .map(|a| wgpu::VertexAttribute { format: vertex_format(a.format), offset: a.offset, shader_location: a.location })
        .collect()
}

impl GraphicsBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, RenderError> {
        let usage = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;

        // mapped_at_creation needs a size that is a multiple of COPY_BUFFER_ALIGNMENT
        let buffer = self.gc.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage,
            mapped_at_creation: true,
        });
        self.check("buffer")?;

        buffer.slice(..).get_mapped_range_mut()[..desc.contents.len()].copy_from_slice(desc.contents);
        buffer.unmap();

        Ok(BufferId(self.buffers.insert(buffer)))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, RenderError> {
        let format = match desc.format {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        };

        let texture = self.gc.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.check("texture")?;

        Ok(TextureId(self.textures.insert(FrameTexture { texture, view })))
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, RenderError> {
        let address = match desc.address {
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        };
        let filter = match desc.filter {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        };

        let sampler = self.gc.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        self.check("sampler")?;

        Ok(SamplerId(self.samplers.insert(sampler)))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, RenderError> {
        let vertex = self.shader_module(ShaderStage::Vertex)?;
        let fragment = self.shader_module(ShaderStage::Fragment)?;

        let missing = |what: &'static str| RenderError::resource("pipeline", format!("unknown {what} handle"));
        let uniforms = self.buffers.get(desc.uniforms.0).ok_or_else(|| missing("uniform buffer"))?;
        let texture = self.textures.get(desc.texture.0).ok_or_else(|| missing("texture"))?;
        let sampler = self.samplers.get(desc.sampler.0).ok_or_else(|| missing("sampler"))?;

        let device = &self.gc.device;
        let layouts = bind_group_layouts(device);

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad-uniforms-bg"),
            layout: &layouts.uniforms,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() }],
        });
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad-texture-bg"),
            layout: &layouts.texture,
            entries: &[
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&texture.view) },
            ],
        });
        self.check("bind group")?;

        let shape = PipelineShape {
            label: desc.label,
            vertex_layouts: desc.vertex_layouts,
            front_face: desc.front_face,
            cull_back_faces: desc.cull_back_faces,
            format: self.gc.surface_config.format,
        };
        let pipeline = render_pipeline(device, &shape, &vertex, &fragment, &layouts);

        // stage interfaces are matched up here, so this is the link step
        if let Some(log) = self.take_error() {
            return Err(RenderError::ProgramLinkFailure { log });
        }

        debug!("{} pipeline ready ({:?})", self.kind, self.gc.surface_config.format);
        Ok(PipelineId(self.pipelines.insert(QuadPipeline { pipeline, uniform_bind_group, texture_bind_group })))
    }

    fn upload(&mut self, texture: TextureId, region: &TextureRegion, bytes: &[u8]) -> Result<(), RenderError> {
        let target = self
            .textures
            .get(texture.0)
            .ok_or_else(|| RenderError::SessionLost { reason: "framebuffer texture was released".into() })?;

        self.gc.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: region.origin[0], y: region.origin[1], z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.bytes_per_row),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d { width: region.width, height: region.height, depth_or_array_layers: 1 },
        );
        Ok(())
    }

    fn submit_frame(&mut self, draw: &DrawCall) -> Result<(), RenderError> {
        // anything reported since the last frame means the session is gone
        if let Some(reason) = self.take_error() {
            return Err(RenderError::SessionLost { reason });
        }

        let lost = |what: &str| RenderError::SessionLost { reason: format!("{what} handle is not live") };
        let pipeline = self.pipelines.get(draw.pipeline.0).ok_or_else(|| lost("pipeline"))?;
        let positions = self.buffers.get(draw.vertex_buffers[0].0).ok_or_else(|| lost("position buffer"))?;
        let colors = self.buffers.get(draw.vertex_buffers[1].0).ok_or_else(|| lost("color buffer"))?;
        let indices = self.buffers.get(draw.index_buffer.0).ok_or_else(|| lost("index buffer"))?;

        let surface_texture = match self.gc.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("surface timed out, dropping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::Outdated) => {
                self.gc.surface.configure(&self.gc.device, &self.gc.surface_config);
                self.gc
                    .surface
                    .get_current_texture()
                    .map_err(|e| RenderError::SessionLost { reason: e.to_string() })?
            }
            Err(e) => return Err(RenderError::SessionLost { reason: e.to_string() }),
        };

        let surface_view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.gc.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("quad-frame") });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let vp = fit_aspect(self.gc.surface_config.width, self.gc.surface_config.height, DISPLAY_ASPECT);
            pass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &pipeline.uniform_bind_group, &[]);
            pass.set_bind_group(1, &pipeline.texture_bind_group, &[]);
            pass.set_vertex_buffer(0, positions.slice(..));
            pass.set_vertex_buffer(1, colors.slice(..));
            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }

        self.gc.queue.submit(Some(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gc.resize(width, height);
    }

    fn release(&mut self, id: ResourceId) {
        match id {
            ResourceId::Buffer(BufferId(raw)) => {
                if let Some(buffer) = self.buffers.remove(raw) {
                    buffer.destroy();
                }
            }
            ResourceId::Texture(TextureId(raw)) => {
                if let Some(frame) = self.textures.remove(raw) {
                    frame.texture.destroy();
                }
            }
            ResourceId::Sampler(SamplerId(raw)) => {
                self.samplers.remove(raw);
            }
            ResourceId::Pipeline(PipelineId(raw)) => {
                self.pipelines.remove(raw);
            }
        }
    }

    fn live_resources(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.samplers.len() + self.pipelines.len()
    }
}
