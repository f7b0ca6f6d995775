//! The one textured rectangle and its uniform block.
//!
//! ```text
//! 0 - 3
//! |   |
//! 1 - 2
//! ```
//!
//! Texture row 0 is the top of the engine's screen, so the top vertices map to
//! `v = 0`.

use bytemuck::{Pod, Zeroable};

/// Backends reject buffer sizes that are not a multiple of this.
pub const BUFFER_ALIGNMENT: u64 = 4;

/// Round `len` up to the next multiple of `align` (a power of two).
pub const fn aligned_size(len: u64, align: u64) -> u64 {
    (len + align - 1) & !(align - 1)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

#[rustfmt::skip]
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0,  1.0], tex_coord: [0.0, 0.0] }, // top-left
    QuadVertex { position: [-1.0, -1.0], tex_coord: [0.0, 1.0] }, // bottom-left
    QuadVertex { position: [ 1.0, -1.0], tex_coord: [1.0, 1.0] }, // bottom-right
    QuadVertex { position: [ 1.0,  1.0], tex_coord: [1.0, 0.0] }, // top-right
];

// currently not read by the fragment stage
#[rustfmt::skip]
pub const QUAD_COLORS: [[f32; 3]; 4] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub const PRIMARY_TINT: [f32; 4] = [0.19, 0.19, 0.19, 1.0];
pub const ACCENT_TINT: [f32; 4] = [0.87, 0.87, 0.87, 1.0];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadUniforms {
    pub model_view_proj: [[f32; 4]; 4],
    pub primary: [f32; 4],
    pub accent: [f32; 4],
}

impl Default for QuadUniforms {
    fn default() -> Self {
        Self {
            model_view_proj: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            primary: PRIMARY_TINT,
            accent: ACCENT_TINT,
        }
    }
}

/// Scalar type of one vertex attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
}

impl AttributeFormat {
    pub const fn size(self) -> u64 {
        match self {
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: u64,
    pub format: AttributeFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

/// Buffer 0: interleaved position (`location 0`) and tex-coord (`location 2`).
pub const POSITION_LAYOUT: VertexLayout = VertexLayout {
    stride: std::mem::size_of::<QuadVertex>() as u64,
    attributes: &[
        VertexAttribute { location: 0, offset: 0, format: AttributeFormat::Float32x2 },
        VertexAttribute { location: 2, offset: 8, format: AttributeFormat::Float32x2 },
    ],
};

/// Buffer 1: per-vertex color (`location 1`).
pub const COLOR_LAYOUT: VertexLayout = VertexLayout {
    stride: std::mem::size_of::<[f32; 3]>() as u64,
    attributes: &[VertexAttribute { location: 1, offset: 0, format: AttributeFormat::Float32x3 }],
};

pub const VERTEX_LAYOUTS: [VertexLayout; 2] = [POSITION_LAYOUT, COLOR_LAYOUT];
