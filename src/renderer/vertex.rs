use bytemuck::{Pod, Zeroable};
use std::mem;

use crate::backend::{VertexAttribute, VertexBufferLayout, VertexFormat};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRS: [VertexAttribute; 3] = [
        VertexAttribute {
            format: VertexFormat::Float32x3,
            offset: 0,
            location: 0,
        },
        VertexAttribute {
            format: VertexFormat::Float32x3,
            offset: 12,
            location: 1,
        },
        VertexAttribute {
            format: VertexFormat::Float32x2,
            offset: 24,
            location: 2,
        },
    ];

    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            stride: mem::size_of::<Vertex>() as u64,
            attributes: Self::ATTRS.to_vec(),
        }
    }
}

#[inline]
pub fn v(pos: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex { pos, normal, uv }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn vertex_stride_matches_struct_size() {
        assert_eq!(Vertex::layout().stride, std::mem::size_of::<Vertex>() as u64);
        assert_eq!(Vertex::layout().stride, 32);
    }
}
