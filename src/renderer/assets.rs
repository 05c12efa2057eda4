// renderer/assets.rs
// GPU-resident meshes, flat PBR materials and cubemaps referenced by scene components

use glam::{Vec3, Vec4};

use crate::backend::{
    BackendError, BackendResult, BufferDescriptor, BufferHandle, BufferUsages, Extent,
    RenderDevice, TextureDescriptor, TextureDimension, TextureFormat, TextureHandle,
    TextureUsages,
};
use crate::renderer::bounds::Aabb;
use crate::renderer::Vertex;

#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    bounds: Option<Aabb>,
}

impl Mesh {
    pub fn upload<D: RenderDevice>(
        device: &mut D,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> BackendResult<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(BackendError::ResourceCreationFailed(
                "mesh has no vertices or indices".to_string(),
            ));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_buffer = device.create_buffer(&BufferDescriptor {
            label: "Mesh.VertexBuffer",
            size: vertex_bytes.len() as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        })?;
        device.write_buffer(vertex_buffer, 0, vertex_bytes)?;

        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let index_buffer = device.create_buffer(&BufferDescriptor {
            label: "Mesh.IndexBuffer",
            size: index_bytes.len() as u64,
            usage: BufferUsages::INDEX | BufferUsages::COPY_DST,
        })?;
        device.write_buffer(index_buffer, 0, index_bytes)?;

        let bounds = Aabb::from_points(vertices.iter().map(|vertex| Vec3::from(vertex.pos)));

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            bounds,
        })
    }

    /// Drops the local bounds so the mesh is never frustum culled.
    pub fn without_bounds(mut self) -> Self {
        self.bounds = None;
        self
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Local-space bounds.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        device.destroy_buffer(self.vertex_buffer);
        device.destroy_buffer(self.index_buffer);
    }
}

/// Untextured metallic/roughness material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    /// Linear HDR radiance added on top of lighting.
    pub emission: Vec3,
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Vec4::ONE)
    }
}

impl Material {
    pub fn new(albedo: Vec4) -> Self {
        Self {
            albedo,
            metallic: 0.0,
            roughness: 1.0,
            ao: 1.0,
            emission: Vec3::ZERO,
        }
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_ao(mut self, ao: f32) -> Self {
        self.ao = ao.clamp(0.0, 1.0);
        self
    }

    pub fn with_emission(mut self, emission: Vec3) -> Self {
        self.emission = emission.max(Vec3::ZERO);
        self
    }
}

/// Six-faced Rgba8 environment texture in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug)]
pub struct Cubemap {
    texture: TextureHandle,
    face_size: u32,
}

impl Cubemap {
    pub const FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

    pub fn upload<D: RenderDevice>(
        device: &mut D,
        face_size: u32,
        faces: [&[u8]; 6],
    ) -> BackendResult<Self> {
        let texture = device.create_texture(&TextureDescriptor {
            label: "Cubemap",
            extent: Extent::new(face_size, face_size),
            format: Self::FORMAT,
            usage: TextureUsages::SAMPLED | TextureUsages::COPY_DST,
            dimension: TextureDimension::Cube,
        })?;
        for (layer, face) in faces.iter().enumerate() {
            if let Err(err) = device.write_texture(texture, layer as u32, face) {
                device.destroy_texture(texture);
                return Err(err);
            }
        }
        Ok(Self { texture, face_size })
    }

    /// Sky fading from `horizon` to `zenith` on the side faces, solid on the top and bottom.
    pub fn gradient<D: RenderDevice>(
        device: &mut D,
        face_size: u32,
        zenith: [u8; 4],
        horizon: [u8; 4],
        ground: [u8; 4],
    ) -> BackendResult<Self> {
        let size = face_size.max(1) as usize;
        let solid = |color: [u8; 4]| color.repeat(size * size);
        let side: Vec<u8> = (0..size)
            .flat_map(|row| {
                let t = row as f32 / (size.max(2) - 1) as f32;
                let texel: [u8; 4] =
                    std::array::from_fn(|c| lerp_u8(zenith[c], horizon[c], t));
                texel.repeat(size)
            })
            .collect();
        let top = solid(zenith);
        let bottom = solid(ground);

        Self::upload(
            device,
            size as u32,
            [&side, &side, &top, &bottom, &side, &side],
        )
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        device.destroy_texture(self.texture);
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::renderer::primitives;

    #[test]
    fn mesh_upload_computes_local_bounds() {
        let mut device = HeadlessDevice::new();
        let (vertices, indices) = primitives::cube();
        let mesh = Mesh::upload(&mut device, &vertices, &indices).unwrap();

        assert_eq!(mesh.index_count(), 36);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::splat(-0.5));
        assert_eq!(bounds.max, Vec3::splat(0.5));
        assert_eq!(device.live_buffers(), 2);

        mesh.destroy(&mut device);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn cubemap_rejects_short_faces() {
        let mut device = HeadlessDevice::new();
        let face = vec![0u8; 4 * 4 * 4];
        let short = vec![0u8; 3];
        let result = Cubemap::upload(&mut device, 4, [&face, &face, &face, &face, &face, &short]);

        assert!(result.is_err());
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn gradient_cubemap_uploads_six_faces() {
        let mut device = HeadlessDevice::new();
        let cubemap =
            Cubemap::gradient(&mut device, 8, [40, 90, 200, 255], [200, 220, 255, 255], [30; 4])
                .unwrap();
        assert_eq!(cubemap.face_size(), 8);
        let desc = device.texture_descriptor(cubemap.texture()).unwrap();
        assert_eq!(desc.dimension, TextureDimension::Cube);
    }
}
