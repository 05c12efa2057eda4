// renderer/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::renderer::camera::PerspectiveCamera;
use crate::renderer::light::MAX_DIRECTIONAL_LIGHTS;
use crate::renderer::Material;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    /// View-projection without translation, used by the skybox.
    pub sky_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            sky_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 0.0],
            _padding: 0.0,
        }
    }

    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let view = camera.view_matrix();
        let rotation_only = Mat4::from_mat3(glam::Mat3::from_mat4(view));
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            sky_view_proj: (camera.projection_matrix() * rotation_only).to_cols_array_2d(),
            camera_pos: camera.position().to_array(),
            _padding: 0.0,
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Light-space matrices of the shadow casting directional lights, in atlas tile order.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct ShadowMappingInfo {
    pub light_space: [[[f32; 4]; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub count: u32,
    pub _padding: [u32; 3],
}

impl ShadowMappingInfo {
    /// Keeps the first `MAX_DIRECTIONAL_LIGHTS` matrices.
    pub fn from_matrices(matrices: &[Mat4]) -> Self {
        let mut info = Self::zeroed();
        for (dst, src) in info.light_space.iter_mut().zip(matrices) {
            *dst = src.to_cols_array_2d();
        }
        info.count = matrices.len().min(MAX_DIRECTIONAL_LIGHTS) as u32;
        info
    }

    pub fn matrix(&self, index: usize) -> Option<Mat4> {
        (index < self.count as usize).then(|| Mat4::from_cols_array_2d(&self.light_space[index]))
    }
}

impl Default for ShadowMappingInfo {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Per-draw push constants of the geometry pass.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ModelInfo {
    pub model: [[f32; 4]; 4],
    pub albedo: [f32; 4],
    pub emission: [f32; 4],
    pub metallic_roughness_ao: [f32; 4],
}

impl ModelInfo {
    pub fn new(model: &Mat4, material: &Material) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            albedo: material.albedo.to_array(),
            emission: material.emission.extend(0.0).to_array(),
            metallic_roughness_ao: Vec4::new(
                material.metallic,
                material.roughness,
                material.ao,
                0.0,
            )
            .to_array(),
        }
    }
}

/// Per-draw push constants of the shadow pass.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ShadowConstants {
    pub light_view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

impl ShadowConstants {
    pub fn new(light_view_proj: &Mat4, model: &Mat4) -> Self {
        Self {
            light_view_proj: light_view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct ToneMappingConstants {
    /// 1 when the bloom input holds a real bloom chain, 0 for the neutral texture.
    pub bloom_enabled: u32,
    pub bloom_intensity: f32,
    pub exposure: f32,
    pub _padding: u32,
}

impl ToneMappingConstants {
    pub fn new(bloom_enabled: bool, bloom_intensity: f32, exposure: f32) -> Self {
        Self {
            bloom_enabled: bloom_enabled as u32,
            bloom_intensity,
            exposure,
            _padding: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MAX_PUSH_CONSTANT_SIZE;

    #[test]
    fn camera_uniform_is_144_bytes() {
        // 2 * mat4x4<f32> = 128 bytes, vec3<f32> = 12 bytes, padding = 4 bytes = 144 bytes
        assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
    }

    #[test]
    fn push_constants_fit_the_device_limit() {
        assert_eq!(std::mem::size_of::<ModelInfo>(), 112);
        assert!(std::mem::size_of::<ShadowConstants>() as u32 <= MAX_PUSH_CONSTANT_SIZE);
        assert_eq!(std::mem::size_of::<ToneMappingConstants>(), 16);
    }

    #[test]
    fn shadow_info_counts_only_stored_matrices() {
        let matrices = [Mat4::IDENTITY; 6];
        let info = ShadowMappingInfo::from_matrices(&matrices);
        assert_eq!(info.count as usize, MAX_DIRECTIONAL_LIGHTS);
        assert_eq!(info.matrix(0), Some(Mat4::IDENTITY));
        assert_eq!(info.matrix(MAX_DIRECTIONAL_LIGHTS), None);
    }
}
