//! The five fixed passes of a frame, in recording order: shadow atlas, G-buffer, lighting with
//! skybox, compute bloom and tone mapping.
//!
//! Passes own their targets and pipelines. Anything produced by one pass and consumed by another
//! is handed over as a handle at record time, so a pass can be rebuilt on its own without leaving
//! stale handles behind in its neighbours.

pub mod bloom;
pub mod geometry;
pub mod lighting;
pub mod shadow;
pub mod tone_mapping;

pub use bloom::BloomPass;
pub use geometry::{DrawCounts, GBuffer, GeometryPass};
pub use lighting::{LightingInputs, LightingPass};
pub use shadow::ShadowPass;
pub use tone_mapping::ToneMappingPass;

use crate::backend::{
    AddressMode, BackendResult, BindGroupLayoutEntry, BindingType, CommandBuffer, Extent,
    FilterMode, RecordingError, RenderDevice, SamplerBindingType, SamplerDescriptor,
    SamplerHandle, ShaderStages, TextureSampleType, TextureViewDimension,
};

/// Edge length of the square workgroups used by the bloom compute shaders.
pub const WORKGROUP_SIZE: u32 = 8;

/// Workgroups needed to cover `extent` with one invocation per texel.
pub fn workgroup_count(extent: Extent) -> (u32, u32) {
    (
        extent.width.div_ceil(WORKGROUP_SIZE),
        extent.height.div_ceil(WORKGROUP_SIZE),
    )
}

pub(crate) fn linear_sampler<D: RenderDevice>(
    device: &mut D,
    label: &'static str,
) -> BackendResult<SamplerHandle> {
    device.create_sampler(&SamplerDescriptor {
        label,
        filter: FilterMode::Linear,
        address_mode: AddressMode::ClampToEdge,
        compare: None,
    })
}

pub(crate) const fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(binding, visibility, BindingType::UniformBuffer)
}

pub(crate) const fn texture_entry(
    binding: u32,
    visibility: ShaderStages,
    filterable: bool,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(
        binding,
        visibility,
        BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable },
            dimension: TextureViewDimension::D2,
        },
    )
}

pub(crate) const fn sampler_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry::new(
        binding,
        visibility,
        BindingType::Sampler(SamplerBindingType::Filtering),
    )
}

/// A single oversized triangle generated from the vertex index.
pub(crate) fn draw_fullscreen(commands: &mut CommandBuffer) -> Result<(), RecordingError> {
    commands.draw(0..3, 0..1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(Extent::new(640, 360)), (80, 45));
        assert_eq!(workgroup_count(Extent::new(641, 1)), (81, 1));
        assert_eq!(workgroup_count(Extent::new(1, 1)), (1, 1));
    }
}
