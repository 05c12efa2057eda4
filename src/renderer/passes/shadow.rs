// renderer/passes/shadow.rs
// Directional shadow maps rendered side by side into one depth atlas

use bytemuck::bytes_of;
use glam::Mat4;

use crate::backend::{
    BufferDescriptor, BufferHandle, BufferUsages, CommandBuffer, CompareFunction, DepthAttachment,
    Extent, IndexFormat, LoadOp, PipelineHandle, RecordingError, RenderDevice, RenderPassDescriptor,
    ShaderSource, ShaderStages, StoreOp, TextureDescriptor, TextureDimension, TextureFormat,
    TextureHandle, TextureUsages, Viewport,
};
use crate::error::RendererResult;
use crate::renderer::light::{shadow_casters, Light, MAX_DIRECTIONAL_LIGHTS};
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::transforms::RenderableEntity;
use crate::renderer::uniforms::{ShadowConstants, ShadowMappingInfo};
use crate::renderer::Vertex;

const SHADER: ShaderSource = ShaderSource {
    label: "shadow",
    wgsl: include_str!("../../shader/shadow.wgsl"),
};

pub struct ShadowPass {
    resolution: u32,
    atlas: TextureHandle,
    pipeline: PipelineHandle,
    info_buffer: BufferHandle,
    info: ShadowMappingInfo,
}

impl ShadowPass {
    pub const ATLAS_FORMAT: TextureFormat = TextureFormat::Depth32Float;

    pub fn new<D: RenderDevice>(device: &mut D, resolution: u32) -> RendererResult<Self> {
        let atlas = device.create_texture(&TextureDescriptor {
            label: "Shadow Atlas",
            extent: Self::atlas_extent(resolution),
            format: Self::ATLAS_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::SAMPLED,
            dimension: TextureDimension::D2,
        })?;

        let info_buffer = device.create_buffer(&BufferDescriptor {
            label: "Shadow Mapping Info",
            size: std::mem::size_of::<ShadowMappingInfo>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        })?;

        let pipeline = PipelineBuilder::new("Shadow Pipeline", SHADER)
            .depth_only()
            .with_vertex_buffer(Vertex::layout())
            .with_push_constants(
                ShaderStages::VERTEX,
                std::mem::size_of::<ShadowConstants>() as u32,
            )
            .with_depth_stencil_biased(
                Self::ATLAS_FORMAT,
                true,
                CompareFunction::LessEqual,
                2,
                2.0,
            )
            .build(device)?;

        log::debug!(
            "Shadow atlas {}x{} ({} tiles of {})",
            resolution * MAX_DIRECTIONAL_LIGHTS as u32,
            resolution,
            MAX_DIRECTIONAL_LIGHTS,
            resolution
        );

        Ok(Self {
            resolution,
            atlas,
            pipeline,
            info_buffer,
            info: ShadowMappingInfo::default(),
        })
    }

    /// One square tile per directional light, laid out horizontally.
    pub fn atlas_extent(resolution: u32) -> Extent {
        Extent::new(resolution * MAX_DIRECTIONAL_LIGHTS as u32, resolution)
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn atlas(&self) -> TextureHandle {
        self.atlas
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn info_buffer(&self) -> BufferHandle {
        self.info_buffer
    }

    pub fn info(&self) -> &ShadowMappingInfo {
        &self.info
    }

    /// Computes the light-space matrices of this frame's casters and uploads them.
    pub fn prepare<D: RenderDevice>(
        &mut self,
        device: &mut D,
        lights: &[Light],
    ) -> RendererResult<&ShadowMappingInfo> {
        let matrices: Vec<Mat4> = shadow_casters(lights)
            .map(|light| light.shadow_matrix())
            .collect();
        self.info = ShadowMappingInfo::from_matrices(&matrices);
        device.write_buffer(self.info_buffer, 0, bytes_of(&self.info))?;
        Ok(&self.info)
    }

    /// Clears the atlas and renders every renderable once per caster tile.
    pub fn record(
        &self,
        commands: &mut CommandBuffer,
        renderables: &[RenderableEntity],
    ) -> Result<(), RecordingError> {
        commands.begin_render_pass(RenderPassDescriptor {
            label: "Shadow Pass",
            color_attachments: Vec::new(),
            depth_attachment: Some(DepthAttachment {
                texture: self.atlas,
                load: LoadOp::Clear(1.0),
                store: StoreOp::Store,
            }),
        })?;

        if self.info.count > 0 {
            commands.set_pipeline(self.pipeline)?;
            let tile = self.resolution as f32;

            for index in 0..self.info.count as usize {
                let Some(light_view_proj) = self.info.matrix(index) else {
                    break;
                };
                commands.set_viewport(Viewport {
                    x: index as f32 * tile,
                    y: 0.0,
                    width: tile,
                    height: tile,
                })?;

                for renderable in renderables {
                    let constants = ShadowConstants::new(&light_view_proj, &renderable.model);
                    commands.set_push_constants(ShaderStages::VERTEX, 0, bytes_of(&constants))?;
                    commands.set_vertex_buffer(0, renderable.mesh.vertex_buffer())?;
                    commands.set_index_buffer(renderable.mesh.index_buffer(), IndexFormat::Uint32)?;
                    commands.draw_indexed(0..renderable.mesh.index_count(), 0, 0..1)?;
                }
            }
        }

        commands.end_render_pass()
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        device.destroy_texture(self.atlas);
        device.destroy_buffer(self.info_buffer);
        device.destroy_pipeline(self.pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, HeadlessDevice};
    use crate::renderer::light::DirectionalLight;
    use glam::Vec3;

    fn caster(direction: Vec3) -> Light {
        Light::Directional(DirectionalLight {
            position: Vec3::ZERO,
            direction,
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: true,
        })
    }

    #[test]
    fn atlas_is_one_tile_per_directional_light() {
        let mut device = HeadlessDevice::new();
        let pass = ShadowPass::new(&mut device, 512).unwrap();

        let desc = device.texture_descriptor(pass.atlas()).unwrap();
        assert_eq!(desc.extent, Extent::new(2048, 512));
        assert_eq!(desc.format, TextureFormat::Depth32Float);
    }

    #[test]
    fn prepare_uploads_one_matrix_per_caster() {
        let mut device = HeadlessDevice::new();
        let mut pass = ShadowPass::new(&mut device, 256).unwrap();
        let lights = [caster(Vec3::NEG_Y), caster(Vec3::new(1.0, -1.0, 0.0))];

        let info = *pass.prepare(&mut device, &lights).unwrap();

        assert_eq!(info.count, 2);
        assert_eq!(
            device.buffer_contents(pass.info_buffer()),
            Some(bytes_of(&info))
        );
    }

    #[test]
    fn each_caster_renders_into_its_own_tile() {
        let mut device = HeadlessDevice::new();
        let mut pass = ShadowPass::new(&mut device, 256).unwrap();
        pass.prepare(&mut device, &[caster(Vec3::NEG_Y), caster(Vec3::NEG_X)])
            .unwrap();

        let mut commands = CommandBuffer::new("Test");
        commands.begin().unwrap();
        pass.record(&mut commands, &[]).unwrap();
        commands.end().unwrap();

        let offsets: Vec<f32> = commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::SetViewport(viewport) => Some(viewport.x),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0.0, 256.0]);
    }
}
