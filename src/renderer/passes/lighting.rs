// renderer/passes/lighting.rs
// Fullscreen deferred shading into the HDR target, followed by the skybox

use std::sync::Arc;

use bytemuck::bytes_of;

use crate::backend::{
    AddressMode, BindGroupEntry, BindGroupLayoutEntry, BindingResource, BindingType, BlendMode,
    BufferDescriptor, BufferHandle, BufferUsages, ColorAttachment, CommandBuffer, CompareFunction,
    DepthAttachment, Extent, FilterMode, FrontFace, IndexFormat, LoadOp, PipelineHandle,
    RecordingError, RenderDevice, RenderPassDescriptor, SamplerBindingType, SamplerDescriptor,
    SamplerHandle, ShaderSource, ShaderStages, StoreOp, TextureDescriptor, TextureFormat,
    TextureHandle, TextureSampleType, TextureViewDimension,
};
use crate::error::RendererResult;
use crate::renderer::light::{Light, LightsUniform};
use crate::renderer::passes::geometry::GBuffer;
use crate::renderer::passes::{
    draw_fullscreen, linear_sampler, sampler_entry, texture_entry, uniform_entry,
};
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::{primitives, Cubemap, Mesh, Vertex};

const LIGHTING_SHADER: ShaderSource = ShaderSource {
    label: "lighting",
    wgsl: include_str!("../../shader/lighting.wgsl"),
};

const SKYBOX_SHADER: ShaderSource = ShaderSource {
    label: "skybox",
    wgsl: include_str!("../../shader/skybox.wgsl"),
};

/// Resources produced by earlier passes of the same frame.
#[derive(Debug, Clone, Copy)]
pub struct LightingInputs<'a> {
    pub gbuffer: &'a GBuffer,
    pub camera_buffer: BufferHandle,
    pub shadow_atlas: TextureHandle,
    pub shadow_info_buffer: BufferHandle,
}

struct Skybox {
    cubemap: Arc<Cubemap>,
    cube: Mesh,
    sampler: SamplerHandle,
    pipeline: PipelineHandle,
}

impl Skybox {
    fn new<D: RenderDevice>(device: &mut D, cubemap: Arc<Cubemap>) -> RendererResult<Self> {
        let (vertices, indices) = primitives::cube();
        let cube = Mesh::upload(device, &vertices, &indices)?;
        let sampler = linear_sampler(device, "Skybox Sampler")?;

        // The cube is seen from the inside, where its outward CCW faces wind clockwise.
        let pipeline = PipelineBuilder::new("Skybox Pipeline", SKYBOX_SHADER)
            .with_bind_group(vec![
                uniform_entry(0, ShaderStages::VERTEX),
                BindGroupLayoutEntry::new(
                    1,
                    ShaderStages::FRAGMENT,
                    BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        dimension: TextureViewDimension::Cube,
                    },
                ),
                sampler_entry(2, ShaderStages::FRAGMENT),
            ])
            .with_vertex_buffer(Vertex::layout())
            .with_color_target(LightingPass::HDR_FORMAT, BlendMode::Replace)
            .with_depth_stencil(GBuffer::DEPTH_FORMAT, false, CompareFunction::LessEqual)
            .with_front_face(FrontFace::Cw)
            .build(device)?;

        Ok(Self {
            cubemap,
            cube,
            sampler,
            pipeline,
        })
    }

    fn record(
        &self,
        commands: &mut CommandBuffer,
        camera_buffer: BufferHandle,
    ) -> Result<(), RecordingError> {
        commands.set_pipeline(self.pipeline)?;
        commands.set_bind_group(
            0,
            vec![
                BindGroupEntry::new(0, BindingResource::Buffer(camera_buffer)),
                BindGroupEntry::new(1, BindingResource::Texture(self.cubemap.texture())),
                BindGroupEntry::new(2, BindingResource::Sampler(self.sampler)),
            ],
        )?;
        commands.set_vertex_buffer(0, self.cube.vertex_buffer())?;
        commands.set_index_buffer(self.cube.index_buffer(), IndexFormat::Uint32)?;
        commands.draw_indexed(0..self.cube.index_count(), 0, 0..1)
    }

    /// The cubemap itself belongs to the scene configuration and is left alone.
    fn destroy<D: RenderDevice>(&self, device: &mut D) {
        self.cube.destroy(device);
        device.destroy_pipeline(self.pipeline);
    }
}

pub struct LightingPass {
    hdr: TextureHandle,
    lights_buffer: BufferHandle,
    shadow_sampler: SamplerHandle,
    pipeline: PipelineHandle,
    skybox: Option<Skybox>,
}

impl LightingPass {
    pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

    pub fn new<D: RenderDevice>(
        device: &mut D,
        extent: Extent,
        skybox: Option<&Arc<Cubemap>>,
    ) -> RendererResult<Self> {
        let hdr = device.create_texture(&TextureDescriptor::render_target(
            "HDR Target",
            extent,
            Self::HDR_FORMAT,
        ))?;
        let lights_buffer = device.create_buffer(&BufferDescriptor {
            label: "Lights Uniform",
            size: std::mem::size_of::<LightsUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        })?;
        let shadow_sampler = device.create_sampler(&SamplerDescriptor {
            label: "Shadow Comparison Sampler",
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
            compare: Some(CompareFunction::LessEqual),
        })?;

        let fragment = ShaderStages::FRAGMENT;
        let pipeline = PipelineBuilder::new("Lighting Pipeline", LIGHTING_SHADER)
            .with_bind_group(vec![
                uniform_entry(0, fragment),
                uniform_entry(1, fragment),
                uniform_entry(2, fragment),
            ])
            .with_bind_group(vec![
                texture_entry(0, fragment, false),
                texture_entry(1, fragment, false),
                texture_entry(2, fragment, false),
                texture_entry(3, fragment, false),
                texture_entry(4, fragment, false),
                BindGroupLayoutEntry::new(
                    5,
                    fragment,
                    BindingType::Texture {
                        sample_type: TextureSampleType::Depth,
                        dimension: TextureViewDimension::D2,
                    },
                ),
                BindGroupLayoutEntry::new(
                    6,
                    fragment,
                    BindingType::Sampler(SamplerBindingType::Comparison),
                ),
            ])
            .with_color_target(Self::HDR_FORMAT, BlendMode::Replace)
            .with_depth_stencil(GBuffer::DEPTH_FORMAT, false, CompareFunction::Always)
            .with_no_culling()
            .build(device)?;

        let skybox = skybox
            .map(|cubemap| Skybox::new(device, Arc::clone(cubemap)))
            .transpose()?;

        Ok(Self {
            hdr,
            lights_buffer,
            shadow_sampler,
            pipeline,
            skybox,
        })
    }

    pub fn hdr(&self) -> TextureHandle {
        self.hdr
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn skybox_pipeline(&self) -> Option<PipelineHandle> {
        self.skybox.as_ref().map(|skybox| skybox.pipeline)
    }

    /// Swaps the skybox for `cubemap`, or removes it.
    pub fn rebuild_skybox<D: RenderDevice>(
        &mut self,
        device: &mut D,
        cubemap: Option<&Arc<Cubemap>>,
    ) -> RendererResult<()> {
        let skybox = cubemap
            .map(|cubemap| Skybox::new(device, Arc::clone(cubemap)))
            .transpose()?;
        if let Some(old) = std::mem::replace(&mut self.skybox, skybox) {
            old.destroy(device);
        }
        Ok(())
    }

    pub fn prepare<D: RenderDevice>(&self, device: &mut D, lights: &[Light]) -> RendererResult<()> {
        let uniform = LightsUniform::from_lights(lights);
        device.write_buffer(self.lights_buffer, 0, bytes_of(&uniform))?;
        Ok(())
    }

    pub fn record(
        &self,
        commands: &mut CommandBuffer,
        inputs: LightingInputs<'_>,
    ) -> Result<(), RecordingError> {
        let gbuffer = inputs.gbuffer;
        commands.begin_render_pass(RenderPassDescriptor {
            label: "Lighting Pass",
            color_attachments: vec![ColorAttachment::clear(self.hdr, [0.0, 0.0, 0.0, 1.0])],
            depth_attachment: Some(DepthAttachment {
                texture: gbuffer.depth,
                load: LoadOp::Load,
                store: StoreOp::Store,
            }),
        })?;

        commands.set_pipeline(self.pipeline)?;
        commands.set_bind_group(
            0,
            vec![
                BindGroupEntry::new(0, BindingResource::Buffer(inputs.camera_buffer)),
                BindGroupEntry::new(1, BindingResource::Buffer(self.lights_buffer)),
                BindGroupEntry::new(2, BindingResource::Buffer(inputs.shadow_info_buffer)),
            ],
        )?;
        commands.set_bind_group(
            1,
            vec![
                BindGroupEntry::new(0, BindingResource::Texture(gbuffer.position)),
                BindGroupEntry::new(1, BindingResource::Texture(gbuffer.normal)),
                BindGroupEntry::new(2, BindingResource::Texture(gbuffer.albedo)),
                BindGroupEntry::new(3, BindingResource::Texture(gbuffer.metallic_roughness_ao)),
                BindGroupEntry::new(4, BindingResource::Texture(gbuffer.emission)),
                BindGroupEntry::new(5, BindingResource::Texture(inputs.shadow_atlas)),
                BindGroupEntry::new(6, BindingResource::Sampler(self.shadow_sampler)),
            ],
        )?;
        draw_fullscreen(commands)?;

        if let Some(skybox) = &self.skybox {
            skybox.record(commands, inputs.camera_buffer)?;
        }

        commands.end_render_pass()
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        device.destroy_texture(self.hdr);
        device.destroy_buffer(self.lights_buffer);
        device.destroy_pipeline(self.pipeline);
        if let Some(skybox) = &self.skybox {
            skybox.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, HeadlessDevice};
    use crate::renderer::passes::{GeometryPass, ShadowPass};

    fn sky(device: &mut HeadlessDevice) -> Cubemap {
        Cubemap::gradient(device, 4, [90, 140, 220, 255], [200, 220, 255, 255], [60, 60, 60, 255])
            .unwrap()
    }

    fn record(device: &mut HeadlessDevice, pass: &LightingPass) -> CommandBuffer {
        let geometry = GeometryPass::new(device, Extent::new(32, 32)).unwrap();
        let shadow = ShadowPass::new(device, 64).unwrap();

        let mut commands = CommandBuffer::new("Test");
        commands.begin().unwrap();
        pass.record(
            &mut commands,
            LightingInputs {
                gbuffer: geometry.gbuffer(),
                camera_buffer: geometry.camera_buffer(),
                shadow_atlas: shadow.atlas(),
                shadow_info_buffer: shadow.info_buffer(),
            },
        )
        .unwrap();
        commands.end().unwrap();
        commands
    }

    #[test]
    fn depth_is_loaded_from_the_geometry_pass() {
        let mut device = HeadlessDevice::new();
        let pass = LightingPass::new(&mut device, Extent::new(32, 32), None).unwrap();
        let commands = record(&mut device, &pass);

        match &commands.commands()[0] {
            Command::BeginRenderPass(desc) => {
                let depth = desc.depth_attachment.unwrap();
                assert_eq!(depth.load, LoadOp::Load);
                assert_eq!(desc.color_attachments[0].texture, pass.hdr());
            }
            other => panic!("expected a render pass, got {other:?}"),
        }
        let draws = commands
            .commands()
            .iter()
            .filter(|command| matches!(command, Command::Draw { .. }))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn skybox_is_drawn_after_the_fullscreen_lighting() {
        let mut device = HeadlessDevice::new();
        let cubemap = Arc::new(sky(&mut device));
        let pass = LightingPass::new(&mut device, Extent::new(32, 32), Some(&cubemap)).unwrap();
        let commands = record(&mut device, &pass);

        let pipelines: Vec<PipelineHandle> = commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::SetPipeline(pipeline) => Some(*pipeline),
                _ => None,
            })
            .collect();
        assert_eq!(
            pipelines,
            vec![pass.pipeline(), pass.skybox_pipeline().unwrap()]
        );
    }

    #[test]
    fn removing_the_skybox_destroys_its_pipeline() {
        let mut device = HeadlessDevice::new();
        let cubemap = Arc::new(sky(&mut device));
        let mut pass = LightingPass::new(&mut device, Extent::new(32, 32), Some(&cubemap)).unwrap();
        let pipelines = device.live_pipelines();

        pass.rebuild_skybox(&mut device, None).unwrap();

        assert!(pass.skybox_pipeline().is_none());
        assert_eq!(device.live_pipelines(), pipelines - 1);
    }
}
