// renderer/passes/tone_mapping.rs
// ACES tone mapping of HDR + bloom into the displayable output

use bytemuck::bytes_of;

use crate::backend::{
    BindGroupEntry, BindingResource, BlendMode, ColorAttachment, CommandBuffer, Extent,
    PipelineHandle, RecordingError, RenderDevice, RenderPassDescriptor, SamplerHandle,
    ShaderSource, ShaderStages, TextureDescriptor, TextureDimension, TextureFormat,
    TextureHandle, TextureUsages,
};
use crate::error::RendererResult;
use crate::renderer::passes::{draw_fullscreen, linear_sampler, sampler_entry, texture_entry};
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::uniforms::ToneMappingConstants;

const SHADER: ShaderSource = ShaderSource {
    label: "tone_mapping",
    wgsl: include_str!("../../shader/tone_mapping.wgsl"),
};

pub const DEFAULT_EXPOSURE: f32 = 1.0;

pub struct ToneMappingPass {
    output: TextureHandle,
    extent: Extent,
    /// 1x1 black texture bound in place of the bloom chain when bloom is off.
    neutral_bloom: TextureHandle,
    sampler: SamplerHandle,
    pipeline: PipelineHandle,
    exposure: f32,
}

impl ToneMappingPass {
    pub const OUTPUT_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

    pub fn new<D: RenderDevice>(device: &mut D, extent: Extent) -> RendererResult<Self> {
        let output = device.create_texture(&TextureDescriptor::render_target(
            "Tone Mapping Output",
            extent,
            Self::OUTPUT_FORMAT,
        ))?;

        let neutral_bloom = device.create_texture(&TextureDescriptor {
            label: "Neutral Bloom",
            extent: Extent::new(1, 1),
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::SAMPLED | TextureUsages::COPY_DST,
            dimension: TextureDimension::D2,
        })?;
        device.write_texture(neutral_bloom, 0, &[0, 0, 0, 255])?;

        let sampler = linear_sampler(device, "Tone Mapping Sampler")?;

        let fragment = ShaderStages::FRAGMENT;
        let pipeline = PipelineBuilder::new("Tone Mapping Pipeline", SHADER)
            .with_bind_group(vec![
                texture_entry(0, fragment, true),
                texture_entry(1, fragment, true),
                sampler_entry(2, fragment),
            ])
            .with_push_constants(fragment, std::mem::size_of::<ToneMappingConstants>() as u32)
            .with_color_target(Self::OUTPUT_FORMAT, BlendMode::Replace)
            .with_no_culling()
            .build(device)?;

        Ok(Self {
            output,
            extent,
            neutral_bloom,
            sampler,
            pipeline,
            exposure: DEFAULT_EXPOSURE,
        })
    }

    pub fn output(&self) -> TextureHandle {
        self.output
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure.max(0.0);
    }

    /// `bloom` is the blurred texture and its intensity, `None` when bloom is disabled.
    pub fn record(
        &self,
        commands: &mut CommandBuffer,
        hdr: TextureHandle,
        bloom: Option<(TextureHandle, f32)>,
    ) -> Result<(), RecordingError> {
        let (bloom_texture, constants) = match bloom {
            Some((texture, intensity)) => (
                texture,
                ToneMappingConstants::new(true, intensity, self.exposure),
            ),
            None => (
                self.neutral_bloom,
                ToneMappingConstants::new(false, 0.0, self.exposure),
            ),
        };

        commands.begin_render_pass(RenderPassDescriptor {
            label: "Tone Mapping Pass",
            color_attachments: vec![ColorAttachment::clear(self.output, [0.0, 0.0, 0.0, 1.0])],
            depth_attachment: None,
        })?;
        commands.set_pipeline(self.pipeline)?;
        commands.set_bind_group(
            0,
            vec![
                BindGroupEntry::new(0, BindingResource::Texture(hdr)),
                BindGroupEntry::new(1, BindingResource::Texture(bloom_texture)),
                BindGroupEntry::new(2, BindingResource::Sampler(self.sampler)),
            ],
        )?;
        commands.set_push_constants(ShaderStages::FRAGMENT, 0, bytes_of(&constants))?;
        draw_fullscreen(commands)?;
        commands.end_render_pass()
    }

    /// Clears the output to opaque black without drawing.
    pub fn record_clear(&self, commands: &mut CommandBuffer) -> Result<(), RecordingError> {
        commands.begin_render_pass(RenderPassDescriptor {
            label: "Tone Mapping Clear",
            color_attachments: vec![ColorAttachment::clear(self.output, [0.0, 0.0, 0.0, 1.0])],
            depth_attachment: None,
        })?;
        commands.end_render_pass()
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        device.destroy_texture(self.output);
        device.destroy_texture(self.neutral_bloom);
        device.destroy_pipeline(self.pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, HeadlessDevice};

    fn recorded_constants(commands: &CommandBuffer) -> ToneMappingConstants {
        commands
            .commands()
            .iter()
            .find_map(|command| match command {
                Command::SetPushConstants { data, .. } => {
                    Some(bytemuck::pod_read_unaligned::<ToneMappingConstants>(data))
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn disabled_bloom_binds_the_neutral_texture() {
        let mut device = HeadlessDevice::new();
        let pass = ToneMappingPass::new(&mut device, Extent::new(16, 16)).unwrap();
        let hdr = device
            .create_texture(&TextureDescriptor::render_target(
                "HDR",
                Extent::new(16, 16),
                TextureFormat::Rgba16Float,
            ))
            .unwrap();

        let mut commands = CommandBuffer::new("Test");
        commands.begin().unwrap();
        pass.record(&mut commands, hdr, None).unwrap();
        commands.end().unwrap();

        assert_eq!(
            recorded_constants(&commands),
            ToneMappingConstants::new(false, 0.0, DEFAULT_EXPOSURE)
        );
        let bound_bloom = commands.commands().iter().find_map(|command| match command {
            Command::SetBindGroup { entries, .. } => Some(entries[1].resource),
            _ => None,
        });
        assert_ne!(bound_bloom, Some(BindingResource::Texture(hdr)));
        assert!(device.submit(commands.commands()).is_ok());
    }

    #[test]
    fn clear_touches_only_the_output() {
        let mut device = HeadlessDevice::new();
        let pass = ToneMappingPass::new(&mut device, Extent::new(16, 16)).unwrap();

        let mut commands = CommandBuffer::new("Test");
        commands.begin().unwrap();
        pass.record_clear(&mut commands).unwrap();
        commands.end().unwrap();

        let passes: Vec<_> = commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::BeginRenderPass(desc) => Some(desc.color_attachments[0].texture),
                _ => None,
            })
            .collect();
        assert_eq!(passes, vec![pass.output()]);
        assert!(!commands
            .commands()
            .iter()
            .any(|command| matches!(command, Command::Draw { .. })));
    }

    #[test]
    fn output_is_rgba8_at_viewport_size() {
        let mut device = HeadlessDevice::new();
        let pass = ToneMappingPass::new(&mut device, Extent::new(800, 600)).unwrap();
        let desc = device.texture_descriptor(pass.output()).unwrap();

        assert_eq!(desc.extent, Extent::new(800, 600));
        assert_eq!(desc.format, TextureFormat::Rgba8Unorm);
    }
}
