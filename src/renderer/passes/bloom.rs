// renderer/passes/bloom.rs
// Compute bloom: bright-pass prefilter, downsample chain, additive upsample chain

use crate::backend::{
    BindGroupEntry, BindGroupLayoutEntry, BindingResource, BindingType, CommandBuffer, Extent,
    PipelineHandle, RecordingError, RenderDevice, SamplerHandle, ShaderSource, ShaderStages,
    TextureDescriptor, TextureDimension, TextureFormat, TextureHandle, TextureUsages,
};
use crate::error::RendererResult;
use crate::renderer::passes::{linear_sampler, sampler_entry, texture_entry, workgroup_count};
use crate::renderer::pipeline_builder::ComputePipelineBuilder;
use crate::scene::BloomConfig;

const SHADER: ShaderSource = ShaderSource {
    label: "bloom",
    wgsl: include_str!("../../shader/bloom.wgsl"),
};

/// Pipelines of the three bloom steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomPipelines {
    pub prefilter: PipelineHandle,
    pub downsample: PipelineHandle,
    pub upsample: PipelineHandle,
}

/// Mip `k` of the chain is `viewport / 2^(k + 1)`. Only the mips that take part in the blur are
/// allocated: `down[k]` holds the downsampled image, `up[k]` the blurred result for every mip but
/// the coarsest, which is its own result.
pub struct BloomPass {
    config: BloomConfig,
    base: Extent,
    down: Vec<TextureHandle>,
    up: Vec<TextureHandle>,
    sampler: SamplerHandle,
    pipelines: BloomPipelines,
}

impl BloomPass {
    pub const FORMAT: TextureFormat = TextureFormat::Rgba16Float;

    pub fn new<D: RenderDevice>(
        device: &mut D,
        viewport: Extent,
        config: &BloomConfig,
    ) -> RendererResult<Self> {
        let base = viewport.half();
        let active = config.active_mips();

        let mut down = Vec::with_capacity(active as usize);
        let mut up = Vec::with_capacity(active.saturating_sub(1) as usize);
        for level in 0..active {
            down.push(device.create_texture(&Self::mip_descriptor("Bloom Down", base.mip(level)))?);
            if level + 1 < active {
                up.push(device.create_texture(&Self::mip_descriptor("Bloom Up", base.mip(level)))?);
            }
        }

        let sampler = linear_sampler(device, "Bloom Sampler")?;

        let compute = ShaderStages::COMPUTE;
        let storage = BindGroupLayoutEntry::new(
            2,
            compute,
            BindingType::StorageTexture {
                format: Self::FORMAT,
            },
        );
        let single_source = vec![
            texture_entry(0, compute, true),
            sampler_entry(1, compute),
            storage,
        ];
        let mut two_sources = single_source.clone();
        two_sources.push(texture_entry(3, compute, true));

        let pipelines = BloomPipelines {
            prefilter: ComputePipelineBuilder::new("Bloom Prefilter Pipeline", SHADER)
                .with_entry("prefilter")
                .with_bind_group(single_source.clone())
                .with_constant("threshold", config.threshold as f64)
                .build(device)?,
            downsample: ComputePipelineBuilder::new("Bloom Downsample Pipeline", SHADER)
                .with_entry("downsample")
                .with_bind_group(single_source)
                .build(device)?,
            upsample: ComputePipelineBuilder::new("Bloom Upsample Pipeline", SHADER)
                .with_entry("upsample")
                .with_bind_group(two_sources)
                .build(device)?,
        };

        log::debug!(
            "Bloom chain: {} of {} mips from {}x{}",
            active,
            config.mip_levels,
            base.width,
            base.height
        );

        Ok(Self {
            config: config.clone(),
            base,
            down,
            up,
            sampler,
            pipelines,
        })
    }

    fn mip_descriptor(label: &'static str, extent: Extent) -> TextureDescriptor {
        TextureDescriptor {
            label,
            extent,
            format: Self::FORMAT,
            usage: TextureUsages::STORAGE | TextureUsages::SAMPLED,
            dimension: TextureDimension::D2,
        }
    }

    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    pub fn pipelines(&self) -> BloomPipelines {
        self.pipelines
    }

    /// Number of mips that are blurred.
    pub fn active_mips(&self) -> u32 {
        self.down.len() as u32
    }

    pub fn mip_extent(&self, level: u32) -> Extent {
        self.base.mip(level)
    }

    /// The finest blurred mip, sampled by tone mapping.
    pub fn output(&self) -> TextureHandle {
        self.up.first().copied().unwrap_or(self.down[0])
    }

    pub fn record(
        &self,
        commands: &mut CommandBuffer,
        hdr: TextureHandle,
    ) -> Result<(), RecordingError> {
        commands.begin_compute_pass("Bloom Pass")?;

        commands.set_pipeline(self.pipelines.prefilter)?;
        self.dispatch(commands, 0, hdr, self.down[0], None)?;

        if self.down.len() > 1 {
            commands.set_pipeline(self.pipelines.downsample)?;
            for level in 1..self.down.len() {
                self.dispatch(commands, level, self.down[level - 1], self.down[level], None)?;
            }

            commands.set_pipeline(self.pipelines.upsample)?;
            let coarsest = self.down[self.down.len() - 1];
            for level in (0..self.up.len()).rev() {
                let coarser = self.up.get(level + 1).copied().unwrap_or(coarsest);
                self.dispatch(
                    commands,
                    level,
                    self.down[level],
                    self.up[level],
                    Some(coarser),
                )?;
            }
        }

        commands.end_compute_pass()
    }

    fn dispatch(
        &self,
        commands: &mut CommandBuffer,
        level: usize,
        source: TextureHandle,
        destination: TextureHandle,
        coarser: Option<TextureHandle>,
    ) -> Result<(), RecordingError> {
        let mut entries = vec![
            BindGroupEntry::new(0, BindingResource::Texture(source)),
            BindGroupEntry::new(1, BindingResource::Sampler(self.sampler)),
            BindGroupEntry::new(2, BindingResource::StorageTexture(destination)),
        ];
        if let Some(coarser) = coarser {
            entries.push(BindGroupEntry::new(3, BindingResource::Texture(coarser)));
        }
        commands.set_bind_group(0, entries)?;

        let (x, y) = workgroup_count(self.mip_extent(level as u32));
        commands.dispatch(x, y, 1)
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        for texture in self.down.iter().chain(&self.up) {
            device.destroy_texture(*texture);
        }
        device.destroy_pipeline(self.pipelines.prefilter);
        device.destroy_pipeline(self.pipelines.downsample);
        device.destroy_pipeline(self.pipelines.upsample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, HeadlessDevice};

    fn dispatches(pass: &BloomPass, device: &mut HeadlessDevice) -> Vec<(u32, u32)> {
        let hdr = device
            .create_texture(&TextureDescriptor::render_target(
                "HDR",
                Extent::new(1280, 720),
                TextureFormat::Rgba16Float,
            ))
            .unwrap();
        let mut commands = CommandBuffer::new("Test");
        commands.begin().unwrap();
        pass.record(&mut commands, hdr).unwrap();
        commands.end().unwrap();

        commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::Dispatch { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn chain_skips_the_coarsest_mips() {
        let mut device = HeadlessDevice::new();
        let config = BloomConfig {
            mip_levels: 5,
            skipped_mips: 2,
            ..BloomConfig::default()
        };
        let pass = BloomPass::new(&mut device, Extent::new(1280, 720), &config).unwrap();

        assert_eq!(pass.active_mips(), 3);
        assert_eq!(pass.mip_extent(0), Extent::new(640, 360));
        assert_eq!(
            device.texture_descriptor(pass.output()).unwrap().extent,
            Extent::new(640, 360)
        );

        // prefilter, 2 downsamples, 2 upsamples back to mip 0
        assert_eq!(
            dispatches(&pass, &mut device),
            vec![(80, 45), (40, 23), (20, 12), (40, 23), (80, 45)]
        );
    }

    #[test]
    fn single_mip_chain_only_prefilters() {
        let mut device = HeadlessDevice::new();
        let config = BloomConfig {
            mip_levels: 1,
            skipped_mips: 0,
            ..BloomConfig::default()
        };
        let pass = BloomPass::new(&mut device, Extent::new(1280, 720), &config).unwrap();

        assert_eq!(dispatches(&pass, &mut device), vec![(80, 45)]);
        assert_eq!(
            device.texture_descriptor(pass.output()).unwrap().usage,
            TextureUsages::STORAGE | TextureUsages::SAMPLED
        );
    }

    #[test]
    fn destroy_releases_the_whole_chain() {
        let mut device = HeadlessDevice::new();
        let before = device.live_textures();
        let pass =
            BloomPass::new(&mut device, Extent::new(64, 64), &BloomConfig::default()).unwrap();
        assert!(device.live_textures() > before);

        pass.destroy(&mut device);
        assert_eq!(device.live_textures(), before);
        assert_eq!(device.live_pipelines(), 0);
    }
}
