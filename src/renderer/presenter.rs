// renderer/presenter.rs
// Blits the renderer output onto the swapchain and presents it

use log::{debug, info, warn};

use crate::backend::{
    BackendError, BindGroupEntry, BindingResource, BlendMode, ColorAttachment, CommandBuffer,
    Extent, PipelineHandle, RecordingError, RenderDevice, RenderPassDescriptor, SamplerHandle,
    ShaderSource, ShaderStages, SurfaceImage, TextureFormat, TextureHandle,
};
use crate::error::RendererResult;
use crate::renderer::context::RenderContext;
use crate::renderer::deferred::DeferredRenderer;
use crate::renderer::frame::FrameRing;
use crate::renderer::passes::{draw_fullscreen, linear_sampler, sampler_entry, texture_entry};
use crate::renderer::pipeline_builder::PipelineBuilder;

const SHADER: ShaderSource = ShaderSource {
    label: "blit",
    wgsl: include_str!("../shader/blit.wgsl"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Nothing was shown this frame; the surface is reconfigured on the next attempt when needed.
    Skipped,
}

pub struct Presenter {
    pipeline: PipelineHandle,
    sampler: SamplerHandle,
    frames: FrameRing,
    format: TextureFormat,
    extent: Extent,
    needs_recreate: bool,
}

impl Presenter {
    /// Builds the blit pipeline for the device's surface format and configures the surface.
    pub fn new<D: RenderDevice>(
        ctx: &mut RenderContext<D>,
        extent: Extent,
    ) -> RendererResult<Self> {
        let format = ctx
            .device()
            .surface_format()
            .ok_or(BackendError::NoSurface)?;
        let frames = FrameRing::new("Present Frame", ctx.frames_in_flight());
        let device = ctx.device_mut();

        let sampler = linear_sampler(device, "Blit Sampler")?;
        let pipeline = PipelineBuilder::new("Blit Pipeline", SHADER)
            .with_bind_group(vec![
                texture_entry(0, ShaderStages::FRAGMENT, true),
                sampler_entry(1, ShaderStages::FRAGMENT),
            ])
            .with_color_target(format, BlendMode::Replace)
            .with_no_culling()
            .with_constant("decode_srgb", if format.is_srgb() { 1.0 } else { 0.0 })
            .build(device)?;

        device.configure_surface(extent)?;
        info!(
            "Presenter targeting {:?} surface at {}x{}",
            format, extent.width, extent.height
        );

        Ok(Self {
            pipeline,
            sampler,
            frames,
            format,
            extent,
            needs_recreate: false,
        })
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn needs_recreate(&self) -> bool {
        self.needs_recreate
    }

    /// Records the new window size; the surface is reconfigured before the next present.
    pub fn resize(&mut self, width: u32, height: u32) {
        let extent = Extent::new(width, height);
        if extent.is_empty() || extent == self.extent {
            return;
        }
        self.extent = extent;
        self.needs_recreate = true;
    }

    pub fn present<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        renderer: &DeferredRenderer,
    ) -> RendererResult<PresentOutcome> {
        let Some(source) = renderer.output_texture() else {
            debug!("No renderer output to present");
            return Ok(PresentOutcome::Skipped);
        };

        if self.needs_recreate {
            ctx.device_mut().configure_surface(self.extent)?;
            self.needs_recreate = false;
            info!(
                "Surface reconfigured at {}x{}",
                self.extent.width, self.extent.height
            );
        }

        let slot_index = ctx.current_frame();
        self.frames.slot_mut(slot_index).wait(ctx.device_mut())?;

        let image = match ctx.device_mut().acquire_surface_texture() {
            Ok(image) => image,
            Err(BackendError::SurfaceOutdated | BackendError::SurfaceLost) => {
                warn!("Surface is out of date, skipping present");
                self.needs_recreate = true;
                return Ok(PresentOutcome::Skipped);
            }
            Err(BackendError::SurfaceTimeout) => {
                warn!("Timed out acquiring the surface, skipping present");
                return Ok(PresentOutcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        };

        if image.suboptimal {
            warn!("Surface is suboptimal, skipping present");
            ctx.device_mut().discard_surface_texture(image);
            self.needs_recreate = true;
            return Ok(PresentOutcome::Skipped);
        }

        if let Err(err) = self.submit_blit(ctx, slot_index, source, image) {
            ctx.device_mut().discard_surface_texture(image);
            return Err(err);
        }
        ctx.device_mut().present(image)?;
        Ok(PresentOutcome::Presented)
    }

    fn submit_blit<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        slot_index: usize,
        source: TextureHandle,
        image: SurfaceImage,
    ) -> RendererResult<()> {
        let slot = self.frames.slot_mut(slot_index);
        let commands = slot.begin(ctx.device_mut())?;
        record_blit(commands, self.pipeline, self.sampler, source, image.texture)?;
        slot.submit(ctx)?;
        Ok(())
    }

    pub fn destroy<D: RenderDevice>(mut self, ctx: &mut RenderContext<D>) -> RendererResult<()> {
        ctx.wait_idle()?;
        self.frames.retire_all();
        ctx.device_mut().destroy_pipeline(self.pipeline);
        Ok(())
    }
}

fn record_blit(
    commands: &mut CommandBuffer,
    pipeline: PipelineHandle,
    sampler: SamplerHandle,
    source: TextureHandle,
    target: TextureHandle,
) -> Result<(), RecordingError> {
    commands.begin_render_pass(RenderPassDescriptor {
        label: "Blit Pass",
        color_attachments: vec![ColorAttachment::clear(target, [0.0, 0.0, 0.0, 1.0])],
        depth_attachment: None,
    })?;
    commands.set_pipeline(pipeline)?;
    commands.set_bind_group(
        0,
        vec![
            BindGroupEntry::new(0, BindingResource::Texture(source)),
            BindGroupEntry::new(1, BindingResource::Sampler(sampler)),
        ],
    )?;
    draw_fullscreen(commands)?;
    commands.end_render_pass()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    #[test]
    fn requires_a_surface() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        assert!(Presenter::new(&mut ctx, Extent::new(8, 8)).is_err());
    }

    #[test]
    fn resize_defers_surface_configuration() {
        let device = HeadlessDevice::with_surface(TextureFormat::Bgra8UnormSrgb, Extent::new(8, 8));
        let mut ctx = RenderContext::new(device, 2);
        let mut presenter = Presenter::new(&mut ctx, Extent::new(8, 8)).unwrap();
        assert_eq!(ctx.device().surface_configurations(), 1);

        presenter.resize(0, 16);
        assert!(!presenter.needs_recreate());

        presenter.resize(16, 16);
        assert!(presenter.needs_recreate());
        assert_eq!(ctx.device().surface_configurations(), 1);
    }
}
