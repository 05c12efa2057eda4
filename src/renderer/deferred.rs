// renderer/deferred.rs
// Frame orchestration: selective rebuilds, resize handling and the five-pass frame

use std::mem;

use log::{debug, error, info, trace};

use crate::backend::{Extent, PipelineHandle, RenderDevice, TextureHandle};
use crate::error::{RendererError, RendererResult};
use crate::renderer::camera::Camera;
use crate::renderer::context::RenderContext;
use crate::renderer::frame::FrameRing;
use crate::renderer::light::{extract_lights, shadow_casters};
use crate::renderer::passes::bloom::BloomPipelines;
use crate::renderer::passes::{
    BloomPass, GeometryPass, LightingInputs, LightingPass, ShadowPass, ToneMappingPass,
};
use crate::renderer::transforms::get_renderable_entities;
use crate::renderer::uniforms::ShadowMappingInfo;
use crate::scene::{ConfigChanges, SceneRendererConfig, SharedScene};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Resizing,
    Reconfiguring,
}

/// How many times each part of the pipeline has been rebuilt since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub shadow: u32,
    pub bloom: u32,
    pub skybox: u32,
    /// Resizes, which rebuild everything.
    pub full: u32,
}

/// Snapshot of the live pipeline handles. Handles are never reused, so comparing two snapshots
/// shows exactly which pipelines were rebuilt in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSet {
    pub shadow: PipelineHandle,
    pub geometry: PipelineHandle,
    pub lighting: PipelineHandle,
    pub skybox: Option<PipelineHandle>,
    pub bloom: Option<BloomPipelines>,
    pub tone_mapping: PipelineHandle,
}

/// Counters of the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub submitted_draws: u32,
    pub culled: u32,
    pub shadow_casters: u32,
}

struct Passes {
    shadow: ShadowPass,
    geometry: GeometryPass,
    lighting: LightingPass,
    bloom: Option<BloomPass>,
    tone_mapping: ToneMappingPass,
}

impl Passes {
    fn new<D: RenderDevice>(
        device: &mut D,
        extent: Extent,
        config: &SceneRendererConfig,
    ) -> RendererResult<Self> {
        Ok(Self {
            shadow: ShadowPass::new(device, config.shadow_map_resolution)?,
            geometry: GeometryPass::new(device, extent)?,
            lighting: LightingPass::new(device, extent, config.environment.skybox.as_ref())?,
            bloom: build_bloom(device, extent, config)?,
            tone_mapping: ToneMappingPass::new(device, extent)?,
        })
    }

    fn destroy<D: RenderDevice>(&self, device: &mut D) {
        self.shadow.destroy(device);
        self.geometry.destroy(device);
        self.lighting.destroy(device);
        if let Some(bloom) = &self.bloom {
            bloom.destroy(device);
        }
        self.tone_mapping.destroy(device);
    }
}

fn build_bloom<D: RenderDevice>(
    device: &mut D,
    extent: Extent,
    config: &SceneRendererConfig,
) -> RendererResult<Option<BloomPass>> {
    if config.bloom.enabled {
        Ok(Some(BloomPass::new(device, extent, &config.bloom)?))
    } else {
        Ok(None)
    }
}

pub struct DeferredRenderer {
    state: RendererState,
    scene: SharedScene,
    config: SceneRendererConfig,
    extent: Extent,
    frames: FrameRing,
    passes: Passes,
    has_rendered: bool,
    rebuild_stats: RebuildStats,
    frame_stats: FrameStats,
}

impl DeferredRenderer {
    pub fn new<D: RenderDevice>(
        ctx: &mut RenderContext<D>,
        scene: SharedScene,
        extent: Extent,
    ) -> RendererResult<Self> {
        if extent.is_empty() {
            return Err(RendererError::InvalidConfig(format!(
                "viewport {}x{} is empty",
                extent.width, extent.height
            )));
        }

        let config = scene.borrow().config().clone().validate();
        let passes = Passes::new(ctx.device_mut(), extent, &config)?;

        let mut renderer = Self {
            state: RendererState::Uninitialized,
            scene,
            config,
            extent,
            frames: FrameRing::new("Deferred Frame", ctx.frames_in_flight()),
            passes,
            has_rendered: false,
            rebuild_stats: RebuildStats::default(),
            frame_stats: FrameStats::default(),
        };
        renderer.state = RendererState::Ready;

        info!(
            "Deferred renderer ready at {}x{} (shadow map {}, bloom {})",
            extent.width,
            extent.height,
            renderer.config.shadow_map_resolution,
            if renderer.config.bloom.enabled { "on" } else { "off" }
        );
        Ok(renderer)
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn config(&self) -> &SceneRendererConfig {
        &self.config
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    pub fn rebuild_stats(&self) -> RebuildStats {
        self.rebuild_stats
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.frame_stats
    }

    /// Light-space matrices uploaded by the most recent frame.
    pub fn shadow_mapping_info(&self) -> &ShadowMappingInfo {
        self.passes.shadow.info()
    }

    pub fn pipelines(&self) -> PipelineSet {
        PipelineSet {
            shadow: self.passes.shadow.pipeline(),
            geometry: self.passes.geometry.pipeline(),
            lighting: self.passes.lighting.pipeline(),
            skybox: self.passes.lighting.skybox_pipeline(),
            bloom: self.passes.bloom.as_ref().map(BloomPass::pipelines),
            tone_mapping: self.passes.tone_mapping.pipeline(),
        }
    }

    /// The tone-mapped image, once a first frame has been rendered. After a resize it is the
    /// cleared target at the new size until the next frame.
    pub fn output_texture(&self) -> Option<TextureHandle> {
        (self.state == RendererState::Ready && self.has_rendered)
            .then(|| self.passes.tone_mapping.output())
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.passes.tone_mapping.set_exposure(exposure);
    }

    /// Records and submits one frame seen through `camera`.
    pub fn render<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        camera: &Camera,
    ) -> RendererResult<()> {
        if self.state != RendererState::Ready {
            return Err(RendererError::NotReady(self.state));
        }
        let Some(camera) = camera.as_perspective() else {
            error!(
                "{:?} cameras are not supported, skipping frame",
                camera.camera_type()
            );
            return Ok(());
        };

        let (renderables, lights) = {
            let scene = self.scene.borrow();
            (get_renderable_entities(&scene)?, extract_lights(&scene)?)
        };

        let slot_index = ctx.advance_frame();
        let slot = self.frames.slot_mut(slot_index);
        let commands = slot.begin(ctx.device_mut())?;

        let passes = &mut self.passes;
        let device = ctx.device_mut();
        passes.shadow.prepare(device, &lights)?;
        passes.geometry.prepare(device, camera)?;
        passes.lighting.prepare(device, &lights)?;

        passes.shadow.record(commands, &renderables)?;
        let counts = passes.geometry.record(commands, camera, &renderables)?;
        passes.lighting.record(
            commands,
            LightingInputs {
                gbuffer: passes.geometry.gbuffer(),
                camera_buffer: passes.geometry.camera_buffer(),
                shadow_atlas: passes.shadow.atlas(),
                shadow_info_buffer: passes.shadow.info_buffer(),
            },
        )?;
        let hdr = passes.lighting.hdr();
        let bloom = match &passes.bloom {
            Some(bloom) => {
                bloom.record(commands, hdr)?;
                Some((bloom.output(), self.config.bloom.intensity))
            }
            None => None,
        };
        passes.tone_mapping.record(commands, hdr, bloom)?;

        let submission = slot.submit(ctx)?;

        self.frame_stats = FrameStats {
            submitted_draws: counts.drawn,
            culled: counts.culled,
            shadow_casters: shadow_casters(&lights).count() as u32,
        };
        self.has_rendered = true;
        trace!(
            "Frame {} submitted as {:?}: {} draws, {} culled",
            ctx.frame_index(),
            submission,
            counts.drawn,
            counts.culled
        );
        Ok(())
    }

    /// Recreates every target and pipeline at the new size. Zero sizes are ignored. On failure
    /// the previous passes stay in place and the renderer returns to `Ready`.
    pub fn window_resized<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        width: u32,
        height: u32,
    ) -> RendererResult<()> {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.state = RendererState::Resizing;
        let result = self.rebuild_all(ctx, extent);
        self.state = RendererState::Ready;

        match &result {
            Ok(()) => info!("Renderer resized to {}x{}", width, height),
            Err(err) => error!("Resize to {}x{} failed: {}", width, height, err),
        }
        result
    }

    fn rebuild_all<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        extent: Extent,
    ) -> RendererResult<()> {
        self.idle(ctx)?;

        let passes = Passes::new(ctx.device_mut(), extent, &self.config)?;
        mem::replace(&mut self.passes, passes).destroy(ctx.device_mut());
        self.extent = extent;
        self.rebuild_stats.full += 1;

        if self.has_rendered {
            self.clear_output(ctx)?;
        }
        Ok(())
    }

    /// Clears a freshly created output so it never exposes undefined contents.
    fn clear_output<D: RenderDevice>(&mut self, ctx: &mut RenderContext<D>) -> RendererResult<()> {
        let slot = self.frames.slot_mut(ctx.current_frame());
        let commands = slot.begin(ctx.device_mut())?;
        self.passes.tone_mapping.record_clear(commands)?;
        slot.submit(ctx)?;
        Ok(())
    }

    /// Applies `config`, rebuilding only the passes whose settings changed. If a rebuild fails,
    /// the sections rebuilt before it are kept, the rest keep their previous settings, and the
    /// renderer returns to `Ready`.
    pub fn change_config<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        config: SceneRendererConfig,
    ) -> RendererResult<ConfigChanges> {
        let config = config.validate();
        let changes = self.config.diff(&config);
        if !changes.any() {
            debug!("Renderer configuration unchanged, no rebuild needed");
            self.config = config;
            return Ok(changes);
        }

        self.state = RendererState::Reconfiguring;
        let result = self.apply_changes(ctx, config, changes);
        self.state = RendererState::Ready;

        if let Err(err) = &result {
            error!("Reconfiguration failed: {}", err);
        }
        result.map(|()| changes)
    }

    fn apply_changes<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        config: SceneRendererConfig,
        changes: ConfigChanges,
    ) -> RendererResult<()> {
        self.idle(ctx)?;
        let device = ctx.device_mut();

        if changes.shadow {
            let shadow = ShadowPass::new(device, config.shadow_map_resolution)?;
            mem::replace(&mut self.passes.shadow, shadow).destroy(device);
            self.config.shadow_map_resolution = config.shadow_map_resolution;
            self.rebuild_stats.shadow += 1;
            info!(
                "Rebuilt shadow pass at {} per tile",
                config.shadow_map_resolution
            );
        }

        if changes.bloom {
            let bloom = build_bloom(device, self.extent, &config)?;
            if let Some(old) = mem::replace(&mut self.passes.bloom, bloom) {
                old.destroy(device);
            }
            self.config.bloom = config.bloom.clone();
            self.rebuild_stats.bloom += 1;
            info!(
                "Rebuilt bloom pass ({})",
                if config.bloom.enabled { "enabled" } else { "disabled" }
            );
        }

        if changes.skybox {
            self.passes
                .lighting
                .rebuild_skybox(device, config.environment.skybox.as_ref())?;
            self.config.environment = config.environment.clone();
            self.rebuild_stats.skybox += 1;
            info!(
                "Rebuilt skybox ({})",
                if config.environment.skybox.is_some() { "set" } else { "removed" }
            );
        }

        self.config = config;
        Ok(())
    }

    /// Switches to `scene` and adopts its renderer configuration.
    pub fn set_scene<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        scene: SharedScene,
    ) -> RendererResult<ConfigChanges> {
        let config = scene.borrow().config().clone();
        info!("Switching to scene {}", scene.borrow().name());
        self.scene = scene;
        self.change_config(ctx, config)
    }

    /// Releases every GPU resource owned by the renderer.
    pub fn destroy<D: RenderDevice>(mut self, ctx: &mut RenderContext<D>) -> RendererResult<()> {
        self.idle(ctx)?;
        self.passes.destroy(ctx.device_mut());
        Ok(())
    }

    /// Waits for the GPU and forgets the submissions of every frame slot.
    fn idle<D: RenderDevice>(&mut self, ctx: &mut RenderContext<D>) -> RendererResult<()> {
        ctx.wait_idle()?;
        self.frames.retire_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::scene::Scene;

    fn renderer(ctx: &mut RenderContext<HeadlessDevice>) -> DeferredRenderer {
        let scene = Rc::new(RefCell::new(Scene::new("Empty")));
        DeferredRenderer::new(ctx, scene, Extent::new(64, 64)).unwrap()
    }

    #[test]
    fn new_renderer_is_ready_without_output() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let renderer = renderer(&mut ctx);

        assert_eq!(renderer.state(), RendererState::Ready);
        assert_eq!(renderer.output_texture(), None);
    }

    #[test]
    fn frames_rotate_through_the_ring() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let mut renderer = renderer(&mut ctx);
        let camera = Camera::perspective(1.0, 1.0, 0.1, 100.0);

        for _ in 0..3 {
            renderer.render(&mut ctx, &camera).unwrap();
        }

        // The third frame reuses the first slot and waits on its submission.
        assert_eq!(ctx.device().submissions().len(), 3);
        assert_eq!(
            ctx.device().waited_submissions(),
            &[ctx.device().submissions()[0].index]
        );
    }

    #[test]
    fn render_outside_ready_is_rejected() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let mut renderer = renderer(&mut ctx);
        let camera = Camera::perspective(1.0, 1.0, 0.1, 100.0);
        renderer.render(&mut ctx, &camera).unwrap();

        renderer.state = RendererState::Resizing;
        assert!(matches!(
            renderer.render(&mut ctx, &camera),
            Err(RendererError::NotReady(RendererState::Resizing))
        ));
        assert_eq!(renderer.output_texture(), None);
        assert_eq!(ctx.device().submissions().len(), 1);
    }

    #[test]
    fn orthographic_camera_skips_the_frame() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let mut renderer = renderer(&mut ctx);
        let camera = Camera::Orthographic(crate::renderer::OrthographicCamera {
            position: glam::Vec3::ZERO,
            rotation: glam::Quat::IDENTITY,
            size: 5.0,
            znear: 0.1,
            zfar: 100.0,
        });

        renderer.render(&mut ctx, &camera).unwrap();

        assert!(ctx.device().submissions().is_empty());
        assert_eq!(renderer.output_texture(), None);
        assert_eq!(renderer.state(), RendererState::Ready);
    }

    #[test]
    fn empty_viewport_is_rejected() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let scene = Rc::new(RefCell::new(Scene::new("Empty")));
        assert!(matches!(
            DeferredRenderer::new(&mut ctx, scene, Extent::new(0, 10)),
            Err(RendererError::InvalidConfig(_))
        ));
    }

    #[test]
    fn destroy_releases_all_resources() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let renderer = renderer(&mut ctx);

        renderer.destroy(&mut ctx).unwrap();

        assert_eq!(ctx.device().live_textures(), 0);
        assert_eq!(ctx.device().live_pipelines(), 0);
        assert_eq!(ctx.device().live_buffers(), 0);
    }
}
