// app.rs
// winit driver for the demo scene

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use glam::{Vec3, Vec4};
use hecs::Entity;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::backend::{Extent, WgpuDevice};
use crate::error::{RendererError, RendererResult};
use crate::renderer::{
    primitives, Camera, Cubemap, DeferredRenderer, Material, Mesh, PresentOutcome, Presenter,
    RenderContext,
};
use crate::scene::{
    LightComponent, Scene, SceneRendererConfig, ShadowType, SharedScene, TransformComponent,
};
use crate::settings::RenderSettings;

struct AppState {
    window: Arc<Window>,
    ctx: RenderContext<WgpuDevice>,
    renderer: DeferredRenderer,
    presenter: Presenter,
    scene: SharedScene,
    camera: Camera,
    spinner: Entity,
    started: Instant,
}

pub struct App {
    settings: RenderSettings,
    state: Option<AppState>,
    error: Option<RendererError>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            state: None,
            error: None,
        }
    }

    /// The error that stopped the application, if any.
    pub fn take_error(&mut self) -> Option<RendererError> {
        self.error.take()
    }

    fn init(&self, window: Arc<Window>) -> RendererResult<AppState> {
        let device = pollster::block_on(WgpuDevice::new(window.clone(), &self.settings))?;
        let extent = device.surface_extent();
        let mut ctx = RenderContext::new(device, self.settings.frames_in_flight);

        let (scene, spinner) = build_demo_scene(&mut ctx, self.settings.scene.clone())?;
        let renderer = DeferredRenderer::new(&mut ctx, scene.clone(), extent)?;
        let presenter = Presenter::new(&mut ctx, extent)?;

        let mut camera = Camera::perspective(60_f32.to_radians(), aspect_ratio(extent), 0.1, 100.0);
        if let Some(perspective) = camera.as_perspective_mut() {
            perspective.set_position(Vec3::new(6.0, 5.0, 9.0));
            perspective.look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        }

        Ok(AppState {
            window,
            ctx,
            renderer,
            presenter,
            scene,
            camera,
            spinner,
            started: Instant::now(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RendererError) {
        log::error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let resolution = &self.settings.resolution;
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("wgpu deferred renderer")
                    .with_inner_size(PhysicalSize::new(resolution.width, resolution.height)),
            )
            .expect("create window");
        let window = Arc::new(window);

        match self.init(window) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.window.id() != id {
            return;
        }

        let result = match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = state.window.inner_size();
                state.resize(size)
            }
            WindowEvent::RedrawRequested => {
                let result = state.redraw();
                state.window.request_redraw();
                result
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match logical_key {
                Key::Named(NamedKey::Escape) => {
                    event_loop.exit();
                    Ok(())
                }
                Key::Character(c) if c.eq_ignore_ascii_case("b") => state.toggle_bloom(),
                _ => Ok(()),
            },
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }
}

impl AppState {
    fn resize(&mut self, size: PhysicalSize<u32>) -> RendererResult<()> {
        self.renderer
            .window_resized(&mut self.ctx, size.width, size.height)?;
        self.presenter.resize(size.width, size.height);
        let extent = Extent::new(size.width, size.height);
        if let (false, Some(perspective)) = (extent.is_empty(), self.camera.as_perspective_mut()) {
            perspective.set_aspect_ratio(aspect_ratio(extent));
        }
        Ok(())
    }

    fn redraw(&mut self) -> RendererResult<()> {
        let t = self.started.elapsed().as_secs_f32();
        if let Ok(mut transform) = self
            .scene
            .borrow_mut()
            .world_mut()
            .get::<&mut TransformComponent>(self.spinner)
        {
            transform.rotation.y = t * 0.6;
        }

        self.renderer.render(&mut self.ctx, &self.camera)?;
        if self.presenter.present(&mut self.ctx, &self.renderer)? == PresentOutcome::Skipped {
            log::debug!("Frame {} was not presented", self.ctx.frame_index());
        }
        Ok(())
    }

    fn toggle_bloom(&mut self) -> RendererResult<()> {
        let mut config = self.renderer.config().clone();
        config.bloom.enabled = !config.bloom.enabled;
        log::info!(
            "Bloom {}",
            if config.bloom.enabled { "enabled" } else { "disabled" }
        );
        self.renderer.change_config(&mut self.ctx, config)?;
        Ok(())
    }
}

/// Floor, a spinning cube carrying two child cubes, a shadowed sun and a warm point light.
fn build_demo_scene(
    ctx: &mut RenderContext<WgpuDevice>,
    mut config: SceneRendererConfig,
) -> RendererResult<(SharedScene, Entity)> {
    let device = ctx.device_mut();

    let (vertices, indices) = primitives::plane(20.0);
    let floor_mesh = Arc::new(Mesh::upload(device, &vertices, &indices)?);
    let (vertices, indices) = primitives::cube();
    let cube_mesh = Arc::new(Mesh::upload(device, &vertices, &indices)?);

    let sky = Cubemap::gradient(
        device,
        64,
        [70, 120, 210, 255],
        [200, 220, 245, 255],
        [60, 58, 55, 255],
    )?;
    config.environment.skybox = Some(Arc::new(sky));

    let floor_material =
        Arc::new(Material::new(Vec4::new(0.6, 0.6, 0.62, 1.0)).with_roughness(0.9));
    let gold = Arc::new(
        Material::new(Vec4::new(1.0, 0.77, 0.34, 1.0))
            .with_metallic(1.0)
            .with_roughness(0.3),
    );
    let glowing = Arc::new(
        Material::new(Vec4::new(0.1, 0.1, 0.1, 1.0)).with_emission(Vec3::new(4.0, 1.2, 0.4)),
    );
    let plastic = Arc::new(Material::new(Vec4::new(0.2, 0.4, 0.9, 1.0)).with_roughness(0.5));

    let mut scene = Scene::with_config("Demo", config);

    scene
        .create_entity()
        .with_name("Floor")
        .with_transform(TransformComponent::default())
        .with_mesh_renderer(floor_mesh, floor_material)
        .spawn();

    let spinner = scene
        .create_entity()
        .with_name("Spinner")
        .with_transform(TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0)))
        .with_mesh_renderer(cube_mesh.clone(), gold)
        .spawn();

    scene
        .create_entity()
        .with_name("Satellite")
        .with_transform(TransformComponent::new(
            Vec3::new(2.5, 0.5, 0.0),
            Vec3::new(0.0, 0.0, 0.4),
            Vec3::splat(0.5),
        ))
        .with_mesh_renderer(cube_mesh.clone(), plastic)
        .with_parent(spinner)
        .spawn();

    scene
        .create_entity()
        .with_name("Ember")
        .with_transform(TransformComponent::new(
            Vec3::new(-2.5, 0.5, 0.0),
            Vec3::ZERO,
            Vec3::splat(0.4),
        ))
        .with_mesh_renderer(cube_mesh, glowing)
        .with_parent(spinner)
        .spawn();

    scene
        .create_entity()
        .with_name("Sun")
        .with_transform(TransformComponent::new(
            Vec3::new(0.0, 8.0, 0.0),
            Vec3::new(-1.0, 0.5, 0.0),
            Vec3::ONE,
        ))
        .with_light(LightComponent::directional(
            Vec4::new(1.0, 0.96, 0.9, 1.0),
            3.0,
            ShadowType::Hard,
        ))
        .spawn();

    scene
        .create_entity()
        .with_name("Lamp")
        .with_transform(TransformComponent::from_position(Vec3::new(-3.0, 2.0, 3.0)))
        .with_light(LightComponent::point(Vec4::new(1.0, 0.6, 0.3, 1.0), 6.0, 8.0))
        .spawn();

    Ok((Rc::new(RefCell::new(scene)), spinner))
}

fn aspect_ratio(extent: Extent) -> f32 {
    extent.width as f32 / extent.height.max(1) as f32
}
