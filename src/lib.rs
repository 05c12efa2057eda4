pub mod app;
pub mod backend;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;

use app::App;
use winit::event_loop::EventLoop;

pub use error::{HierarchyError, RendererError, RendererResult};
pub use settings::RenderSettings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
}

pub fn run() -> Result<(), AppError> {
    init_logging();

    log::info!("Starting wgpu deferred renderer");

    let event_loop = EventLoop::new()?;
    let mut app = App::new(RenderSettings::load());

    let result = event_loop.run_app(&mut app);
    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }
    log::info!("Application shutdown complete");

    result?;
    match app.take_error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
