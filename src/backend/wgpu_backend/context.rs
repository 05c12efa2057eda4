use std::sync::Arc;

use winit::window::Window;

use crate::backend::traits::{BackendError, BackendResult};
use crate::backend::types::{Extent, MAX_PUSH_CONSTANT_SIZE};
use crate::settings::RenderSettings;

pub(crate) struct GpuContext {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    pub(crate) async fn new(window: Arc<Window>, settings: &RenderSettings) -> BackendResult<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|err| BackendError::InitializationFailed(format!("surface: {err}")))?;

        log::info!("Surface created successfully!");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| BackendError::InitializationFailed(format!("adapter: {err}")))?;

        log::info!("Using adapter: {:?}", adapter.get_info());
        log::info!("Using backend: {:?}", adapter.get_info().backend);
        let adapter_features = adapter.features();
        log::info!("Adapter features: {:?}", adapter_features);

        if !adapter_features.contains(wgpu::Features::PUSH_CONSTANTS) {
            return Err(BackendError::InitializationFailed(
                "adapter does not support push constants".to_string(),
            ));
        }
        let adapter_limits = adapter.limits();
        if adapter_limits.max_push_constant_size < MAX_PUSH_CONSTANT_SIZE {
            return Err(BackendError::InitializationFailed(format!(
                "adapter supports {} bytes of push constants, {} required",
                adapter_limits.max_push_constant_size, MAX_PUSH_CONSTANT_SIZE
            )));
        }

        let limits = wgpu::Limits {
            max_push_constant_size: MAX_PUSH_CONSTANT_SIZE,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::PUSH_CONSTANTS,
                required_limits: limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| BackendError::InitializationFailed(format!("device: {err}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let first_format = surface_caps.formats.first().copied().ok_or_else(|| {
            BackendError::InitializationFailed("surface reports no formats".to_string())
        })?;

        // Tone mapping already encodes gamma, so prefer a linear surface.
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .unwrap_or(first_format);

        let present_mode = settings.present_mode(&surface_caps.present_modes);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: settings.frames_in_flight as u32,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    pub(crate) fn configure(&mut self, extent: Extent) {
        if extent.is_empty() {
            return;
        }
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn extent(&self) -> Extent {
        Extent::new(self.config.width, self.config.height)
    }
}
