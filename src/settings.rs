use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::scene::SceneRendererConfig;

/// Upper bound on frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_frames_in_flight")]
    pub frames_in_flight: usize,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    /// Renderer configuration given to scenes that do not carry their own.
    #[serde(default)]
    pub scene: SceneRendererConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: Self::default_frames_in_flight(),
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            scene: SceneRendererConfig::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    /// Reads `path`, falling back to defaults when it is missing or malformed.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No render settings at {:?}, using defaults", path);
                return Self::default();
            }
            Err(err) => {
                warn!("Cannot read {:?} ({}), using default render settings", path, err);
                return Self::default();
            }
        };

        Self::from_json(&contents).unwrap_or_else(|err| {
            warn!("Cannot parse {:?} ({}), using default render settings", path, err);
            Self::default()
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RenderSettings>(contents).map(RenderSettings::validate)
    }

    pub fn validate(mut self) -> Self {
        if self.frames_in_flight == 0 {
            warn!("Frames in flight must be greater than zero. Using default value.");
            self.frames_in_flight = Self::default_frames_in_flight();
        } else if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            warn!(
                "{} frames in flight requested, clamping to {}.",
                self.frames_in_flight, MAX_FRAMES_IN_FLIGHT
            );
            self.frames_in_flight = MAX_FRAMES_IN_FLIGHT;
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        self.scene = self.scene.validate();
        self
    }

    /// The configured present mode if the surface offers it, else FIFO, else whatever comes first.
    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        let chosen = [desired, wgpu::PresentMode::Fifo]
            .into_iter()
            .chain(available.first().copied())
            .find(|mode| available.contains(mode))
            .unwrap_or(wgpu::PresentMode::Fifo);
        if chosen != desired {
            warn!("Present mode {:?} unavailable, using {:?}", desired, chosen);
        }
        chosen
    }

    const fn default_frames_in_flight() -> usize {
        2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let settings = RenderSettings {
            frames_in_flight: 0,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            ..RenderSettings::default()
        };

        let validated = settings.validate();

        assert_eq!(validated.frames_in_flight, 2);
        assert_eq!(validated.resolution.width, Resolution::default().width);
        assert_eq!(validated.resolution.height, Resolution::default().height);
    }

    #[test]
    fn validate_clamps_frames_in_flight() {
        let settings = RenderSettings {
            frames_in_flight: 8,
            ..RenderSettings::default()
        };

        assert_eq!(settings.validate().frames_in_flight, MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let settings = RenderSettings::from_json(
            r#"{ "frames_in_flight": 3, "scene": { "shadow_map_resolution": 512 } }"#,
        )
        .unwrap();

        assert_eq!(settings.frames_in_flight, 3);
        assert_eq!(settings.resolution.width, 1280);
        assert_eq!(settings.scene.shadow_map_resolution, 512);
        assert!(settings.scene.bloom.enabled);
    }

    #[test]
    fn present_mode_falls_back_in_order() {
        use wgpu::PresentMode::{Fifo, Immediate, Mailbox};

        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        for (available, expected) in [
            (&[Fifo, Mailbox, Immediate][..], Mailbox),
            (&[Immediate, Fifo][..], Fifo),
            (&[Immediate][..], Immediate),
        ] {
            assert_eq!(settings.present_mode(available), expected, "{available:?}");
        }
    }
}
