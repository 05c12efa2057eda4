//! Per-scene renderer configuration.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::renderer::Cubemap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRendererConfig {
    /// Edge length of one shadow atlas tile.
    #[serde(default = "SceneRendererConfig::default_shadow_map_resolution")]
    pub shadow_map_resolution: u32,
    #[serde(default)]
    pub bloom: BloomConfig,
    /// Assets are resolved by the caller, so the environment is never serialized.
    #[serde(skip)]
    pub environment: EnvironmentConfig,
}

impl Default for SceneRendererConfig {
    fn default() -> Self {
        Self {
            shadow_map_resolution: Self::default_shadow_map_resolution(),
            bloom: BloomConfig::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

impl SceneRendererConfig {
    /// Largest tile that keeps the atlas within the default 8192 texel texture limit.
    pub const MAX_SHADOW_MAP_RESOLUTION: u32 = 2048;

    pub fn validate(mut self) -> Self {
        if self.shadow_map_resolution == 0 {
            warn!("Shadow map resolution must be greater than zero. Using default value.");
            self.shadow_map_resolution = Self::default_shadow_map_resolution();
        } else if self.shadow_map_resolution > Self::MAX_SHADOW_MAP_RESOLUTION {
            warn!(
                "Shadow map resolution {} exceeds {}. Clamping.",
                self.shadow_map_resolution,
                Self::MAX_SHADOW_MAP_RESOLUTION
            );
            self.shadow_map_resolution = Self::MAX_SHADOW_MAP_RESOLUTION;
        }
        self.bloom = self.bloom.validate();
        self
    }

    /// Which pipelines have to be rebuilt to go from `self` to `next`.
    pub fn diff(&self, next: &SceneRendererConfig) -> ConfigChanges {
        ConfigChanges {
            shadow: self.shadow_map_resolution != next.shadow_map_resolution,
            bloom: self.bloom.requires_rebuild(&next.bloom),
            skybox: !self.environment.same_skybox(&next.environment),
        }
    }

    const fn default_shadow_map_resolution() -> u32 {
        1024
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigChanges {
    pub shadow: bool,
    pub bloom: bool,
    pub skybox: bool,
}

impl ConfigChanges {
    pub fn any(&self) -> bool {
        self.shadow || self.bloom || self.skybox
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomConfig {
    #[serde(default = "BloomConfig::default_enabled")]
    pub enabled: bool,
    /// Luminance above which pixels feed the bloom chain.
    #[serde(default = "BloomConfig::default_threshold")]
    pub threshold: f32,
    #[serde(default = "BloomConfig::default_intensity")]
    pub intensity: f32,
    /// Length of the mip chain, mip 0 being half the viewport.
    #[serde(default = "BloomConfig::default_mip_levels")]
    pub mip_levels: u32,
    /// Coarsest mips of the chain left out of downsampling and upsampling.
    #[serde(default = "BloomConfig::default_skipped_mips")]
    pub skipped_mips: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            threshold: Self::default_threshold(),
            intensity: Self::default_intensity(),
            mip_levels: Self::default_mip_levels(),
            skipped_mips: Self::default_skipped_mips(),
        }
    }
}

impl BloomConfig {
    pub const MAX_MIP_LEVELS: u32 = 10;

    pub fn validate(mut self) -> Self {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            warn!("Bloom threshold must be a non-negative number. Using default value.");
            self.threshold = Self::default_threshold();
        }
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            warn!("Bloom intensity must be a non-negative number. Using default value.");
            self.intensity = Self::default_intensity();
        }
        if self.mip_levels == 0 || self.mip_levels > Self::MAX_MIP_LEVELS {
            warn!(
                "Bloom mip levels must be within 1..={}. Using default value.",
                Self::MAX_MIP_LEVELS
            );
            self.mip_levels = Self::default_mip_levels();
        }
        if self.skipped_mips >= self.mip_levels {
            warn!(
                "Skipping {} of {} bloom mips leaves nothing to blur. Skipping {} instead.",
                self.skipped_mips,
                self.mip_levels,
                self.mip_levels - 1
            );
            self.skipped_mips = self.mip_levels - 1;
        }
        self
    }

    /// Whether going to `next` needs new bloom targets or pipelines. Intensity is applied at tone
    /// mapping, and nothing is rebuilt while bloom stays off.
    pub fn requires_rebuild(&self, next: &BloomConfig) -> bool {
        if !self.enabled && !next.enabled {
            return false;
        }
        self.enabled != next.enabled
            || self.threshold != next.threshold
            || self.mip_levels != next.mip_levels
            || self.skipped_mips != next.skipped_mips
    }

    /// Mips that take part in downsampling and upsampling.
    pub fn active_mips(&self) -> u32 {
        self.mip_levels.saturating_sub(self.skipped_mips).max(1)
    }

    const fn default_enabled() -> bool {
        true
    }

    const fn default_threshold() -> f32 {
        1.0
    }

    const fn default_intensity() -> f32 {
        0.3
    }

    const fn default_mip_levels() -> u32 {
        6
    }

    const fn default_skipped_mips() -> u32 {
        1
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    pub skybox: Option<Arc<Cubemap>>,
}

impl EnvironmentConfig {
    /// Skyboxes compare by asset identity, not by contents.
    pub fn same_skybox(&self, other: &EnvironmentConfig) -> bool {
        match (&self.skybox, &other.skybox) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_configs_have_no_changes() {
        let config = SceneRendererConfig::default();
        assert!(!config.diff(&config.clone()).any());
    }

    #[test]
    fn diff_reports_only_the_changed_section() {
        let current = SceneRendererConfig::default();

        let mut next = current.clone();
        next.shadow_map_resolution = 512;
        assert_eq!(
            current.diff(&next),
            ConfigChanges {
                shadow: true,
                ..ConfigChanges::default()
            }
        );

        let mut next = current.clone();
        next.bloom.threshold = 2.5;
        assert_eq!(
            current.diff(&next),
            ConfigChanges {
                bloom: true,
                ..ConfigChanges::default()
            }
        );
    }

    #[test]
    fn bloom_intensity_and_disabled_tweaks_need_no_rebuild() {
        let current = SceneRendererConfig::default();

        let mut next = current.clone();
        next.bloom.intensity = 0.9;
        assert!(!current.diff(&next).any());

        let mut off = current.clone();
        off.bloom.enabled = false;
        let mut still_off = off.clone();
        still_off.bloom.threshold = 4.0;
        still_off.bloom.mip_levels = 3;
        assert!(!off.diff(&still_off).any());

        let mut on = still_off.clone();
        on.bloom.enabled = true;
        assert!(still_off.diff(&on).bloom);
    }

    #[test]
    fn validate_keeps_at_least_one_active_bloom_mip() {
        let bloom = BloomConfig {
            mip_levels: 4,
            skipped_mips: 9,
            ..BloomConfig::default()
        }
        .validate();

        assert_eq!(bloom.skipped_mips, 3);
        assert_eq!(bloom.active_mips(), 1);
    }

    #[test]
    fn validate_clamps_shadow_resolution() {
        let config = SceneRendererConfig {
            shadow_map_resolution: 16384,
            ..SceneRendererConfig::default()
        }
        .validate();

        assert_eq!(
            config.shadow_map_resolution,
            SceneRendererConfig::MAX_SHADOW_MAP_RESOLUTION
        );
    }
}
