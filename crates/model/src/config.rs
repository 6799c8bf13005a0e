//! Compositor and studio configuration.

use std::path::PathBuf;

use lessoncast_common::{CompositorError, CompositorResult, LoggingConfig};
use serde::{Deserialize, Serialize};

use crate::geometry::Rgba;
use crate::layout::{CanvasConfig, PipPosition};
use crate::transition::{Easing, TransitionConfig};

/// Compositor settings, fixed at `initialize()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Target output frame rate.
    pub frame_rate: u32,

    /// Canvas clear colour (`#RRGGBB` or `#RRGGBBAA`).
    pub background_color: String,

    /// Whether the output carries a mixed audio track.
    pub enable_audio: bool,

    /// Whether layout changes animate.
    pub enable_transitions: bool,

    /// Default transition duration.
    pub transition_duration_ms: u64,

    /// Default transition easing.
    pub transition_easing: Easing,

    /// Corner used by picture-in-picture when none is requested.
    pub pip_position: PipPosition,

    /// Mixer output sample rate (mono).
    pub audio_sample_rate: u32,

    /// Whether the quality controller adapts output under load.
    pub performance_monitoring: bool,

    /// Thresholds for the quality controller.
    pub quality: QualityTuning,
}

/// Tunable thresholds for health scoring and quality changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityTuning {
    /// Sampling window length.
    pub window_ms: u64,

    /// Health score at or above which a window counts as good.
    pub health_threshold: f64,

    /// Consecutive bad windows before stepping down (N).
    pub downgrade_after: u32,

    /// Consecutive good windows before stepping up (M > N).
    pub upgrade_after: u32,

    /// Weight of the fps-to-target ratio in the health score.
    pub fps_weight: f64,

    /// Weight of the on-time frame ratio in the health score.
    pub drop_weight: f64,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            background_color: "#000000".to_string(),
            enable_audio: true,
            enable_transitions: true,
            transition_duration_ms: 300,
            transition_easing: Easing::EaseInOutCubic,
            pip_position: PipPosition::BottomRight,
            audio_sample_rate: 48_000,
            performance_monitoring: true,
            quality: QualityTuning::default(),
        }
    }
}

impl Default for QualityTuning {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            health_threshold: 70.0,
            downgrade_after: 3,
            upgrade_after: 5,
            fps_weight: 0.7,
            drop_weight: 0.3,
        }
    }
}

impl CompositorConfig {
    /// Check every field, returning the first problem as a configuration error.
    pub fn validate(&self) -> CompositorResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CompositorError::configuration(format!(
                "canvas size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(CompositorError::configuration(
                "frame rate must be positive",
            ));
        }
        if self.audio_sample_rate == 0 {
            return Err(CompositorError::configuration(
                "audio sample rate must be positive",
            ));
        }
        self.background()?;
        self.quality.validate()
    }

    /// Parsed background colour.
    pub fn background(&self) -> CompositorResult<Rgba> {
        self.background_color
            .parse()
            .map_err(|e| CompositorError::configuration(format!("background colour: {e}")))
    }

    pub fn canvas(&self) -> CanvasConfig {
        CanvasConfig::new(self.width, self.height)
    }

    /// Transition used by `set_layout`; instant when transitions are disabled.
    pub fn default_transition(&self) -> TransitionConfig {
        if self.enable_transitions {
            TransitionConfig::new(self.transition_duration_ms, self.transition_easing)
        } else {
            TransitionConfig::INSTANT
        }
    }
}

impl QualityTuning {
    pub fn validate(&self) -> CompositorResult<()> {
        if self.window_ms == 0 {
            return Err(CompositorError::configuration(
                "quality window must be positive",
            ));
        }
        if !(0.0..=100.0).contains(&self.health_threshold) {
            return Err(CompositorError::configuration(format!(
                "health threshold {} outside 0..=100",
                self.health_threshold
            )));
        }
        if self.downgrade_after < 2 {
            return Err(CompositorError::configuration(
                "downgrade_after must be at least 2 windows",
            ));
        }
        if self.upgrade_after <= self.downgrade_after {
            return Err(CompositorError::configuration(format!(
                "upgrade_after ({}) must exceed downgrade_after ({})",
                self.upgrade_after, self.downgrade_after
            )));
        }
        let weights = self.fps_weight + self.drop_weight;
        if self.fps_weight < 0.0 || self.drop_weight < 0.0 || (weights - 1.0).abs() > 1e-6 {
            return Err(CompositorError::configuration(
                "health weights must be non-negative and sum to 1",
            ));
        }
        Ok(())
    }
}

/// Studio-wide settings persisted between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Compositor settings applied at `initialize()`.
    pub compositor: CompositorConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl StudioConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("lessoncast").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        CompositorConfig::default().validate().unwrap();
        QualityTuning::default().validate().unwrap();
    }

    #[test]
    fn test_non_positive_dimensions_are_rejected() {
        for (w, h, fps) in [(0, 720, 30), (1280, 0, 30), (1280, 720, 0)] {
            let config = CompositorConfig {
                width: w,
                height: h,
                frame_rate: fps,
                ..CompositorConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(matches!(err, CompositorError::Configuration { .. }));
        }
    }

    #[test]
    fn test_bad_background_is_rejected() {
        let config = CompositorConfig {
            background_color: "black".to_string(),
            ..CompositorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hysteresis_must_be_wider_for_upgrades() {
        let tuning = QualityTuning {
            downgrade_after: 3,
            upgrade_after: 3,
            ..QualityTuning::default()
        };
        assert!(tuning.validate().is_err());

        let tuning = QualityTuning {
            downgrade_after: 1,
            ..QualityTuning::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn test_disabled_transitions_are_instant() {
        let config = CompositorConfig {
            enable_transitions: false,
            ..CompositorConfig::default()
        };
        assert!(config.default_transition().is_instant());
        assert_eq!(
            CompositorConfig::default().default_transition().duration_ms,
            300
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: StudioConfig =
            serde_json::from_str(r#"{"compositor": {"width": 640, "height": 360}}"#).unwrap();
        assert_eq!(config.compositor.width, 640);
        assert_eq!(config.compositor.frame_rate, 30);
        assert_eq!(config.logging.level, "info");
    }
}
