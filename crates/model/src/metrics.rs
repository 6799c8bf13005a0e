//! Performance samples, quality levels, and audio levels.

use serde::{Deserialize, Serialize};

/// Discrete output quality tier.
///
/// Ordered from best to worst; the controller only ever moves one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityLevel {
    #[default]
    High,
    Medium,
    Low,
}

/// Frame rate ceiling at the lowest quality tier.
pub const LOW_QUALITY_FPS_CAP: u32 = 15;

impl QualityLevel {
    /// Output resolution factor relative to the configured canvas.
    pub fn scale(self) -> f64 {
        match self {
            QualityLevel::High => 1.0,
            QualityLevel::Medium => 0.75,
            QualityLevel::Low => 0.5,
        }
    }

    /// Effective output frame rate for a configured target rate.
    pub fn frame_rate(self, target: u32) -> u32 {
        match self {
            QualityLevel::High | QualityLevel::Medium => target,
            QualityLevel::Low => target.min(LOW_QUALITY_FPS_CAP),
        }
    }

    /// One step worse, or `None` at the bottom of the ladder.
    pub fn downgraded(self) -> Option<QualityLevel> {
        match self {
            QualityLevel::High => Some(QualityLevel::Medium),
            QualityLevel::Medium => Some(QualityLevel::Low),
            QualityLevel::Low => None,
        }
    }

    /// One step better, or `None` at the top of the ladder.
    pub fn upgraded(self) -> Option<QualityLevel> {
        match self {
            QualityLevel::High => None,
            QualityLevel::Medium => Some(QualityLevel::High),
            QualityLevel::Low => Some(QualityLevel::Medium),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::High => "high",
            QualityLevel::Medium => "medium",
            QualityLevel::Low => "low",
        }
    }
}

/// Health summary, present only while adaptive quality monitoring is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Weighted score in `[0, 100]`.
    pub health_score: f64,
    pub quality_level: QualityLevel,
}

/// Render-loop performance over the most recent sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub fps: f64,
    /// Accumulated since the last `stop()`.
    pub dropped_frames: u64,
    /// Mean render time in milliseconds.
    pub average_render_time: f64,
    /// Resident memory in bytes, when the host reports it.
    pub memory_usage: Option<u64>,
    pub is_performance_good: bool,
    pub health: Option<HealthReport>,
}

/// Pre-gain level of one audio source for visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioLevelData {
    pub source_id: String,
    /// Root mean square of the last processed block.
    pub rms: f32,
    /// Peak absolute sample of the last processed block.
    pub peak: f32,
    /// Whether the source is currently contributing to the mix.
    pub active: bool,
}
