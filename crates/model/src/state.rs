//! Lifecycle states and the externally observable state snapshot.

use serde::{Deserialize, Serialize};

use crate::layout::{CompositorLayout, SourceKind, SourceLayout};
use crate::metrics::PerformanceMetrics;

/// Compositor lifecycle.
///
/// ```text
/// uninitialized → initialized → running ⇄ paused
///                      │            ↓        ↓
///                      └──────→ stopped ←────┘
/// any ──────────────────────────→ disposed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    Stopped,
    Disposed,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Initialized => "initialized",
            Lifecycle::Running => "running",
            Lifecycle::Paused => "paused",
            Lifecycle::Stopped => "stopped",
            Lifecycle::Disposed => "disposed",
        }
    }

    /// Whether the render loop owns an output stream in this state.
    pub fn is_active(self) -> bool {
        matches!(self, Lifecycle::Running | Lifecycle::Paused)
    }
}

/// Per-source runtime state owned by the source registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub layout: SourceLayout,
    pub visible: bool,
    /// In `[0, 1]`.
    pub opacity: f64,
}

/// Per-source audio settings owned by the mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSourceSettings {
    pub id: String,
    pub label: String,
    /// In `[0, 1]`.
    pub volume: f64,
    pub muted: bool,
}

impl AudioSourceSettings {
    /// Gain applied to the source's samples.
    pub fn gain(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Snapshot of one registered video source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub id: String,
    pub kind: SourceKind,
    pub label: String,
    pub config: SourceConfig,
    pub has_audio: bool,
}

/// Read-only snapshot of the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositorState {
    pub lifecycle: Lifecycle,
    pub is_initialized: bool,
    pub is_running: bool,
    pub current_layout: Option<CompositorLayout>,
    pub active_sources: Vec<SourceSummary>,
    pub audio_sources: Vec<AudioSourceSettings>,
    pub performance_metrics: PerformanceMetrics,
    pub audio_enabled: bool,
    pub visual_effects_enabled: bool,
    /// Cause of the last fatal error, cleared by `initialize()`.
    pub fault: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muted_source_has_zero_gain() {
        let mut settings = AudioSourceSettings {
            id: "cam1".into(),
            label: "Camera".into(),
            volume: 0.8,
            muted: true,
        };
        assert_eq!(settings.gain(), 0.0);
        settings.muted = false;
        assert_eq!(settings.gain(), 0.8);
    }

    #[test]
    fn test_active_states() {
        assert!(Lifecycle::Running.is_active());
        assert!(Lifecycle::Paused.is_active());
        assert!(!Lifecycle::Stopped.is_active());
        assert_eq!(
            serde_json::to_string(&Lifecycle::Uninitialized).unwrap(),
            "\"uninitialized\""
        );
    }
}
