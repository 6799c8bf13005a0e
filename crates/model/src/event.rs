//! Compositor event types.
//!
//! Events are immutable records published on every lifecycle transition
//! and notable condition. The JSON form is tagged by `type` so telemetry
//! consumers can filter without knowing every payload.

use chrono::{DateTime, Utc};
use lessoncast_common::ErrorKind;
use serde::{Deserialize, Serialize};

use crate::layout::{LayoutType, SourceKind};
use crate::metrics::{PerformanceMetrics, QualityLevel};

/// A single event with its publication time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositorEvent {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: EventKind,
}

/// Discriminated union of event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    Initialized {
        width: u32,
        height: u32,
        frame_rate: u32,
    },
    Started,
    Paused,
    Resumed,
    Stopped {
        /// Frames rendered during the session that just ended.
        frames_rendered: u64,
    },
    Disposed,

    /// Render failure or fatal condition inside the render loop.
    Error {
        error_kind: ErrorKind,
        message: String,
        fatal: bool,
    },

    SourceAdded {
        source_id: String,
        kind: SourceKind,
    },
    SourceRemoved {
        source_id: String,
        kind: SourceKind,
    },
    SourceUpdated {
        source_id: String,
        visible: bool,
        opacity: f64,
    },

    LayoutChanged {
        layout_type: LayoutType,
    },
    TransitionStarted {
        layout_type: LayoutType,
        duration_ms: u64,
    },
    TransitionCompleted {
        layout_type: LayoutType,
    },

    QualityChanged {
        from: QualityLevel,
        to: QualityLevel,
    },
    PerformanceWarning {
        metrics: PerformanceMetrics,
    },

    AudioMixChanged {
        active_sources: usize,
    },
}

impl CompositorEvent {
    /// Stamp a payload with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Kebab-case tag of the payload.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            EventKind::Initialized { .. } => "initialized",
            EventKind::Started => "started",
            EventKind::Paused => "paused",
            EventKind::Resumed => "resumed",
            EventKind::Stopped { .. } => "stopped",
            EventKind::Disposed => "disposed",
            EventKind::Error { .. } => "error",
            EventKind::SourceAdded { .. } => "source-added",
            EventKind::SourceRemoved { .. } => "source-removed",
            EventKind::SourceUpdated { .. } => "source-updated",
            EventKind::LayoutChanged { .. } => "layout-changed",
            EventKind::TransitionStarted { .. } => "transition-started",
            EventKind::TransitionCompleted { .. } => "transition-completed",
            EventKind::QualityChanged { .. } => "quality-changed",
            EventKind::PerformanceWarning { .. } => "performance-warning",
            EventKind::AudioMixChanged { .. } => "audio-mix-changed",
        }
    }

    /// Whether a recorder should finalize on this event.
    pub fn ends_session(&self) -> bool {
        match &self.kind {
            EventKind::Stopped { .. } | EventKind::Disposed => true,
            EventKind::Error { fatal, .. } => *fatal,
            _ => false,
        }
    }
}
