//! Contracts shared with the downstream recorder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::layout::LayoutType;
use crate::metrics::QualityLevel;

/// Options the studio hands to the recorder when arming it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingOptions {
    pub mime_type: String,
    pub video_bits_per_second: u64,
    pub audio_bits_per_second: u64,
    /// Chunk interval for the recorder's data callbacks.
    pub time_slice_ms: u64,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            mime_type: "video/webm;codecs=vp9,opus".to_string(),
            video_bits_per_second: 2_500_000,
            audio_bits_per_second: 128_000,
            time_slice_ms: 1000,
        }
    }
}

impl RecordingOptions {
    /// Options suited to a quality tier: video bitrate follows the pixel count.
    pub fn for_quality(quality: QualityLevel) -> Self {
        let base = Self::default();
        let pixel_factor = quality.scale() * quality.scale();
        Self {
            video_bits_per_second: (base.video_bits_per_second as f64 * pixel_factor).round()
                as u64,
            ..base
        }
    }

    /// Drop the audio bitrate when the output carries no audio track.
    pub fn without_audio(self) -> Self {
        Self {
            mime_type: "video/webm;codecs=vp9".to_string(),
            audio_bits_per_second: 0,
            ..self
        }
    }
}

/// Metadata the recorder produces for a finished take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: f64,
    /// Bytes.
    pub file_size: u64,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub layout_type: LayoutType,
}

impl RecordingMetadata {
    /// Metadata for a take that has just begun.
    pub fn begin(start_time: DateTime<Utc>, layout_type: LayoutType) -> Self {
        Self {
            start_time,
            end_time: None,
            duration: 0.0,
            file_size: 0,
            video_codec: None,
            audio_codec: None,
            layout_type,
        }
    }

    /// Close the take and compute its duration.
    pub fn finalize(&mut self, end_time: DateTime<Utc>, file_size: u64) {
        let millis = (end_time - self.start_time).num_milliseconds().max(0);
        self.end_time = Some(end_time);
        self.duration = millis as f64 / 1000.0;
        self.file_size = file_size;
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }
}
