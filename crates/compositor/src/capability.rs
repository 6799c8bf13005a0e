//! Host capability interfaces.
//!
//! The compositor never talks to a camera, screen grabber, or encoder
//! directly. The host hands it a [`MediaStream`] per source, built from
//! these traits, and receives composited output through a [`FrameSink`].

use std::sync::Arc;

use lessoncast_common::error::{CompositorError, CompositorResult};
use lessoncast_model::geometry::Rgba;

use crate::output::{AudioBlock, OutputFrame};

/// One decoded RGBA8 video frame, row-major, no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// A frame filled with one colour.
    pub fn solid(width: u32, height: u32, color: Rgba) -> Self {
        let pixels: Vec<u8> = color
            .to_array()
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, pixels)
    }

    /// Reject frames whose buffer does not match their dimensions.
    pub fn validate(&self) -> CompositorResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CompositorError::render(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(CompositorError::render(format!(
                "frame buffer holds {} bytes, {}x{} RGBA needs {}",
                self.pixels.len(),
                self.width,
                self.height,
                expected
            )));
        }
        Ok(())
    }

    /// Pixel at `(x, y)`; callers keep coordinates in range.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Video track of a source.
pub trait FrameSource: Send {
    /// Latest frame, or `None` when no new frame arrived since the last
    /// call (the compositor then redraws the previous one).
    fn read_frame(&mut self) -> CompositorResult<Option<VideoFrame>>;
}

/// Audio track of a source.
pub trait AudioSource: Send {
    /// Fill `out` with mono samples at `sample_rate`.
    ///
    /// Returns how many samples were written; the rest of `out` is
    /// treated as silence.
    fn read_samples(&mut self, out: &mut [f32], sample_rate: u32) -> usize;
}

/// Hardware or OS handle behind a stream that must be released explicitly.
#[async_trait::async_trait]
pub trait DeviceRelease: Send {
    async fn release(&mut self) -> CompositorResult<()>;
}

/// Receives composited output.
pub trait FrameSink: Send {
    /// Deliver one composited frame. A `Fatal` error ends the session.
    fn write_video(&mut self, frame: OutputFrame) -> CompositorResult<()>;

    /// Deliver one block of mixed audio.
    fn write_audio(&mut self, block: AudioBlock) -> CompositorResult<()>;
}

/// Reports process memory use for the performance monitor.
pub trait MemoryProbe: Send {
    /// Resident memory in bytes, when the platform exposes it.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads resident set size from `/proc/self/statm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMemoryProbe;

const PAGE_SIZE: u64 = 4096;

impl MemoryProbe for ProcMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(pages * PAGE_SIZE)
    }
}

/// A host media stream: optional video, optional audio, optional device.
///
/// Ownership moves into the compositor on `add_source`; the stream is
/// split so the registry keeps the video track and the mixer keeps the
/// audio track.
pub struct MediaStream {
    label: String,
    video: Option<Box<dyn FrameSource>>,
    audio: Option<Box<dyn AudioSource>>,
    device: Option<Box<dyn DeviceRelease>>,
}

/// A [`MediaStream`] split into its tracks.
pub struct StreamParts {
    pub label: String,
    pub video: Option<Box<dyn FrameSource>>,
    pub audio: Option<Box<dyn AudioSource>>,
    pub device: Option<Box<dyn DeviceRelease>>,
}

impl MediaStream {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            video: None,
            audio: None,
            device: None,
        }
    }

    pub fn with_video(mut self, video: impl FrameSource + 'static) -> Self {
        self.video = Some(Box::new(video));
        self
    }

    pub fn with_audio(mut self, audio: impl AudioSource + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn with_device(mut self, device: impl DeviceRelease + 'static) -> Self {
        self.device = Some(Box::new(device));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn into_parts(self) -> StreamParts {
        StreamParts {
            label: self.label,
            video: self.video,
            audio: self.audio,
            device: self.device,
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("label", &self.label)
            .field("video", &self.video.is_some())
            .field("audio", &self.audio.is_some())
            .field("device", &self.device.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_frame_is_valid() {
        let frame = VideoFrame::solid(4, 3, Rgba::new(10, 20, 30, 255));
        frame.validate().unwrap();
        assert_eq!(frame.pixel(3, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn test_short_buffer_is_a_render_error() {
        let frame = VideoFrame::new(2, 2, vec![0u8; 15]);
        let err = frame.validate().unwrap_err();
        assert!(matches!(err, CompositorError::Render { .. }));
    }

    #[test]
    fn test_proc_probe_reports_memory_on_linux() {
        if std::path::Path::new("/proc/self/statm").exists() {
            assert!(ProcMemoryProbe.resident_bytes().unwrap() > 0);
        }
    }
}
