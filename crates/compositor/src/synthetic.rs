//! Synthetic sources for demos, checks, and tests.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lessoncast_common::error::{CompositorError, CompositorResult};
use lessoncast_model::geometry::Rgba;

use crate::capability::{AudioSource, DeviceRelease, FrameSource, VideoFrame};

/// Vertical colour bars with a bright column sweeping across them.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    frame: u64,
}

const BARS: [Rgba; 7] = [
    Rgba::new(192, 192, 192, 255),
    Rgba::new(192, 192, 0, 255),
    Rgba::new(0, 192, 192, 255),
    Rgba::new(0, 192, 0, 255),
    Rgba::new(192, 0, 192, 255),
    Rgba::new(192, 0, 0, 255),
    Rgba::new(0, 0, 192, 255),
];

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame: 0,
        }
    }
}

impl FrameSource for TestPattern {
    fn read_frame(&mut self) -> CompositorResult<Option<VideoFrame>> {
        let (w, h) = (self.width as usize, self.height as usize);
        let sweep = (self.frame as usize * 4) % w;
        let mut pixels = Vec::with_capacity(w * h * 4);
        for _ in 0..h {
            for x in 0..w {
                let color = if x == sweep {
                    Rgba::WHITE
                } else {
                    BARS[x * BARS.len() / w]
                };
                pixels.extend_from_slice(&color.to_array());
            }
        }
        self.frame += 1;
        Ok(Some(VideoFrame::new(self.width, self.height, pixels)))
    }
}

/// Delivers one solid frame, then reports no new frames.
#[derive(Debug, Clone)]
pub struct SolidColor {
    frame: Option<VideoFrame>,
}

impl SolidColor {
    pub fn new(width: u32, height: u32, color: Rgba) -> Self {
        Self {
            frame: Some(VideoFrame::solid(width, height, color)),
        }
    }
}

impl FrameSource for SolidColor {
    fn read_frame(&mut self) -> CompositorResult<Option<VideoFrame>> {
        Ok(self.frame.take())
    }
}

/// Always fails, as a disconnected device would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSource;

impl FrameSource for FailingSource {
    fn read_frame(&mut self) -> CompositorResult<Option<VideoFrame>> {
        Err(CompositorError::render("device disconnected"))
    }
}

/// DC signal at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct ConstantTone {
    level: f32,
}

impl ConstantTone {
    pub fn new(level: f32) -> Self {
        Self { level }
    }
}

impl AudioSource for ConstantTone {
    fn read_samples(&mut self, out: &mut [f32], _sample_rate: u32) -> usize {
        out.fill(self.level);
        out.len()
    }
}

/// Continuous sine wave.
#[derive(Debug, Clone, Copy)]
pub struct SineTone {
    frequency: f32,
    amplitude: f32,
    phase: f32,
}

impl SineTone {
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            amplitude,
            phase: 0.0,
        }
    }
}

impl AudioSource for SineTone {
    fn read_samples(&mut self, out: &mut [f32], sample_rate: u32) -> usize {
        let step = TAU * self.frequency / sample_rate.max(1) as f32;
        for sample in out.iter_mut() {
            *sample = self.amplitude * self.phase.sin();
            self.phase = (self.phase + step) % TAU;
        }
        out.len()
    }
}

/// Device handle that counts releases.
#[derive(Debug, Clone, Default)]
pub struct CountingDevice {
    releases: Arc<AtomicUsize>,
}

impl CountingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter, readable after the device moved into a stream.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

#[async_trait::async_trait]
impl DeviceRelease for CountingDevice {
    async fn release(&mut self) -> CompositorResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
