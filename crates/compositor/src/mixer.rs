//! Audio mixer.
//!
//! Every attached audio track feeds one gain stage; all gain stages sum
//! into a single mono output. The gain table is rebuilt whenever a track
//! is added or removed or its volume or mute changes, and the output
//! always reflects the current table.

use std::sync::Arc;

use lessoncast_common::error::{CompositorError, CompositorResult};
use lessoncast_model::metrics::AudioLevelData;
use lessoncast_model::state::AudioSourceSettings;

use crate::capability::AudioSource;
use crate::output::AudioBlock;

/// Longest block produced by one `render` call, in seconds.
const MAX_BLOCK_SECS: f64 = 0.25;

struct MixerInput {
    settings: AudioSourceSettings,
    track: Box<dyn AudioSource>,
    rms: f32,
    peak: f32,
}

/// Sums attached audio tracks into one mono stream.
pub struct AudioMixer {
    sample_rate: u32,
    inputs: Vec<MixerInput>,
    /// Gain per input, same order as `inputs`.
    gains: Vec<f32>,
    scratch: Vec<f32>,
    /// Fractional samples carried between blocks.
    carry: f64,
}

impl AudioMixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            inputs: Vec::new(),
            gains: Vec::new(),
            scratch: Vec::new(),
            carry: 0.0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the output rate; attached tracks resample on their side.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.carry = 0.0;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inputs.iter().any(|i| i.settings.id == id)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Attach a track at full volume, unmuted.
    pub fn add(&mut self, id: &str, label: String, track: Box<dyn AudioSource>) -> CompositorResult<()> {
        if self.contains(id) {
            return Err(CompositorError::source(format!(
                "audio source '{id}' is already attached"
            )));
        }
        self.inputs.push(MixerInput {
            settings: AudioSourceSettings {
                id: id.to_string(),
                label,
                volume: 1.0,
                muted: false,
            },
            track,
            rms: 0.0,
            peak: 0.0,
        });
        self.rebuild();
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.inputs.len();
        self.inputs.retain(|i| i.settings.id != id);
        let removed = self.inputs.len() != before;
        if removed {
            self.rebuild();
        }
        removed
    }

    /// Set a track's volume, clamped to `[0, 1]`. Returns the stored value.
    pub fn set_volume(&mut self, id: &str, volume: f64) -> CompositorResult<f64> {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.input_mut(id)?.settings.volume = volume;
        self.rebuild();
        Ok(volume)
    }

    pub fn set_muted(&mut self, id: &str, muted: bool) -> CompositorResult<()> {
        self.input_mut(id)?.settings.muted = muted;
        self.rebuild();
        Ok(())
    }

    fn input_mut(&mut self, id: &str) -> CompositorResult<&mut MixerInput> {
        self.inputs
            .iter_mut()
            .find(|i| i.settings.id == id)
            .ok_or_else(|| CompositorError::source(format!("unknown audio source '{id}'")))
    }

    fn rebuild(&mut self) {
        self.gains = self
            .inputs
            .iter()
            .map(|i| i.settings.gain() as f32)
            .collect();
        tracing::debug!(
            inputs = self.inputs.len(),
            active = self.active_count(),
            "Audio mix rebuilt"
        );
    }

    /// Tracks currently contributing to the mix.
    pub fn active_count(&self) -> usize {
        self.gains.iter().filter(|g| **g > 0.0).count()
    }

    pub fn settings(&self) -> Vec<AudioSourceSettings> {
        self.inputs.iter().map(|i| i.settings.clone()).collect()
    }

    /// Pre-gain levels of the last processed block.
    pub fn levels(&self) -> Vec<AudioLevelData> {
        self.inputs
            .iter()
            .zip(&self.gains)
            .map(|(input, gain)| AudioLevelData {
                source_id: input.settings.id.clone(),
                rms: input.rms,
                peak: input.peak,
                active: *gain > 0.0,
            })
            .collect()
    }

    /// Mix exactly `frames` samples.
    pub fn mix(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        if self.scratch.len() < frames {
            self.scratch.resize(frames, 0.0);
        }
        let sample_rate = self.sample_rate;

        for (input, gain) in self.inputs.iter_mut().zip(&self.gains) {
            let buf = &mut self.scratch[..frames];
            buf.fill(0.0);
            let written = input.track.read_samples(buf, sample_rate).min(frames);
            buf[written..].fill(0.0);

            let (mut sum_sq, mut peak) = (0.0f64, 0.0f32);
            for s in buf.iter() {
                sum_sq += f64::from(*s) * f64::from(*s);
                peak = peak.max(s.abs());
            }
            input.rms = if frames == 0 {
                0.0
            } else {
                (sum_sq / frames as f64).sqrt() as f32
            };
            input.peak = peak;

            if *gain > 0.0 {
                for (o, s) in out.iter_mut().zip(buf.iter()) {
                    *o += s * gain;
                }
            }
        }

        for o in &mut out {
            *o = o.clamp(-1.0, 1.0);
        }
        out
    }

    /// Mix the samples covering `elapsed_ns` of wall time.
    pub fn render(&mut self, elapsed_ns: u64, timestamp_ns: u64) -> AudioBlock {
        let exact = elapsed_ns as f64 / 1e9 * self.sample_rate as f64 + self.carry;
        let capped = exact.min(MAX_BLOCK_SECS * self.sample_rate as f64);
        let frames = capped.floor();
        self.carry = if capped < exact { 0.0 } else { capped - frames };
        let samples = self.mix(frames as usize);
        AudioBlock {
            timestamp_ns,
            sample_rate: self.sample_rate,
            samples: Arc::from(samples),
        }
    }

    /// Forget fractional carry, e.g. after a pause.
    pub fn reset_clock(&mut self) {
        self.carry = 0.0;
    }
}
