//! Composited output and the channel-backed sink.

use std::sync::Arc;

use lessoncast_common::error::CompositorResult;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::capability::FrameSink;

/// One composited canvas snapshot, RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFrame {
    /// Monotonic per session, starting at 0.
    pub sequence: u64,
    /// Render-loop time the frame was composited at.
    pub timestamp_ns: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

/// One block of mixed mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pub timestamp_ns: u64,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl AudioBlock {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ns(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1_000_000_000 / self.sample_rate as u64
    }
}

/// Receiving half handed to a recorder.
///
/// Frames stop arriving when the compositor stops; both channels then
/// close once drained.
#[derive(Debug)]
pub struct OutputStream {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub video: mpsc::Receiver<OutputFrame>,
    /// Present when the output carries audio.
    pub audio: Option<mpsc::Receiver<AudioBlock>>,
}

/// [`FrameSink`] backed by bounded tokio channels.
///
/// A slow consumer loses frames instead of stalling the render loop.
#[derive(Debug)]
pub struct ChannelSink {
    video: mpsc::Sender<OutputFrame>,
    audio: Option<mpsc::Sender<AudioBlock>>,
    discarded: u64,
}

/// Queued frames before the sink starts discarding.
pub const OUTPUT_QUEUE_DEPTH: usize = 8;

impl ChannelSink {
    /// Create a sink and its stream.
    pub fn new(width: u32, height: u32, frame_rate: u32, with_audio: bool) -> (Self, OutputStream) {
        let (video_tx, video_rx) = mpsc::channel(OUTPUT_QUEUE_DEPTH);
        let (audio_tx, audio_rx) = if with_audio {
            let (tx, rx) = mpsc::channel(OUTPUT_QUEUE_DEPTH * 4);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        (
            Self {
                video: video_tx,
                audio: audio_tx,
                discarded: 0,
            },
            OutputStream {
                width,
                height,
                frame_rate,
                video: video_rx,
                audio: audio_rx,
            },
        )
    }

    /// Frames and blocks thrown away because the consumer lagged.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl FrameSink for ChannelSink {
    fn write_video(&mut self, frame: OutputFrame) -> CompositorResult<()> {
        match self.video.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.discarded += 1;
                tracing::debug!(sequence = frame.sequence, "Output queue full, frame discarded");
            }
            // Nobody is recording; keep compositing for preview.
            Err(TrySendError::Closed(_)) => {}
        }
        Ok(())
    }

    fn write_audio(&mut self, block: AudioBlock) -> CompositorResult<()> {
        let Some(audio) = &self.audio else {
            return Ok(());
        };
        match audio.try_send(block) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                self.discarded += 1;
                tracing::debug!("Audio queue full, block discarded");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> OutputFrame {
        OutputFrame {
            sequence,
            timestamp_ns: sequence * 33_333_333,
            width: 1,
            height: 1,
            pixels: Arc::from(vec![0u8; 4]),
        }
    }

    #[test]
    fn test_frames_reach_the_stream() {
        let (mut sink, mut stream) = ChannelSink::new(1, 1, 30, false);
        sink.write_video(frame(0)).unwrap();
        assert_eq!(stream.video.try_recv().unwrap().sequence, 0);
        assert!(stream.audio.is_none());
    }

    #[test]
    fn test_full_queue_discards_instead_of_failing() {
        let (mut sink, _stream) = ChannelSink::new(1, 1, 30, false);
        for i in 0..(OUTPUT_QUEUE_DEPTH as u64 + 3) {
            sink.write_video(frame(i)).unwrap();
        }
        assert_eq!(sink.discarded(), 3);
    }

    #[test]
    fn test_closed_stream_is_not_an_error() {
        let (mut sink, stream) = ChannelSink::new(1, 1, 30, true);
        drop(stream);
        sink.write_video(frame(0)).unwrap();
        sink.write_audio(AudioBlock {
            timestamp_ns: 0,
            sample_rate: 48_000,
            samples: Arc::from(vec![0.0f32; 16]),
        })
        .unwrap();
        assert_eq!(sink.discarded(), 0);
    }

    #[test]
    fn test_block_duration() {
        let block = AudioBlock {
            timestamp_ns: 0,
            sample_rate: 48_000,
            samples: Arc::from(vec![0.0f32; 480]),
        };
        assert_eq!(block.duration_ns(), 10_000_000);
    }
}
