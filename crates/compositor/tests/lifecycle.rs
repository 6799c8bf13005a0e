use std::sync::atomic::Ordering;

use lessoncast_common::CompositorError;
use lessoncast_compositor::synthetic::{ConstantTone, CountingDevice, FailingSource, SolidColor};
use lessoncast_compositor::{Compositor, MediaStream, TickOutcome};
use lessoncast_model::config::CompositorConfig;
use lessoncast_model::event::{CompositorEvent, EventKind};
use lessoncast_model::geometry::{Rect, Rgba};
use lessoncast_model::layout::{LayoutType, SourceKind, SourceLayout};
use lessoncast_model::state::Lifecycle;
use lessoncast_model::transition::TransitionConfig;
use proptest::prelude::*;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

const MS: u64 = 1_000_000;

fn screen() -> MediaStream {
    MediaStream::new("Screen").with_video(SolidColor::new(8, 8, Rgba::WHITE))
}

fn initialized() -> Compositor {
    let mut compositor = Compositor::new();
    compositor
        .initialize(CompositorConfig {
            width: 64,
            height: 36,
            ..CompositorConfig::default()
        })
        .unwrap();
    compositor
}

fn running() -> Compositor {
    let mut compositor = initialized();
    compositor.add_source("screen1", SourceKind::Screen, screen()).unwrap();
    compositor.start().unwrap();
    compositor
}

fn paused() -> Compositor {
    let mut compositor = running();
    compositor.pause().unwrap();
    compositor
}

fn stopped() -> Compositor {
    let mut compositor = running();
    compositor.stop().unwrap();
    compositor
}

fn types(rx: &mut broadcast::Receiver<CompositorEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.type_name());
    }
    names
}

#[tokio::test]
async fn full_session_publishes_events_in_order() {
    let mut compositor = Compositor::new();
    let mut rx = compositor.subscribe();

    compositor.initialize(CompositorConfig::default()).unwrap();
    compositor.add_source("screen1", SourceKind::Screen, screen()).unwrap();
    compositor.start().unwrap();
    assert_eq!(compositor.tick(0), TickOutcome::Rendered);
    compositor.pause().unwrap();
    assert_eq!(compositor.tick(100 * MS), TickOutcome::Idle);
    compositor.resume().unwrap();
    compositor.stop().unwrap();
    compositor.dispose().await.unwrap();

    assert_eq!(
        types(&mut rx),
        vec![
            "initialized",
            "source-added",
            "started",
            "paused",
            "resumed",
            "stopped",
            "disposed"
        ]
    );
    assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
}

#[test]
fn events_serialize_for_telemetry() {
    let mut compositor = Compositor::new();
    let mut rx = compositor.subscribe();
    compositor.initialize(CompositorConfig::default()).unwrap();
    compositor.add_source("screen1", SourceKind::Screen, screen()).unwrap();

    let initialized = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
    assert_eq!(initialized["type"], "initialized");
    assert_eq!(initialized["width"], 1280);
    assert!(initialized["timestamp"].is_string());

    let added = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
    assert_eq!(added["type"], "source-added");
    assert_eq!(added["source_id"], "screen1");
    assert_eq!(added["kind"], "screen");
}

type Op = fn(&mut Compositor) -> Result<(), CompositorError>;

fn assert_rejected(name: &str, setup: fn() -> Compositor, op: Op) {
    let mut compositor = setup();
    let before = compositor.lifecycle();
    let mut rx = compositor.subscribe();
    let err = op(&mut compositor).unwrap_err();
    assert!(matches!(err, CompositorError::State { .. }), "{name}: {err}");
    assert_eq!(compositor.lifecycle(), before, "{name}");
    assert_eq!(types(&mut rx), vec!["error"], "{name}");
}

#[test]
fn invalid_transitions_are_rejected_with_an_event() {
    assert_rejected("start before initialize", Compositor::new, |c| c.start());
    assert_rejected("pause while initialized", initialized, |c| c.pause());
    assert_rejected("resume while initialized", initialized, |c| c.resume());
    assert_rejected("stop while initialized", initialized, |c| c.stop());
    assert_rejected("resume while running", running, |c| c.resume());
    assert_rejected("start while running", running, |c| c.start());
    assert_rejected("initialize twice", initialized, |c| {
        c.initialize(CompositorConfig::default())
    });
    assert_rejected("pause while paused", paused, |c| c.pause());
    assert_rejected("start while paused", paused, |c| c.start());
    assert_rejected("pause while stopped", stopped, |c| c.pause());
    assert_rejected("resume while stopped", stopped, |c| c.resume());
}

#[tokio::test]
async fn disposed_compositor_rejects_every_transition() {
    let ops: [(&str, Op); 5] = [
        ("start", |c| c.start()),
        ("pause", |c| c.pause()),
        ("resume", |c| c.resume()),
        ("stop", |c| c.stop()),
        ("initialize", |c| c.initialize(CompositorConfig::default())),
    ];
    for (name, op) in ops {
        let mut compositor = running();
        compositor.dispose().await.unwrap();
        let err = op(&mut compositor).unwrap_err();
        assert!(matches!(err, CompositorError::State { .. }), "{name}: {err}");
        assert_eq!(compositor.lifecycle(), Lifecycle::Disposed, "{name}");
    }
}

#[test]
fn paused_compositor_can_stop_and_restart() {
    let mut compositor = running();
    compositor.pause().unwrap();
    compositor.stop().unwrap();
    assert_eq!(compositor.lifecycle(), Lifecycle::Stopped);
    compositor.start().unwrap();
    assert!(compositor.take_output_stream().is_some());
    assert_eq!(compositor.tick(0), TickOutcome::Rendered);
}

#[test]
fn stopped_compositor_has_no_output_stream_to_hand_out() {
    let mut compositor = running();
    compositor.stop().unwrap();
    assert!(compositor.take_output_stream().is_none());

    compositor.start().unwrap();
    assert!(compositor.take_output_stream().is_some());
}

#[test]
fn stop_closes_the_output_stream() {
    let mut compositor = running();
    let mut output = compositor.take_output_stream().unwrap();
    compositor.tick(0);
    compositor.stop().unwrap();

    assert!(output.video.try_recv().is_ok());
    assert!(matches!(
        output.video.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
    assert_eq!(compositor.metrics().dropped_frames, 0);
}

#[test]
fn three_failed_frames_stop_the_compositor() {
    let mut compositor = initialized();
    compositor
        .add_source(
            "screen1",
            SourceKind::Screen,
            MediaStream::new("Screen").with_video(FailingSource),
        )
        .unwrap();
    compositor.start().unwrap();
    let mut rx = compositor.subscribe();

    assert_eq!(compositor.tick(0), TickOutcome::Dropped);
    assert_eq!(compositor.tick(34 * MS), TickOutcome::Dropped);
    assert_eq!(compositor.tick(68 * MS), TickOutcome::Faulted);
    assert_eq!(compositor.lifecycle(), Lifecycle::Stopped);

    let mut fatal = 0;
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EventKind::Error { fatal: true, .. } = event.kind {
            fatal += 1;
        }
        names.push(event.type_name());
    }
    assert_eq!(names, vec!["error", "error", "error", "error", "stopped"]);
    assert_eq!(fatal, 1);

    let state = compositor.state();
    assert!(state.fault.is_some());
    assert!(!state.is_running);

    // A faulted compositor needs a fresh initialize before it runs again.
    assert!(matches!(
        compositor.start(),
        Err(CompositorError::State { .. })
    ));
    compositor.initialize(CompositorConfig::default()).unwrap();
    assert!(compositor.state().fault.is_none());
    assert!(compositor.remove_source("screen1").unwrap());
    compositor.add_source("screen2", SourceKind::Screen, screen()).unwrap();
    compositor.start().unwrap();
    assert_eq!(compositor.tick(0), TickOutcome::Rendered);
}

#[test]
fn a_good_frame_resets_the_failure_count() {
    struct Flaky(u32);
    impl lessoncast_compositor::FrameSource for Flaky {
        fn read_frame(
            &mut self,
        ) -> lessoncast_common::CompositorResult<Option<lessoncast_compositor::VideoFrame>> {
            self.0 += 1;
            if self.0 % 3 == 0 {
                Ok(Some(lessoncast_compositor::VideoFrame::solid(2, 2, Rgba::WHITE)))
            } else {
                Err(CompositorError::render("glitch"))
            }
        }
    }

    let mut compositor = initialized();
    compositor
        .add_source(
            "screen1",
            SourceKind::Screen,
            MediaStream::new("Screen").with_video(Flaky(0)),
        )
        .unwrap();
    compositor.start().unwrap();
    for i in 0..12u64 {
        assert_ne!(compositor.tick(i * 34 * MS), TickOutcome::Faulted);
    }
    assert_eq!(compositor.lifecycle(), Lifecycle::Running);
}

#[test]
fn removing_unknown_source_is_a_silent_noop() {
    let mut compositor = initialized();
    let mut rx = compositor.subscribe();
    assert!(!compositor.remove_source("ghost").unwrap());
    assert!(types(&mut rx).is_empty());
}

#[test]
fn duplicate_source_is_rejected() {
    let mut compositor = initialized();
    compositor.add_source("screen1", SourceKind::Screen, screen()).unwrap();
    assert!(matches!(
        compositor.add_source("screen1", SourceKind::Camera, screen()),
        Err(CompositorError::Source { .. })
    ));
    assert!(matches!(
        compositor.add_source("screen2", SourceKind::Screen, screen()),
        Err(CompositorError::Source { .. })
    ));
    assert_eq!(compositor.state().active_sources.len(), 1);
}

#[tokio::test]
async fn rejected_sources_still_release_their_devices() {
    let mut compositor = initialized();
    compositor.add_source("screen1", SourceKind::Screen, screen()).unwrap();
    let duplicate = CountingDevice::new();
    let second_screen = CountingDevice::new();
    let duplicate_count = duplicate.counter();
    let second_screen_count = second_screen.counter();

    assert!(compositor
        .add_source("screen1", SourceKind::Camera, screen().with_device(duplicate))
        .is_err());
    assert!(compositor
        .add_source("screen2", SourceKind::Screen, screen().with_device(second_screen))
        .is_err());
    assert_eq!(compositor.state().active_sources.len(), 1);
    assert_eq!(duplicate_count.load(Ordering::SeqCst), 0);

    compositor.dispose().await.unwrap();
    assert_eq!(duplicate_count.load(Ordering::SeqCst), 1);
    assert_eq!(second_screen_count.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_layout_leaves_current_layout_alone() {
    let mut compositor = initialized();
    let before = compositor.current_layout().copied();
    let mut layout = before.unwrap();
    layout.layout_type = LayoutType::PictureInPicture;
    layout.sources.camera = Some(SourceLayout::from_rect(Rect::new(50.0, 30.0, 40.0, 40.0), 1));

    let err = compositor
        .transition_to(layout, TransitionConfig::default())
        .unwrap_err();
    assert!(matches!(err, CompositorError::LayoutValidation { .. }));
    assert_eq!(compositor.current_layout().copied(), before);
}

#[tokio::test]
async fn dispose_releases_every_device_once() {
    let mut compositor = initialized();
    let screen_device = CountingDevice::new();
    let mic_device = CountingDevice::new();
    let screen_count = screen_device.counter();
    let mic_count = mic_device.counter();

    compositor
        .add_source("screen1", SourceKind::Screen, screen().with_device(screen_device))
        .unwrap();
    compositor
        .add_audio_source(
            "mic1",
            MediaStream::new("Mic")
                .with_audio(ConstantTone::new(0.1))
                .with_device(mic_device),
        )
        .unwrap();
    compositor.start().unwrap();
    compositor.remove_source("screen1").unwrap();

    compositor.dispose().await.unwrap();
    compositor.dispose().await.unwrap();
    assert_eq!(screen_count.load(Ordering::SeqCst), 1);
    assert_eq!(mic_count.load(Ordering::SeqCst), 1);

    assert_eq!(compositor.lifecycle(), Lifecycle::Disposed);
    assert!(!compositor.state().is_initialized);
    assert!(matches!(
        compositor.add_source("screen1", SourceKind::Screen, screen()),
        Err(CompositorError::State { .. })
    ));
    assert!(matches!(compositor.start(), Err(CompositorError::State { .. })));
    let mut late = compositor.subscribe();
    assert_eq!(late.try_recv(), Err(TryRecvError::Closed));
}

#[test]
fn audio_operations_need_audio_enabled() {
    let mut compositor = Compositor::new();
    compositor
        .initialize(CompositorConfig {
            enable_audio: false,
            ..CompositorConfig::default()
        })
        .unwrap();
    let mic = MediaStream::new("Mic").with_audio(ConstantTone::new(0.1));
    assert!(matches!(
        compositor.add_audio_source("mic1", mic),
        Err(CompositorError::Source { .. })
    ));
    assert!(compositor.set_volume("mic1", 0.5).is_err());
    assert!(!compositor.state().audio_enabled);
}

proptest! {
    #[test]
    fn opacity_is_always_clamped(opacity in prop::num::f64::ANY) {
        let mut compositor = initialized();
        compositor.add_source("screen1", SourceKind::Screen, screen()).unwrap();
        compositor.set_opacity("screen1", opacity).unwrap();
        let stored = compositor.state().active_sources[0].config.opacity;
        prop_assert!((0.0..=1.0).contains(&stored));
        if opacity.is_nan() {
            prop_assert_eq!(stored, 0.0);
        }
    }

    #[test]
    fn volume_is_always_clamped(volume in prop::num::f64::ANY) {
        let mut compositor = initialized();
        compositor
            .add_audio_source("mic1", MediaStream::new("Mic").with_audio(ConstantTone::new(0.1)))
            .unwrap();
        compositor.set_volume("mic1", volume).unwrap();
        let stored = compositor.state().audio_sources[0].volume;
        prop_assert!((0.0..=1.0).contains(&stored));
    }
}
