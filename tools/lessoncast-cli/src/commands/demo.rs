//! Run the compositor against synthetic sources.

use std::time::Duration;

use lessoncast_compositor::synthetic::{SineTone, SolidColor, TestPattern};
use lessoncast_compositor::{AudioBlock, Compositor, MediaStream, RenderLoop};
use lessoncast_model::config::CompositorConfig;
use lessoncast_model::event::{CompositorEvent, EventKind};
use lessoncast_model::geometry::Rgba;
use lessoncast_model::layout::{LayoutType, SourceKind};
use tokio::sync::{broadcast, mpsc};

pub async fn run(
    config: CompositorConfig,
    seconds: f64,
    refresh_hz: u32,
    layouts: Vec<LayoutType>,
    json_events: bool,
) -> anyhow::Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        anyhow::bail!("--seconds must be a positive number, got {seconds}");
    }
    let layouts = if layouts.is_empty() {
        vec![LayoutType::ScreenOnly]
    } else {
        layouts
    };

    println!(
        "Compositing {}x{} @ {} fps for {seconds:.1}s ({} layout(s))",
        config.width,
        config.height,
        config.frame_rate,
        layouts.len()
    );

    let mut compositor = Compositor::new();
    let events = compositor.subscribe();
    let printer = tokio::spawn(print_events(events, json_events));

    compositor.initialize(config.clone())?;
    let (w, h) = (config.width, config.height);
    compositor.add_source(
        "screen",
        SourceKind::Screen,
        MediaStream::new("Test pattern").with_video(TestPattern::new(w, h)),
    )?;
    compositor.add_source(
        "camera",
        SourceKind::Camera,
        MediaStream::new("Camera")
            .with_video(SolidColor::new(w / 4, h / 4, Rgba::new(40, 120, 220, 255))),
    )?;
    if config.enable_audio {
        compositor.add_audio_source(
            "mic",
            MediaStream::new("Tone").with_audio(SineTone::new(440.0, 0.25)),
        )?;
    }

    compositor.set_layout(layouts[0], None)?;
    compositor.start()?;

    let output = compositor
        .take_output_stream()
        .ok_or_else(|| anyhow::anyhow!("compositor did not provide an output stream"))?;
    let drain = tokio::spawn(async move {
        let mut video = output.video;
        let mut audio = output.audio;
        let mut frames = 0u64;
        let mut samples = 0u64;
        loop {
            tokio::select! {
                frame = video.recv() => match frame {
                    Some(_) => frames += 1,
                    None => break,
                },
                block = recv_audio(&mut audio) => match block {
                    Some(block) => samples += block.samples.len() as u64,
                    None => audio = None,
                },
            }
        }
        (frames, samples)
    });

    let mut render_loop = RenderLoop::new(refresh_hz);
    let slice = Duration::from_secs_f64(seconds / layouts.len() as f64);
    for (i, layout_type) in layouts.iter().enumerate() {
        if i > 0 {
            compositor.set_layout(*layout_type, None)?;
        }
        let stats = render_loop.run(&mut compositor, Some(slice)).await;
        tracing::debug!(?stats, layout = %layout_type, "Layout slice finished");
        if stats.faulted {
            println!("[WARN] Compositor faulted during {layout_type}");
            break;
        }
    }

    let state = compositor.state();
    let metrics = compositor.metrics();
    let levels = compositor.audio_levels();
    let recording = compositor.recommended_recording_options();
    if compositor.lifecycle().is_active() {
        compositor.stop()?;
    }
    let (frames, samples) = drain.await?;
    compositor.dispose().await?;
    printer.await?;

    println!();
    println!(
        "Final state: {} ({} video source(s), {} audio source(s))",
        state.lifecycle.as_str(),
        state.active_sources.len(),
        state.audio_sources.len()
    );
    if let Some(fault) = &state.fault {
        println!("[WARN] Fault: {fault}");
    }
    println!("Frames delivered: {frames}");
    println!("Audio samples delivered: {samples}");
    println!("Rendered: {}", compositor.frames_rendered());
    println!("Measured fps: {:.1}", metrics.fps);
    println!("Dropped frames: {}", metrics.dropped_frames);
    println!("Average render time: {:.2} ms", metrics.average_render_time);
    if let Some(health) = metrics.health {
        println!(
            "Health: {:.0} (quality {})",
            health.health_score,
            health.quality_level.as_str()
        );
    }
    for level in &levels {
        println!(
            "Audio {}: rms={:.3} peak={:.3}{}",
            level.source_id,
            level.rms,
            level.peak,
            if level.active { "" } else { " (inactive)" }
        );
    }
    println!(
        "Recommended recording: {} at {} kbps video / {} kbps audio",
        recording.mime_type,
        recording.video_bits_per_second / 1000,
        recording.audio_bits_per_second / 1000
    );
    Ok(())
}

/// Next audio block; never resolves once the channel is gone.
async fn recv_audio(audio: &mut Option<mpsc::Receiver<AudioBlock>>) -> Option<AudioBlock> {
    match audio.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn print_events(mut events: broadcast::Receiver<CompositorEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!("Failed to serialize event: {e}"),
                    }
                } else {
                    println!("  [{}] {}", event.timestamp.format("%H:%M:%S%.3f"), describe(&event));
                    if event.ends_session() {
                        println!("  recording ends here");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                println!("  [WARN] missed {n} event(s)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &CompositorEvent) -> String {
    match &event.kind {
        EventKind::Initialized {
            width,
            height,
            frame_rate,
        } => format!("initialized {width}x{height} @ {frame_rate} fps"),
        EventKind::Stopped { frames_rendered } => format!("stopped after {frames_rendered} frames"),
        EventKind::Error {
            error_kind,
            message,
            fatal,
        } => format!(
            "{} error ({error_kind:?}): {message}",
            if *fatal { "fatal" } else { "non-fatal" }
        ),
        EventKind::SourceAdded { source_id, kind } => format!("source added: {source_id} ({kind})"),
        EventKind::SourceRemoved { source_id, kind } => {
            format!("source removed: {source_id} ({kind})")
        }
        EventKind::SourceUpdated {
            source_id,
            visible,
            opacity,
        } => format!("source updated: {source_id} visible={visible} opacity={opacity:.2}"),
        EventKind::LayoutChanged { layout_type } => format!("layout changed: {layout_type}"),
        EventKind::TransitionStarted {
            layout_type,
            duration_ms,
        } => format!("transition to {layout_type} ({duration_ms} ms)"),
        EventKind::TransitionCompleted { layout_type } => {
            format!("transition to {layout_type} completed")
        }
        EventKind::QualityChanged { from, to } => {
            format!("quality {} -> {}", from.as_str(), to.as_str())
        }
        EventKind::PerformanceWarning { metrics } => format!(
            "performance warning: {:.1} fps, {} dropped",
            metrics.fps, metrics.dropped_frames
        ),
        EventKind::AudioMixChanged { active_sources } => {
            format!("audio mix: {active_sources} active source(s)")
        }
        EventKind::Started | EventKind::Paused | EventKind::Resumed | EventKind::Disposed => {
            event.type_name().to_string()
        }
    }
}
