//! The compositor core: lifecycle, source and layout operations, and the
//! per-tick render step.
//!
//! All operations are synchronous state changes. Nothing is drawn until
//! the next [`Compositor::tick`], so a registry or layout change made
//! mid-session never tears a frame.

use std::time::Instant;

use lessoncast_common::clock::RateController;
use lessoncast_common::error::{CompositorError, CompositorResult};
use lessoncast_layout::{validate_layout, LayoutEngine, Placement, TransitionAnimator, TransitionStart};
use lessoncast_model::config::CompositorConfig;
use lessoncast_model::event::{CompositorEvent, EventKind};
use lessoncast_model::geometry::Rgba;
use lessoncast_model::layout::{CompositorLayout, LayoutType, PipPosition, SourceKind, SourceLayout};
use lessoncast_model::metrics::{AudioLevelData, PerformanceMetrics, QualityLevel};
use lessoncast_model::recording::RecordingOptions;
use lessoncast_model::state::{CompositorState, Lifecycle};
use lessoncast_model::transition::TransitionConfig;
use tokio::sync::broadcast;

use crate::canvas::Canvas;
use crate::capability::{FrameSink, MediaStream, MemoryProbe, ProcMemoryProbe, StreamParts};
use crate::events::EventBus;
use crate::mixer::AudioMixer;
use crate::output::{ChannelSink, OutputStream};
use crate::performance::{PerformanceMonitor, WindowReport};
use crate::registry::SourceRegistry;

/// Consecutive failed frames after which the session is torn down.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// What one call to [`Compositor::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Idle,
    /// Too early for the next output frame.
    Skipped,
    Rendered,
    /// The frame failed and was skipped.
    Dropped,
    /// A fatal error stopped the compositor during this tick.
    Faulted,
}

/// Everything fixed at `initialize()`.
struct Session {
    config: CompositorConfig,
    background: Rgba,
    canvas: Canvas,
    mixer: Option<AudioMixer>,
    monitor: PerformanceMonitor,
    pacer: RateController,
}

pub struct Compositor {
    lifecycle: Lifecycle,
    session: Option<Session>,
    probe: Option<Box<dyn MemoryProbe>>,
    engine: LayoutEngine,
    registry: SourceRegistry,
    animator: TransitionAnimator,
    /// Most recently requested layout.
    current_layout: Option<CompositorLayout>,
    /// Layout on screen whenever no transition is running.
    displayed_layout: Option<CompositorLayout>,
    /// Layout change waiting for the next tick.
    pending: Option<(CompositorLayout, TransitionConfig)>,
    events: EventBus,
    sink: Option<Box<dyn FrameSink>>,
    output: Option<OutputStream>,
    consecutive_failures: u32,
    frames_rendered: u64,
    last_audio_ns: Option<u64>,
    fault: Option<String>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            session: None,
            probe: None,
            engine: LayoutEngine::default(),
            registry: SourceRegistry::new(),
            animator: TransitionAnimator::new(),
            current_layout: None,
            displayed_layout: None,
            pending: None,
            events: EventBus::default(),
            sink: None,
            output: None,
            consecutive_failures: 0,
            frames_rendered: 0,
            last_audio_ns: None,
            fault: None,
        }
    }

    /// Use `probe` for memory readings instead of `/proc`.
    pub fn with_memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Use custom layout proportions.
    pub fn with_layout_engine(mut self, engine: LayoutEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn config(&self) -> Option<&CompositorConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn current_layout(&self) -> Option<&CompositorLayout> {
        self.current_layout.as_ref()
    }

    /// Frames composited since the last start.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CompositorEvent> {
        self.events.subscribe()
    }

    /// Hand the output of the current session to a recorder. Only the
    /// first call after `start()` returns a stream.
    pub fn take_output_stream(&mut self) -> Option<OutputStream> {
        self.output.take()
    }

    pub fn quality_level(&self) -> QualityLevel {
        self.session
            .as_ref()
            .map(|s| s.monitor.quality_level())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.session
            .as_ref()
            .map(|s| s.monitor.metrics())
            .unwrap_or_default()
    }

    /// Pre-gain levels of every attached audio track.
    pub fn audio_levels(&self) -> Vec<AudioLevelData> {
        self.mixer().map(AudioMixer::levels).unwrap_or_default()
    }

    /// Recorder settings matching the current quality and audio setup.
    pub fn recommended_recording_options(&self) -> RecordingOptions {
        let options = RecordingOptions::for_quality(self.quality_level());
        if self.mixer().is_some() {
            options
        } else {
            options.without_audio()
        }
    }

    /// Read-only snapshot for UI and telemetry.
    pub fn state(&self) -> CompositorState {
        CompositorState {
            lifecycle: self.lifecycle,
            is_initialized: !matches!(
                self.lifecycle,
                Lifecycle::Uninitialized | Lifecycle::Disposed
            ),
            is_running: self.lifecycle == Lifecycle::Running,
            current_layout: self.current_layout,
            active_sources: self.registry.summaries(),
            audio_sources: self.mixer().map(AudioMixer::settings).unwrap_or_default(),
            performance_metrics: self.metrics(),
            audio_enabled: self.mixer().is_some(),
            visual_effects_enabled: self
                .config()
                .is_some_and(|c| c.enable_transitions),
            fault: self.fault.clone(),
        }
    }

    fn mixer(&self) -> Option<&AudioMixer> {
        self.session.as_ref()?.mixer.as_ref()
    }

    fn mixer_mut(&mut self) -> Option<&mut AudioMixer> {
        self.session.as_mut()?.mixer.as_mut()
    }

    fn session_config(&self) -> CompositorResult<&CompositorConfig> {
        self.config()
            .ok_or_else(|| CompositorError::state("compositor is not initialized"))
    }

    /// Refuse a lifecycle transition and tell subscribers about it.
    fn reject(&mut self, operation: &str) -> CompositorError {
        let err = CompositorError::state(format!(
            "cannot {operation} while {}",
            self.lifecycle.as_str()
        ));
        self.report_state_error(err)
    }

    fn report_state_error(&mut self, err: CompositorError) -> CompositorError {
        tracing::warn!(state = self.lifecycle.as_str(), error = %err, "Rejected lifecycle transition");
        self.events.publish(EventKind::Error {
            error_kind: err.kind(),
            message: err.to_string(),
            fatal: false,
        });
        err
    }

    /// Source and layout operations need a configured, live compositor.
    fn ensure_configured(&self, operation: &str) -> CompositorResult<()> {
        match self.lifecycle {
            Lifecycle::Uninitialized | Lifecycle::Disposed => Err(CompositorError::state(
                format!("cannot {operation} while {}", self.lifecycle.as_str()),
            )),
            _ => Ok(()),
        }
    }

    /// Validate `config` and allocate the canvas, mixer, and monitor.
    ///
    /// Allowed once from `uninitialized`, and again after a fatal error.
    /// Registered sources survive a re-initialize.
    pub fn initialize(&mut self, config: CompositorConfig) -> CompositorResult<()> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Stopped if self.fault.is_some() => {}
            _ => return Err(self.reject("initialize")),
        }
        config.validate()?;
        let background = config.background()?;

        let previous = self.session.take();
        let (probe, old_mixer) = match previous {
            Some(session) => (Some(session.monitor.into_probe()), session.mixer),
            None => (self.probe.take(), None),
        };
        let probe = probe.unwrap_or_else(|| Box::new(ProcMemoryProbe));

        let mixer = if config.enable_audio {
            let mut mixer = old_mixer.unwrap_or_else(|| AudioMixer::new(config.audio_sample_rate));
            mixer.set_sample_rate(config.audio_sample_rate);
            Some(mixer)
        } else {
            None
        };

        let canvas = config.canvas();
        let layout_type = self
            .current_layout
            .map(|l| l.layout_type)
            .unwrap_or(LayoutType::ScreenOnly);
        let layout = self
            .engine
            .compute(layout_type, canvas, Some(config.pip_position));

        self.session = Some(Session {
            monitor: PerformanceMonitor::new(
                config.quality.clone(),
                config.frame_rate,
                config.performance_monitoring,
                probe,
            ),
            pacer: RateController::new(config.frame_rate),
            canvas: Canvas::new(canvas.width, canvas.height),
            background,
            mixer,
            config,
        });
        self.animator.cancel();
        self.pending = None;
        self.current_layout = Some(layout);
        self.settle(layout);
        self.fault = None;
        self.lifecycle = Lifecycle::Initialized;

        tracing::info!(
            width = canvas.width,
            height = canvas.height,
            layout = %layout_type,
            "Compositor initialized"
        );
        let frame_rate = self.session_config()?.frame_rate;
        self.events.publish(EventKind::Initialized {
            width: canvas.width,
            height: canvas.height,
            frame_rate,
        });
        Ok(())
    }

    /// Start compositing into a channel-backed output stream, retrieved
    /// with [`take_output_stream`](Self::take_output_stream).
    pub fn start(&mut self) -> CompositorResult<()> {
        self.start_inner(None)
    }

    /// Start compositing into a host-supplied sink.
    pub fn start_with_sink(&mut self, sink: Box<dyn FrameSink>) -> CompositorResult<()> {
        self.start_inner(Some(sink))
    }

    fn start_inner(&mut self, sink: Option<Box<dyn FrameSink>>) -> CompositorResult<()> {
        match self.lifecycle {
            Lifecycle::Initialized => {}
            Lifecycle::Stopped if self.fault.is_none() => {}
            Lifecycle::Stopped => {
                let err = CompositorError::state(
                    "cannot start after a fatal error; initialize again",
                );
                return Err(self.report_state_error(err));
            }
            _ => return Err(self.reject("start")),
        }

        let Some(layout) = self.current_layout else {
            return Err(self.report_state_error(CompositorError::state("no layout selected")));
        };
        let missing: Vec<&str> = layout
            .layout_type
            .required_sources()
            .iter()
            .filter(|kind| !self.registry.has_kind(**kind))
            .map(|kind| kind.as_str())
            .collect();
        if !missing.is_empty() {
            let err = CompositorError::state(format!(
                "cannot start {} layout without a {} source",
                layout.layout_type,
                missing.join(" and ")
            ));
            return Err(self.report_state_error(err));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CompositorError::state("compositor is not initialized"))?;
        let sink = match sink {
            Some(sink) => sink,
            None => {
                let (sink, stream) = ChannelSink::new(
                    session.config.width,
                    session.config.height,
                    session.config.frame_rate,
                    session.mixer.is_some(),
                );
                self.output = Some(stream);
                Box::new(sink)
            }
        };
        session.pacer.reset();
        session.monitor.reset_session();
        if let Some(mixer) = session.mixer.as_mut() {
            mixer.reset_clock();
        }
        self.sink = Some(sink);
        self.last_audio_ns = None;
        self.consecutive_failures = 0;
        self.frames_rendered = 0;
        self.lifecycle = Lifecycle::Running;

        tracing::info!(
            layout = %layout.layout_type,
            sources = self.registry.len(),
            "Compositor started"
        );
        self.events.publish(EventKind::Started);
        Ok(())
    }

    pub fn pause(&mut self) -> CompositorResult<()> {
        if self.lifecycle != Lifecycle::Running {
            return Err(self.reject("pause"));
        }
        self.lifecycle = Lifecycle::Paused;
        tracing::info!("Compositor paused");
        self.events.publish(EventKind::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> CompositorResult<()> {
        if self.lifecycle != Lifecycle::Paused {
            return Err(self.reject("resume"));
        }
        if let Some(session) = self.session.as_mut() {
            session.monitor.resume();
            session.pacer.reset();
            if let Some(mixer) = session.mixer.as_mut() {
                mixer.reset_clock();
            }
        }
        self.last_audio_ns = None;
        self.lifecycle = Lifecycle::Running;
        tracing::info!("Compositor resumed");
        self.events.publish(EventKind::Resumed);
        Ok(())
    }

    /// End the session: the output stream closes, any transition snaps to
    /// its target, and dropped-frame counters reset.
    pub fn stop(&mut self) -> CompositorResult<()> {
        if !self.lifecycle.is_active() {
            return Err(self.reject("stop"));
        }
        self.halt();
        Ok(())
    }

    fn halt(&mut self) {
        self.sink = None;
        self.output = None;
        self.animator.cancel();
        self.pending = None;
        if let Some(layout) = self.current_layout {
            self.settle(layout);
        }
        if let Some(session) = self.session.as_mut() {
            session.monitor.reset_session();
        }
        self.apply_quality(QualityLevel::High);

        let frames_rendered = std::mem::take(&mut self.frames_rendered);
        self.consecutive_failures = 0;
        self.lifecycle = Lifecycle::Stopped;
        tracing::info!(frames_rendered, "Compositor stopped");
        self.events.publish(EventKind::Stopped { frames_rendered });
    }

    fn fail(&mut self, err: CompositorError) {
        let message = err.to_string();
        tracing::error!(error = %message, "Fatal compositor error");
        self.events.publish(EventKind::Error {
            error_kind: err.kind(),
            message: message.clone(),
            fatal: true,
        });
        self.fault = Some(message);
        self.halt();
    }

    /// Stop if needed, release every device, and free all resources.
    /// Terminal; a second call does nothing.
    pub async fn dispose(&mut self) -> CompositorResult<()> {
        if self.lifecycle == Lifecycle::Disposed {
            return Ok(());
        }
        if self.lifecycle.is_active() {
            self.halt();
        }

        let devices = self.registry.drain_devices();
        let total = devices.len();
        let mut failed = 0;
        for (id, mut device) in devices {
            if let Err(e) = device.release().await {
                failed += 1;
                tracing::warn!(source = %id, error = %e, "Device release failed");
            }
        }

        self.session = None;
        self.sink = None;
        self.output = None;
        self.animator.cancel();
        self.pending = None;
        self.current_layout = None;
        self.displayed_layout = None;
        self.lifecycle = Lifecycle::Disposed;

        tracing::info!(
            devices = total,
            failed,
            events = self.events.published(),
            "Compositor disposed"
        );
        self.events.publish(EventKind::Disposed);
        self.events.close();
        Ok(())
    }

    /// Register a screen or camera stream. Its audio track, if any, joins
    /// the mix at full volume.
    pub fn add_source(
        &mut self,
        id: &str,
        kind: SourceKind,
        stream: MediaStream,
    ) -> CompositorResult<()> {
        let parts = self.split_stream(id, stream);
        self.ensure_configured("add a source")?;
        if self.mixer().is_some_and(|m| m.contains(id)) {
            return Err(CompositorError::source(format!(
                "source '{id}' is already registered"
            )));
        }

        let video = parts.video.ok_or_else(|| {
            CompositorError::source(format!("stream for '{id}' has no video track"))
        })?;
        let layout = self.placement_for(kind)?;
        let has_audio = parts.audio.is_some();
        self.registry
            .add(id, kind, parts.label.clone(), video, has_audio, layout)?;
        tracing::info!(source = id, %kind, has_audio, "Source added");
        self.events.publish(EventKind::SourceAdded {
            source_id: id.to_string(),
            kind,
        });

        if let Some(audio) = parts.audio {
            match self.mixer_mut() {
                Some(mixer) => {
                    mixer.add(id, parts.label, audio)?;
                    let active_sources = mixer.active_count();
                    self.events
                        .publish(EventKind::AudioMixChanged { active_sources });
                }
                None => tracing::debug!(source = id, "Audio disabled, ignoring audio track"),
            }
        }
        Ok(())
    }

    /// Attach an audio-only stream, such as a microphone.
    pub fn add_audio_source(&mut self, id: &str, stream: MediaStream) -> CompositorResult<()> {
        let parts = self.split_stream(id, stream);
        self.ensure_configured("add an audio source")?;
        if self.registry.contains(id) {
            return Err(CompositorError::source(format!(
                "source '{id}' is already registered"
            )));
        }
        let audio = parts.audio.ok_or_else(|| {
            CompositorError::source(format!("stream for '{id}' has no audio track"))
        })?;
        let mixer = self
            .mixer_mut()
            .ok_or_else(|| CompositorError::source("audio is disabled"))?;
        mixer.add(id, parts.label, audio)?;
        let active_sources = mixer.active_count();
        tracing::info!(source = id, "Audio source added");
        self.events
            .publish(EventKind::AudioMixChanged { active_sources });
        Ok(())
    }

    /// Split `stream` into its tracks and park its device until `dispose`,
    /// whether or not the source ends up registered.
    fn split_stream(&mut self, id: &str, stream: MediaStream) -> StreamParts {
        let mut parts = stream.into_parts();
        if let Some(device) = parts.device.take() {
            if self.lifecycle == Lifecycle::Disposed {
                tracing::warn!(source = id, "Compositor disposed, device dropped unreleased");
            } else {
                self.registry.adopt_device(id, device);
            }
        }
        parts
    }

    /// Unregister a source. Returns `false`, with a warning, when `id`
    /// is unknown.
    pub fn remove_source(&mut self, id: &str) -> CompositorResult<bool> {
        self.ensure_configured("remove a source")?;
        let kind = self.registry.remove(id);
        let audio_removed = self.mixer_mut().is_some_and(|m| m.remove(id));
        if kind.is_none() && !audio_removed {
            tracing::warn!(source = id, "remove_source: no such source");
            return Ok(false);
        }

        if let Some(kind) = kind {
            tracing::info!(source = id, %kind, "Source removed");
            self.events.publish(EventKind::SourceRemoved {
                source_id: id.to_string(),
                kind,
            });
        }
        if audio_removed {
            let active_sources = self.mixer().map_or(0, AudioMixer::active_count);
            self.events
                .publish(EventKind::AudioMixChanged { active_sources });
        }
        Ok(true)
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) -> CompositorResult<()> {
        self.ensure_configured("change a source")?;
        let config = self.registry.set_visible(id, visible)?;
        self.events.publish(EventKind::SourceUpdated {
            source_id: id.to_string(),
            visible: config.visible,
            opacity: config.opacity,
        });
        Ok(())
    }

    /// Set a source's opacity; values outside `[0, 1]` are clamped and NaN
    /// counts as 0.
    pub fn set_opacity(&mut self, id: &str, opacity: f64) -> CompositorResult<()> {
        self.ensure_configured("change a source")?;
        let config = self.registry.set_opacity(id, opacity)?;
        self.events.publish(EventKind::SourceUpdated {
            source_id: id.to_string(),
            visible: config.visible,
            opacity: config.opacity,
        });
        Ok(())
    }

    pub fn set_volume(&mut self, id: &str, volume: f64) -> CompositorResult<()> {
        self.ensure_configured("change audio")?;
        let mixer = self
            .mixer_mut()
            .ok_or_else(|| CompositorError::source("audio is disabled"))?;
        mixer.set_volume(id, volume)?;
        let active_sources = mixer.active_count();
        self.events
            .publish(EventKind::AudioMixChanged { active_sources });
        Ok(())
    }

    pub fn set_muted(&mut self, id: &str, muted: bool) -> CompositorResult<()> {
        self.ensure_configured("change audio")?;
        let mixer = self
            .mixer_mut()
            .ok_or_else(|| CompositorError::source("audio is disabled"))?;
        mixer.set_muted(id, muted)?;
        let active_sources = mixer.active_count();
        self.events
            .publish(EventKind::AudioMixChanged { active_sources });
        Ok(())
    }

    fn placement_for(&self, kind: SourceKind) -> CompositorResult<SourceLayout> {
        let canvas = self.session_config()?.canvas();
        Ok(self
            .current_layout
            .as_ref()
            .and_then(|l| l.source(kind).copied())
            .unwrap_or_else(|| SourceLayout::full_canvas(&canvas)))
    }

    /// Switch to a computed layout using the configured transition.
    pub fn set_layout(
        &mut self,
        layout_type: LayoutType,
        pip_position: Option<PipPosition>,
    ) -> CompositorResult<()> {
        let config = self.session_config()?;
        let position = pip_position.unwrap_or(config.pip_position);
        let transition = config.default_transition();
        let layout = self
            .engine
            .compute(layout_type, config.canvas(), Some(position));
        self.transition_to(layout, transition)
    }

    /// Switch to `layout`, animated per `transition` while running.
    ///
    /// Validation happens now; the change is applied on the next tick and
    /// replaces any change still waiting for one.
    pub fn transition_to(
        &mut self,
        layout: CompositorLayout,
        transition: TransitionConfig,
    ) -> CompositorResult<()> {
        self.ensure_configured("change layout")?;
        let config = self.session_config()?;
        let canvas = config.canvas();
        let transition = if config.enable_transitions {
            transition
        } else {
            TransitionConfig::INSTANT
        };

        if layout.canvas != canvas {
            return Err(CompositorError::layout(vec![format!(
                "layout is for a {}x{} canvas, output is {}x{}",
                layout.canvas.width, layout.canvas.height, canvas.width, canvas.height
            )]));
        }
        for warning in validate_layout(&layout).into_result()? {
            tracing::warn!(layout = %layout.layout_type, "{warning}");
        }

        self.current_layout = Some(layout);
        tracing::info!(layout = %layout.layout_type, duration_ms = transition.duration_ms, "Layout changed");
        self.events.publish(EventKind::LayoutChanged {
            layout_type: layout.layout_type,
        });

        if self.lifecycle.is_active() && !transition.is_instant() {
            self.pending = Some((layout, transition));
        } else {
            self.pending = None;
            self.animator.cancel();
            self.settle(layout);
        }
        Ok(())
    }

    /// Make `layout` the on-screen arrangement.
    fn settle(&mut self, layout: CompositorLayout) {
        for (kind, source) in layout.sources.iter() {
            self.registry.set_layout(kind, *source);
        }
        self.displayed_layout = Some(layout);
    }

    fn advance_layout(&mut self, now_ns: u64) {
        if let Some((target, transition)) = self.pending.take() {
            let settled = self
                .displayed_layout
                .map(|l| l.sources)
                .unwrap_or_default();
            match self
                .animator
                .transition_to(&settled, target, transition, now_ns)
            {
                TransitionStart::Instant => self.settle(target),
                TransitionStart::Started | TransitionStart::Retargeted => {
                    self.events.publish(EventKind::TransitionStarted {
                        layout_type: target.layout_type,
                        duration_ms: transition.duration_ms,
                    });
                }
            }
        }
        if let Some(done) = self.animator.advance(now_ns) {
            self.settle(done);
            tracing::debug!(layout = %done.layout_type, "Transition completed");
            self.events.publish(EventKind::TransitionCompleted {
                layout_type: done.layout_type,
            });
        }
    }

    /// Run one render step at render-loop time `now_ns`.
    ///
    /// Does nothing unless running. Applies pending layout changes,
    /// advances transitions, mixes audio, composites every visible source
    /// in z-order, and hands the result to the sink.
    pub fn tick(&mut self, now_ns: u64) -> TickOutcome {
        if self.lifecycle != Lifecycle::Running {
            return TickOutcome::Idle;
        }
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Idle;
        };
        if !session.pacer.should_tick(now_ns) {
            return TickOutcome::Skipped;
        }

        self.advance_layout(now_ns);
        self.mix_audio(now_ns);

        let started = Instant::now();
        let result = self.render_frame(now_ns);
        let render_ns = started.elapsed().as_nanos() as u64;

        match result {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.frames_rendered += 1;
                let report = self
                    .session
                    .as_mut()
                    .and_then(|s| s.monitor.record_frame(now_ns, render_ns));
                if let Some(report) = report {
                    self.apply_window(report);
                }
                TickOutcome::Rendered
            }
            Err(err) if err.is_fatal() => {
                self.fail(err);
                TickOutcome::Faulted
            }
            Err(err) => {
                self.consecutive_failures += 1;
                tracing::warn!(
                    error = %err,
                    consecutive = self.consecutive_failures,
                    "Frame skipped"
                );
                self.events.publish(EventKind::Error {
                    error_kind: err.kind(),
                    message: err.to_string(),
                    fatal: false,
                });
                let report = self
                    .session
                    .as_mut()
                    .and_then(|s| s.monitor.record_failure(now_ns));
                if let Some(report) = report {
                    self.apply_window(report);
                }
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    self.fail(CompositorError::fatal(format!(
                        "{MAX_CONSECUTIVE_FAILURES} consecutive frames failed, last: {err}"
                    )));
                    return TickOutcome::Faulted;
                }
                TickOutcome::Dropped
            }
        }
    }

    fn render_frame(&mut self, now_ns: u64) -> CompositorResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CompositorError::fatal("render loop has no session"))?;
        let scale = session.monitor.quality_level().scale();
        session.canvas.clear(session.background);

        let mut draws: Vec<(SourceKind, Placement)> = SourceKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let placement = self.animator.sample(kind, now_ns).or_else(|| {
                    self.displayed_layout
                        .as_ref()?
                        .source(kind)
                        .copied()
                        .map(Placement::settled)
                })?;
                Some((kind, placement))
            })
            .collect();
        draws.sort_by_key(|(_, placement)| placement.layout.z_index);

        for (kind, placement) in draws {
            self.registry.set_layout(kind, placement.layout);
            let Some(config) = self.registry.config(kind) else {
                continue;
            };
            let opacity = config.opacity * placement.opacity;
            if !config.visible || opacity <= 0.0 {
                continue;
            }
            let Some(frame) = self.registry.frame(kind)? else {
                continue;
            };
            session
                .canvas
                .draw(&frame, &placement.layout, scale, opacity)?;
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.write_video(session.canvas.snapshot(self.frames_rendered, now_ns))?;
        }
        Ok(())
    }

    fn mix_audio(&mut self, now_ns: u64) {
        let Some(mixer) = self.session.as_mut().and_then(|s| s.mixer.as_mut()) else {
            return;
        };
        let Some(last) = self.last_audio_ns.replace(now_ns) else {
            return;
        };
        let block = mixer.render(now_ns.saturating_sub(last), now_ns);
        if block.is_empty() {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write_audio(block) {
                tracing::warn!(error = %e, "Audio block not delivered");
            }
        }
    }

    fn apply_window(&mut self, report: WindowReport) {
        if !report.metrics.is_performance_good {
            tracing::debug!(fps = report.metrics.fps, "Performance below threshold");
            self.events.publish(EventKind::PerformanceWarning {
                metrics: report.metrics,
            });
        }
        if let Some(change) = report.quality_change {
            self.apply_quality(change.to);
            tracing::info!(
                from = change.from.as_str(),
                to = change.to.as_str(),
                "Output quality changed"
            );
            self.events.publish(EventKind::QualityChanged {
                from: change.from,
                to: change.to,
            });
        }
    }

    /// Resize the canvas and re-pace the loop for `level`.
    fn apply_quality(&mut self, level: QualityLevel) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let canvas = session.config.canvas().scaled(level.scale());
        session.canvas.resize(canvas.width, canvas.height);
        let fps = level.frame_rate(session.config.frame_rate);
        session.pacer.set_rate(fps);
        session.monitor.set_target_fps(fps);
    }
}
