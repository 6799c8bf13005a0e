//! Host-driven render loop on a tokio interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lessoncast_common::clock::{frame_interval_ns, SessionClock};
use lessoncast_model::state::Lifecycle;
use tokio::time::MissedTickBehavior;

use crate::compositor::{Compositor, TickOutcome};

/// Tick counts from one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub rendered: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub faulted: bool,
}

/// Calls [`Compositor::tick`] at the host refresh rate.
///
/// The compositor paces output frames itself, so the refresh rate only
/// needs to be at least the target frame rate.
pub struct RenderLoop {
    clock: SessionClock,
    refresh_hz: u32,
    stop_flag: Arc<AtomicBool>,
}

impl RenderLoop {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            clock: SessionClock::start(),
            refresh_hz: refresh_hz.max(1),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Set the stop flag.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Get the stop flag for external coordination.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Tick until the stop flag is set, `limit` elapses, or the compositor
    /// leaves the running/paused states.
    pub async fn run(&mut self, compositor: &mut Compositor, limit: Option<Duration>) -> LoopStats {
        let mut interval =
            tokio::time::interval(Duration::from_nanos(frame_interval_ns(self.refresh_hz)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = limit.map(|l| self.clock.elapsed_ns() + l.as_nanos() as u64);
        let mut stats = LoopStats::default();

        tracing::info!(refresh_hz = self.refresh_hz, "Render loop started");
        while !self.stop_flag.load(Ordering::Relaxed) {
            interval.tick().await;
            let now = self.clock.elapsed_ns();
            if deadline.is_some_and(|d| now >= d) {
                break;
            }
            match compositor.lifecycle() {
                Lifecycle::Running => {}
                Lifecycle::Paused => continue,
                _ => break,
            }

            stats.ticks += 1;
            match compositor.tick(now) {
                TickOutcome::Rendered => stats.rendered += 1,
                TickOutcome::Skipped => stats.skipped += 1,
                TickOutcome::Dropped => stats.dropped += 1,
                TickOutcome::Faulted => {
                    stats.faulted = true;
                    break;
                }
                TickOutcome::Idle => {}
            }
        }

        tracing::info!(
            ticks = stats.ticks,
            rendered = stats.rendered,
            dropped = stats.dropped,
            "Render loop stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MediaStream;
    use crate::synthetic::TestPattern;
    use lessoncast_model::config::CompositorConfig;
    use lessoncast_model::layout::SourceKind;

    #[tokio::test]
    async fn test_exits_when_not_running() {
        let mut compositor = Compositor::new();
        let stats = RenderLoop::new(60).run(&mut compositor, None).await;
        assert_eq!(stats.ticks, 0);
    }

    #[tokio::test]
    async fn test_renders_until_limit() {
        let mut compositor = Compositor::new();
        compositor
            .initialize(CompositorConfig {
                width: 64,
                height: 36,
                ..CompositorConfig::default()
            })
            .unwrap();
        compositor
            .add_source(
                "screen1",
                SourceKind::Screen,
                MediaStream::new("Screen").with_video(TestPattern::new(32, 18)),
            )
            .unwrap();
        compositor.start().unwrap();

        let mut render_loop = RenderLoop::new(60);
        let stats = render_loop
            .run(&mut compositor, Some(Duration::from_millis(200)))
            .await;
        assert!(stats.rendered > 0);
        assert!(!stats.faulted);
        assert_eq!(compositor.lifecycle(), Lifecycle::Running);
    }
}
