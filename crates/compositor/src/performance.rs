//! Render-loop performance monitor.
//!
//! Frames are grouped into fixed windows. A frame counts as dropped when
//! it arrives more than two frame intervals after the previous one, or
//! took longer than two intervals to render, or failed outright. At the
//! end of each window the monitor scores health and, when adaptive
//! quality is enabled, feeds the verdict to the quality controller.

use lessoncast_common::clock::{frame_interval_ns, SessionClock};
use lessoncast_model::config::QualityTuning;
use lessoncast_model::metrics::{HealthReport, PerformanceMetrics, QualityLevel};

use crate::capability::MemoryProbe;
use crate::quality::{QualityChange, QualityController};

/// What closing a window produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub metrics: PerformanceMetrics,
    pub quality_change: Option<QualityChange>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Window {
    started_ns: Option<u64>,
    frames: u32,
    late: u32,
    failed: u32,
    render_total_ns: u64,
}

pub struct PerformanceMonitor {
    tuning: QualityTuning,
    target_fps: u32,
    window: Window,
    last_frame_ns: Option<u64>,
    dropped_total: u64,
    latest: PerformanceMetrics,
    controller: Option<QualityController>,
    probe: Box<dyn MemoryProbe>,
}

impl PerformanceMonitor {
    /// `adaptive` enables health scoring and quality changes.
    pub fn new(
        tuning: QualityTuning,
        target_fps: u32,
        adaptive: bool,
        probe: Box<dyn MemoryProbe>,
    ) -> Self {
        let controller = adaptive.then(|| QualityController::new(&tuning));
        Self {
            tuning,
            target_fps,
            window: Window::default(),
            last_frame_ns: None,
            dropped_total: 0,
            latest: PerformanceMetrics {
                is_performance_good: true,
                ..PerformanceMetrics::default()
            },
            controller,
            probe,
        }
    }

    /// Give back the memory probe, e.g. to carry it into a new session.
    pub fn into_probe(self) -> Box<dyn MemoryProbe> {
        self.probe
    }

    /// Frame rate the drop threshold and fps ratio are measured against.
    pub fn set_target_fps(&mut self, fps: u32) {
        self.target_fps = fps.max(1);
    }

    pub fn quality_level(&self) -> QualityLevel {
        self.controller
            .as_ref()
            .map(QualityController::level)
            .unwrap_or_default()
    }

    /// Dropped frames since the last session reset, including the
    /// current partial window.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_total
    }

    /// Metrics of the last closed window, with a live dropped-frame count.
    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            dropped_frames: self.dropped_total,
            ..self.latest
        }
    }

    fn late_threshold_ns(&self) -> u64 {
        frame_interval_ns(self.target_fps).saturating_mul(2)
    }

    /// Record a composited frame.
    pub fn record_frame(&mut self, now_ns: u64, render_ns: u64) -> Option<WindowReport> {
        let threshold = self.late_threshold_ns();
        let gap_late = self
            .last_frame_ns
            .is_some_and(|last| now_ns.saturating_sub(last) > threshold);
        self.last_frame_ns = Some(now_ns);

        let report = self.roll_window(now_ns);
        self.window.started_ns.get_or_insert(now_ns);
        self.window.frames += 1;
        self.window.render_total_ns += render_ns;
        if gap_late || render_ns > threshold {
            self.window.late += 1;
            self.dropped_total += 1;
        }
        report
    }

    /// Record a frame that failed to render.
    pub fn record_failure(&mut self, now_ns: u64) -> Option<WindowReport> {
        self.last_frame_ns = Some(now_ns);
        let report = self.roll_window(now_ns);
        self.window.started_ns.get_or_insert(now_ns);
        self.window.failed += 1;
        self.dropped_total += 1;
        report
    }

    /// Close the current window if `now_ns` lies at or past its end. The
    /// frame at `now_ns` belongs to the next window.
    fn roll_window(&mut self, now_ns: u64) -> Option<WindowReport> {
        let started = self.window.started_ns?;
        let elapsed = now_ns.saturating_sub(started);
        if elapsed < SessionClock::ms_to_ns(self.tuning.window_ms as f64) {
            return None;
        }
        let window = std::mem::take(&mut self.window);
        Some(self.close(window, elapsed))
    }

    fn close(&mut self, window: Window, elapsed_ns: u64) -> WindowReport {
        let secs = SessionClock::ns_to_secs(elapsed_ns.max(1));
        let fps = window.frames as f64 / secs;
        let average_render_time = if window.frames == 0 {
            0.0
        } else {
            SessionClock::ns_to_ms(window.render_total_ns) / window.frames as f64
        };

        let attempted = window.frames + window.failed;
        let on_time = if attempted == 0 {
            0.0
        } else {
            (window.frames - window.late) as f64 / attempted as f64
        };
        let fps_ratio = (fps / self.target_fps.max(1) as f64).min(1.0);
        let health_score =
            100.0 * (self.tuning.fps_weight * fps_ratio + self.tuning.drop_weight * on_time);
        let is_good = health_score >= self.tuning.health_threshold;

        let quality_change = self.controller.as_mut().and_then(|c| c.observe(is_good));
        let health = self.controller.as_ref().map(|c| HealthReport {
            health_score,
            quality_level: c.level(),
        });

        self.latest = PerformanceMetrics {
            fps,
            dropped_frames: self.dropped_total,
            average_render_time,
            memory_usage: self.probe.resident_bytes(),
            is_performance_good: is_good,
            health,
        };

        tracing::debug!(
            fps,
            late = window.late,
            failed = window.failed,
            health = health_score,
            "Performance window closed"
        );

        WindowReport {
            metrics: self.latest,
            quality_change,
        }
    }

    /// Forget frame spacing so a pause gap is not counted as a drop.
    pub fn resume(&mut self) {
        self.last_frame_ns = None;
        self.window = Window::default();
    }

    /// Clear counters and quality state for a new session.
    pub fn reset_session(&mut self) {
        self.resume();
        self.dropped_total = 0;
        self.latest = PerformanceMetrics {
            is_performance_good: true,
            ..PerformanceMetrics::default()
        };
        if let Some(controller) = &mut self.controller {
            controller.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoProbe;

    impl MemoryProbe for NoProbe {
        fn resident_bytes(&self) -> Option<u64> {
            None
        }
    }

    const MS: u64 = 1_000_000;

    fn monitor(adaptive: bool) -> PerformanceMonitor {
        PerformanceMonitor::new(QualityTuning::default(), 30, adaptive, Box::new(NoProbe))
    }

    #[test]
    fn test_steady_frames_are_healthy() {
        let mut m = monitor(true);
        let mut report = None;
        for i in 0..=30u64 {
            report = m.record_frame(i * 33_333_334, 5 * MS).or(report);
        }
        let report = report.unwrap();
        assert!(report.metrics.is_performance_good);
        assert!(report.metrics.fps > 29.0);
        assert_eq!(report.metrics.dropped_frames, 0);
        assert!((report.metrics.average_render_time - 5.0).abs() < 1e-9);
        assert!(report.metrics.health.unwrap().health_score > 99.0);
    }

    #[test]
    fn test_window_counts_each_frame_once() {
        let mut m = monitor(false);
        let mut reports = Vec::new();
        for i in 0..=60u64 {
            reports.extend(m.record_frame(i * 33_333_334, MS));
        }
        assert_eq!(reports.len(), 2);
        for report in reports {
            assert!((report.metrics.fps - 30.0).abs() < 0.01, "{}", report.metrics.fps);
        }
    }

    #[test]
    fn test_slow_frames_count_as_dropped() {
        let mut m = monitor(true);
        for i in 0..10u64 {
            m.record_frame(i * 33 * MS, 80 * MS);
        }
        assert_eq!(m.dropped_frames(), 10);
    }

    #[test]
    fn test_gaps_count_as_dropped() {
        let mut m = monitor(false);
        m.record_frame(0, MS);
        m.record_frame(100 * MS, MS);
        assert_eq!(m.dropped_frames(), 1);
    }

    #[test]
    fn test_sustained_load_downgrades_once_per_streak() {
        let mut m = monitor(true);
        let mut changes = Vec::new();
        // 10 fps with 80 ms renders: every window is bad.
        for i in 0..=30u64 {
            if let Some(report) = m.record_frame(i * 100 * MS, 80 * MS) {
                assert!(!report.metrics.is_performance_good);
                changes.extend(report.quality_change);
            }
        }
        assert_eq!(
            changes,
            vec![QualityChange {
                from: QualityLevel::High,
                to: QualityLevel::Medium
            }]
        );
        assert_eq!(m.quality_level(), QualityLevel::Medium);
    }

    #[test]
    fn test_monitoring_off_never_changes_quality() {
        let mut m = monitor(false);
        for i in 0..=100u64 {
            if let Some(report) = m.record_frame(i * 100 * MS, 80 * MS) {
                assert!(report.quality_change.is_none());
                assert!(report.metrics.health.is_none());
            }
        }
        assert_eq!(m.quality_level(), QualityLevel::High);
    }

    #[test]
    fn test_failures_are_dropped_and_reset_clears() {
        let mut m = monitor(true);
        m.record_failure(0);
        m.record_failure(10 * MS);
        assert_eq!(m.dropped_frames(), 2);
        m.reset_session();
        assert_eq!(m.dropped_frames(), 0);
        assert!(m.metrics().is_performance_good);
    }

    #[test]
    fn test_resume_forgives_pause_gap() {
        let mut m = monitor(false);
        m.record_frame(0, MS);
        m.resume();
        m.record_frame(5_000 * MS, MS);
        assert_eq!(m.dropped_frames(), 0);
    }
}
