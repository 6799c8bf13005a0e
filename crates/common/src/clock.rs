//! Clock and frame pacing utilities for the render loop.
//!
//! Every compositor session is anchored to a monotonic epoch recorded at
//! `start()`. Frame timestamps handed to the render loop, the performance
//! sampler and the transition animator are nanoseconds since that epoch.

use std::time::Instant;

/// Nanoseconds in one second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A session clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment the render loop started).
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Nanoseconds elapsed since the epoch.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Seconds elapsed since the epoch.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at the epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Convert a nanosecond value to seconds.
    pub fn ns_to_secs(ns: u64) -> f64 {
        ns as f64 / NANOS_PER_SEC as f64
    }

    /// Convert a nanosecond value to milliseconds.
    pub fn ns_to_ms(ns: u64) -> f64 {
        ns as f64 / 1_000_000.0
    }

    /// Convert milliseconds to nanoseconds.
    pub fn ms_to_ns(ms: f64) -> u64 {
        (ms.max(0.0) * 1_000_000.0) as u64
    }
}

/// Frame interval for a given rate, in nanoseconds.
pub fn frame_interval_ns(fps: u32) -> u64 {
    NANOS_PER_SEC / fps.max(1) as u64
}

/// Frame pacing controller.
///
/// The render loop is driven by the host's refresh ticks, which can run
/// faster than the effective output rate (e.g. 60 Hz display, 15 fps
/// low-quality output). The controller decides which ticks produce a frame.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: frame_interval_ns(target_hz),
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            // Quarter-interval slack: a host tick landing a hair early
            // must not skip a whole output frame.
            Some(last)
                if current_ns + self.target_interval_ns / 4 >= last + self.target_interval_ns =>
            {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Change the target rate. The next tick is paced against the new interval.
    pub fn set_rate(&mut self, target_hz: u32) {
        self.target_interval_ns = frame_interval_ns(target_hz);
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_ns() < NANOS_PER_SEC);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_conversions() {
        assert!((SessionClock::ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
        assert!((SessionClock::ns_to_ms(2_500_000) - 2.5).abs() < 1e-9);
        assert_eq!(SessionClock::ms_to_ns(300.0), 300_000_000);
        assert_eq!(SessionClock::ms_to_ns(-5.0), 0);
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval_ns(30), 33_333_333);
        assert_eq!(frame_interval_ns(0), NANOS_PER_SEC);
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(30);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(1_000_000)); // 1ms later, too soon
        assert!(ctrl.should_tick(33_000_000)); // slightly early 30 fps tick still fires
    }

    #[test]
    fn test_rate_controller_halves_60hz_host() {
        let mut ctrl = RateController::new(30);
        let fired = (0..60u64)
            .filter(|i| ctrl.should_tick(i * 16_666_667))
            .count();
        assert_eq!(fired, 30);
    }

    #[test]
    fn test_rate_controller_retarget() {
        let mut ctrl = RateController::new(30);
        assert!(ctrl.should_tick(0));
        ctrl.set_rate(15);
        assert!(!ctrl.should_tick(34_000_000));
        assert!(ctrl.should_tick(67_000_000));
        ctrl.reset();
        assert!(ctrl.should_tick(68_000_000));
    }
}
