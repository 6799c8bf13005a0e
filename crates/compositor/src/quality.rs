//! Adaptive quality controller.
//!
//! Steps the output one level down after `downgrade_after` consecutive
//! bad windows and one level up after `upgrade_after` consecutive good
//! windows. The wider upgrade streak keeps the level from oscillating.

use lessoncast_model::config::QualityTuning;
use lessoncast_model::metrics::QualityLevel;
use serde::{Deserialize, Serialize};

/// A level change decided by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityChange {
    pub from: QualityLevel,
    pub to: QualityLevel,
}

#[derive(Debug, Clone)]
pub struct QualityController {
    level: QualityLevel,
    downgrade_after: u32,
    upgrade_after: u32,
    bad_streak: u32,
    good_streak: u32,
}

impl QualityController {
    pub fn new(tuning: &QualityTuning) -> Self {
        Self {
            level: QualityLevel::High,
            downgrade_after: tuning.downgrade_after,
            upgrade_after: tuning.upgrade_after,
            bad_streak: 0,
            good_streak: 0,
        }
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    /// Feed one window verdict.
    pub fn observe(&mut self, good: bool) -> Option<QualityChange> {
        if good {
            self.bad_streak = 0;
            self.good_streak += 1;
            if self.good_streak >= self.upgrade_after {
                self.good_streak = 0;
                return self.step(self.level.upgraded());
            }
        } else {
            self.good_streak = 0;
            self.bad_streak += 1;
            if self.bad_streak >= self.downgrade_after {
                self.bad_streak = 0;
                return self.step(self.level.downgraded());
            }
        }
        None
    }

    fn step(&mut self, next: Option<QualityLevel>) -> Option<QualityChange> {
        let to = next?;
        let change = QualityChange {
            from: self.level,
            to,
        };
        self.level = to;
        Some(change)
    }

    /// Back to high quality with no pending streaks.
    pub fn reset(&mut self) {
        self.level = QualityLevel::High;
        self.bad_streak = 0;
        self.good_streak = 0;
    }
}
