use stopsig_core::{CompletedTrial, Condition};

use crate::config::StaircaseConfig;

/// How a trial moved the stop-signal delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsdChange {
    Increased,
    Decreased,
    /// Successful stop with the delay already at its maximum.
    AtCeiling,
    /// Failed stop with the delay already at its minimum.
    AtFloor,
    /// Not a stop trial.
    Unchanged,
}

/// One-up/one-down staircase on the stop-signal delay.
///
/// A successful stop lengthens the delay by one step, a failed stop shortens
/// it by one step, clamped to `[min_ms, max_ms]`. Over a session this drives
/// stopping accuracy toward 50%.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staircase {
    ssd_ms: u32,
    min_ms: u32,
    max_ms: u32,
    step_ms: u32,
}

impl Staircase {
    pub fn new(config: &StaircaseConfig) -> Self {
        Self {
            ssd_ms: config.initial_ms.clamp(config.min_ms, config.max_ms),
            min_ms: config.min_ms,
            max_ms: config.max_ms,
            step_ms: config.step_ms,
        }
    }

    /// The committed delay for the next stop-signal presentation.
    pub fn current(&self) -> u32 {
        self.ssd_ms
    }

    pub fn update(&mut self, outcome: &CompletedTrial) -> SsdChange {
        if outcome.condition() != Condition::Stop {
            return SsdChange::Unchanged;
        }
        if outcome.response.is_withheld() {
            if self.ssd_ms < self.max_ms {
                self.ssd_ms = (self.ssd_ms + self.step_ms).min(self.max_ms);
                SsdChange::Increased
            } else {
                SsdChange::AtCeiling
            }
        } else if self.ssd_ms > self.min_ms {
            self.ssd_ms = self.ssd_ms.saturating_sub(self.step_ms).max(self.min_ms);
            SsdChange::Decreased
        } else {
            SsdChange::AtFloor
        }
    }
}

impl Default for Staircase {
    fn default() -> Self {
        Self::new(&StaircaseConfig::default())
    }
}
