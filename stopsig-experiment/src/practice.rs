use stopsig_core::CompletedTrial;
use tracing::info;

use crate::config::ThresholdConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PracticeDecision {
    /// Run another practice block.
    Repeat { accuracy: Option<f64> },
    /// Accuracy cleared the pass threshold.
    Passed { accuracy: f64 },
    /// Out of attempts; move on regardless of accuracy.
    CapReached { accuracy: Option<f64> },
}

impl PracticeDecision {
    pub fn repeat(&self) -> bool {
        matches!(self, PracticeDecision::Repeat { .. })
    }
}

impl std::fmt::Display for PracticeDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PracticeDecision::Repeat { .. } => write!(f, "repeat"),
            PracticeDecision::Passed { .. } => write!(f, "pass"),
            PracticeDecision::CapReached { .. } => write!(f, "repeat limit"),
        }
    }
}

/// Decides after each practice block whether to run it again.
#[derive(Debug, Clone)]
pub struct PracticeGate {
    pass_threshold: f64,
    max_repeats: usize,
    attempts: usize,
    outcome: Option<PracticeDecision>,
}

impl PracticeGate {
    pub fn new(thresholds: &ThresholdConfig) -> Self {
        Self {
            pass_threshold: thresholds.practice_pass,
            max_repeats: thresholds.practice_max_repeats,
            attempts: 0,
            outcome: None,
        }
    }

    /// Practice blocks evaluated so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// The pass or cap decision that ended practice, once there is one.
    pub fn outcome(&self) -> Option<PracticeDecision> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Passing needs accuracy strictly above the threshold. An empty block
    /// has no accuracy and counts as a failed attempt. After a pass or the
    /// cap the decision is final: later calls return it unchanged and do not
    /// count as attempts.
    pub fn evaluate(&mut self, trials: &[CompletedTrial]) -> PracticeDecision {
        if let Some(decision) = self.outcome {
            return decision;
        }
        self.attempts += 1;
        let accuracy = (!trials.is_empty()).then(|| {
            trials.iter().filter(|t| t.is_correct()).count() as f64 / trials.len() as f64
        });

        let decision = match accuracy {
            Some(acc) if acc > self.pass_threshold => PracticeDecision::Passed { accuracy: acc },
            _ if self.attempts >= self.max_repeats => PracticeDecision::CapReached { accuracy },
            _ => PracticeDecision::Repeat { accuracy },
        };
        info!(attempt = self.attempts, ?accuracy, ?decision, "practice block evaluated");
        if !decision.repeat() {
            self.outcome = Some(decision);
        }
        decision
    }
}
