use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stimulus::{KeyCode, StimulusId};

/// Trial type, fixed when the sequence is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Go,
    Stop,
    Ignore,
}

impl Condition {
    /// Stop and ignore trials both show the stop signal.
    pub fn shows_signal(&self) -> bool {
        !matches!(self, Condition::Go)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Condition::Go => "go",
            Condition::Stop => "stop",
            Condition::Ignore => "ignore",
        })
    }
}

/// Trial skeleton handed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub condition: Condition,
    pub stimulus: StimulusId,
    pub correct_response: KeyCode,
}

/// What the subject did on a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// No key before the response window closed.
    Withheld,
    Pressed { key: KeyCode, rt_ms: f64 },
}

impl Response {
    /// Returns `None` for a negative or non-finite reaction time.
    pub fn pressed(key: KeyCode, rt_ms: f64) -> Option<Self> {
        Some(Response::Pressed { key, rt_ms }).filter(Response::is_valid)
    }

    /// False for a press with a negative or non-finite reaction time, which
    /// can still be built through the public variant.
    pub fn is_valid(&self) -> bool {
        match self {
            Response::Withheld => true,
            Response::Pressed { rt_ms, .. } => rt_ms.is_finite() && *rt_ms >= 0.0,
        }
    }

    pub fn key(&self) -> Option<KeyCode> {
        match self {
            Response::Withheld => None,
            Response::Pressed { key, .. } => Some(*key),
        }
    }

    pub fn rt_ms(&self) -> Option<f64> {
        match self {
            Response::Withheld => None,
            Response::Pressed { rt_ms, .. } => Some(*rt_ms),
        }
    }

    pub fn is_withheld(&self) -> bool {
        matches!(self, Response::Withheld)
    }
}

/// A trial together with its outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrial {
    pub trial: Trial,
    pub response: Response,
    /// Delay in force when the trial was shown, stop and ignore trials only.
    pub ssd_ms: Option<u32>,
}

impl CompletedTrial {
    pub fn new(trial: Trial, response: Response, ssd_ms: Option<u32>) -> Self {
        Self {
            trial,
            response,
            ssd_ms,
        }
    }

    pub fn condition(&self) -> Condition {
        self.trial.condition
    }

    pub fn responded(&self) -> bool {
        !self.response.is_withheld()
    }

    /// The pressed key matches the stimulus mapping.
    pub fn key_matches(&self) -> bool {
        self.response.key() == Some(self.trial.correct_response)
    }

    pub fn is_successful_stop(&self) -> bool {
        self.trial.condition == Condition::Stop && self.response.is_withheld()
    }

    /// Stop trials are correct when withheld, everything else when the
    /// mapped key was pressed.
    pub fn is_correct(&self) -> bool {
        match self.trial.condition {
            Condition::Stop => self.response.is_withheld(),
            Condition::Go | Condition::Ignore => self.key_matches(),
        }
    }
}

/// Recorded result per trial, for the collaborator to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_num: usize,
    pub exp_stage: String,
    pub block: Option<usize>,
    pub condition: Condition,
    pub stimulus: StimulusId,
    pub correct_response: KeyCode,
    pub key_press: Option<KeyCode>,
    pub rt_ms: Option<f64>,
    pub ssd_ms: Option<u32>,
    pub correct: bool,
    pub stop_response: KeyCode,
}

impl TrialResult {
    pub fn from_completed(
        trial_num: usize,
        exp_stage: &str,
        block: Option<usize>,
        completed: &CompletedTrial,
        stop_response: KeyCode,
    ) -> Self {
        Self {
            trial_num,
            exp_stage: exp_stage.to_string(),
            block,
            condition: completed.trial.condition,
            stimulus: completed.trial.stimulus,
            correct_response: completed.trial.correct_response,
            key_press: completed.response.key(),
            rt_ms: completed.response.rt_ms(),
            ssd_ms: completed.ssd_ms,
            correct: completed.is_correct(),
            stop_response,
        }
    }
}
