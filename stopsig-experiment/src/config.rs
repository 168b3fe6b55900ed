use serde::{Deserialize, Serialize};
use stopsig_core::Condition;

use crate::error::ConfigError;

/// Per-position condition pattern of the two test blocks.
const DEFAULT_PATTERN: [u8; 60] = [
    0, 0, 2, 1, 0, 1, 0, 0, 2, 2, 2, 2, 0, 0, 0, 1, 1, 2, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 2, //
    1, 0, 2, 1, 0, 1, 0, 0, 2, 0, 2, 2, 0, 2, 0, 0, 1, 2, 0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 2,
];

/// Response-window jitter in seconds, one entry per trial position in a block.
const DEFAULT_ITI_JITTER_S: [f64; 30] = [
    0.0, 0.0, 0.1, 0.3, 0.7, 0.0, 0.1, 0.3, 0.0, 0.1, 0.3, 0.2, 0.1, 0.4, 0.3, 0.5, 0.3, 0.2, 0.5,
    0.3, 0.1, 0.0, 0.4, 0.0, 0.1, 0.0, 0.1, 0.1, 0.0, 0.6,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub practice_trials: usize,
    pub test_block_len: usize,
    pub num_blocks: usize,
    pub condition_pattern: Vec<Condition>,
    pub proportions: ConditionProportions,
    pub staircase: StaircaseConfig,
    pub timing: TrialTiming,
    pub thresholds: ThresholdConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let condition_pattern = DEFAULT_PATTERN
            .iter()
            .map(|code| match code {
                0 => Condition::Go,
                1 => Condition::Stop,
                _ => Condition::Ignore,
            })
            .collect();

        Self {
            practice_trials: 20,
            test_block_len: 30,
            num_blocks: 2,
            condition_pattern,
            proportions: ConditionProportions::default(),
            staircase: StaircaseConfig::default(),
            timing: TrialTiming::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Parses a (possibly partial) JSON override on top of the defaults and
    /// validates the result.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Total number of test trials across all blocks.
    pub fn test_len(&self) -> usize {
        self.test_block_len * self.num_blocks
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.practice_trials == 0 {
            return Err(ConfigError::Zero("practice_trials"));
        }
        if self.test_block_len == 0 {
            return Err(ConfigError::Zero("test_block_len"));
        }
        if self.num_blocks == 0 {
            return Err(ConfigError::Zero("num_blocks"));
        }
        if self.condition_pattern.len() != self.test_len() {
            return Err(ConfigError::PatternLength {
                expected: self.test_len(),
                actual: self.condition_pattern.len(),
                blocks: self.num_blocks,
                block_len: self.test_block_len,
            });
        }
        self.proportions.validate()?;
        self.staircase.validate()?;
        self.thresholds.validate()
    }

    /// Response window for the trial at `position` within a test block.
    pub fn response_window_ms(&self, position: usize) -> u64 {
        let jitter = &self.timing.iti_jitter_s;
        if jitter.is_empty() {
            return self.timing.response_base_ms;
        }
        let extra = (jitter[position % jitter.len()] * 1000.0).round().max(0.0) as u64;
        self.timing.response_base_ms + extra
    }
}

/// Target share of each condition in the test sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionProportions {
    pub go: f64,
    pub stop: f64,
    pub ignore: f64,
}

impl Default for ConditionProportions {
    fn default() -> Self {
        Self {
            go: 0.6,
            stop: 0.2,
            ignore: 0.2,
        }
    }
}

impl ConditionProportions {
    pub fn get(&self, condition: Condition) -> f64 {
        match condition {
            Condition::Go => self.go,
            Condition::Stop => self.stop,
            Condition::Ignore => self.ignore,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for condition in [Condition::Go, Condition::Stop, Condition::Ignore] {
            let value = self.get(condition);
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Proportion { condition, value });
            }
        }
        let sum = self.go + self.stop + self.ignore;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::ProportionSum(sum));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaircaseConfig {
    pub initial_ms: u32,
    pub min_ms: u32,
    pub max_ms: u32,
    pub step_ms: u32,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            initial_ms: 250,
            min_ms: 0,
            max_ms: 1000,
            step_ms: 50,
        }
    }
}

impl StaircaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            initial_ms,
            min_ms,
            max_ms,
            step_ms,
        } = *self;
        if step_ms == 0 || min_ms >= max_ms || (max_ms - min_ms) % step_ms != 0 {
            return Err(ConfigError::StaircaseRange {
                min: min_ms,
                max: max_ms,
                step: step_ms,
            });
        }
        if initial_ms < min_ms || initial_ms > max_ms || (initial_ms - min_ms) % step_ms != 0 {
            return Err(ConfigError::StaircaseStart {
                initial: initial_ms,
                min: min_ms,
                max: max_ms,
                step: step_ms,
            });
        }
        Ok(())
    }
}

/// Durations handed to the presentation layer with each trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialTiming {
    pub stimulus_ms: u64,
    pub stop_signal_ms: u64,
    pub response_base_ms: u64,
    pub iti_jitter_s: Vec<f64>,
    pub practice_response_ms: u64,
    pub practice_feedback_ms: u64,
    pub practice_post_trial_ms: u64,
}

impl Default for TrialTiming {
    fn default() -> Self {
        Self {
            stimulus_ms: 850,
            stop_signal_ms: 500,
            response_base_ms: 2250,
            iti_jitter_s: DEFAULT_ITI_JITTER_S.to_vec(),
            practice_response_ms: 1850,
            practice_feedback_ms: 500,
            practice_post_trial_ms: 250,
        }
    }
}

/// Feedback and practice-gating thresholds, read-only for the session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub rt_ms: f64,
    pub rt_drift_ms: f64,
    pub missed_response: f64,
    pub accuracy: f64,
    pub stop_tolerance: f64,
    pub stop_history_low: f64,
    pub stop_history_high: f64,
    /// At or below this ignore-trial response rate the subject is stopping
    /// with both hands.
    pub motor: f64,
    pub practice_pass: f64,
    pub practice_max_repeats: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            rt_ms: 1000.0,
            rt_drift_ms: 75.0,
            missed_response: 0.1,
            accuracy: 0.8,
            stop_tolerance: 0.2,
            stop_history_low: 0.45,
            stop_history_high: 0.55,
            motor: 0.6,
            practice_pass: 0.75,
            practice_max_repeats: 3,
        }
    }
}

impl ThresholdConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [("rt_ms", self.rt_ms), ("rt_drift_ms", self.rt_drift_ms)];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        let rates = [
            ("missed_response", self.missed_response),
            ("accuracy", self.accuracy),
            ("stop_history_low", self.stop_history_low),
            ("stop_history_high", self.stop_history_high),
            ("motor", self.motor),
            ("practice_pass", self.practice_pass),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        if !(0.0..=0.5).contains(&self.stop_tolerance) {
            return Err(ConfigError::Threshold {
                name: "stop_tolerance",
                value: self.stop_tolerance,
            });
        }
        if self.stop_history_low > self.stop_history_high {
            return Err(ConfigError::Threshold {
                name: "stop_history_low",
                value: self.stop_history_low,
            });
        }
        if self.practice_max_repeats == 0 {
            return Err(ConfigError::Zero("practice_max_repeats"));
        }
        Ok(())
    }
}
