use stopsig_core::Condition;
use thiserror::Error;

/// Structural problems in the session configuration. All of these surface
/// before the first trial runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("condition pattern has {actual} entries, expected {expected} ({blocks} blocks x {block_len} trials)")]
    PatternLength {
        expected: usize,
        actual: usize,
        blocks: usize,
        block_len: usize,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{condition} proportion {value} is outside [0, 1]")]
    Proportion { condition: Condition, value: f64 },
    #[error("condition proportions sum to {0}, expected 1")]
    ProportionSum(f64),
    #[error("staircase range [{min}, {max}] with step {step} is invalid")]
    StaircaseRange { min: u32, max: u32, step: u32 },
    #[error("initial SSD {initial} ms is not on the staircase grid [{min}, {max}] step {step}")]
    StaircaseStart {
        initial: u32,
        min: u32,
        max: u32,
        step: u32,
    },
    #[error("threshold {name} = {value} is outside its valid range")]
    Threshold { name: &'static str, value: f64 },
    #[error("invalid configuration json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err.to_string())
    }
}

/// Calls made against the session out of protocol order.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("no trial is awaiting an outcome")]
    NoPendingTrial,
    #[error("trial {0} is still awaiting its outcome")]
    OutcomePending(usize),
    #[error("operation not available in phase {0}")]
    WrongPhase(String),
    #[error("block {block} has {remaining} trials left to run")]
    BlockIncomplete { block: usize, remaining: usize },
    #[error("reaction time {rt_ms} ms must be finite and non-negative")]
    InvalidResponse { rt_ms: f64 },
    #[error("all {0} test blocks are already finished")]
    SessionComplete(usize),
    #[error("practice already ended with {0}")]
    PracticeFinished(String),
}
