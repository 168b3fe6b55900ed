pub mod config;
pub mod error;
pub mod feedback;
pub mod monitor;
pub mod practice;
pub mod sequence;
pub mod staircase;
pub mod state;
pub use config::{
    ConditionProportions, ExperimentConfig, StaircaseConfig, ThresholdConfig, TrialTiming,
};
pub use error::{ConfigError, SessionError};
pub use feedback::{Feedback, FeedbackFragment, compose};
pub use monitor::{BlockSummary, PerformanceMonitor};
pub use practice::{PracticeDecision, PracticeGate};
pub use sequence::{StimulusPool, TrialSequenceGenerator, practice_sequence};
pub use staircase::{SsdChange, Staircase};
pub use state::{
    BlockFeedback, ExperimentEvent, ExperimentStateMachine, PresentationTiming, SessionState,
    TrialPresentation,
};
