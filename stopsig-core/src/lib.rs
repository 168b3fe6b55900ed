pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::{Phase, StandardPhase};
pub use stimulus::{
    Finger, KeyCode, ResponseOption, STIMULUS_COUNT, Shape, StimulusCatalog, StimulusId,
};
pub use trial::{CompletedTrial, Condition, Response, Trial, TrialResult};
