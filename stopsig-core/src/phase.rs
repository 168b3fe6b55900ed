use serde::{Deserialize, Serialize};

/// Defines session phases and behavior
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn next(&self) -> Option<Self>;

    fn is_practice(&self) -> bool {
        false
    }
    fn is_test(&self) -> bool {
        false
    }

    /// Phases that present task trials to the subject.
    fn runs_trials(&self) -> bool {
        self.is_practice() || self.is_test()
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardPhase {
    Instructions,
    Practice,
    Test,
    End,
}

impl Default for StandardPhase {
    fn default() -> Self {
        StandardPhase::Instructions
    }
}

impl Phase for StandardPhase {
    fn next(&self) -> Option<Self> {
        use StandardPhase::*;
        Some(match self {
            Instructions => Practice,
            Practice => Test,
            Test => End,
            End => return None,
        })
    }

    fn is_practice(&self) -> bool {
        matches!(self, StandardPhase::Practice)
    }

    fn is_test(&self) -> bool {
        matches!(self, StandardPhase::Test)
    }
}
