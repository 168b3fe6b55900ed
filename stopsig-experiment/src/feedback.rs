//! End-of-block feedback.
//!
//! Each fragment has its own trigger and is evaluated independently. The
//! only exception is the pair of stopping reminders: a subject cannot be
//! told both to stop more and to stop slowing down.

use serde::{Deserialize, Serialize};
use std::fmt;
use stopsig_core::{Finger, StimulusCatalog};

use crate::config::ThresholdConfig;
use crate::monitor::BlockSummary;

/// Stop success rate the staircase aims for.
const STOP_TARGET: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedbackFragment {
    /// Rounded median RT and go accuracy percentage; `None` without data.
    Summary {
        rt_ms: Option<i64>,
        accuracy_pct: Option<i64>,
    },
    TooSlow,
    MissedResponses,
    LowAccuracy { key_mapping: String },
    NotStoppingEnough { stop_finger: Finger },
    WaitingForSignal,
    StoppingBothHands { stop_finger: Finger },
}

impl fmt::Display for FeedbackFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackFragment::Summary {
                rt_ms,
                accuracy_pct,
            } => {
                f.write_str("Average reaction time: ")?;
                match rt_ms {
                    Some(rt) => write!(f, "{rt} ms")?,
                    None => f.write_str("no data")?,
                }
                f.write_str(". Accuracy for non-star trials: ")?;
                match accuracy_pct {
                    Some(pct) => write!(f, "{pct}%"),
                    None => f.write_str("no data"),
                }
            }
            FeedbackFragment::TooSlow => f.write_str(
                "You have been responding too slowly, please respond to each shape as quickly and as accurately as possible.",
            ),
            FeedbackFragment::MissedResponses => f.write_str(
                "We have detected a number of trials that required a response, where no response was made. Please ensure that you are responding to each shape, unless a star appears.",
            ),
            FeedbackFragment::LowAccuracy { key_mapping } => write!(
                f,
                "Your accuracy is too low. Remember, the correct keys are as follows: {key_mapping}"
            ),
            FeedbackFragment::NotStoppingEnough { stop_finger } => write!(
                f,
                "Remember to try and withhold your response when you see a stop signal AND the correct key is the {stop_finger}."
            ),
            FeedbackFragment::WaitingForSignal => f.write_str(
                "Remember, do not slow your responses to the shape to see if a star will appear before you respond. Please respond to each shape as quickly and as accurately as possible.",
            ),
            FeedbackFragment::StoppingBothHands { stop_finger } => write!(
                f,
                "You have been stopping with both fingers. Please make sure to stop your response only when the star appears and you were going to respond with the {stop_finger}."
            ),
        }
    }
}

/// Ordered feedback for one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub fragments: Vec<FeedbackFragment>,
}

impl Feedback {
    pub fn contains(&self, pred: impl Fn(&FeedbackFragment) -> bool) -> bool {
        self.fragments.iter().any(pred)
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{fragment}")?;
        }
        Ok(())
    }
}

/// Builds block feedback from a summary. Pure; the same inputs always give
/// the same fragments in the same order.
pub fn compose(
    summary: &BlockSummary,
    thresholds: &ThresholdConfig,
    catalog: &StimulusCatalog,
) -> Feedback {
    let mut fragments = vec![FeedbackFragment::Summary {
        rt_ms: summary.median_rt_ms.map(|rt| rt.round() as i64),
        accuracy_pct: summary.go_accuracy.map(|acc| (acc * 100.0).round() as i64),
    }];

    let too_slow = summary.median_rt_ms.is_some_and(|rt| rt > thresholds.rt_ms)
        || summary.rt_drift_ms > thresholds.rt_drift_ms;
    if too_slow {
        fragments.push(FeedbackFragment::TooSlow);
    }

    if summary
        .missed_response_rate
        .is_some_and(|rate| rate >= thresholds.missed_response)
    {
        fragments.push(FeedbackFragment::MissedResponses);
    }

    if summary
        .go_accuracy
        .is_some_and(|acc| acc < thresholds.accuracy)
    {
        fragments.push(FeedbackFragment::LowAccuracy {
            key_mapping: catalog.key_mapping(),
        });
    }

    let stop_finger = catalog.stop_response().finger;
    let rate = summary.stop_success_rate;
    let history = summary.mean_stop_accuracy;
    let under = rate.is_some_and(|r| r < STOP_TARGET - thresholds.stop_tolerance)
        || history.is_some_and(|m| m < thresholds.stop_history_low);
    let over = rate.is_some_and(|r| r > STOP_TARGET + thresholds.stop_tolerance)
        || history.is_some_and(|m| m > thresholds.stop_history_high);
    if under {
        fragments.push(FeedbackFragment::NotStoppingEnough { stop_finger });
    } else if over {
        fragments.push(FeedbackFragment::WaitingForSignal);
    }

    if summary
        .ignore_respond_rate
        .is_some_and(|rate| rate <= thresholds.motor)
    {
        fragments.push(FeedbackFragment::StoppingBothHands { stop_finger });
    }

    Feedback { fragments }
}
