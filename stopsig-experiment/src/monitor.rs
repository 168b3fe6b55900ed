//! Block-level performance aggregation.

use serde::{Deserialize, Serialize};
use stopsig_core::{CompletedTrial, Condition};
use tracing::debug;

/// Statistics over one block. Rates whose denominator is zero are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlockSummary {
    pub total_trials: usize,
    /// Every non-stop trial.
    pub go_length: usize,
    pub stop_length: usize,
    pub ignore_length: usize,
    pub responses: usize,
    pub correct_responses: usize,
    pub successful_stops: usize,
    pub ignore_responses: usize,
    pub median_rt_ms: Option<f64>,
    pub go_accuracy: Option<f64>,
    pub missed_response_rate: Option<f64>,
    pub stop_success_rate: Option<f64>,
    pub ignore_respond_rate: Option<f64>,
    /// Change in median RT against the previous block, 0 without one.
    pub rt_drift_ms: f64,
    /// Mean stop success over every block summarized so far, this one
    /// included.
    pub mean_stop_accuracy: Option<f64>,
}

/// Current block buffer plus the per-block histories feedback is judged
/// against
#[derive(Debug, Clone, Default)]
pub struct PerformanceMonitor {
    block: Vec<CompletedTrial>,
    rt_median_history: Vec<f64>,
    stop_accuracy_history: Vec<f64>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trial: CompletedTrial) {
        self.block.push(trial);
    }

    pub fn block(&self) -> &[CompletedTrial] {
        &self.block
    }

    pub fn clear_block(&mut self) {
        self.block.clear();
    }

    pub fn rt_median_history(&self) -> &[f64] {
        &self.rt_median_history
    }

    pub fn stop_accuracy_history(&self) -> &[f64] {
        &self.stop_accuracy_history
    }

    /// Summarizes the current block and appends its median RT and stop
    /// success rate to the histories. Call exactly once per block; a second
    /// call counts the block twice. The buffer is left as is.
    pub fn summarize(&mut self) -> BlockSummary {
        let mut summary = tally(&self.block);

        let previous_median = self.rt_median_history.last().copied();
        if let Some(median) = summary.median_rt_ms {
            self.rt_median_history.push(median);
        }
        summary.rt_drift_ms = match (summary.median_rt_ms, previous_median) {
            (Some(current), Some(previous)) => current - previous,
            _ => 0.0,
        };

        if let Some(rate) = summary.stop_success_rate {
            self.stop_accuracy_history.push(rate);
        }
        summary.mean_stop_accuracy = mean(&self.stop_accuracy_history);

        debug!(
            trials = summary.total_trials,
            median_rt_ms = ?summary.median_rt_ms,
            go_accuracy = ?summary.go_accuracy,
            stop_success_rate = ?summary.stop_success_rate,
            rt_drift_ms = summary.rt_drift_ms,
            "block summarized"
        );
        summary
    }
}

/// Counts and rates over a block, without history-dependent fields.
fn tally(trials: &[CompletedTrial]) -> BlockSummary {
    let mut summary = BlockSummary {
        total_trials: trials.len(),
        ..BlockSummary::default()
    };
    let mut rts = Vec::new();

    for trial in trials {
        if trial.condition() == Condition::Stop {
            summary.stop_length += 1;
            if trial.is_successful_stop() {
                summary.successful_stops += 1;
            }
            continue;
        }

        summary.go_length += 1;
        if let Some(rt) = trial.response.rt_ms() {
            summary.responses += 1;
            rts.push(rt);
            if trial.key_matches() {
                summary.correct_responses += 1;
            }
        }
        if trial.condition() == Condition::Ignore {
            summary.ignore_length += 1;
            if trial.responded() {
                summary.ignore_responses += 1;
            }
        }
    }

    summary.median_rt_ms = median(&mut rts);
    summary.go_accuracy = ratio(summary.correct_responses, summary.go_length);
    summary.missed_response_rate =
        ratio(summary.go_length - summary.responses, summary.go_length);
    summary.stop_success_rate = ratio(summary.successful_stops, summary.stop_length);
    summary.ignore_respond_rate = ratio(summary.ignore_responses, summary.ignore_length);
    summary
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn mean(data: &[f64]) -> Option<f64> {
    (!data.is_empty()).then(|| data.iter().sum::<f64>() / data.len() as f64)
}

/// Middle value, or the mean of the two middle values for even counts.
fn median(data: &mut [f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.sort_by(|a, b| a.total_cmp(b));
    let mid = data.len() / 2;
    if data.len() % 2 == 0 {
        Some((data[mid - 1] + data[mid]) / 2.0)
    } else {
        Some(data[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stopsig_core::{KeyCode, Response, StimulusId, Trial};

    fn trial(condition: Condition, stimulus: usize) -> Trial {
        let stimulus = StimulusId::ALL[stimulus];
        let correct_response = if stimulus.is_stop_hand() {
            KeyCode::LEFT_ARROW
        } else {
            KeyCode::DOWN_ARROW
        };
        Trial {
            condition,
            stimulus,
            correct_response,
        }
    }

    fn pressed(condition: Condition, stimulus: usize, correct: bool, rt_ms: f64) -> CompletedTrial {
        let t = trial(condition, stimulus);
        let key = if correct {
            t.correct_response
        } else if t.correct_response == KeyCode::LEFT_ARROW {
            KeyCode::DOWN_ARROW
        } else {
            KeyCode::LEFT_ARROW
        };
        CompletedTrial::new(t, Response::Pressed { key, rt_ms }, None)
    }

    fn withheld(condition: Condition, stimulus: usize) -> CompletedTrial {
        CompletedTrial::new(trial(condition, stimulus), Response::Withheld, Some(250))
    }

    #[test]
    fn empty_block_reports_undefined_rates() {
        let mut monitor = PerformanceMonitor::new();
        let summary = monitor.summarize();
        assert_eq!(summary.total_trials, 0);
        assert_eq!(summary.median_rt_ms, None);
        assert_eq!(summary.go_accuracy, None);
        assert_eq!(summary.missed_response_rate, None);
        assert_eq!(summary.stop_success_rate, None);
        assert_eq!(summary.ignore_respond_rate, None);
        assert_eq!(summary.mean_stop_accuracy, None);
        assert_eq!(summary.rt_drift_ms, 0.0);
        assert!(monitor.rt_median_history().is_empty());
        assert!(monitor.stop_accuracy_history().is_empty());
    }

    #[test]
    fn ten_go_trials_eight_correct() {
        let mut monitor = PerformanceMonitor::new();
        for i in 0..10 {
            monitor.record(pressed(Condition::Go, i % 4, i < 8, 600.0));
        }
        let summary = monitor.summarize();
        assert_eq!(summary.go_length, 10);
        assert_eq!(summary.go_accuracy, Some(0.8));
        assert_eq!(summary.missed_response_rate, Some(0.0));
        assert_eq!(summary.median_rt_ms, Some(600.0));
        assert_eq!(summary.stop_success_rate, None);
    }

    #[test]
    fn stop_trials_are_not_counted_as_go() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record(withheld(Condition::Stop, 0));
        monitor.record(pressed(Condition::Stop, 1, true, 350.0));
        monitor.record(pressed(Condition::Stop, 0, true, 380.0));
        monitor.record(pressed(Condition::Stop, 1, true, 390.0));
        monitor.record(pressed(Condition::Go, 2, true, 500.0));
        let summary = monitor.summarize();
        assert_eq!(summary.stop_length, 4);
        assert_eq!(summary.stop_success_rate, Some(0.25));
        assert_eq!(summary.go_length, 1);
        // Stop-trial RTs stay out of the median.
        assert_eq!(summary.median_rt_ms, Some(500.0));
    }

    #[test]
    fn ignore_trials_count_as_go_and_as_ignore() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record(pressed(Condition::Ignore, 2, true, 700.0));
        monitor.record(withheld(Condition::Ignore, 3));
        monitor.record(pressed(Condition::Go, 0, true, 500.0));
        monitor.record(withheld(Condition::Go, 1));
        let summary = monitor.summarize();
        assert_eq!(summary.go_length, 4);
        assert_eq!(summary.responses, 2);
        assert_eq!(summary.go_accuracy, Some(0.5));
        assert_eq!(summary.missed_response_rate, Some(0.5));
        assert_eq!(summary.ignore_length, 2);
        assert_eq!(summary.ignore_respond_rate, Some(0.5));
        assert_eq!(summary.median_rt_ms, Some(600.0));
    }

    #[test]
    fn drift_compares_against_the_previous_block() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record(pressed(Condition::Go, 0, true, 500.0));
        let first = monitor.summarize();
        assert_eq!(first.rt_drift_ms, 0.0);
        monitor.clear_block();

        monitor.record(pressed(Condition::Go, 0, true, 620.0));
        monitor.record(pressed(Condition::Go, 2, true, 600.0));
        monitor.record(pressed(Condition::Go, 3, true, 640.0));
        let second = monitor.summarize();
        assert_eq!(second.median_rt_ms, Some(620.0));
        assert_eq!(second.rt_drift_ms, 120.0);
        assert_eq!(monitor.rt_median_history(), &[500.0, 620.0]);
    }

    #[test]
    fn stop_history_mean_includes_current_block() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record(withheld(Condition::Stop, 0));
        monitor.record(withheld(Condition::Stop, 1));
        assert_eq!(monitor.summarize().mean_stop_accuracy, Some(1.0));
        monitor.clear_block();

        monitor.record(withheld(Condition::Stop, 0));
        monitor.record(pressed(Condition::Stop, 1, true, 300.0));
        monitor.record(pressed(Condition::Stop, 1, true, 300.0));
        monitor.record(pressed(Condition::Stop, 0, true, 300.0));
        let summary = monitor.summarize();
        assert_eq!(summary.stop_success_rate, Some(0.25));
        assert_eq!(summary.mean_stop_accuracy, Some(0.625));
    }

    #[test]
    fn summarize_leaves_the_buffer_and_is_not_idempotent() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record(pressed(Condition::Go, 0, true, 450.0));
        monitor.summarize();
        assert_eq!(monitor.block().len(), 1);
        monitor.summarize();
        assert_eq!(monitor.rt_median_history().len(), 2);
    }

    #[test]
    fn median_of_even_count_averages_middle_values() {
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [5.0]), Some(5.0));
        assert_eq!(median(&mut []), None);
    }
}
