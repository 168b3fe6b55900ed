use super::config::ExperimentConfig;
use super::error::{ConfigError, SessionError};
use super::feedback::{Feedback, compose};
use super::monitor::{BlockSummary, PerformanceMonitor};
use super::practice::{PracticeDecision, PracticeGate};
use super::sequence::{TrialSequenceGenerator, practice_sequence};
use super::staircase::{SsdChange, Staircase};
use rand::Rng;
use serde::{Deserialize, Serialize};
use stopsig_core::{
    CompletedTrial, Phase, Response, Shape, StimulusCatalog, Trial, TrialResult,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    TrialComplete,
    PracticeBlockComplete,
    BlockComplete,
}

/// Mutable state of the test phase: the staircase and the performance
/// monitor. Lives from the first test block to the end of the session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub staircase: Staircase,
    pub monitor: PerformanceMonitor,
}

impl SessionState {
    pub fn new(config: &ExperimentConfig) -> Self {
        Self {
            staircase: Staircase::new(&config.staircase),
            monitor: PerformanceMonitor::new(),
        }
    }

    pub fn request_delay(&self) -> u32 {
        self.staircase.current()
    }

    /// Commits a test-trial outcome: staircase first, then the block buffer.
    pub fn report_outcome(&mut self, outcome: CompletedTrial) -> SsdChange {
        let change = self.staircase.update(&outcome);
        self.monitor.record(outcome);
        change
    }

    /// Summarizes the block, composes its feedback and clears the buffer.
    pub fn end_block(
        &mut self,
        config: &ExperimentConfig,
        catalog: &StimulusCatalog,
    ) -> (BlockSummary, Feedback) {
        let summary = self.monitor.summarize();
        let feedback = compose(&summary, &config.thresholds, catalog);
        self.monitor.clear_block();
        (summary, feedback)
    }
}

/// Durations for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresentationTiming {
    pub stimulus_ms: u64,
    pub response_window_ms: u64,
    pub stop_signal_ms: Option<u64>,
    pub feedback_ms: Option<u64>,
    pub post_trial_ms: u64,
}

/// Everything the presentation layer needs for one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialPresentation {
    pub trial_number: usize,
    pub block: Option<usize>,
    pub trial: Trial,
    pub shape: Shape,
    /// Stop-signal delay, on stop and ignore trials.
    pub ssd_ms: Option<u32>,
    pub timing: PresentationTiming,
}

/// Feedback for a finished test block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFeedback {
    pub block: usize,
    pub summary: BlockSummary,
    pub feedback: Feedback,
    pub is_last: bool,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    trial: Trial,
    ssd_ms: Option<u32>,
}

/// Drives a session for the presentation layer: hands out trials in order,
/// takes their outcomes back, and produces block feedback and practice
/// decisions.
pub struct ExperimentStateMachine<P, R>
where
    P: Phase,
    R: Rng,
{
    pub phase: P,
    pub rng: R,
    pub config: ExperimentConfig,
    catalog: StimulusCatalog,
    practice_trials: Vec<Trial>,
    test_trials: Vec<Trial>,
    cursor: usize,
    block_index: usize,
    pending: Option<Pending>,
    practice_block: Vec<CompletedTrial>,
    gate: PracticeGate,
    session: SessionState,
    phase_trial_number: usize,
    results: Vec<TrialResult>,
}

impl<P, R> ExperimentStateMachine<P, R>
where
    P: Phase,
    R: Rng,
{
    /// Validates the configuration, draws a counterbalanced catalog and
    /// builds the full test sequence up front.
    pub fn new(config: ExperimentConfig, mut rng: R) -> Result<Self, ConfigError> {
        let catalog = StimulusCatalog::randomized(&mut rng);
        Self::with_catalog(config, catalog, rng)
    }

    pub fn with_catalog(
        config: ExperimentConfig,
        catalog: StimulusCatalog,
        mut rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let test_trials = TrialSequenceGenerator::generate(
            &config.condition_pattern,
            config.test_len(),
            &config.proportions,
            &catalog,
            &mut rng,
        )?;
        let practice_trials = practice_sequence(&catalog, config.practice_trials, &mut rng);
        info!(
            test_trials = test_trials.len(),
            practice_trials = practice_trials.len(),
            stop_finger = %catalog.stop_response().finger,
            "session prepared"
        );

        Ok(Self {
            phase: P::default(),
            gate: PracticeGate::new(&config.thresholds),
            session: SessionState::new(&config),
            rng,
            catalog,
            practice_trials,
            test_trials,
            cursor: 0,
            block_index: 0,
            pending: None,
            practice_block: Vec::new(),
            phase_trial_number: 0,
            results: Vec::new(),
            config,
        })
    }

    /// Moves to the next phase. Refused while a trial awaits its outcome,
    /// before practice has passed or hit its cap, and in the middle of a
    /// test block.
    pub fn advance_phase(&mut self) -> bool {
        if self.pending.is_some() {
            warn!("phase change requested with a trial awaiting its outcome");
            return false;
        }
        if self.phase.is_practice() && !self.gate.is_finished() {
            warn!(
                attempts = self.gate.attempts(),
                "phase change requested before practice ended"
            );
            return false;
        }
        if self.phase.is_test() && self.test_block_started() {
            warn!(block = self.block_index, "phase change requested inside a test block");
            return false;
        }
        if let Some(next) = self.phase.next() {
            info!(from = ?self.phase, to = ?next, "phase change");
            self.phase = next;
            self.cursor = 0;
            self.phase_trial_number = 0;
            true
        } else {
            false
        }
    }

    /// Hands out the next trial of the current block, or `None` when the
    /// block has run out and needs finishing.
    pub fn next_trial(&mut self) -> Result<Option<TrialPresentation>, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::OutcomePending(self.phase_trial_number));
        }
        if !self.phase.runs_trials() {
            return Err(SessionError::WrongPhase(format!("{:?}", self.phase)));
        }
        if self.remaining_in_block() == 0 {
            return Ok(None);
        }

        let presentation = if self.phase.is_practice() {
            let trial = self.practice_trials[self.cursor];
            let timing = &self.config.timing;
            TrialPresentation {
                trial_number: self.phase_trial_number,
                block: None,
                trial,
                shape: self.catalog.shape(trial.stimulus),
                ssd_ms: None,
                timing: PresentationTiming {
                    stimulus_ms: timing.stimulus_ms,
                    response_window_ms: timing.practice_response_ms,
                    stop_signal_ms: None,
                    feedback_ms: Some(timing.practice_feedback_ms),
                    post_trial_ms: timing.practice_post_trial_ms,
                },
            }
        } else {
            let trial = self.test_trials[self.cursor];
            let shows_signal = trial.condition.shows_signal();
            let position = self.cursor % self.config.test_block_len;
            TrialPresentation {
                trial_number: self.phase_trial_number,
                block: Some(self.block_index),
                trial,
                shape: self.catalog.shape(trial.stimulus),
                ssd_ms: shows_signal.then(|| self.session.request_delay()),
                timing: PresentationTiming {
                    stimulus_ms: self.config.timing.stimulus_ms,
                    response_window_ms: self.config.response_window_ms(position),
                    stop_signal_ms: shows_signal.then_some(self.config.timing.stop_signal_ms),
                    feedback_ms: None,
                    post_trial_ms: 0,
                },
            }
        };

        debug!(
            trial = presentation.trial_number,
            condition = %presentation.trial.condition,
            stimulus = %presentation.trial.stimulus,
            ssd_ms = ?presentation.ssd_ms,
            "trial presented"
        );
        self.pending = Some(Pending {
            trial: presentation.trial,
            ssd_ms: presentation.ssd_ms,
        });
        Ok(Some(presentation))
    }

    /// Current stop-signal delay.
    pub fn request_delay(&self) -> u32 {
        self.session.request_delay()
    }

    /// Commits the outcome of the pending trial. In the test phase the
    /// staircase is updated before anything else can read the delay. A press
    /// with a negative or non-finite reaction time is rejected and the trial
    /// stays pending.
    pub fn report_outcome(
        &mut self,
        response: Response,
    ) -> Result<Vec<ExperimentEvent>, SessionError> {
        match response {
            Response::Pressed { rt_ms, .. } if !response.is_valid() => {
                warn!(rt_ms, "outcome with an unusable reaction time rejected");
                return Err(SessionError::InvalidResponse { rt_ms });
            }
            _ => {}
        }
        let pending = self.pending.take().ok_or(SessionError::NoPendingTrial)?;
        let completed = CompletedTrial::new(pending.trial, response, pending.ssd_ms);
        let stage = if self.phase.is_practice() { "practice" } else { "test" };
        let block = self.phase.is_test().then_some(self.block_index);

        if self.phase.is_test() {
            let change = self.session.report_outcome(completed);
            debug!(?change, ssd_ms = self.session.request_delay(), "staircase updated");
        } else {
            self.practice_block.push(completed);
        }

        self.results.push(TrialResult::from_completed(
            self.phase_trial_number,
            stage,
            block,
            &completed,
            self.catalog.stop_response().key,
        ));
        debug!(
            trial = self.phase_trial_number,
            correct = completed.is_correct(),
            rt_ms = ?completed.response.rt_ms(),
            "outcome recorded"
        );
        self.cursor += 1;
        self.phase_trial_number += 1;

        let mut events = vec![ExperimentEvent::TrialComplete];
        if self.remaining_in_block() == 0 {
            events.push(if self.phase.is_practice() {
                ExperimentEvent::PracticeBlockComplete
            } else {
                ExperimentEvent::BlockComplete
            });
        }
        Ok(events)
    }

    /// Ends the current test block: summary, feedback, cleared buffer.
    pub fn finish_block(&mut self) -> Result<BlockFeedback, SessionError> {
        if !self.phase.is_test() {
            return Err(SessionError::WrongPhase(format!("{:?}", self.phase)));
        }
        if self.block_index >= self.config.num_blocks {
            return Err(SessionError::SessionComplete(self.config.num_blocks));
        }
        self.ensure_block_done()?;

        let (summary, feedback) = self.session.end_block(&self.config, &self.catalog);
        let block = self.block_index;
        self.block_index += 1;
        let is_last = self.block_index >= self.config.num_blocks;
        info!(block, is_last, feedback = %feedback, "test block finished");
        Ok(BlockFeedback {
            block,
            summary,
            feedback,
            is_last,
        })
    }

    /// Ends a practice block and decides whether to run another one.
    pub fn finish_practice_block(&mut self) -> Result<PracticeDecision, SessionError> {
        if !self.phase.is_practice() {
            return Err(SessionError::WrongPhase(format!("{:?}", self.phase)));
        }
        if let Some(decision) = self.gate.outcome() {
            return Err(SessionError::PracticeFinished(decision.to_string()));
        }
        self.ensure_block_done()?;

        let decision = self.gate.evaluate(&self.practice_block);
        self.practice_block.clear();
        if decision.repeat() {
            self.practice_trials =
                practice_sequence(&self.catalog, self.config.practice_trials, &mut self.rng);
            self.cursor = 0;
        }
        Ok(decision)
    }

    fn ensure_block_done(&self) -> Result<(), SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::OutcomePending(self.phase_trial_number));
        }
        match self.remaining_in_block() {
            0 => Ok(()),
            remaining => Err(SessionError::BlockIncomplete {
                block: self.block_index,
                remaining,
            }),
        }
    }

    /// Some trials of the current test block have run but the block has not
    /// been finished.
    fn test_block_started(&self) -> bool {
        self.block_index < self.config.num_blocks
            && self.cursor > self.block_index * self.config.test_block_len
    }

    fn remaining_in_block(&self) -> usize {
        if self.phase.is_practice() {
            self.practice_trials.len().saturating_sub(self.cursor)
        } else if self.phase.is_test() {
            if self.block_index >= self.config.num_blocks {
                return 0;
            }
            let block_end =
                ((self.block_index + 1) * self.config.test_block_len).min(self.test_trials.len());
            block_end.saturating_sub(self.cursor)
        } else {
            0
        }
    }

    pub fn current_phase(&self) -> &P {
        &self.phase
    }

    pub fn catalog(&self) -> &StimulusCatalog {
        &self.catalog
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn test_trials(&self) -> &[Trial] {
        &self.test_trials
    }

    pub fn practice_attempts(&self) -> usize {
        self.gate.attempts()
    }

    /// Session results
    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use stopsig_core::{Condition, StandardPhase};

    type Machine = ExperimentStateMachine<StandardPhase, StdRng>;

    fn machine() -> Machine {
        Machine::with_catalog(
            ExperimentConfig::default(),
            StimulusCatalog::default(),
            StdRng::seed_from_u64(17),
        )
        .unwrap()
    }

    fn correct(p: &TrialPresentation) -> Response {
        Response::Pressed {
            key: p.trial.correct_response,
            rt_ms: 550.0,
        }
    }

    fn to_test_phase(m: &mut Machine) {
        assert!(m.advance_phase());
        while let Some(p) = m.next_trial().unwrap() {
            m.report_outcome(correct(&p)).unwrap();
        }
        assert!(!m.finish_practice_block().unwrap().repeat());
        assert!(m.advance_phase());
    }

    #[test]
    fn instructions_phase_has_no_trials() {
        let mut m = machine();
        assert!(matches!(m.next_trial(), Err(SessionError::WrongPhase(_))));
    }

    #[test]
    fn outcome_without_trial_is_rejected() {
        let mut m = machine();
        m.advance_phase();
        assert_eq!(
            m.report_outcome(Response::Withheld),
            Err(SessionError::NoPendingTrial)
        );
    }

    #[test]
    fn second_trial_needs_the_first_outcome() {
        let mut m = machine();
        m.advance_phase();
        m.next_trial().unwrap().unwrap();
        assert_eq!(m.next_trial(), Err(SessionError::OutcomePending(0)));
        assert!(!m.advance_phase());
    }

    #[test]
    fn failed_stop_lowers_the_next_delay() {
        let mut m = machine();
        to_test_phase(&mut m);

        loop {
            let p = m.next_trial().unwrap().unwrap();
            if p.trial.condition == Condition::Stop {
                assert_eq!(p.ssd_ms, Some(250));
                m.report_outcome(correct(&p)).unwrap();
                assert_eq!(m.request_delay(), 200);
                break;
            }
            m.report_outcome(correct(&p)).unwrap();
        }
        let next_signal = loop {
            let p = m.next_trial().unwrap().unwrap();
            if p.ssd_ms.is_some() {
                break p;
            }
            m.report_outcome(correct(&p)).unwrap();
        };
        assert_eq!(next_signal.ssd_ms, Some(200));
    }

    #[test]
    fn go_trials_carry_no_delay() {
        let mut m = machine();
        to_test_phase(&mut m);
        let p = m.next_trial().unwrap().unwrap();
        assert_eq!(p.trial.condition, Condition::Go);
        assert_eq!(p.ssd_ms, None);
        assert_eq!(p.timing.stop_signal_ms, None);
        assert_eq!(p.timing.response_window_ms, 2250);
    }

    #[test]
    fn block_cannot_finish_early() {
        let mut m = machine();
        to_test_phase(&mut m);
        let p = m.next_trial().unwrap().unwrap();
        m.report_outcome(correct(&p)).unwrap();
        assert_eq!(
            m.finish_block(),
            Err(SessionError::BlockIncomplete {
                block: 0,
                remaining: 29
            })
        );
    }

    #[test]
    fn practice_repeats_until_cap() {
        let mut m = machine();
        m.advance_phase();
        for attempt in 1..=3 {
            while let Some(_p) = m.next_trial().unwrap() {
                m.report_outcome(Response::Withheld).unwrap();
            }
            let decision = m.finish_practice_block().unwrap();
            assert_eq!(decision.repeat(), attempt < 3);
        }
        assert_eq!(m.practice_attempts(), 3);
        assert_eq!(m.next_trial().unwrap(), None);
    }

    #[test]
    fn unusable_reaction_times_keep_the_trial_pending() {
        let mut m = machine();
        to_test_phase(&mut m);
        let p = m.next_trial().unwrap().unwrap();
        let key = p.trial.correct_response;
        for rt_ms in [f64::NAN, -1.0, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                m.report_outcome(Response::Pressed { key, rt_ms }),
                Err(SessionError::InvalidResponse { .. })
            ));
        }
        assert_eq!(m.next_trial(), Err(SessionError::OutcomePending(0)));

        m.report_outcome(correct(&p)).unwrap();
        while let Some(p) = m.next_trial().unwrap() {
            m.report_outcome(correct(&p)).unwrap();
        }
        let block = m.finish_block().unwrap();
        assert_eq!(block.summary.median_rt_ms, Some(550.0));
        assert_eq!(m.session().monitor.rt_median_history(), &[550.0]);
        assert_eq!(m.results().iter().filter(|r| r.exp_stage == "test").count(), 30);
    }

    #[test]
    fn practice_cannot_restart_after_passing() {
        let mut m = machine();
        m.advance_phase();
        while let Some(p) = m.next_trial().unwrap() {
            m.report_outcome(correct(&p)).unwrap();
        }
        assert!(matches!(
            m.finish_practice_block(),
            Ok(PracticeDecision::Passed { .. })
        ));
        assert!(matches!(
            m.finish_practice_block(),
            Err(SessionError::PracticeFinished(_))
        ));
        assert_eq!(m.practice_attempts(), 1);
        assert_eq!(m.next_trial().unwrap(), None);
    }

    #[test]
    fn practice_cannot_restart_after_the_cap() {
        let mut m = machine();
        m.advance_phase();
        for _ in 0..3 {
            while let Some(_p) = m.next_trial().unwrap() {
                m.report_outcome(Response::Withheld).unwrap();
            }
            m.finish_practice_block().unwrap();
        }
        assert!(matches!(
            m.finish_practice_block(),
            Err(SessionError::PracticeFinished(_))
        ));
        assert_eq!(m.practice_attempts(), 3);
        assert_eq!(m.next_trial().unwrap(), None);
    }

    #[test]
    fn practice_must_end_before_the_test_phase() {
        let mut m = machine();
        m.advance_phase();
        assert!(!m.advance_phase());

        let p = m.next_trial().unwrap().unwrap();
        m.report_outcome(correct(&p)).unwrap();
        assert!(!m.advance_phase());
        assert!(m.current_phase().is_practice());

        while let Some(p) = m.next_trial().unwrap() {
            m.report_outcome(correct(&p)).unwrap();
        }
        assert!(!m.advance_phase());
        m.finish_practice_block().unwrap();
        assert!(m.advance_phase());
        assert!(m.current_phase().is_test());
    }

    #[test]
    fn test_phase_holds_until_the_running_block_is_finished() {
        let mut m = machine();
        to_test_phase(&mut m);
        let p = m.next_trial().unwrap().unwrap();
        m.report_outcome(correct(&p)).unwrap();
        assert!(!m.advance_phase());

        while let Some(p) = m.next_trial().unwrap() {
            m.report_outcome(correct(&p)).unwrap();
        }
        assert!(!m.advance_phase());
        assert_eq!(m.session().monitor.block().len(), 30);

        m.finish_block().unwrap();
        assert!(m.advance_phase());
        assert_eq!(*m.current_phase(), StandardPhase::End);
    }

    #[test]
    fn no_block_to_finish_after_the_last_one() {
        let mut m = machine();
        to_test_phase(&mut m);
        loop {
            while let Some(p) = m.next_trial().unwrap() {
                m.report_outcome(correct(&p)).unwrap();
            }
            if m.finish_block().unwrap().is_last {
                break;
            }
        }
        let history = m.session().monitor.rt_median_history().to_vec();
        assert_eq!(m.finish_block(), Err(SessionError::SessionComplete(2)));
        assert_eq!(m.finish_block(), Err(SessionError::SessionComplete(2)));
        assert_eq!(m.session().monitor.rt_median_history(), history.as_slice());
        assert_eq!(m.next_trial().unwrap(), None);
    }
}
