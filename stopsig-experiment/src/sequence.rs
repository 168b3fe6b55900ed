//! Stimulus assignment for pre-typed trial slots.
//!
//! Each condition draws from its own pool. A pool holds its members repeated
//! a fixed number of times in shuffled order and is dealt from front to back;
//! the moment the last item is dealt it is reshuffled and dealt again. Draws
//! are therefore balanced locally instead of sampled with replacement.

use rand::Rng;
use rand::seq::SliceRandom;
use stopsig_core::{Condition, StimulusCatalog, StimulusId, Trial};
use tracing::debug;

use crate::config::ConditionProportions;
use crate::error::ConfigError;

/// Shuffled, repeating deal over a fixed set of stimuli
#[derive(Debug, Clone)]
pub struct StimulusPool {
    members: Vec<StimulusId>,
    repeats: usize,
    queue: Vec<StimulusId>,
    cursor: usize,
    refills: usize,
}

impl StimulusPool {
    /// `repeats` is clamped to at least one.
    pub fn new<R: Rng + ?Sized>(members: Vec<StimulusId>, repeats: usize, rng: &mut R) -> Self {
        let mut pool = Self {
            members,
            repeats: repeats.max(1),
            queue: Vec::new(),
            cursor: 0,
            refills: 0,
        };
        pool.refill(rng);
        pool
    }

    /// Pool for `condition` sized from the total sequence length and the
    /// condition's target share.
    pub fn for_condition<R: Rng + ?Sized>(
        condition: Condition,
        total: usize,
        proportions: &ConditionProportions,
        rng: &mut R,
    ) -> Self {
        let members = pool_members(condition);
        let repeats = refill_repeats(total, proportions.get(condition), members.len());
        Self::new(members, repeats, rng)
    }

    /// Deals the next stimulus, refilling as soon as the pool runs dry.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StimulusId {
        let stimulus = self.queue[self.cursor];
        self.cursor += 1;
        if self.cursor == self.queue.len() {
            self.refill(rng);
        }
        stimulus
    }

    fn refill<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.queue.clear();
        for _ in 0..self.repeats {
            self.queue.extend_from_slice(&self.members);
        }
        self.queue.shuffle(rng);
        self.cursor = 0;
        self.refills += 1;
    }

    /// Stimuli per fill.
    pub fn capacity(&self) -> usize {
        self.queue.len()
    }

    /// Stimuli dealt from a fill that was not used up. Zero right after a
    /// refill.
    pub fn leftover(&self) -> usize {
        if self.cursor == 0 {
            0
        } else {
            self.queue.len() - self.cursor
        }
    }

    /// Number of fills so far, counting the initial one.
    pub fn fills(&self) -> usize {
        self.refills
    }
}

/// Go trials use every shape, stop trials the stop-hand shapes, ignore
/// trials the other two.
pub fn pool_members(condition: Condition) -> Vec<StimulusId> {
    let [a, b, c, d] = StimulusId::ALL;
    match condition {
        Condition::Go => vec![a, b, c, d],
        Condition::Stop => vec![a, b],
        Condition::Ignore => vec![c, d],
    }
}

/// round(total * proportion / cardinality), at least one.
pub fn refill_repeats(total: usize, proportion: f64, cardinality: usize) -> usize {
    if cardinality == 0 {
        return 1;
    }
    let repeats = (total as f64 * proportion / cardinality as f64).round();
    (repeats as usize).max(1)
}

/// Assigns stimuli to an externally supplied condition pattern.
#[derive(Debug, Clone)]
pub struct TrialSequenceGenerator {
    go: StimulusPool,
    stop: StimulusPool,
    ignore: StimulusPool,
}

impl TrialSequenceGenerator {
    pub fn new<R: Rng + ?Sized>(
        total: usize,
        proportions: &ConditionProportions,
        rng: &mut R,
    ) -> Self {
        Self {
            go: StimulusPool::for_condition(Condition::Go, total, proportions, rng),
            stop: StimulusPool::for_condition(Condition::Stop, total, proportions, rng),
            ignore: StimulusPool::for_condition(Condition::Ignore, total, proportions, rng),
        }
    }

    /// Builds the full test sequence. The pattern length must equal
    /// `expected_len`; a mismatch is a configuration error, not something to
    /// discover mid-session.
    pub fn generate<R: Rng + ?Sized>(
        pattern: &[Condition],
        expected_len: usize,
        proportions: &ConditionProportions,
        catalog: &StimulusCatalog,
        rng: &mut R,
    ) -> Result<Vec<Trial>, ConfigError> {
        if pattern.len() != expected_len {
            return Err(ConfigError::PatternLength {
                expected: expected_len,
                actual: pattern.len(),
                blocks: 1,
                block_len: expected_len,
            });
        }
        let mut generator = Self::new(expected_len, proportions, rng);
        let trials = generator.assign(pattern, catalog, rng);
        debug!(
            trials = trials.len(),
            go_leftover = generator.go.leftover(),
            stop_leftover = generator.stop.leftover(),
            ignore_leftover = generator.ignore.leftover(),
            "test sequence generated"
        );
        Ok(trials)
    }

    /// Deals one stimulus per slot of `pattern`.
    pub fn assign<R: Rng + ?Sized>(
        &mut self,
        pattern: &[Condition],
        catalog: &StimulusCatalog,
        rng: &mut R,
    ) -> Vec<Trial> {
        pattern
            .iter()
            .map(|&condition| {
                let stimulus = self.pool_mut(condition).draw(rng);
                Trial {
                    condition,
                    stimulus,
                    correct_response: catalog.correct_response(stimulus),
                }
            })
            .collect()
    }

    pub fn pool(&self, condition: Condition) -> &StimulusPool {
        match condition {
            Condition::Go => &self.go,
            Condition::Stop => &self.stop,
            Condition::Ignore => &self.ignore,
        }
    }

    fn pool_mut(&mut self, condition: Condition) -> &mut StimulusPool {
        match condition {
            Condition::Go => &mut self.go,
            Condition::Stop => &mut self.stop,
            Condition::Ignore => &mut self.ignore,
        }
    }

    /// Undealt stimuli across all pools.
    pub fn leftover(&self) -> usize {
        self.go.leftover() + self.stop.leftover() + self.ignore.leftover()
    }
}

/// Go-only practice block: every shape `len / 4` times (at least once), in
/// shuffled order.
pub fn practice_sequence<R: Rng + ?Sized>(
    catalog: &StimulusCatalog,
    len: usize,
    rng: &mut R,
) -> Vec<Trial> {
    let members = pool_members(Condition::Go);
    let repeats = (len / members.len()).max(1);
    let mut stimuli: Vec<StimulusId> = members
        .iter()
        .cycle()
        .take(members.len() * repeats)
        .copied()
        .collect();
    stimuli.shuffle(rng);
    stimuli
        .into_iter()
        .map(|stimulus| Trial {
            condition: Condition::Go,
            stimulus,
            correct_response: catalog.correct_response(stimulus),
        })
        .collect()
}
