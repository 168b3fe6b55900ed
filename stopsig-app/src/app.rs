use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use stopsig_core::{Phase, StandardPhase};
use stopsig_experiment::{ExperimentConfig, ExperimentStateMachine, PracticeDecision};
use tracing::{info, warn};

use crate::participant::{ParticipantProfile, SimulatedParticipant};

/// Headless stand-in for the presentation layer: walks every phase and
/// answers each trial with a simulated participant.
pub struct App {
    experiment: ExperimentStateMachine<StandardPhase, StdRng>,
    participant: SimulatedParticipant<StdRng>,
    output: Option<PathBuf>,
}

impl App {
    pub fn new(
        config: ExperimentConfig,
        seed: Option<u64>,
        profile: ParticipantProfile,
        output: Option<PathBuf>,
    ) -> Result<Self> {
        let (session_rng, participant_rng) = match seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        };
        let experiment = ExperimentStateMachine::new(config, session_rng)
            .context("invalid session configuration")?;

        Ok(Self {
            experiment,
            participant: SimulatedParticipant::new(profile, participant_rng),
            output,
        })
    }

    pub fn run(mut self) -> Result<()> {
        println!("=== STOP-SIGNAL TASK (simulated) ===");
        println!("Key mapping: {}", self.experiment.catalog().key_mapping());
        println!(
            "Withhold the {} when the star appears.\n",
            self.experiment.catalog().stop_response().finger
        );

        while self.experiment.advance_phase() {
            let phase = *self.experiment.current_phase();
            if phase.is_practice() {
                self.run_practice()?;
            } else if phase.is_test() {
                self.run_test()?;
            }
        }

        println!("\nSession completed.");
        self.save_results()
    }

    fn run_practice(&mut self) -> Result<()> {
        loop {
            self.run_block()?;
            match self.experiment.finish_practice_block()? {
                PracticeDecision::Repeat { accuracy } => {
                    println!("Practice accuracy {}, repeating practice.", percent(accuracy));
                }
                PracticeDecision::Passed { accuracy } => {
                    println!("Practice passed with {}.", percent(Some(accuracy)));
                    return Ok(());
                }
                PracticeDecision::CapReached { accuracy } => {
                    warn!(accuracy = ?accuracy, "practice repeat limit reached");
                    return Ok(());
                }
            }
        }
    }

    fn run_test(&mut self) -> Result<()> {
        loop {
            self.run_block()?;
            let block = self.experiment.finish_block()?;
            println!("\n--- Block {} feedback ---\n{}", block.block + 1, block.feedback);
            if block.is_last {
                return Ok(());
            }
        }
    }

    /// Presents trials until the current block runs out.
    fn run_block(&mut self) -> Result<()> {
        while let Some(presentation) = self.experiment.next_trial()? {
            let response = self
                .participant
                .respond(&presentation, self.experiment.catalog());
            self.experiment.report_outcome(response)?;
        }
        Ok(())
    }

    fn save_results(&self) -> Result<()> {
        let results = self.experiment.results();
        info!(
            trials = results.len(),
            final_ssd_ms = self.experiment.request_delay(),
            "session finished"
        );
        let Some(path) = &self.output else {
            return Ok(());
        };
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), results)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        println!("Results saved to {}.", path.display());
        Ok(())
    }
}

fn percent(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.0}%", rate * 100.0),
        None => "n/a".to_string(),
    }
}
