use rand::Rng;
use stopsig_core::{Condition, KeyCode, Response, StimulusCatalog};
use stopsig_experiment::TrialPresentation;

/// Parameters of the simulated subject
#[derive(Debug, Clone, Copy)]
pub struct ParticipantProfile {
    pub go_rt_ms: f64,
    pub go_rt_sd_ms: f64,
    /// Stop-signal reaction time.
    pub ssrt_ms: f64,
    pub accuracy: f64,
    pub omission_rate: f64,
}

/// Independent race between the go process and the stop process. The stop
/// process only cancels responses of the stop finger, so ignore trials are
/// answered.
pub struct SimulatedParticipant<R: Rng> {
    profile: ParticipantProfile,
    rng: R,
}

impl<R: Rng> SimulatedParticipant<R> {
    pub fn new(profile: ParticipantProfile, rng: R) -> Self {
        Self { profile, rng }
    }

    pub fn respond(
        &mut self,
        presentation: &TrialPresentation,
        catalog: &StimulusCatalog,
    ) -> Response {
        if self.rng.random_bool(self.profile.omission_rate.clamp(0.0, 1.0)) {
            return Response::Withheld;
        }

        let rt_ms = self.go_rt();
        if rt_ms > presentation.timing.response_window_ms as f64 {
            return Response::Withheld;
        }

        if presentation.trial.condition == Condition::Stop {
            if let Some(ssd_ms) = presentation.ssd_ms {
                if ssd_ms as f64 + self.profile.ssrt_ms < rt_ms {
                    return Response::Withheld;
                }
            }
        }

        let key = if self.rng.random_bool(self.profile.accuracy.clamp(0.0, 1.0)) {
            presentation.trial.correct_response
        } else {
            other_key(catalog, presentation.trial.correct_response)
        };
        Response::pressed(key, rt_ms).unwrap_or(Response::Withheld)
    }

    /// Approximately normal go RT from the sum of twelve uniforms.
    fn go_rt(&mut self) -> f64 {
        let z: f64 = (0..12).map(|_| self.rng.random::<f64>()).sum::<f64>() - 6.0;
        (self.profile.go_rt_ms + z * self.profile.go_rt_sd_ms).max(150.0)
    }
}

fn other_key(catalog: &StimulusCatalog, key: KeyCode) -> KeyCode {
    let [stop, ignore] = catalog.choices();
    if key == stop { ignore } else { stop }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use stopsig_core::{Shape, StimulusId, Trial};
    use stopsig_experiment::PresentationTiming;

    fn presentation(condition: Condition, ssd_ms: Option<u32>) -> TrialPresentation {
        TrialPresentation {
            trial_number: 0,
            block: Some(0),
            trial: Trial {
                condition,
                stimulus: StimulusId::ALL[0],
                correct_response: KeyCode::LEFT_ARROW,
            },
            shape: Shape::Circle,
            ssd_ms,
            timing: PresentationTiming {
                stimulus_ms: 850,
                response_window_ms: 2250,
                stop_signal_ms: ssd_ms.map(|_| 500),
                feedback_ms: None,
                post_trial_ms: 0,
            },
        }
    }

    fn participant() -> SimulatedParticipant<StdRng> {
        SimulatedParticipant::new(
            ParticipantProfile {
                go_rt_ms: 600.0,
                go_rt_sd_ms: 0.0,
                ssrt_ms: 200.0,
                accuracy: 1.0,
                omission_rate: 0.0,
            },
            StdRng::seed_from_u64(0),
        )
    }

    #[test]
    fn early_signal_wins_the_race() {
        let catalog = StimulusCatalog::default();
        let response = participant().respond(&presentation(Condition::Stop, Some(100)), &catalog);
        assert_eq!(response, Response::Withheld);
    }

    #[test]
    fn late_signal_loses_the_race() {
        let catalog = StimulusCatalog::default();
        let response = participant().respond(&presentation(Condition::Stop, Some(500)), &catalog);
        assert_eq!(response.rt_ms(), Some(600.0));
    }

    #[test]
    fn ignore_trials_are_answered() {
        let catalog = StimulusCatalog::default();
        let response = participant().respond(&presentation(Condition::Ignore, Some(0)), &catalog);
        assert_eq!(response.key(), Some(KeyCode::LEFT_ARROW));
    }
}
