//! Round-based training loop with patience-bounded early stopping.
//!
//! Every round hands the whole training partition to the classifier for a fixed
//! epoch budget, then looks at the final validation accuracy:
//!
//! - a strict improvement over the best so far resets the patience counter,
//!   anything else increments it;
//! - reaching the accuracy target ends the session as [`ControllerState::Converged`];
//! - exhausting patience, or the hard round cap, ends it as
//!   [`ControllerState::Stalled`]. A stall is an outcome, not an error.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::pipeline::dataset::Dataset;
use crate::pipeline::error::{PipelineError, Result};
use crate::training::classifier::{Classifier, EpochHistory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    Training,
    Evaluating,
    Converged,
    Stalled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    TargetReached,
    PatienceExhausted,
    RoundLimit,
}

/// Knobs the controller needs, split out of [`TrainingConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerConfig {
    pub epochs_per_round: usize,
    pub batch_size: usize,
    pub accuracy_target: f32,
    pub max_patience: usize,
    pub max_rounds: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for ControllerConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            epochs_per_round: config.epochs_per_round,
            batch_size: config.batch_size,
            accuracy_target: config.accuracy_target,
            max_patience: config.max_patience,
            max_rounds: config.max_rounds,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidBatchSize);
        }
        if self.epochs_per_round == 0 {
            return Err(PipelineError::InvalidConfig(
                "epochs_per_round must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.accuracy_target) {
            return Err(PipelineError::InvalidConfig(format!(
                "accuracy_target must lie in [0, 1], got {}",
                self.accuracy_target
            )));
        }
        if self.max_patience == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_patience must be at least 1".into(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_rounds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Halve the batch size when the training set is smaller than it, never below 1.
pub fn effective_batch_size(configured: usize, train_len: usize) -> Result<usize> {
    if configured == 0 {
        return Err(PipelineError::InvalidBatchSize);
    }
    if train_len < configured {
        let halved = (configured / 2).max(1);
        log::warn!(
            "training set ({train_len}) smaller than batch size {configured}; using {halved}"
        );
        return Ok(halved);
    }
    Ok(configured)
}

/// One completed call to [`Classifier::fit`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingRound {
    pub index: usize,
    pub batch_size: usize,
    pub history: EpochHistory,
    pub final_val_accuracy: f32,
    pub best_val_accuracy: f32,
    pub elapsed: Duration,
}

/// Mutable session bookkeeping, owned by the controller while it runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub best_accuracy: f32,
    pub patience_counter: usize,
    pub rounds: Vec<TrainingRound>,
}

/// Terminal result of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub state: ControllerState,
    pub reason: StopReason,
    pub run: RunState,
}

impl TrainingOutcome {
    pub fn converged(&self) -> bool {
        self.state == ControllerState::Converged
    }

    pub fn best_accuracy(&self) -> f32 {
        self.run.best_accuracy
    }

    pub fn rounds(&self) -> usize {
        self.run.rounds.len()
    }
}

pub struct TrainingController {
    config: ControllerConfig,
    state: ControllerState,
}

impl TrainingController {
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ControllerState::Training,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Drive `classifier` until it converges or stalls.
    ///
    /// Configuration and data problems are reported before the first round.
    /// Errors from the classifier abort the session.
    pub fn run<C: Classifier + ?Sized>(
        &mut self,
        classifier: &mut C,
        train: &Dataset,
        validation: &Dataset,
    ) -> Result<TrainingOutcome> {
        if train.is_empty() {
            return Err(PipelineError::EmptyPartition {
                partition: "training",
            });
        }
        if validation.is_empty() {
            return Err(PipelineError::EmptyPartition {
                partition: "validation",
            });
        }
        if train.num_classes() != validation.num_classes() {
            return Err(PipelineError::ClassCountMismatch {
                expected: train.num_classes(),
                actual: validation.num_classes(),
            });
        }
        if train.feature_shape() != validation.feature_shape() {
            return Err(PipelineError::FeatureShapeMismatch {
                expected: train.feature_shape(),
                actual: validation.feature_shape(),
            });
        }
        let batch_size = effective_batch_size(self.config.batch_size, train.len())?;
        let (train_x, train_y) = train.to_arrays();
        let (val_x, val_y) = validation.to_arrays();

        let mut run = RunState::default();
        self.state = ControllerState::Training;
        let reason = loop {
            if run.rounds.len() >= self.config.max_rounds {
                log::warn!(
                    "round limit {} reached with best accuracy {:.4}",
                    self.config.max_rounds,
                    run.best_accuracy
                );
                break StopReason::RoundLimit;
            }
            let index = run.rounds.len() + 1;
            self.state = ControllerState::Training;
            let started = Instant::now();
            let history = classifier.fit(
                train_x.view(),
                train_y.view(),
                val_x.view(),
                val_y.view(),
                self.config.epochs_per_round,
                batch_size,
            )?;
            let elapsed = started.elapsed();

            self.state = ControllerState::Evaluating;
            history.validate()?;
            let final_val_accuracy = history.final_val_accuracy().unwrap_or(0.0);
            let best_val_accuracy = history.best_val_accuracy().unwrap_or(0.0);
            let verdict = self.observe(&mut run, index, final_val_accuracy);
            run.rounds.push(TrainingRound {
                index,
                batch_size,
                history,
                final_val_accuracy,
                best_val_accuracy,
                elapsed,
            });
            if let Some(reason) = verdict {
                break reason;
            }
        };

        self.state = match reason {
            StopReason::TargetReached => ControllerState::Converged,
            StopReason::PatienceExhausted | StopReason::RoundLimit => ControllerState::Stalled,
        };
        log::info!(
            "training finished after {} rounds: {:?} ({:?}), best accuracy {:.4}",
            run.rounds.len(),
            self.state,
            reason,
            run.best_accuracy
        );
        Ok(TrainingOutcome {
            state: self.state,
            reason,
            run,
        })
    }

    /// Apply the transition rule for one round's validation accuracy.
    fn observe(&self, run: &mut RunState, round: usize, val_accuracy: f32) -> Option<StopReason> {
        if val_accuracy > run.best_accuracy {
            run.best_accuracy = val_accuracy;
            run.patience_counter = 0;
        } else {
            run.patience_counter += 1;
        }
        log::debug!(
            "round {round}: val accuracy {val_accuracy:.4}, best {:.4}, patience {}/{}",
            run.best_accuracy,
            run.patience_counter,
            self.config.max_patience
        );
        if run.best_accuracy >= self.config.accuracy_target {
            Some(StopReason::TargetReached)
        } else if run.patience_counter >= self.config.max_patience {
            Some(StopReason::PatienceExhausted)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::tests::dataset_with_counts;
    use crate::training::classifier::tests::ScriptedClassifier;

    fn controller(max_patience: usize, max_rounds: usize) -> TrainingController {
        TrainingController::new(ControllerConfig {
            epochs_per_round: 3,
            batch_size: 4,
            accuracy_target: 0.99,
            max_patience,
            max_rounds,
        })
        .unwrap()
    }

    fn data() -> (Dataset, Dataset) {
        (dataset_with_counts(&[4, 4], 2), dataset_with_counts(&[2, 2], 2))
    }

    #[test]
    fn plateau_stalls_after_patience_runs_out() {
        let (train, val) = data();
        let mut model = ScriptedClassifier::new(&[0.5, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6]);
        let mut ctl = controller(5, 100);
        let outcome = ctl.run(&mut model, &train, &val).unwrap();
        assert_eq!(outcome.state, ControllerState::Stalled);
        assert_eq!(outcome.reason, StopReason::PatienceExhausted);
        assert_eq!(outcome.best_accuracy(), 0.6);
        // last improvement in round 2, five flat rounds after it
        assert_eq!(outcome.rounds(), 7);
        assert_eq!(outcome.run.patience_counter, 5);
        assert_eq!(ctl.state(), ControllerState::Stalled);
    }

    #[test]
    fn six_round_plateau_with_patience_four() {
        let (train, val) = data();
        let mut model = ScriptedClassifier::new(&[0.5, 0.6, 0.6, 0.6, 0.6, 0.6]);
        let outcome = controller(4, 100).run(&mut model, &train, &val).unwrap();
        assert_eq!(outcome.state, ControllerState::Stalled);
        assert_eq!(outcome.rounds(), 6);
        assert_eq!(outcome.best_accuracy(), 0.6);
        assert!(model.script.is_empty());
    }

    #[test]
    fn converges_when_target_reached() {
        let (train, val) = data();
        let mut model = ScriptedClassifier::new(&[0.7, 0.95, 0.991, 0.2]);
        let outcome = controller(5, 100).run(&mut model, &train, &val).unwrap();
        assert!(outcome.converged());
        assert_eq!(outcome.reason, StopReason::TargetReached);
        assert_eq!(outcome.rounds(), 3);
        assert_eq!(model.script.len(), 1);
    }

    #[test]
    fn best_accuracy_is_monotonic_and_patience_resets() {
        let (train, val) = data();
        let script = [0.3, 0.2, 0.4, 0.35, 0.5, 0.1, 0.1, 0.1];
        let mut model = ScriptedClassifier::new(&script);
        let outcome = controller(3, 100).run(&mut model, &train, &val).unwrap();
        assert_eq!(outcome.rounds(), 8);
        let mut best = 0.0f32;
        for round in &outcome.run.rounds {
            assert!(round.final_val_accuracy <= 1.0);
            best = best.max(round.final_val_accuracy);
        }
        assert_eq!(outcome.best_accuracy(), best);
        assert_eq!(outcome.reason, StopReason::PatienceExhausted);
    }

    #[test]
    fn round_cap_ends_in_stalled() {
        let (train, val) = data();
        let improving: Vec<f32> = (1..=20).map(|i| i as f32 * 0.01).collect();
        let mut model = ScriptedClassifier::new(&improving);
        let outcome = controller(5, 10).run(&mut model, &train, &val).unwrap();
        assert_eq!(outcome.state, ControllerState::Stalled);
        assert_eq!(outcome.reason, StopReason::RoundLimit);
        assert_eq!(outcome.rounds(), 10);
        assert!((outcome.best_accuracy() - 0.10).abs() < 1e-6);
    }

    #[test]
    fn small_training_set_halves_batch_size() {
        let (train, val) = data();
        let mut model = ScriptedClassifier::new(&[1.0]);
        let mut ctl = TrainingController::new(ControllerConfig {
            batch_size: 32,
            ..ControllerConfig::default()
        })
        .unwrap();
        ctl.run(&mut model, &train, &val).unwrap();
        assert_eq!(model.calls, vec![(ControllerConfig::default().epochs_per_round, 16)]);
    }

    #[test]
    fn batch_size_policy() {
        assert_eq!(effective_batch_size(32, 100).unwrap(), 32);
        assert_eq!(effective_batch_size(32, 10).unwrap(), 16);
        assert_eq!(effective_batch_size(1, 0).unwrap(), 1);
        assert!(matches!(
            effective_batch_size(0, 10),
            Err(PipelineError::InvalidBatchSize)
        ));
    }

    #[test]
    fn classifier_errors_abort_the_session() {
        let (train, val) = data();
        let mut model = ScriptedClassifier::new(&[0.1]);
        let err = controller(5, 100).run(&mut model, &train, &val).unwrap_err();
        assert!(matches!(err, PipelineError::Classifier(_)));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        for config in [
            ControllerConfig {
                batch_size: 0,
                ..ControllerConfig::default()
            },
            ControllerConfig {
                max_patience: 0,
                ..ControllerConfig::default()
            },
            ControllerConfig {
                accuracy_target: 1.5,
                ..ControllerConfig::default()
            },
            ControllerConfig {
                max_rounds: 0,
                ..ControllerConfig::default()
            },
        ] {
            assert!(TrainingController::new(config).is_err());
        }
    }

    #[test]
    fn empty_partitions_fail_before_training() {
        let (train, _) = data();
        let mut model = ScriptedClassifier::new(&[0.5]);
        let empty = train.select(&[]);
        let err = controller(5, 100).run(&mut model, &train, &empty).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyPartition { .. }));
        assert!(model.calls.is_empty());
    }
}
