use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::pipeline::augment::Augmenter;
use crate::pipeline::balance::balance;
use crate::pipeline::dataset::Dataset;
use crate::pipeline::error::{PipelineError, Result};
use crate::pipeline::features::FeatureExtractor;
use crate::pipeline::filter::FilterChain;
use crate::pipeline::matrix::SignalMatrix;
use crate::pipeline::scaler::FittedScaler;
use crate::pipeline::segment::segment;
use crate::pipeline::split::split;
use crate::training::classifier::Classifier;
use crate::training::controller::{ControllerConfig, TrainingController, TrainingOutcome};
use crate::training::evaluate::{Evaluator, Metrics};

/// Standardized partitions plus the scaler fitted on the training side.
#[derive(Clone, Debug)]
pub struct PreparedData {
    pub train: Dataset,
    pub validation: Dataset,
    pub scaler: FittedScaler,
}

/// Raw matrix to standardized train/validation datasets.
///
/// `labels` must hold one one-hot row per window, aligned with
/// [`segment`](crate::pipeline::segment::segment).
pub fn prepare_datasets<R: Rng + ?Sized>(
    matrix: &SignalMatrix,
    labels: Array2<f32>,
    config: &TrainingConfig,
    rng: &mut R,
) -> Result<PreparedData> {
    config.validate()?;
    log::info!(
        "preparing {:.1} s recording ({} samples x {} channels)",
        matrix.duration_seconds(config.sample_rate_hz),
        matrix.n_samples(),
        matrix.n_channels()
    );
    let filtered;
    let matrix = if config.filters.is_empty() {
        matrix
    } else {
        let chain = FilterChain::from_kinds(config.sample_rate_hz, &config.filters)?;
        log::debug!("applying {} filter sections", chain.len());
        filtered = matrix.filtered(&chain)?;
        &filtered
    };

    let segments = segment(matrix, config.window_size)?;
    if segments.is_empty() {
        return Err(PipelineError::NoWindows {
            samples: matrix.n_samples(),
            window_size: config.window_size,
        });
    }
    let extractor = FeatureExtractor::new(config.window_size, matrix.n_channels())?;
    let features = extractor.extract_parallel(&segments, config.feature_workers)?;
    log::info!(
        "extracted features for {} windows x {} channels",
        features.len(),
        matrix.n_channels()
    );
    let dataset = Dataset::new(features, labels)?;

    let augmented = Augmenter::new(config.noise_std)?.augment(&dataset, rng);
    let balanced = balance(&augmented, rng)?;
    let parts = split(&balanced, config.test_fraction, rng)?;

    let scaler = FittedScaler::fit(&parts.train)?;
    Ok(PreparedData {
        train: scaler.transform(&parts.train)?,
        validation: scaler.transform(&parts.test)?,
        scaler,
    })
}

/// What a session hands to reporting collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub outcome: TrainingOutcome,
    pub metrics: Metrics,
    pub train_examples: usize,
    pub validation_examples: usize,
}

impl SessionReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(PipelineError::Serialize)
    }
}

/// Prepare data, train until converged or stalled, then score the validation set.
pub fn run_session<C: Classifier + ?Sized>(
    matrix: &SignalMatrix,
    labels: Array2<f32>,
    classifier: &mut C,
    config: &TrainingConfig,
) -> Result<SessionReport> {
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let prepared = prepare_datasets(matrix, labels, config, &mut rng)?;
    let mut controller = TrainingController::new(ControllerConfig::from(config))?;
    log::info!(
        "training {} examples against {} validation examples with {:?}",
        prepared.train.len(),
        prepared.validation.len(),
        controller.config()
    );
    let outcome = controller.run(classifier, &prepared.train, &prepared.validation)?;
    let metrics = Evaluator::evaluate(&*classifier, &prepared.validation)?;
    Ok(SessionReport {
        outcome,
        metrics,
        train_examples: prepared.train.len(),
        validation_examples: prepared.validation.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::one_hot;
    use crate::pipeline::error::ErrorKind;
    use crate::pipeline::filter::FilterKind;
    use crate::pipeline::segment::{segment_count, window_labels};
    use crate::training::classifier::tests::{CentroidClassifier, ScriptedClassifier};
    use crate::training::controller::{ControllerState, StopReason};
    use std::f32::consts::PI;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Four channels; the class sets the offset and amplitude of a 10 Hz tone on
    /// channel 0, the other channels hold constant offsets.
    fn recording(classes: &[usize], window_size: usize) -> SignalMatrix {
        let stride = window_size / 2;
        let n_samples = (classes.len() - 1) * stride + window_size;
        let data = Array2::from_shape_fn((n_samples, 4), |(s, c)| {
            if c == 0 {
                let class = classes[(s / stride).min(classes.len() - 1)] as f32;
                3.0 * class + (2.0 * PI * 10.0 * s as f32 / 250.0).sin() * (1.0 + 4.0 * class)
            } else {
                c as f32
            }
        });
        SignalMatrix::new(data).unwrap()
    }

    #[test]
    fn pipeline_counts_follow_the_stages() {
        init_logger();
        // 1000 samples, window 100 -> 19 windows with classes 10/6/3
        let classes: Vec<usize> = [0; 10].into_iter().chain([1; 6]).chain([2; 3]).collect();
        let data = Array2::from_shape_fn((1000, 4), |(s, c)| ((s + c) as f32 * 0.1).sin());
        let matrix = SignalMatrix::new(data).unwrap();
        assert_eq!(segment_count(matrix.n_samples(), 100), 19);

        let config = TrainingConfig {
            window_size: 100,
            test_fraction: 0.2,
            ..TrainingConfig::default()
        };
        let prepared = prepare_datasets(
            &matrix,
            one_hot(&classes, 3).unwrap(),
            &config,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        // 19 -> 38 augmented (20/12/6) -> 60 balanced -> 48 / 12
        assert_eq!(prepared.train.len() + prepared.validation.len(), 60);
        assert_eq!(prepared.validation.class_counts(), vec![4, 4, 4]);
        assert_eq!(prepared.train.class_counts(), vec![16, 16, 16]);
        assert_eq!(prepared.train.feature_shape(), (4, 5));
    }

    #[test]
    fn label_misalignment_is_a_shape_error() {
        let data = Array2::from_shape_fn((1000, 2), |(s, _)| s as f32);
        let matrix = SignalMatrix::new(data).unwrap();
        let err = prepare_datasets(
            &matrix,
            one_hot(&[0; 18], 1).unwrap(),
            &TrainingConfig::default(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn recording_shorter_than_a_window_is_reported() {
        let matrix = SignalMatrix::new(Array2::zeros((60, 2))).unwrap();
        let err = prepare_datasets(
            &matrix,
            one_hot(&[], 1).unwrap(),
            &TrainingConfig::default(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoWindows {
                samples: 60,
                window_size: 100
            }
        ));
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn filters_at_an_unusable_sample_rate_fail_cleanly() {
        let matrix = recording(&[0, 1, 0, 1], 100);
        let labels = one_hot(&[0, 1, 0, 1], 2).unwrap();
        let config = TrainingConfig {
            sample_rate_hz: 0.01,
            filters: vec![FilterKind::Notch {
                freq_hz: 50.0,
                q: 30.0,
            }],
            ..TrainingConfig::default()
        };
        let err = prepare_datasets(&matrix, labels, &config, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_class_is_reported_before_training() {
        let data = Array2::from_shape_fn((1000, 2), |(s, _)| (s as f32).cos());
        let matrix = SignalMatrix::new(data).unwrap();
        let labels = one_hot(&[0; 19], 2).unwrap();
        let mut model = ScriptedClassifier::new(&[0.5]);
        let err = run_session(&matrix, labels, &mut model, &TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyClass { class: 1 }));
        assert!(model.calls.is_empty());
    }

    #[test]
    fn separable_recording_converges_end_to_end() {
        init_logger();
        // long runs so only the two windows straddling a class change are mixed
        let classes: Vec<usize> = (0..60).map(|i| i / 20).collect();
        let matrix = recording(&classes, 100);
        let labels = one_hot(&classes, 3).unwrap();
        let config = TrainingConfig {
            epochs_per_round: 2,
            batch_size: 16,
            accuracy_target: 0.8,
            noise_std: 0.0,
            feature_workers: 3,
            ..TrainingConfig::default()
        };
        let mut model = CentroidClassifier::default();
        let report = run_session(&matrix, labels, &mut model, &config).unwrap();
        assert_eq!(report.outcome.state, ControllerState::Converged);
        assert_eq!(report.outcome.reason, StopReason::TargetReached);
        assert!(report.metrics.overall_accuracy >= 0.8);
        assert_eq!(report.metrics.per_class_accuracy.len(), 3);
        assert_eq!(report.train_examples + report.validation_examples, 120);

        let json = report.to_json().unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.outcome.run.rounds.len(), report.outcome.rounds());
    }

    #[test]
    fn configured_filters_run_before_segmentation() {
        let classes: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let matrix = recording(&classes, 100);
        let labels = one_hot(&classes, 2).unwrap();
        let plain = TrainingConfig::default();
        let filtered = TrainingConfig {
            filters: vec![FilterKind::Highpass {
                cutoff_hz: 1.0,
                q: 0.707,
            }],
            ..TrainingConfig::default()
        };
        let a = prepare_datasets(&matrix, labels.clone(), &plain, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = prepare_datasets(&matrix, labels, &filtered, &mut StdRng::seed_from_u64(3))
            .unwrap();
        // the highpass strips the DC offsets on channels 1..4
        assert!((a.scaler.mean()[5] - 1.0).abs() < 0.05);
        assert!(b.scaler.mean()[5].abs() < 0.5);
    }

    #[test]
    fn same_seed_prepares_identical_data() {
        let classes: Vec<usize> = (0..30).map(|i| i % 2).collect();
        let matrix = recording(&classes, 50);
        let config = TrainingConfig {
            window_size: 50,
            ..TrainingConfig::default()
        };
        let labels = one_hot(&classes, 2).unwrap();
        let a = prepare_datasets(&matrix, labels.clone(), &config, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = prepare_datasets(&matrix, labels, &config, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.validation, b.validation);
        assert_eq!(a.scaler, b.scaler);
    }

    #[test]
    fn window_labels_align_with_segmentation() {
        let per_sample: Vec<usize> = (0..1000).map(|s| if s < 500 { 0 } else { 1 }).collect();
        let labels = window_labels(&per_sample, 100, 2).unwrap();
        assert_eq!(labels.nrows(), 19);
        let data = Array2::from_shape_fn((1000, 2), |(s, c)| (s * (c + 1)) as f32 * 0.01);
        let matrix = SignalMatrix::new(data).unwrap();
        let prepared = prepare_datasets(
            &matrix,
            labels,
            &TrainingConfig::default(),
            &mut StdRng::seed_from_u64(4),
        )
        .unwrap();
        assert_eq!(prepared.train.num_classes(), 2);
    }
}
