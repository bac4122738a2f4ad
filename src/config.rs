use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::error::{PipelineError, Result};
use crate::pipeline::filter::{FilterKind, MIN_SAMPLE_RATE_HZ};

/// Every tunable of a training session. Missing JSON fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Samples per window; consecutive windows overlap by half.
    pub window_size: usize,
    /// Share of each class held out for validation, in `(0, 1)`.
    pub test_fraction: f32,
    pub epochs_per_round: usize,
    pub batch_size: usize,
    pub accuracy_target: f32,
    /// Consecutive non-improving rounds tolerated before stalling.
    pub max_patience: usize,
    /// Hard ceiling on training rounds.
    pub max_rounds: usize,
    pub random_seed: u64,
    /// Standard deviation of the augmentation jitter.
    pub noise_std: f32,
    pub sample_rate_hz: f32,
    /// Applied to every channel before segmentation.
    pub filters: Vec<FilterKind>,
    /// Threads used for feature extraction.
    pub feature_workers: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            test_fraction: 0.2,
            epochs_per_round: 50,
            batch_size: 32,
            accuracy_target: 0.99,
            max_patience: 5,
            max_rounds: 100,
            random_seed: 42,
            noise_std: 0.01,
            sample_rate_hz: 250.0,
            filters: Vec::new(),
            feature_workers: 1,
        }
    }
}

impl TrainingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(PipelineError::Serialize)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(PipelineError::InvalidWindowSize);
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::InvalidTestFraction(self.test_fraction));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidBatchSize);
        }
        if self.epochs_per_round == 0 {
            return Err(invalid("epochs_per_round must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.accuracy_target) {
            return Err(invalid("accuracy_target must lie in [0, 1]"));
        }
        if self.max_patience == 0 {
            return Err(invalid("max_patience must be at least 1"));
        }
        if self.max_rounds == 0 {
            return Err(invalid("max_rounds must be at least 1"));
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(invalid("noise_std must be finite and non-negative"));
        }
        if !self.filters.is_empty() && !(self.sample_rate_hz >= MIN_SAMPLE_RATE_HZ) {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_rate_hz must be at least {MIN_SAMPLE_RATE_HZ} when filters are configured, got {}",
                self.sample_rate_hz
            )));
        }
        if self.feature_workers == 0 {
            return Err(invalid("feature_workers must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> PipelineError {
    PipelineError::InvalidConfig(message.to_string())
}
