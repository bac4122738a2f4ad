use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::pipeline::error::{PipelineError, Result};

/// Per-epoch curves reported by one call to [`Classifier::fit`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochHistory {
    pub accuracy: Vec<f32>,
    pub val_accuracy: Vec<f32>,
    pub loss: Vec<f32>,
    pub val_loss: Vec<f32>,
}

impl EpochHistory {
    pub fn epochs(&self) -> usize {
        self.val_accuracy.len()
    }

    /// Checks that the history is non-empty, that all four curves have the same
    /// length, and that the validation accuracies lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let epochs = self.val_accuracy.len();
        if epochs == 0 {
            return Err(PipelineError::ClassifierContract(
                "fit returned an empty history".into(),
            ));
        }
        if [self.accuracy.len(), self.loss.len(), self.val_loss.len()]
            .iter()
            .any(|&len| len != epochs)
        {
            return Err(PipelineError::ClassifierContract(format!(
                "ragged history: accuracy {}, val_accuracy {epochs}, loss {}, val_loss {}",
                self.accuracy.len(),
                self.loss.len(),
                self.val_loss.len()
            )));
        }
        if let Some(bad) = self
            .val_accuracy
            .iter()
            .find(|a| !a.is_finite() || **a < 0.0 || **a > 1.0)
        {
            return Err(PipelineError::ClassifierContract(format!(
                "validation accuracy {bad} outside [0, 1]"
            )));
        }
        Ok(())
    }

    /// Validation accuracy after the last epoch.
    pub fn final_val_accuracy(&self) -> Option<f32> {
        self.val_accuracy.last().copied()
    }

    pub fn best_val_accuracy(&self) -> Option<f32> {
        self.val_accuracy.iter().copied().reduce(f32::max)
    }
}

/// The trainable model the controller drives.
///
/// Features are flattened to `(examples, channels * arity)` and labels are one-hot
/// `(examples, classes)`. The backing tensor library and network architecture are
/// the implementor's business.
pub trait Classifier {
    /// Train for `epochs` epochs on mini-batches of `batch_size`, validating after
    /// each epoch.
    fn fit(
        &mut self,
        train_features: ArrayView2<'_, f32>,
        train_labels: ArrayView2<'_, f32>,
        val_features: ArrayView2<'_, f32>,
        val_labels: ArrayView2<'_, f32>,
        epochs: usize,
        batch_size: usize,
    ) -> anyhow::Result<EpochHistory>;

    /// One class-probability row per input row.
    fn predict(&self, features: ArrayView2<'_, f32>) -> anyhow::Result<Array2<f32>>;

    /// The model's own loss on a labeled set.
    fn loss(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
    ) -> anyhow::Result<f32>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn fit(
        &mut self,
        train_features: ArrayView2<'_, f32>,
        train_labels: ArrayView2<'_, f32>,
        val_features: ArrayView2<'_, f32>,
        val_labels: ArrayView2<'_, f32>,
        epochs: usize,
        batch_size: usize,
    ) -> anyhow::Result<EpochHistory> {
        (**self).fit(
            train_features,
            train_labels,
            val_features,
            val_labels,
            epochs,
            batch_size,
        )
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> anyhow::Result<Array2<f32>> {
        (**self).predict(features)
    }

    fn loss(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
    ) -> anyhow::Result<f32> {
        (**self).loss(features, labels)
    }
}
