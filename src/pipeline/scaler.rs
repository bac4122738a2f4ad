use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::pipeline::dataset::{Dataset, LabeledExample};
use crate::pipeline::error::{PipelineError, Result};

/// Per-feature standardization fitted once on training data.
///
/// The scaler is an immutable value; apply the same instance to the training,
/// validation and any later inference features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    feature_shape: (usize, usize),
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl FittedScaler {
    pub fn fit(dataset: &Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(PipelineError::EmptyPartition {
                partition: "training",
            });
        }
        let (features, _) = dataset.to_arrays();
        let n = features.nrows() as f32;
        let mean: Array1<f32> = features.sum_axis(Axis(0)) / n;
        let variance = features
            .axis_iter(Axis(0))
            .fold(Array1::<f32>::zeros(mean.len()), |acc, row| {
                let delta = &row - &mean;
                acc + &delta * &delta
            })
            / n;
        let scale = variance
            .iter()
            .map(|v| {
                let std = v.max(0.0).sqrt();
                // rounding noise on a constant column is not spread
                if std > 10.0 * f32::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Ok(Self {
            feature_shape: dataset.feature_shape(),
            mean: mean.to_vec(),
            scale,
        })
    }

    pub fn feature_shape(&self) -> (usize, usize) {
        self.feature_shape
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn scale(&self) -> &[f32] {
        &self.scale
    }

    /// Standardize flattened `(examples, channels * arity)` features.
    pub fn transform_array(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if features.ncols() != self.mean.len() {
            return Err(PipelineError::FeatureShapeMismatch {
                expected: (features.nrows(), self.mean.len()),
                actual: features.dim(),
            });
        }
        let mut out = features.to_owned();
        for mut row in out.rows_mut() {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = (*v - m) / s;
            }
        }
        Ok(out)
    }

    pub fn transform(&self, dataset: &Dataset) -> Result<Dataset> {
        if dataset.feature_shape() != self.feature_shape && !dataset.is_empty() {
            return Err(PipelineError::FeatureShapeMismatch {
                expected: self.feature_shape,
                actual: dataset.feature_shape(),
            });
        }
        let examples = dataset
            .examples()
            .iter()
            .map(|example| {
                let mut features = example.features.clone();
                features
                    .iter_mut()
                    .zip(self.mean.iter().zip(&self.scale))
                    .for_each(|(v, (m, s))| *v = (*v - m) / s);
                LabeledExample {
                    features,
                    label: example.label.clone(),
                }
            })
            .collect();
        Ok(dataset.with_examples(examples))
    }
}
