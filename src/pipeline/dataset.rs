use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::pipeline::error::{PipelineError, Result};
use crate::pipeline::features::FeatureSet;

/// One window's features paired with its one-hot label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledExample {
    pub features: FeatureSet,
    pub label: Array1<f32>,
}

impl LabeledExample {
    /// Index of the hot entry.
    pub fn class(&self) -> usize {
        argmax(self.label.view())
    }
}

/// Ordered, validated collection of examples sharing one feature shape and one
/// label width. Stages never mutate a dataset; they build a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    examples: Vec<LabeledExample>,
    feature_shape: (usize, usize),
    num_classes: usize,
}

impl Dataset {
    /// Pair features with rows of a one-hot label matrix.
    pub fn new(features: Vec<FeatureSet>, labels: Array2<f32>) -> Result<Self> {
        if features.len() != labels.nrows() {
            return Err(PipelineError::LabelCountMismatch {
                examples: features.len(),
                labels: labels.nrows(),
            });
        }
        let num_classes = labels.ncols();
        let examples = features
            .into_iter()
            .zip(labels.axis_iter(Axis(0)))
            .map(|(features, label)| LabeledExample {
                features,
                label: label.to_owned(),
            })
            .collect();
        Self::from_examples(examples, num_classes)
    }

    pub fn from_examples(examples: Vec<LabeledExample>, num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            return Err(PipelineError::InvalidConfig(
                "label matrix has no classes".into(),
            ));
        }
        let feature_shape = examples.first().map(|e| e.features.dim()).unwrap_or((0, 0));
        for (row, example) in examples.iter().enumerate() {
            if example.features.dim() != feature_shape {
                return Err(PipelineError::FeatureShapeMismatch {
                    expected: feature_shape,
                    actual: example.features.dim(),
                });
            }
            if example.label.len() != num_classes || !is_one_hot(example.label.view()) {
                return Err(PipelineError::InvalidLabel { row });
            }
        }
        Ok(Self {
            examples,
            feature_shape,
            num_classes,
        })
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// `(channels, features per channel)` shared by every example.
    pub fn feature_shape(&self) -> (usize, usize) {
        self.feature_shape
    }

    pub fn flat_width(&self) -> usize {
        self.feature_shape.0 * self.feature_shape.1
    }

    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for example in &self.examples {
            counts[example.class()] += 1;
        }
        counts
    }

    /// Example indices grouped by class.
    pub fn indices_by_class(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.num_classes];
        for (index, example) in self.examples.iter().enumerate() {
            groups[example.class()].push(index);
        }
        groups
    }

    /// Flattened `(examples, channels * arity)` features and `(examples, classes)`
    /// labels, ready for a classifier.
    pub fn to_arrays(&self) -> (Array2<f32>, Array2<f32>) {
        let width = self.flat_width();
        let mut features = Array2::zeros((self.len(), width));
        let mut labels = Array2::zeros((self.len(), self.num_classes));
        for (i, example) in self.examples.iter().enumerate() {
            features
                .row_mut(i)
                .iter_mut()
                .zip(example.features.iter())
                .for_each(|(dst, src)| *dst = *src);
            labels.row_mut(i).assign(&example.label);
        }
        (features, labels)
    }

    /// New dataset over `indices` (repeats allowed), in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            examples: indices.iter().map(|&i| self.examples[i].clone()).collect(),
            feature_shape: self.feature_shape,
            num_classes: self.num_classes,
        }
    }

    pub(crate) fn with_examples(&self, examples: Vec<LabeledExample>) -> Self {
        Self {
            examples,
            feature_shape: self.feature_shape,
            num_classes: self.num_classes,
        }
    }
}

pub(crate) fn argmax(values: ArrayView1<'_, f32>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

fn is_one_hot(label: ArrayView1<'_, f32>) -> bool {
    let ones = label.iter().filter(|&&v| v == 1.0).count();
    let zeros = label.iter().filter(|&&v| v == 0.0).count();
    ones == 1 && ones + zeros == label.len()
}

/// One-hot matrix for a list of class indices.
pub fn one_hot(classes: &[usize], num_classes: usize) -> Result<Array2<f32>> {
    let mut labels = Array2::zeros((classes.len(), num_classes));
    for (row, &class) in classes.iter().enumerate() {
        if class >= num_classes {
            return Err(PipelineError::InvalidLabel { row });
        }
        labels[[row, class]] = 1.0;
    }
    Ok(labels)
}
