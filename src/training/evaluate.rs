use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::pipeline::dataset::{argmax, Dataset};
use crate::pipeline::error::{PipelineError, Result};
use crate::training::classifier::Classifier;

/// Aggregate and per-class scores on a labeled set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub examples: usize,
    pub overall_accuracy: f32,
    /// Only classes with at least one true example appear here.
    pub per_class_accuracy: BTreeMap<usize, f32>,
    /// True examples per class.
    pub support: Vec<usize>,
    /// Rows are true classes, columns predicted classes.
    pub confusion: Vec<Vec<usize>>,
    /// As reported by the classifier.
    pub loss: f32,
}

impl Metrics {
    pub fn from_predictions(
        predictions: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        loss: f32,
    ) -> Result<Self> {
        if predictions.dim() != labels.dim() {
            return Err(PipelineError::ClassifierContract(format!(
                "predictions shaped {:?} but labels shaped {:?}",
                predictions.dim(),
                labels.dim()
            )));
        }
        let num_classes = labels.ncols();
        let mut confusion = Array2::<usize>::zeros((num_classes, num_classes));
        for (prediction, label) in predictions.axis_iter(Axis(0)).zip(labels.axis_iter(Axis(0))) {
            confusion[[argmax(label), argmax(prediction)]] += 1;
        }
        let examples = labels.nrows();
        let correct: usize = (0..num_classes).map(|c| confusion[[c, c]]).sum();
        let support: Vec<usize> = confusion.axis_iter(Axis(0)).map(|row| row.sum()).collect();
        let per_class_accuracy = support
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(c, &n)| (c, confusion[[c, c]] as f32 / n as f32))
            .collect();
        let overall_accuracy = if examples == 0 {
            0.0
        } else {
            correct as f32 / examples as f32
        };
        Ok(Self {
            examples,
            overall_accuracy,
            per_class_accuracy,
            support,
            confusion: confusion.outer_iter().map(|row| row.to_vec()).collect(),
            loss,
        })
    }
}

/// Scores a trained classifier on a dataset.
pub struct Evaluator;

impl Evaluator {
    pub fn evaluate<C: Classifier + ?Sized>(classifier: &C, dataset: &Dataset) -> Result<Metrics> {
        let (features, labels) = dataset.to_arrays();
        let predictions = classifier.predict(features.view())?;
        let loss = classifier.loss(features.view(), labels.view())?;
        let metrics = Metrics::from_predictions(predictions.view(), labels.view(), loss)?;
        log::info!(
            "evaluated {} examples: accuracy {:.4}, loss {:.4}",
            metrics.examples,
            metrics.overall_accuracy,
            metrics.loss
        );
        Ok(metrics)
    }
}
