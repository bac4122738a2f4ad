use rand::seq::SliceRandom;
use rand::Rng;

use crate::pipeline::dataset::Dataset;
use crate::pipeline::error::{PipelineError, Result};

/// Train/test partition produced by [`split`].
#[derive(Clone, Debug, PartialEq)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// Number of a class's examples sent to the test partition.
///
/// Rounds `count * test_fraction` to the nearest integer, keeping at least one
/// example of every class in training when the class has more than one.
pub fn test_quota(count: usize, test_fraction: f32) -> usize {
    let quota = (count as f64 * test_fraction as f64).round() as usize;
    if count > 1 {
        quota.min(count - 1)
    } else {
        quota.min(count)
    }
}

/// Stratified split: each class contributes [`test_quota`] randomly chosen
/// examples to `test`, the rest go to `train`. Both partitions are shuffled.
pub fn split<R: Rng + ?Sized>(dataset: &Dataset, test_fraction: f32, rng: &mut R) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidTestFraction(test_fraction));
    }
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (class, mut members) in dataset.indices_by_class().into_iter().enumerate() {
        if members.is_empty() {
            return Err(PipelineError::EmptyClass { class });
        }
        members.shuffle(rng);
        let quota = test_quota(members.len(), test_fraction);
        test.extend_from_slice(&members[..quota]);
        train.extend_from_slice(&members[quota..]);
    }
    train.shuffle(rng);
    test.shuffle(rng);
    log::info!(
        "stratified split: {} train / {} test (test fraction {test_fraction})",
        train.len(),
        test.len()
    );
    Ok(Split {
        train: dataset.select(&train),
        test: dataset.select(&test),
    })
}
