use rand::Rng;

use crate::pipeline::dataset::Dataset;
use crate::pipeline::error::{PipelineError, Result};

/// Bootstrap-oversample every minority class up to the majority count.
///
/// Output is grouped by class index, ascending; within a class the original
/// examples come first, then the resampled ones. No example is ever dropped.
/// An empty class cannot be oversampled and is reported as
/// [`PipelineError::EmptyClass`].
pub fn balance<R: Rng + ?Sized>(dataset: &Dataset, rng: &mut R) -> Result<Dataset> {
    let groups = dataset.indices_by_class();
    if let Some(class) = groups.iter().position(|g| g.is_empty()) {
        log::warn!("class {class} has no examples; refusing to balance");
        return Err(PipelineError::EmptyClass { class });
    }
    let target = groups.iter().map(Vec::len).max().unwrap_or(0);
    let mut order = Vec::with_capacity(target * groups.len());
    for (class, members) in groups.iter().enumerate() {
        order.extend_from_slice(members);
        let deficit = target - members.len();
        if deficit > 0 {
            log::debug!("class {class}: oversampling {deficit} examples");
        }
        order.extend((0..deficit).map(|_| members[rng.gen_range(0..members.len())]));
    }
    log::info!(
        "balanced {} classes to {target} examples each ({} -> {})",
        groups.len(),
        dataset.len(),
        order.len()
    );
    Ok(dataset.select(&order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::tests::dataset_with_counts;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn equalizes_to_majority_count() {
        let dataset = dataset_with_counts(&[10, 6, 3], 4);
        let balanced = balance(&dataset, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(balanced.len(), 30);
        assert_eq!(balanced.class_counts(), vec![10, 10, 10]);
    }

    #[test]
    fn keeps_every_original_and_groups_by_class() {
        let dataset = dataset_with_counts(&[2, 5, 1], 1);
        let balanced = balance(&dataset, &mut StdRng::seed_from_u64(9)).unwrap();
        let classes: Vec<usize> = balanced.examples().iter().map(|e| e.class()).collect();
        let mut sorted = classes.clone();
        sorted.sort_unstable();
        assert_eq!(classes, sorted);
        for original in dataset.examples() {
            assert!(balanced.examples().contains(original));
        }
        // oversampled copies come from their own class
        for example in balanced.examples() {
            let source = example.features[[0, 0]] as usize;
            assert_eq!(dataset.examples()[source].class(), example.class());
        }
    }

    #[test]
    fn already_balanced_is_unchanged() {
        let dataset = dataset_with_counts(&[3, 3], 2);
        let balanced = balance(&dataset, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(balanced, dataset);
    }

    #[test]
    fn empty_class_is_reported() {
        let dataset = dataset_with_counts(&[4, 0, 2], 2);
        assert!(matches!(
            balance(&dataset, &mut StdRng::seed_from_u64(0)),
            Err(PipelineError::EmptyClass { class: 1 })
        ));
    }
}
