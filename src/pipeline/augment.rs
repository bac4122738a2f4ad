use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::pipeline::dataset::{Dataset, LabeledExample};
use crate::pipeline::error::{PipelineError, Result};

/// Doubles a dataset with Gaussian-jittered copies.
#[derive(Clone, Debug)]
pub struct Augmenter {
    noise: Normal<f32>,
}

impl Augmenter {
    pub fn new(noise_std: f32) -> Result<Self> {
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "noise standard deviation must be finite and non-negative, got {noise_std}"
            )));
        }
        let noise = Normal::new(0.0, noise_std)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        Ok(Self { noise })
    }

    pub fn noise_std(&self) -> f32 {
        self.noise.std_dev()
    }

    /// Emit every example followed by a perturbed copy with the same label, so
    /// examples `2i` and `2i + 1` both come from input example `i`.
    pub fn augment<R: Rng + ?Sized>(&self, dataset: &Dataset, rng: &mut R) -> Dataset {
        let mut examples = Vec::with_capacity(dataset.len() * 2);
        for example in dataset.examples() {
            let noisy = example.features.mapv(|v| v + self.noise.sample(rng));
            examples.push(example.clone());
            examples.push(LabeledExample {
                features: noisy,
                label: example.label.clone(),
            });
        }
        log::info!(
            "augmented {} examples to {} (noise std {})",
            dataset.len(),
            examples.len(),
            self.noise_std()
        );
        dataset.with_examples(examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::tests::dataset_with_counts;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn doubles_and_interleaves() {
        let dataset = dataset_with_counts(&[4, 3, 2], 3);
        let augmented = Augmenter::new(0.01)
            .unwrap()
            .augment(&dataset, &mut StdRng::seed_from_u64(7));
        assert_eq!(augmented.len(), 18);
        for (i, original) in dataset.examples().iter().enumerate() {
            assert_eq!(&augmented.examples()[2 * i], original);
            assert_eq!(augmented.examples()[2 * i + 1].label, original.label);
            assert_ne!(augmented.examples()[2 * i + 1].features, original.features);
        }
    }

    #[test]
    fn noise_is_zero_mean_at_configured_scale() {
        let dataset = dataset_with_counts(&[200], 4);
        let augmented = Augmenter::new(0.01)
            .unwrap()
            .augment(&dataset, &mut StdRng::seed_from_u64(11));
        let deltas: Vec<f32> = augmented
            .examples()
            .chunks(2)
            .flat_map(|pair| {
                (&pair[1].features - &pair[0].features)
                    .into_iter()
                    .collect::<Vec<_>>()
            })
            .collect();
        let n = deltas.len() as f32;
        let mean = deltas.iter().sum::<f32>() / n;
        let mean_abs = deltas.iter().map(|d| d.abs()).sum::<f32>() / n;
        assert!(mean.abs() < 1e-3);
        // E|N(0, s)| = s * sqrt(2 / pi)
        let expected = 0.01 * (2.0 / std::f32::consts::PI).sqrt();
        assert!((mean_abs - expected).abs() < 1e-3);
    }

    #[test]
    fn same_seed_same_output() {
        let dataset = dataset_with_counts(&[5, 5], 2);
        let augmenter = Augmenter::new(0.05).unwrap();
        let a = augmenter.augment(&dataset, &mut StdRng::seed_from_u64(3));
        let b = augmenter.augment(&dataset, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn negative_noise_is_rejected() {
        assert!(matches!(
            Augmenter::new(-1.0),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
