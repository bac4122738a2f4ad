use std::sync::Arc;

use ndarray::ArrayView1;
use rustfft::{num_complex::Complex32, Fft, FftPlanner};

/// Forward FFT planned once for a fixed window length.
///
/// The plan is immutable and `Send + Sync`, so a single instance serves every
/// feature-extraction worker.
#[derive(Clone)]
pub struct SpectrumBuilder {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumBuilder {
    pub fn with_size(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self { fft_size, fft }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Unnormalized magnitudes of the full (two-sided) spectrum.
    ///
    /// Shorter inputs are zero-padded and longer ones truncated to `fft_size`.
    pub fn magnitudes(&self, channel: ArrayView1<'_, f32>) -> Vec<f32> {
        let mut buffer: Vec<Complex32> = channel
            .iter()
            .copied()
            .take(self.fft_size)
            .map(|v| Complex32::new(v, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex32::new(0.0, 0.0));
        self.fft.process(&mut buffer);
        buffer.iter().map(|c| c.norm()).collect()
    }

    /// Mean of [`SpectrumBuilder::magnitudes`]; zero for an empty plan.
    pub fn mean_magnitude(&self, channel: ArrayView1<'_, f32>) -> f32 {
        if self.fft_size == 0 {
            return 0.0;
        }
        self.magnitudes(channel).iter().sum::<f32>() / self.fft_size as f32
    }
}

impl std::fmt::Debug for SpectrumBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumBuilder")
            .field("fft_size", &self.fft_size)
            .finish()
    }
}
