//! Per-window, per-channel summary features.
//!
//! Each window becomes a `(channels, FEATURE_ARITY)` matrix with columns
//! `mean, std, max, min, mean spectral magnitude`. Windows are independent, so
//! extraction can be spread across a rayon pool without any shared mutable state.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::pipeline::error::{PipelineError, Result};
use crate::pipeline::fft::SpectrumBuilder;
use crate::pipeline::segment::Segment;

/// Number of features computed for every channel.
pub const FEATURE_ARITY: usize = 5;

/// Features for one window: `channels x FEATURE_ARITY`.
pub type FeatureSet = Array2<f32>;

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    n_channels: usize,
    spectrum: SpectrumBuilder,
}

impl FeatureExtractor {
    pub fn new(window_size: usize, n_channels: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(PipelineError::InvalidWindowSize);
        }
        Ok(Self {
            n_channels,
            spectrum: SpectrumBuilder::with_size(window_size),
        })
    }

    pub fn window_size(&self) -> usize {
        self.spectrum.fft_size()
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Features for a single window.
    pub fn extract_one(&self, segment: &Segment) -> Result<FeatureSet> {
        if segment.n_channels() != self.n_channels {
            return Err(PipelineError::ChannelMismatch {
                expected: self.n_channels,
                actual: segment.n_channels(),
            });
        }
        if segment.len() != self.window_size() {
            return Err(PipelineError::FeatureShapeMismatch {
                expected: (self.window_size(), self.n_channels),
                actual: segment.samples.dim(),
            });
        }
        let mut features = Array2::zeros((self.n_channels, FEATURE_ARITY));
        for (channel, mut row) in features.rows_mut().into_iter().enumerate() {
            let samples = segment.samples.column(channel);
            let (mean, std, max, min) = time_domain(samples);
            row[0] = mean;
            row[1] = std;
            row[2] = max;
            row[3] = min;
            row[4] = self.spectrum.mean_magnitude(samples);
        }
        Ok(features)
    }

    /// Features for every window, in window order.
    pub fn extract(&self, segments: &[Segment]) -> Result<Vec<FeatureSet>> {
        segments.iter().map(|s| self.extract_one(s)).collect()
    }

    /// Same result as [`FeatureExtractor::extract`], computed on a dedicated pool
    /// of `workers` threads. Output keeps window order.
    pub fn extract_parallel(&self, segments: &[Segment], workers: usize) -> Result<Vec<FeatureSet>> {
        let workers = workers.max(1).min(segments.len().max(1));
        if workers == 1 {
            return self.extract(segments);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("feature-worker-{i}"))
            .build()?;
        log::debug!("extracting {} windows on {workers} workers", segments.len());
        pool.install(|| {
            segments
                .par_iter()
                .map(|s| self.extract_one(s))
                .collect::<Result<Vec<_>>>()
        })
    }
}

// Mean, population std, max, min. A constant channel gives std = 0.
fn time_domain(samples: ArrayView1<'_, f32>) -> (f32, f32, f32, f32) {
    let n = samples.len();
    if n == 0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let mean = samples.sum() / n as f32;
    let variance = samples
        .iter()
        .map(|v| {
            let delta = v - mean;
            delta * delta
        })
        .sum::<f32>()
        / n as f32;
    let max = samples.iter().copied().fold(f32::MIN, f32::max);
    let min = samples.iter().copied().fold(f32::MAX, f32::min);
    (mean, variance.max(0.0).sqrt(), max, min)
}
