use ndarray::{Array2, ArrayView1, Axis};

use crate::pipeline::error::{PipelineError, Result};
use crate::pipeline::filter::SignalFilter;

/// Multichannel recording held fully in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalMatrix {
    data: Array2<f32>, // samples x channels
}

impl SignalMatrix {
    /// Wrap a `(samples, channels)` array, rejecting NaN/Inf entries.
    pub fn new(data: Array2<f32>) -> Result<Self> {
        let matrix = Self { data };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Build from channel-major buffers (`channels x samples`).
    pub fn from_channels(channels: &[Vec<f32>]) -> Result<Self> {
        let n_channels = channels.len();
        let n_samples = channels.first().map(|c| c.len()).unwrap_or(0);
        if let Some(ragged) = channels.iter().find(|c| c.len() != n_samples) {
            return Err(PipelineError::ChannelMismatch {
                expected: n_samples,
                actual: ragged.len(),
            });
        }
        let data = Array2::from_shape_fn((n_samples, n_channels), |(s, c)| channels[c][s]);
        Self::new(data)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(((sample, channel), _)) =
            self.data.indexed_iter().find(|(_, v)| !v.is_finite())
        {
            return Err(PipelineError::NonFiniteSample { sample, channel });
        }
        Ok(())
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn channel(&self, index: usize) -> ArrayView1<'_, f32> {
        self.data.column(index)
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn duration_seconds(&self, sample_rate_hz: f32) -> f32 {
        if sample_rate_hz <= 0.0 {
            return 0.0;
        }
        self.n_samples() as f32 / sample_rate_hz
    }

    /// Run `filter` over every channel and re-check the finite-sample invariant.
    pub fn filtered<F: SignalFilter + ?Sized>(&self, filter: &F) -> Result<Self> {
        let mut data = Array2::zeros(self.data.raw_dim());
        for (index, mut column) in data.axis_iter_mut(Axis(1)).enumerate() {
            let samples = self.channel(index).to_vec();
            let out = filter.filter(&samples);
            if out.len() != samples.len() {
                return Err(PipelineError::ChannelMismatch {
                    expected: samples.len(),
                    actual: out.len(),
                });
            }
            column.assign(&ArrayView1::from(&out[..]));
        }
        Self::new(data)
    }
}
