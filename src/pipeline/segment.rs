use ndarray::{s, Array2};

use crate::pipeline::error::{PipelineError, Result};
use crate::pipeline::matrix::SignalMatrix;

/// Contiguous window cut from a [`SignalMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub start: usize,
    pub samples: Array2<f32>, // window_size x channels
}

impl Segment {
    pub fn n_channels(&self) -> usize {
        self.samples.ncols()
    }

    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Offset between consecutive window starts (50% overlap).
///
/// A single-sample window would give a zero stride, so it is raised to one.
pub fn stride_for(window_size: usize) -> usize {
    (window_size / 2).max(1)
}

/// Number of full windows that fit in `n_samples`.
pub fn segment_count(n_samples: usize, window_size: usize) -> usize {
    if window_size == 0 || n_samples < window_size {
        return 0;
    }
    (n_samples - window_size) / stride_for(window_size) + 1
}

/// Slice `matrix` into overlapping windows. The trailing partial window is dropped.
pub fn segment(matrix: &SignalMatrix, window_size: usize) -> Result<Vec<Segment>> {
    if window_size == 0 {
        return Err(PipelineError::InvalidWindowSize);
    }
    let stride = stride_for(window_size);
    let count = segment_count(matrix.n_samples(), window_size);
    let segments: Vec<Segment> = (0..count)
        .map(|i| {
            let start = i * stride;
            Segment {
                start,
                samples: matrix
                    .data()
                    .slice(s![start..start + window_size, ..])
                    .to_owned(),
            }
        })
        .collect();
    log::debug!(
        "segmented {} samples into {} windows (size {window_size}, stride {stride})",
        matrix.n_samples(),
        segments.len()
    );
    Ok(segments)
}

/// One-hot label per window, taken as the majority class of the window's samples.
///
/// Windows follow [`segment`] exactly, so the result aligns row-for-row with its
/// output. Ties resolve to the lowest class index.
pub fn window_labels(
    sample_classes: &[usize],
    window_size: usize,
    num_classes: usize,
) -> Result<Array2<f32>> {
    if window_size == 0 {
        return Err(PipelineError::InvalidWindowSize);
    }
    if num_classes == 0 {
        return Err(PipelineError::InvalidConfig(
            "at least one class is required".into(),
        ));
    }
    if let Some(row) = sample_classes.iter().position(|&c| c >= num_classes) {
        return Err(PipelineError::InvalidLabel { row });
    }
    let stride = stride_for(window_size);
    let count = segment_count(sample_classes.len(), window_size);
    let mut labels = Array2::zeros((count, num_classes));
    let mut votes = vec![0usize; num_classes];
    for i in 0..count {
        votes.iter_mut().for_each(|v| *v = 0);
        let start = i * stride;
        for &class in &sample_classes[start..start + window_size] {
            votes[class] += 1;
        }
        let winner = votes
            .iter()
            .enumerate()
            .fold(0, |best, (class, &n)| if n > votes[best] { class } else { best });
        labels[[i, winner]] = 1.0;
    }
    Ok(labels)
}
