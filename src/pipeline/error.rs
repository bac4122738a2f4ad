use thiserror::Error;

/// Coarse grouping of failures, used by callers that only care whether the
/// input, the configuration, or the classifier is at fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    DataShape,
    Classifier,
    Io,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("window size must be greater than zero")]
    InvalidWindowSize,
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
    #[error("test fraction must lie strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("class {class} has no examples; cannot balance or stratify an empty class")]
    EmptyClass { class: usize },
    #[error("{partition} partition is empty")]
    EmptyPartition { partition: &'static str },
    #[error("recording of {samples} samples is shorter than one window of {window_size}")]
    NoWindows { samples: usize, window_size: usize },
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("label count mismatch: {examples} examples but {labels} labels")]
    LabelCountMismatch { examples: usize, labels: usize },
    #[error("class count mismatch: expected {expected}, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },
    #[error("feature shape mismatch: expected {expected:?}, got {actual:?}")]
    FeatureShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("label row {row} is not a valid one-hot vector")]
    InvalidLabel { row: usize },
    #[error("non-finite value at sample {sample}, channel {channel}")]
    NonFiniteSample { sample: usize, channel: usize },
    #[error("classifier broke its contract: {0}")]
    ClassifierContract(String),
    #[error("classifier failed: {0}")]
    Classifier(#[from] anyhow::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to serialize: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to start feature workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidWindowSize
            | PipelineError::InvalidBatchSize
            | PipelineError::InvalidTestFraction(_)
            | PipelineError::InvalidConfig(_)
            | PipelineError::EmptyClass { .. }
            | PipelineError::Json(_) => ErrorKind::Configuration,
            PipelineError::EmptyPartition { .. }
            | PipelineError::NoWindows { .. }
            | PipelineError::ChannelMismatch { .. }
            | PipelineError::LabelCountMismatch { .. }
            | PipelineError::ClassCountMismatch { .. }
            | PipelineError::FeatureShapeMismatch { .. }
            | PipelineError::InvalidLabel { .. }
            | PipelineError::NonFiniteSample { .. } => ErrorKind::DataShape,
            PipelineError::ClassifierContract(_) | PipelineError::Classifier(_) => {
                ErrorKind::Classifier
            }
            PipelineError::Serialize(_) | PipelineError::WorkerPool(_) | PipelineError::Io(_) => {
                ErrorKind::Io
            }
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
