//! Turns a multichannel biosignal recording into a balanced, augmented, windowed
//! feature dataset and trains an external classifier on it round by round until it
//! reaches a target validation accuracy or stops improving.
//!
//! Data flow:
//!
//! ```text
//! SignalMatrix -> segment -> FeatureExtractor -> Augmenter -> balance -> split
//!              -> FittedScaler -> TrainingController (Classifier) -> Evaluator
//! ```
//!
//! [`session::run_session`] wires the whole chain together; every stage is also
//! usable on its own.

pub mod config;
pub mod pipeline;
pub mod session;
pub mod training;

pub use config::TrainingConfig;
pub use pipeline::{Dataset, ErrorKind, PipelineError, Result, SignalMatrix};
pub use session::{prepare_datasets, run_session, PreparedData, SessionReport};
pub use training::{
    Classifier, ControllerState, EpochHistory, Evaluator, Metrics, StopReason,
    TrainingController, TrainingOutcome,
};
