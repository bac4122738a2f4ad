// src/training/mod.rs
// Adaptive training loop around an external classifier, plus scoring.
pub mod classifier;
pub mod controller;
pub mod evaluate;

pub use classifier::{Classifier, EpochHistory};
pub use controller::{
    effective_batch_size, ControllerConfig, ControllerState, RunState, StopReason,
    TrainingController, TrainingOutcome, TrainingRound,
};
pub use evaluate::{Evaluator, Metrics};
