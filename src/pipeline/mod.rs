// src/pipeline/mod.rs
// Data preparation stages, leaf first: matrix -> segments -> features ->
// augmentation -> balancing -> stratified split -> scaling.
pub mod augment;
pub mod balance;
pub mod dataset;
pub mod error;
pub mod features;
pub mod fft;
pub mod filter;
pub mod matrix;
pub mod scaler;
pub mod segment;
pub mod split;

pub use augment::Augmenter;
pub use balance::balance;
pub use dataset::{one_hot, Dataset, LabeledExample};
pub use error::{ErrorKind, PipelineError, Result};
pub use features::{FeatureExtractor, FeatureSet, FEATURE_ARITY};
pub use fft::SpectrumBuilder;
pub use filter::{FilterChain, FilterKind, SignalFilter};
pub use matrix::SignalMatrix;
pub use scaler::FittedScaler;
pub use segment::{segment, segment_count, stride_for, window_labels, Segment};
pub use split::{split, test_quota, Split};
