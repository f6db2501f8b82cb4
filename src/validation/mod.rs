//! Fix validation and classification

pub mod classifier;
pub mod data;
pub mod error;

pub use classifier::{ClassifierThresholds, SampleClassifier, Verdict};
pub use data::FixValidator;
pub use error::{InvalidFix, Rejection};
