//! Common interface over the two smoothing strategies

use serde::{Deserialize, Serialize};
use crate::core::{FilteredPosition, RawFix};
use crate::processing::kalman::RecursiveEstimator;
use crate::processing::smoothing::SmoothingBuffer;

/// Smoothing strategy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizerKind {
    /// Recursive estimator weighting fixes by reported accuracy
    #[default]
    Kalman,
    /// Arithmetic mean of the last `smoothing_factor` fixes
    MovingAverage,
}

/// Folds accepted fixes into a smoothed position
pub trait Stabilizer: Send {
    /// Absorb one accepted fix and return the new smoothed position
    fn apply(&mut self, fix: &RawFix) -> FilteredPosition;

    /// Discard accumulated state; the next fix starts from scratch
    fn reset(&mut self);

    fn is_initialized(&self) -> bool;

    fn kind(&self) -> StabilizerKind;
}

/// Build the stabilizer for a strategy
pub fn build_stabilizer(
    kind: StabilizerKind,
    process_noise: f64,
    smoothing_factor: usize,
) -> Box<dyn Stabilizer> {
    match kind {
        StabilizerKind::Kalman => Box::new(RecursiveEstimator::with_process_noise(process_noise)),
        StabilizerKind::MovingAverage => Box::new(SmoothingBuffer::new(smoothing_factor)),
    }
}
