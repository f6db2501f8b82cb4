//! Smoothing, locking and caching of accepted fixes

pub mod kalman;
pub mod smoothing;
pub mod stabilizer;
pub mod lock;
pub mod cache;

pub use kalman::{EstimatorState, RecursiveEstimator};
pub use smoothing::SmoothingBuffer;
pub use stabilizer::{build_stabilizer, Stabilizer, StabilizerKind};
pub use lock::{LockController, LockState, LockTransition};
pub use cache::{BoundedCache, Cache, CacheStats};
