//! Stabilized positioning for ride-hailing clients
//!
//! Turns a noisy, intermittent stream of device location fixes into a
//! smoothed, outlier-rejected position that locks once it is stable and
//! accurate enough to trigger actions such as "driver arrived".

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod source;
pub mod utils;
pub mod api;
pub mod logging;

// Re-export commonly used types
pub use crate::core::{FilteredPosition, GeoPoint, RawFix, KINSHASA_CENTER};
pub use algorithms::{distance_meters, initial_bearing_degrees};
pub use processing::{
    build_stabilizer, BoundedCache, Cache, CacheStats, LockController, LockState, RecursiveEstimator,
    SmoothingBuffer, Stabilizer, StabilizerKind,
};
pub use validation::{ClassifierThresholds, FixValidator, Rejection, SampleClassifier, Verdict};
pub use source::{FixRequest, FixSource, FixSubscription, MockFixSource, RecoveryStrategy, SourceError, SubscriptionId};
pub use utils::{ConfigError, PositioningConfig};
pub use api::{
    CachedGeocoder, ErrorKind, FallbackCause, GeocodeError, PositionSession, ReverseGeocoder, SessionError,
    SessionOptions,
};
pub use logging::{init_logging, LoggingError, DEFAULT_LOG_FILTER};
