//! Session options, callbacks and error kinds

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use crate::core::FilteredPosition;
use crate::source::SourceError;

/// Callback receiving positions (updates and accuracy-reached)
pub type PositionCallback = Arc<dyn Fn(FilteredPosition) + Send + Sync>;

/// Callback receiving recoverable errors
pub type ErrorCallback = Arc<dyn Fn(ErrorKind) + Send + Sync>;

/// Why the session delivered its default position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackCause {
    #[error("{0}")]
    Source(SourceError),
    #[error("{rejected} consecutive fixes rejected")]
    Rejected { rejected: u32 },
}

/// Recoverable errors reported through `on_error`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Default position delivered; present as a neutral hint, not an alarm
    #[error("using default position ({cause})")]
    FallbackToDefault { cause: FallbackCause },
    /// The fast fix timed out twice
    #[error("timed out waiting for a location fix")]
    Timeout,
    /// Any other source failure; the session keeps running
    #[error("location source error: {0}")]
    Source(SourceError),
}

impl ErrorKind {
    /// True for the non-alarming fallback notice
    pub fn is_soft(&self) -> bool {
        matches!(self, ErrorKind::FallbackToDefault { .. })
    }
}

/// Errors returned by session control calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is already running")]
    AlreadyRunning,
    #[error("session is locked; call unlock() before start()")]
    Locked,
    #[error("no position has been accepted yet")]
    NoPosition,
    #[error("start() requires a tokio runtime")]
    NoRuntime,
    #[error("invalid session option {option}: {reason}")]
    InvalidOption { option: &'static str, reason: String },
}

/// Callbacks and lock policy for one `start()`
#[derive(Clone)]
pub struct SessionOptions {
    pub(crate) on_update: PositionCallback,
    pub(crate) on_accuracy_reached: Option<PositionCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) lock_on_accuracy_meters: Option<f64>,
}

impl SessionOptions {
    pub fn new<F>(on_update: F) -> Self
    where
        F: Fn(FilteredPosition) + Send + Sync + 'static,
    {
        Self {
            on_update: Arc::new(on_update),
            on_accuracy_reached: None,
            on_error: None,
            lock_on_accuracy_meters: None,
        }
    }

    /// Called once when the session locks on its own
    pub fn on_accuracy_reached<F>(mut self, callback: F) -> Self
    where
        F: Fn(FilteredPosition) + Send + Sync + 'static,
    {
        self.on_accuracy_reached = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(ErrorKind) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Override the configured lock accuracy for this run (meters)
    pub fn lock_on_accuracy(mut self, meters: f64) -> Self {
        self.lock_on_accuracy_meters = Some(meters);
        self
    }

    pub fn lock_on_accuracy_meters(&self) -> Option<f64> {
        self.lock_on_accuracy_meters
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("on_accuracy_reached", &self.on_accuracy_reached.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("lock_on_accuracy_meters", &self.lock_on_accuracy_meters)
            .finish()
    }
}
