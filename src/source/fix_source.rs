//! Fix source trait and subscription types

use async_trait::async_trait;
use tokio::sync::mpsc;
use crate::core::RawFix;
use crate::source::SourceError;

/// Parameters for a one-shot fix or a continuous watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixRequest {
    /// Ask for the most accurate (slowest, most power hungry) mode
    pub high_accuracy: bool,
    /// Maximum time to wait for a fix (milliseconds)
    pub timeout_ms: u64,
    /// Cached fixes younger than this may be returned (milliseconds)
    pub max_age_ms: u64,
}

impl FixRequest {
    /// Quick, low-accuracy request for an initial position
    pub fn fast(timeout_ms: u64) -> Self {
        Self {
            high_accuracy: false,
            timeout_ms,
            max_age_ms: u64::MAX,
        }
    }

    pub fn watch(high_accuracy: bool, timeout_ms: u64, max_age_ms: u64) -> Self {
        Self {
            high_accuracy,
            timeout_ms,
            max_age_ms,
        }
    }
}

/// Identifies an active subscription for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        SubscriptionId(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// One item of a continuous subscription
pub type FixEvent = Result<RawFix, SourceError>;

/// Stream of fixes from a continuous subscription
///
/// The stream ends when the source drops its sender, typically on `cancel`.
#[derive(Debug)]
pub struct FixSubscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<FixEvent>,
}

impl FixSubscription {
    pub fn new(id: SubscriptionId, events: mpsc::UnboundedReceiver<FixEvent>) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, or `None` once the source has closed the stream
    pub async fn next(&mut self) -> Option<FixEvent> {
        self.events.recv().await
    }
}

/// Platform location source
///
/// Implementations are expected to validate nothing: the session checks every
/// fix at the boundary before it is classified.
#[async_trait]
pub trait FixSource: Send + Sync {
    /// Synchronous capability/permission check performed by `start()`
    fn availability(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Obtain a single fix
    async fn get_one_fix(&self, request: FixRequest) -> Result<RawFix, SourceError>;

    /// Open a continuous subscription
    fn subscribe(&self, request: FixRequest) -> Result<FixSubscription, SourceError>;

    /// Cancel a subscription; unknown or already cancelled ids are ignored
    fn cancel(&self, id: SubscriptionId);
}
