//! Fix source error types and recovery policy

use thiserror::Error;

/// Errors reported by the platform location source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// User or platform refused location access
    #[error("location permission denied")]
    PermissionDenied,
    /// Location capability absent on this device
    #[error("location capability unavailable")]
    Unavailable,
    /// No fix within the requested time
    #[error("timed out waiting for a location fix")]
    Timeout,
    /// Sandboxed or embedded context refuses location
    #[error("location blocked by embedding policy")]
    PolicyBlocked,
    /// Any other source failure
    #[error("location source failure: {0}")]
    Other(String),
}

/// What the session does about a source error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Deliver the default position and stop consuming the source
    FallbackToDefault,
    /// Retry the one-shot request once, then fall back
    RetryOnce,
    /// Report and keep going
    Report,
}

impl SourceError {
    /// Get the recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            SourceError::PermissionDenied
            | SourceError::Unavailable
            | SourceError::PolicyBlocked => RecoveryStrategy::FallbackToDefault,
            SourceError::Timeout => RecoveryStrategy::RetryOnce,
            SourceError::Other(_) => RecoveryStrategy::Report,
        }
    }

    /// True for errors where the source will not produce fixes at all
    pub fn is_denial(&self) -> bool {
        matches!(self.recovery_strategy(), RecoveryStrategy::FallbackToDefault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_strategies() {
        assert_eq!(SourceError::PermissionDenied.recovery_strategy(), RecoveryStrategy::FallbackToDefault);
        assert_eq!(SourceError::PolicyBlocked.recovery_strategy(), RecoveryStrategy::FallbackToDefault);
        assert_eq!(SourceError::Unavailable.recovery_strategy(), RecoveryStrategy::FallbackToDefault);
        assert_eq!(SourceError::Timeout.recovery_strategy(), RecoveryStrategy::RetryOnce);
        assert_eq!(SourceError::Other("gps chip reset".into()).recovery_strategy(), RecoveryStrategy::Report);
    }

    #[test]
    fn test_denials() {
        assert!(SourceError::PermissionDenied.is_denial());
        assert!(!SourceError::Timeout.is_denial());
    }
}
