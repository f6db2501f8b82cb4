//! Fix-level rejection reasons
//!
//! Rejections never leave the session: they are expected, frequent in dense
//! urban areas, and only logged.

use thiserror::Error;

/// Why a fix failed boundary validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidFix {
    #[error("non-finite coordinate ({latitude}, {longitude})")]
    NonFiniteCoordinate { latitude: f64, longitude: f64 },
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("accuracy {0} m is negative or not finite")]
    InvalidAccuracy(f64),
    #[error("{field} {value} is not finite")]
    NonFiniteField { field: &'static str, value: f64 },
}

/// Why the classifier dropped a fix
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("accuracy {accuracy_m:.1} m above limit {limit_m:.1} m")]
    LowAccuracy { accuracy_m: f64, limit_m: f64 },

    #[error("only {interval_ms} ms since last accepted fix (minimum {min_interval_ms} ms)")]
    TooFrequent { interval_ms: i64, min_interval_ms: i64 },

    #[error("jump of {distance_m:.0} m at {apparent_speed_mps:.1} m/s exceeds plausible speed {allowed_speed_mps:.1} m/s")]
    SuspiciousJump {
        distance_m: f64,
        apparent_speed_mps: f64,
        allowed_speed_mps: f64,
    },

    #[error("malformed fix: {0}")]
    Malformed(#[from] InvalidFix),
}

impl Rejection {
    /// Short stable label for structured logs
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::LowAccuracy { .. } => "low_accuracy",
            Rejection::TooFrequent { .. } => "too_frequent",
            Rejection::SuspiciousJump { .. } => "suspicious_jump",
            Rejection::Malformed(_) => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let r = Rejection::LowAccuracy { accuracy_m: 80.0, limit_m: 50.0 };
        assert_eq!(r.label(), "low_accuracy");
        assert_eq!(r.to_string(), "accuracy 80.0 m above limit 50.0 m");

        let malformed: Rejection = InvalidFix::LatitudeOutOfRange(95.0).into();
        assert_eq!(malformed.label(), "malformed");
        assert!(malformed.to_string().contains("latitude 95"));
    }
}
