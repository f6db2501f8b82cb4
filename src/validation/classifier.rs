//! Gatekeeper deciding which fixes reach the stabilizer
//!
//! Checks run cheapest first: accuracy, then rate limiting, then the jump
//! plausibility test that needs the previous accepted fix.

use serde::{Deserialize, Serialize};
use crate::algorithms::distance::distance_meters;
use crate::core::RawFix;
use crate::validation::error::Rejection;

/// Classifier thresholds; all are tunable per deployment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// Fixes reporting a larger accuracy radius are rejected (meters)
    pub min_accuracy_meters: f64,
    /// Displacement above which the speed plausibility test applies (meters)
    pub max_jump_meters: f64,
    /// Minimum spacing between accepted fixes (milliseconds)
    pub min_interval_ms: i64,
    /// Slack added to the reported speed before a jump is called implausible (m/s)
    pub jump_speed_tolerance_mps: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            min_accuracy_meters: 50.0,
            max_jump_meters: 50.0,
            min_interval_ms: 1000,
            jump_speed_tolerance_mps: 10.0,
        }
    }
}

impl ClassifierThresholds {
    /// Relaxed accuracy limit for dense urban areas
    pub fn urban_tolerant() -> Self {
        Self {
            min_accuracy_meters: 500.0,
            ..Self::default()
        }
    }
}

/// Outcome of classifying one fix
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Stateless fix classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleClassifier {
    thresholds: ClassifierThresholds,
}

impl SampleClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Same classifier with a different accuracy limit
    pub fn with_accuracy_limit(&self, min_accuracy_meters: f64) -> Self {
        Self {
            thresholds: ClassifierThresholds {
                min_accuracy_meters,
                ..self.thresholds
            },
        }
    }

    /// Classify `fix` against the last accepted fix and timestamp
    pub fn classify(
        &self,
        fix: &RawFix,
        last_accepted: Option<&RawFix>,
        last_accepted_timestamp_ms: Option<i64>,
    ) -> Verdict {
        let t = &self.thresholds;

        if fix.accuracy_meters > t.min_accuracy_meters {
            return Verdict::Reject(Rejection::LowAccuracy {
                accuracy_m: fix.accuracy_meters,
                limit_m: t.min_accuracy_meters,
            });
        }

        if let Some(last_ts) = last_accepted_timestamp_ms {
            let interval_ms = fix.timestamp_ms - last_ts;
            if interval_ms < t.min_interval_ms {
                return Verdict::Reject(Rejection::TooFrequent {
                    interval_ms,
                    min_interval_ms: t.min_interval_ms,
                });
            }
        }

        if let Some(last) = last_accepted {
            let distance_m = distance_meters(last.point(), fix.point());
            let elapsed_s = (fix.timestamp_ms - last.timestamp_ms) as f64 / 1000.0;
            let apparent_speed_mps = if elapsed_s > 0.0 {
                distance_m / elapsed_s
            } else {
                f64::INFINITY
            };
            let allowed_speed_mps = fix.speed_mps.unwrap_or(0.0) + t.jump_speed_tolerance_mps;

            if distance_m > t.max_jump_meters && apparent_speed_mps > allowed_speed_mps {
                return Verdict::Reject(Rejection::SuspiciousJump {
                    distance_m,
                    apparent_speed_mps,
                    allowed_speed_mps,
                });
            }
        }

        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shift north by roughly `meters`
    fn north_of(fix: &RawFix, meters: f64, t: i64) -> RawFix {
        RawFix::new(fix.latitude + meters / 111_195.0, fix.longitude, fix.accuracy_meters, t)
    }

    #[test]
    fn test_low_accuracy_rejected_first() {
        let classifier = SampleClassifier::default();
        let fix = RawFix::new(-4.3276, 15.3136, 80.0, 0);

        let verdict = classifier.classify(&fix, None, None);
        assert!(matches!(verdict, Verdict::Reject(Rejection::LowAccuracy { .. })));
    }

    #[test]
    fn test_urban_tolerant_accepts_coarse_fix() {
        let classifier = SampleClassifier::new(ClassifierThresholds::urban_tolerant());
        let fix = RawFix::new(-4.3276, 15.3136, 300.0, 0);
        assert!(classifier.classify(&fix, None, None).is_accept());
    }

    #[test]
    fn test_too_frequent() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 0);
        let second = RawFix::new(-4.33001, 15.31001, 15.0, 500);

        let verdict = classifier.classify(&second, Some(&first), Some(first.timestamp_ms));
        assert_eq!(
            verdict,
            Verdict::Reject(Rejection::TooFrequent { interval_ms: 500, min_interval_ms: 1000 })
        );
    }

    #[test]
    fn test_out_of_order_timestamp_is_too_frequent() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 10_000);
        let earlier = RawFix::new(-4.33, 15.31, 20.0, 2_000);

        let verdict = classifier.classify(&earlier, Some(&first), Some(first.timestamp_ms));
        assert!(matches!(verdict, Verdict::Reject(Rejection::TooFrequent { .. })));
    }

    #[test]
    fn test_suspicious_jump_without_reported_speed() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 0);
        let jumped = north_of(&first, 5000.0, 5000).with_speed(0.0);

        let verdict = classifier.classify(&jumped, Some(&first), Some(0));
        assert!(matches!(verdict, Verdict::Reject(Rejection::SuspiciousJump { .. })));
    }

    #[test]
    fn test_jump_supported_by_reported_speed() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 0);
        let jumped = north_of(&first, 5000.0, 5000).with_speed(1400.0);

        assert!(classifier.classify(&jumped, Some(&first), Some(0)).is_accept());
    }

    #[test]
    fn test_small_move_always_accepted() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 0);
        // 40 m in one second is fast, but under the jump threshold
        let next = north_of(&first, 40.0, 1000);

        assert!(classifier.classify(&next, Some(&first), Some(0)).is_accept());
    }

    #[test]
    fn test_plausible_drive_accepted() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 0);
        // 80 m over 10 s, 8 m/s without reported speed stays under the 10 m/s slack
        let next = north_of(&first, 80.0, 10_000);

        assert!(classifier.classify(&next, Some(&first), Some(0)).is_accept());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = SampleClassifier::default();
        let first = RawFix::new(-4.33, 15.31, 20.0, 0);
        let candidates = [
            RawFix::new(-4.33, 15.31, 70.0, 2000),
            RawFix::new(-4.33, 15.31, 10.0, 200),
            north_of(&first, 3000.0, 2000),
            north_of(&first, 5.0, 2000),
        ];

        for fix in &candidates {
            let a = classifier.classify(fix, Some(&first), Some(0));
            let b = classifier.classify(fix, Some(&first), Some(0));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_with_accuracy_limit_keeps_other_thresholds() {
        let classifier = SampleClassifier::default().with_accuracy_limit(500.0);
        assert_eq!(classifier.thresholds().min_accuracy_meters, 500.0);
        assert_eq!(classifier.thresholds().min_interval_ms, 1000);
    }
}
