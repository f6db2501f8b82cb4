use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use crate::core::{GeoPoint, DEFAULT_POSITION_ACCURACY_METERS, KINSHASA_CENTER};
use crate::processing::StabilizerKind;
use crate::validation::ClassifierThresholds;

/// Positioning configuration, read once at session construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    /// Displacement that breaks stability (meters)
    pub movement_threshold_meters: f64,
    /// Moving-average window when `stabilizer` is `moving_average`
    pub smoothing_factor: usize,
    /// Fixes reporting a larger accuracy radius are rejected (meters)
    pub min_accuracy_meters: f64,
    /// Relaxed accuracy limit for the initial fast fix (meters)
    pub fast_fix_accuracy_meters: f64,
    /// Displacement above which the jump plausibility test applies (meters)
    pub max_jump_meters: f64,
    /// Slack over reported speed before a jump is implausible (m/s)
    pub jump_speed_tolerance_mps: f64,
    /// Minimum spacing between accepted fixes (milliseconds)
    pub min_interval_ms: i64,
    /// Consecutive small moves required for Stable
    pub stable_threshold: u32,
    /// Accuracy required to lock (meters); overridable per `start()`
    pub target_accuracy_meters: f64,
    /// Variance added per estimator step (meters squared)
    pub process_noise: f64,
    pub stabilizer: StabilizerKind,
    /// Fallback location when the source gives nothing usable
    pub default_position: GeoPoint,
    /// Accuracy radius reported with the fallback (meters)
    pub default_accuracy_meters: f64,
    pub fast_fix_timeout_ms: u64,
    pub watch_timeout_ms: u64,
    pub max_age_ms: u64,
    /// Request the precise (GPS) mode for the continuous subscription
    pub high_accuracy: bool,
    /// Consecutive rejections, with nothing accepted yet, before falling back
    pub fallback_after_rejections: u32,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        let thresholds = ClassifierThresholds::default();
        Self {
            movement_threshold_meters: 10.0,
            smoothing_factor: 3,
            min_accuracy_meters: thresholds.min_accuracy_meters,
            fast_fix_accuracy_meters: 500.0,
            max_jump_meters: thresholds.max_jump_meters,
            jump_speed_tolerance_mps: thresholds.jump_speed_tolerance_mps,
            min_interval_ms: thresholds.min_interval_ms,
            stable_threshold: 3,
            target_accuracy_meters: 10.0,
            process_noise: 0.001,
            stabilizer: StabilizerKind::Kalman,
            default_position: KINSHASA_CENTER,
            default_accuracy_meters: DEFAULT_POSITION_ACCURACY_METERS,
            fast_fix_timeout_ms: 3000,
            watch_timeout_ms: 10_000,
            max_age_ms: 5000,
            high_accuracy: true,
            fallback_after_rejections: 10,
        }
    }
}

/// Configuration errors; all are fatal at construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    #[error("configuration file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_positive(parameter: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(parameter, value, "must be a finite value greater than zero"));
    }
    Ok(())
}

impl PositioningConfig {
    /// Relaxed thresholds for dense urban areas where GPS is poor
    pub fn urban_tolerant() -> Self {
        Self {
            min_accuracy_meters: 500.0,
            target_accuracy_meters: 20.0,
            ..Self::default()
        }
    }

    /// Check every parameter; the first violation is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("movement_threshold_meters", self.movement_threshold_meters)?;
        check_positive("min_accuracy_meters", self.min_accuracy_meters)?;
        check_positive("fast_fix_accuracy_meters", self.fast_fix_accuracy_meters)?;
        check_positive("max_jump_meters", self.max_jump_meters)?;
        check_positive("target_accuracy_meters", self.target_accuracy_meters)?;
        check_positive("default_accuracy_meters", self.default_accuracy_meters)?;

        if !self.jump_speed_tolerance_mps.is_finite() || self.jump_speed_tolerance_mps < 0.0 {
            return Err(invalid(
                "jump_speed_tolerance_mps",
                self.jump_speed_tolerance_mps,
                "must be finite and not negative",
            ));
        }
        if !self.process_noise.is_finite() || self.process_noise < 0.0 {
            return Err(invalid("process_noise", self.process_noise, "must be finite and not negative"));
        }
        if self.min_interval_ms < 0 {
            return Err(invalid("min_interval_ms", self.min_interval_ms, "must not be negative"));
        }
        if self.smoothing_factor == 0 {
            return Err(invalid("smoothing_factor", self.smoothing_factor, "window needs at least one point"));
        }
        if self.stable_threshold == 0 {
            return Err(invalid("stable_threshold", self.stable_threshold, "needs at least one stable sample"));
        }
        if self.fast_fix_timeout_ms == 0 {
            return Err(invalid("fast_fix_timeout_ms", self.fast_fix_timeout_ms, "must be greater than zero"));
        }
        if self.watch_timeout_ms == 0 {
            return Err(invalid("watch_timeout_ms", self.watch_timeout_ms, "must be greater than zero"));
        }
        if self.fallback_after_rejections == 0 {
            return Err(invalid(
                "fallback_after_rejections",
                self.fallback_after_rejections,
                "must be greater than zero",
            ));
        }

        let GeoPoint { latitude, longitude } = self.default_position;
        if !latitude.is_finite() || latitude.abs() > 90.0 {
            return Err(invalid("default_position.latitude", latitude, "must be within [-90, 90]"));
        }
        if !longitude.is_finite() || longitude.abs() > 180.0 {
            return Err(invalid("default_position.longitude", longitude, "must be within [-180, 180]"));
        }

        Ok(())
    }

    /// Thresholds for the continuous stream
    pub fn classifier_thresholds(&self) -> ClassifierThresholds {
        ClassifierThresholds {
            min_accuracy_meters: self.min_accuracy_meters,
            max_jump_meters: self.max_jump_meters,
            min_interval_ms: self.min_interval_ms,
            jump_speed_tolerance_mps: self.jump_speed_tolerance_mps,
        }
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate, then write pretty JSON to `path`
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PositioningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_position, KINSHASA_CENTER);
        assert_eq!(config.stabilizer, StabilizerKind::Kalman);
        assert!(PositioningConfig::urban_tolerant().validate().is_ok());
    }

    #[test]
    fn test_urban_tolerant_preset() {
        let config = PositioningConfig::urban_tolerant();
        assert_eq!(config.min_accuracy_meters, 500.0);
        assert_eq!(config.target_accuracy_meters, 20.0);
        assert_eq!(config.classifier_thresholds(), ClassifierThresholds::urban_tolerant());
    }

    #[test]
    fn test_negative_threshold_is_rejected_not_clamped() {
        let config = PositioningConfig {
            movement_threshold_meters: -5.0,
            ..PositioningConfig::default()
        };

        match config.validate() {
            Err(ConfigError::InvalidParameter { parameter, value, .. }) => {
                assert_eq!(parameter, "movement_threshold_meters");
                assert_eq!(value, "-5");
            }
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_other_invalid_values() {
        let cases = [
            PositioningConfig { smoothing_factor: 0, ..Default::default() },
            PositioningConfig { stable_threshold: 0, ..Default::default() },
            PositioningConfig { min_interval_ms: -1, ..Default::default() },
            PositioningConfig { process_noise: f64::NAN, ..Default::default() },
            PositioningConfig { default_position: GeoPoint::new(95.0, 15.0), ..Default::default() },
            PositioningConfig { min_accuracy_meters: f64::INFINITY, ..Default::default() },
        ];
        for config in &cases {
            assert!(matches!(config.validate(), Err(ConfigError::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PositioningConfig::from_json_str(
            r#"{ "min_accuracy_meters": 500.0, "stabilizer": "moving_average" }"#,
        )
        .expect("valid config");

        assert_eq!(config.min_accuracy_meters, 500.0);
        assert_eq!(config.stabilizer, StabilizerKind::MovingAverage);
        assert_eq!(config.stable_threshold, 3);
    }

    #[test]
    fn test_json_validation_and_parse_errors() {
        assert!(matches!(
            PositioningConfig::from_json_str(r#"{ "target_accuracy_meters": 0.0 }"#),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert!(matches!(
            PositioningConfig::from_json_str("{ not json"),
            Err(ConfigError::Serialization(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = PositioningConfig::urban_tolerant();
        let json = config.to_json_string().expect("serialize");
        assert_eq!(PositioningConfig::from_json_str(&json).expect("parse"), config);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("positioning-config-{}.json", std::process::id()));
        let config = PositioningConfig {
            fallback_after_rejections: 4,
            ..PositioningConfig::default()
        };

        config.save_to_file(&path).expect("save");
        let loaded = PositioningConfig::from_file(&path).expect("load");
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
        assert!(matches!(
            PositioningConfig::from_file(path.with_extension("missing")),
            Err(ConfigError::Io(_))
        ));
    }
}
