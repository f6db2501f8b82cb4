//! Core data types for the positioning subsystem

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Point in geodetic coordinates (decimal degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One raw observation delivered by the fix source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Confidence radius reported by the source (meters, smaller is better)
    pub accuracy_meters: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    #[serde(default)]
    pub speed_mps: Option<f64>,
    #[serde(default)]
    pub heading_degrees: Option<f64>,
    #[serde(default)]
    pub altitude_meters: Option<f64>,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            timestamp_ms,
            speed_mps: None,
            heading_degrees: None,
            altitude_meters: None,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_heading(mut self, heading_degrees: f64) -> Self {
        self.heading_degrees = Some(heading_degrees);
        self
    }

    pub fn with_altitude(mut self, altitude_meters: f64) -> Self {
        self.altitude_meters = Some(altitude_meters);
        self
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Smoothed, outlier-rejected position handed to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub timestamp_ms: i64,
    pub speed_mps: Option<f64>,
    pub heading_degrees: Option<f64>,
}

impl FilteredPosition {
    /// Position stamped with the fix's timestamp and motion fields
    pub fn from_fix(point: GeoPoint, accuracy_meters: f64, fix: &RawFix) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy_meters,
            timestamp_ms: fix.timestamp_ms,
            speed_mps: fix.speed_mps,
            heading_degrees: fix.heading_degrees,
        }
    }

    /// Fallback position without motion information
    pub fn fallback(point: GeoPoint, accuracy_meters: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy_meters,
            timestamp_ms,
            speed_mps: None,
            heading_degrees: None,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_fix_builder() {
        let fix = RawFix::new(-4.33, 15.31, 12.0, 1_000)
            .with_speed(8.5)
            .with_heading(270.0)
            .with_altitude(280.0);

        assert_eq!(fix.speed_mps, Some(8.5));
        assert_eq!(fix.heading_degrees, Some(270.0));
        assert_eq!(fix.altitude_meters, Some(280.0));
        assert_eq!(fix.point(), GeoPoint::new(-4.33, 15.31));
    }

    #[test]
    fn test_raw_fix_deserializes_without_optional_fields() {
        let json = r#"{"latitude":-4.3276,"longitude":15.3136,"accuracy_meters":80.0,"timestamp_ms":0}"#;
        let fix: RawFix = serde_json::from_str(json).unwrap();

        assert_eq!(fix.accuracy_meters, 80.0);
        assert!(fix.speed_mps.is_none());
        assert!(fix.heading_degrees.is_none());
    }

    #[test]
    fn test_filtered_position_carries_motion_fields() {
        let fix = RawFix::new(-4.33, 15.31, 12.0, 42).with_speed(3.0);
        let position = FilteredPosition::from_fix(GeoPoint::new(-4.331, 15.311), 6.0, &fix);

        assert_eq!(position.timestamp_ms, 42);
        assert_eq!(position.speed_mps, Some(3.0));
        assert_eq!(position.accuracy_meters, 6.0);
    }
}
