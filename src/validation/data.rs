use crate::core::RawFix;
use crate::validation::error::InvalidFix;

/// Boundary validation of fixes delivered by the source
#[derive(Debug, Clone, Copy, Default)]
pub struct FixValidator;

impl FixValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check that a fix is well formed before it is classified
    pub fn validate(&self, fix: &RawFix) -> Result<(), InvalidFix> {
        if !fix.latitude.is_finite() || !fix.longitude.is_finite() {
            return Err(InvalidFix::NonFiniteCoordinate {
                latitude: fix.latitude,
                longitude: fix.longitude,
            });
        }
        if fix.latitude.abs() > 90.0 {
            return Err(InvalidFix::LatitudeOutOfRange(fix.latitude));
        }
        if fix.longitude.abs() > 180.0 {
            return Err(InvalidFix::LongitudeOutOfRange(fix.longitude));
        }
        if !fix.accuracy_meters.is_finite() || fix.accuracy_meters < 0.0 {
            return Err(InvalidFix::InvalidAccuracy(fix.accuracy_meters));
        }

        let optional = [
            ("speed_mps", fix.speed_mps),
            ("heading_degrees", fix.heading_degrees),
            ("altitude_meters", fix.altitude_meters),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(InvalidFix::NonFiniteField { field, value });
                }
            }
        }

        Ok(())
    }
}
