//! Physical constants and fallback parameters

use super::types::GeoPoint;

/// Mean Earth radius used by the haversine formula (meters)
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Kinshasa city centre, used when no genuine fix is available
pub const KINSHASA_CENTER: GeoPoint = GeoPoint {
    latitude: -4.3276,
    longitude: 15.3136,
};

/// Accuracy radius reported alongside the default position (meters)
pub const DEFAULT_POSITION_ACCURACY_METERS: f64 = 5000.0;

/// Smallest accuracy radius the estimator will accept (meters)
pub const MIN_ACCURACY_EPSILON_METERS: f64 = 0.1;
