//! Great-circle distance helpers

use crate::core::{GeoPoint, EARTH_RADIUS_METERS};

/// Haversine distance between two points (meters)
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Initial bearing from `a` towards `b`, in degrees clockwise from north [0, 360)
pub fn initial_bearing_degrees(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_zero_for_same_point() {
        let p = GeoPoint::new(-4.3276, 15.3136);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (GeoPoint::new(-4.3276, 15.3136), GeoPoint::new(-4.4419, 15.2663)),
            (GeoPoint::new(0.0, 0.0), GeoPoint::new(10.0, -20.0)),
            (GeoPoint::new(51.5, -0.12), GeoPoint::new(-33.87, 151.21)),
        ];

        for (a, b) in pairs {
            assert_eq!(distance_meters(a, b), distance_meters(b, a));
        }
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // 2 * pi * R / 360
        let expected = 111_194.9;
        let d = distance_meters(GeoPoint::new(0.0, 15.0), GeoPoint::new(1.0, 15.0));
        assert!((d - expected).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_urban_scale_distance() {
        // Gombe to Ndjili airport is roughly 17.4 km as the crow flies
        let gombe = GeoPoint::new(-4.3050, 15.3100);
        let ndjili = GeoPoint::new(-4.3857, 15.4446);
        let d = distance_meters(gombe, ndjili);
        assert!(d > 16_500.0 && d < 18_500.0, "got {}", d);
    }

    #[test]
    fn test_antipodal_points_do_not_produce_nan() {
        let d = distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert!((initial_bearing_degrees(origin, GeoPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((initial_bearing_degrees(origin, GeoPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((initial_bearing_degrees(origin, GeoPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((initial_bearing_degrees(origin, GeoPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }
}
