//! Geodesic helpers

pub mod distance;

pub use distance::{distance_meters, initial_bearing_degrees};
