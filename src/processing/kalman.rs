use nalgebra::Vector2;
use crate::core::{FilteredPosition, GeoPoint, RawFix, MIN_ACCURACY_EPSILON_METERS};
use crate::processing::stabilizer::{Stabilizer, StabilizerKind};

/// Variance seeded by `reset()` until the next fix re-initializes the filter
pub const RESET_VARIANCE: f64 = 1000.0;

/// Default process noise; assumes a near-stationary user between samples
pub const DEFAULT_PROCESS_NOISE: f64 = 0.001;

/// Snapshot of the estimator's internal state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorState {
    pub latitude: f64,
    pub longitude: f64,
    pub variance_meters_squared: f64,
    pub process_noise: f64,
    pub measurement_noise: f64,
}

/// Kalman-style recursive estimator for temporal position smoothing
///
/// A single scalar variance is shared by both axes, so the filter reduces to
/// a weighted running average that favours fixes with a smaller reported
/// accuracy radius. There is no motion model: the prediction step only adds
/// `process_noise` to the variance.
#[derive(Debug, Clone)]
pub struct RecursiveEstimator {
    /// Current estimate [latitude, longitude]
    state: Vector2<f64>,
    /// Estimate variance (meters squared), never negative
    variance: f64,
    process_noise: f64,
    /// Accuracy of the fix that initialized the filter (meters)
    measurement_noise: f64,
    initialized: bool,
}

impl RecursiveEstimator {
    pub fn new() -> Self {
        Self::with_process_noise(DEFAULT_PROCESS_NOISE)
    }

    pub fn with_process_noise(process_noise: f64) -> Self {
        Self {
            state: Vector2::zeros(),
            variance: RESET_VARIANCE,
            process_noise: process_noise.max(0.0),
            measurement_noise: 0.0,
            initialized: false,
        }
    }

    /// Seed the filter with its first accepted fix
    pub fn initialize(&mut self, fix: &RawFix) {
        let accuracy = clamp_accuracy(fix.accuracy_meters);

        self.state = Vector2::new(fix.latitude, fix.longitude);
        self.variance = accuracy * accuracy;
        self.measurement_noise = accuracy;
        self.initialized = true;
    }

    /// Fold one fix into the estimate
    pub fn update(&mut self, fix: &RawFix) -> FilteredPosition {
        if !self.initialized {
            self.initialize(fix);
            return self.position_for(fix);
        }

        let accuracy = clamp_accuracy(fix.accuracy_meters);
        let predicted_variance = self.variance + self.process_noise;
        let measurement_variance = accuracy * accuracy;
        let gain = predicted_variance / (predicted_variance + measurement_variance);

        let measurement = Vector2::new(fix.latitude, fix.longitude);
        self.state += (measurement - self.state) * gain;
        self.variance = ((1.0 - gain) * predicted_variance).max(0.0);

        self.position_for(fix)
    }

    /// Forget the current estimate; the next update starts from scratch
    pub fn reset(&mut self) {
        self.initialized = false;
        self.variance = RESET_VARIANCE;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Standard deviation of the estimate (meters)
    pub fn accuracy_meters(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn state(&self) -> EstimatorState {
        EstimatorState {
            latitude: self.state.x,
            longitude: self.state.y,
            variance_meters_squared: self.variance,
            process_noise: self.process_noise,
            measurement_noise: self.measurement_noise,
        }
    }

    fn position_for(&self, fix: &RawFix) -> FilteredPosition {
        FilteredPosition::from_fix(
            GeoPoint::new(self.state.x, self.state.y),
            self.accuracy_meters(),
            fix,
        )
    }
}

impl Default for RecursiveEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Stabilizer for RecursiveEstimator {
    fn apply(&mut self, fix: &RawFix) -> FilteredPosition {
        self.update(fix)
    }

    fn reset(&mut self) {
        RecursiveEstimator::reset(self);
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn kind(&self) -> StabilizerKind {
        StabilizerKind::Kalman
    }
}

fn clamp_accuracy(accuracy_meters: f64) -> f64 {
    if accuracy_meters.is_finite() && accuracy_meters > MIN_ACCURACY_EPSILON_METERS {
        accuracy_meters
    } else {
        MIN_ACCURACY_EPSILON_METERS
    }
}
