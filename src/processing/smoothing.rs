//! Moving-average smoothing over the most recent accepted fixes

use nalgebra::Vector2;
use std::collections::VecDeque;
use crate::core::{FilteredPosition, GeoPoint, RawFix};
use crate::processing::stabilizer::{Stabilizer, StabilizerKind};

pub const DEFAULT_SMOOTHING_FACTOR: usize = 3;

/// Fixed-size FIFO buffer whose mean is the smoothed position
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    smoothing_factor: usize,
    points: VecDeque<GeoPoint>,
}

impl SmoothingBuffer {
    /// A factor of 0 is treated as 1 so the buffer always holds the latest point
    pub fn new(smoothing_factor: usize) -> Self {
        let smoothing_factor = smoothing_factor.max(1);
        Self {
            smoothing_factor,
            points: VecDeque::with_capacity(smoothing_factor + 1),
        }
    }

    pub fn push(&mut self, point: GeoPoint) {
        self.points.push_back(point);
        while self.points.len() > self.smoothing_factor {
            self.points.pop_front();
        }
    }

    /// Arithmetic mean of the buffered points; {0, 0} when empty
    pub fn average(&self) -> GeoPoint {
        if self.points.is_empty() {
            return GeoPoint::new(0.0, 0.0);
        }

        let sum = self
            .points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + Vector2::new(p.latitude, p.longitude));
        let mean = sum / self.points.len() as f64;

        GeoPoint::new(mean.x, mean.y)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn smoothing_factor(&self) -> usize {
        self.smoothing_factor
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for SmoothingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

impl Stabilizer for SmoothingBuffer {
    /// Averaged coordinates; accuracy and timestamp come from the newest fix
    fn apply(&mut self, fix: &RawFix) -> FilteredPosition {
        self.push(fix.point());
        FilteredPosition::from_fix(self.average(), fix.accuracy_meters, fix)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn is_initialized(&self) -> bool {
        !self.points.is_empty()
    }

    fn kind(&self) -> StabilizerKind {
        StabilizerKind::MovingAverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_averages_to_origin() {
        let buffer = SmoothingBuffer::default();
        assert_eq!(buffer.average(), GeoPoint::new(0.0, 0.0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fifo_eviction_keeps_length_bounded() {
        let mut buffer = SmoothingBuffer::new(3);
        for i in 0..10 {
            buffer.push(GeoPoint::new(i as f64, -(i as f64)));
            assert!(buffer.len() <= 3);
        }

        // Only 7, 8, 9 remain
        let avg = buffer.average();
        assert!((avg.latitude - 8.0).abs() < 1e-12);
        assert!((avg.longitude + 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_average_is_independent_per_axis() {
        let mut buffer = SmoothingBuffer::new(4);
        buffer.push(GeoPoint::new(-4.30, 15.30));
        buffer.push(GeoPoint::new(-4.32, 15.30));

        let avg = buffer.average();
        assert!((avg.latitude + 4.31).abs() < 1e-12);
        assert!((avg.longitude - 15.30).abs() < 1e-12);
    }

    #[test]
    fn test_stabilizer_reports_latest_accuracy() {
        let mut buffer = SmoothingBuffer::new(3);
        buffer.apply(&RawFix::new(-4.30, 15.30, 30.0, 0));
        let position = buffer.apply(&RawFix::new(-4.32, 15.32, 12.0, 1000));

        assert_eq!(position.accuracy_meters, 12.0);
        assert_eq!(position.timestamp_ms, 1000);
        assert!((position.latitude + 4.31).abs() < 1e-12);

        buffer.reset();
        assert!(!buffer.is_initialized());
    }

    #[test]
    fn test_zero_factor_holds_latest_point() {
        let mut buffer = SmoothingBuffer::new(0);
        buffer.push(GeoPoint::new(1.0, 1.0));
        buffer.push(GeoPoint::new(2.0, 2.0));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.average(), GeoPoint::new(2.0, 2.0));
    }
}
