//! Position lock state machine
//!
//! ```text
//!  Tracking --(N consecutive small moves)--> Stable --(accuracy <= target)--> Locked
//!     ^                                        |                                |
//!     +------------(move >= threshold)---------+                                |
//!     +-------------------------------(unlock)----------------------------------+
//! ```
//!
//! `Locked` is quiescent: observations are ignored until `unlock()`.

use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::algorithms::distance::distance_meters;
use crate::core::{FilteredPosition, GeoPoint};

pub const DEFAULT_MOVEMENT_THRESHOLD_METERS: f64 = 10.0;
pub const DEFAULT_STABLE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    Tracking,
    Stable,
    Locked,
}

/// State before and after one controller operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTransition {
    pub from: LockState,
    pub to: LockState,
}

impl LockTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// True when this transition entered `state`
    pub fn entered(&self, state: LockState) -> bool {
        self.changed() && self.to == state
    }
}

#[derive(Debug, Clone)]
pub struct LockController {
    state: LockState,
    consecutive_stable_count: u32,
    stable_threshold: u32,
    movement_threshold_meters: f64,
    /// Reference point movement is measured from
    anchor: Option<GeoPoint>,
    locked_position: Option<FilteredPosition>,
}

impl LockController {
    pub fn new(movement_threshold_meters: f64, stable_threshold: u32) -> Self {
        Self {
            state: LockState::Tracking,
            consecutive_stable_count: 0,
            stable_threshold: stable_threshold.max(1),
            movement_threshold_meters,
            anchor: None,
            locked_position: None,
        }
    }

    /// Feed one filtered position into the movement check
    pub fn observe(&mut self, position: &FilteredPosition) -> LockTransition {
        let from = self.state;
        if from == LockState::Locked {
            return LockTransition { from, to: from };
        }

        let point = position.point();
        let moved = match self.anchor {
            Some(anchor) => distance_meters(anchor, point),
            None => 0.0,
        };

        if moved < self.movement_threshold_meters {
            if self.anchor.is_none() {
                self.anchor = Some(point);
            }
            self.consecutive_stable_count = self.consecutive_stable_count.saturating_add(1);
            if self.consecutive_stable_count >= self.stable_threshold {
                self.state = LockState::Stable;
            }
        } else {
            debug!(moved_m = moved, "movement above threshold, back to tracking");
            self.anchor = Some(point);
            self.consecutive_stable_count = 0;
            self.state = LockState::Tracking;
        }

        LockTransition { from, to: self.state }
    }

    /// Lock if stable and the position is accurate enough
    pub fn try_lock(&mut self, position: &FilteredPosition, target_accuracy_meters: f64) -> bool {
        if self.state != LockState::Stable || position.accuracy_meters > target_accuracy_meters {
            return false;
        }
        self.force_lock(position.clone());
        true
    }

    /// Lock at `position` regardless of the current state
    pub fn force_lock(&mut self, position: FilteredPosition) -> LockTransition {
        let from = self.state;
        self.state = LockState::Locked;
        self.locked_position = Some(position);
        LockTransition { from, to: self.state }
    }

    /// Return to tracking; true if the controller was locked
    ///
    /// The caller is expected to reset its stabilizer when this returns true.
    pub fn unlock(&mut self) -> bool {
        if self.state != LockState::Locked {
            return false;
        }
        self.state = LockState::Tracking;
        self.consecutive_stable_count = 0;
        self.anchor = None;
        self.locked_position = None;
        true
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    pub fn consecutive_stable_count(&self) -> u32 {
        self.consecutive_stable_count
    }

    pub fn locked_position(&self) -> Option<&FilteredPosition> {
        self.locked_position.as_ref()
    }
}

impl Default for LockController {
    fn default() -> Self {
        Self::new(DEFAULT_MOVEMENT_THRESHOLD_METERS, DEFAULT_STABLE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ~1.1 m of latitude per 1e-5 degrees
    fn position(lat: f64, lng: f64, accuracy: f64) -> FilteredPosition {
        FilteredPosition::fallback(GeoPoint::new(lat, lng), accuracy, 0)
    }

    #[test]
    fn test_starts_tracking() {
        let controller = LockController::default();
        assert_eq!(controller.state(), LockState::Tracking);
        assert_eq!(controller.consecutive_stable_count(), 0);
        assert!(controller.locked_position().is_none());
    }

    #[test]
    fn test_becomes_stable_after_threshold() {
        let mut controller = LockController::default();

        let t1 = controller.observe(&position(-4.33, 15.31, 20.0));
        let t2 = controller.observe(&position(-4.33002, 15.31, 20.0));
        assert!(!t1.changed());
        assert!(!t2.changed());

        let t3 = controller.observe(&position(-4.33003, 15.31001, 20.0));
        assert!(t3.entered(LockState::Stable));
        assert_eq!(controller.consecutive_stable_count(), 3);
    }

    #[test]
    fn test_large_move_resets_to_tracking() {
        let mut controller = LockController::default();
        for _ in 0..3 {
            controller.observe(&position(-4.33, 15.31, 20.0));
        }
        assert_eq!(controller.state(), LockState::Stable);

        // ~110 m north
        let transition = controller.observe(&position(-4.329, 15.31, 20.0));
        assert!(transition.entered(LockState::Tracking));
        assert_eq!(controller.consecutive_stable_count(), 0);

        // Movement is now measured from the new anchor
        controller.observe(&position(-4.32901, 15.31, 20.0));
        assert_eq!(controller.consecutive_stable_count(), 1);
    }

    #[test]
    fn test_lock_requires_stable_and_accuracy() {
        let mut controller = LockController::default();
        let p = position(-4.33, 15.31, 8.0);

        controller.observe(&p);
        assert!(!controller.try_lock(&p, 10.0));

        controller.observe(&p);
        controller.observe(&p);
        assert!(!controller.try_lock(&position(-4.33, 15.31, 15.0), 10.0));
        assert!(controller.try_lock(&p, 10.0));
        assert!(controller.is_locked());
        assert_eq!(controller.locked_position(), Some(&p));
    }

    #[test]
    fn test_locked_ignores_observations() {
        let mut controller = LockController::default();
        controller.force_lock(position(-4.33, 15.31, 5.0));

        let transition = controller.observe(&position(-4.20, 15.20, 5.0));
        assert!(!transition.changed());
        assert_eq!(controller.locked_position().map(|p| p.latitude), Some(-4.33));
    }

    #[test]
    fn test_unlock_returns_to_tracking() {
        let mut controller = LockController::default();
        assert!(!controller.unlock());

        controller.force_lock(position(-4.33, 15.31, 5.0));
        assert!(controller.unlock());
        assert_eq!(controller.state(), LockState::Tracking);
        assert!(controller.locked_position().is_none());
        assert_eq!(controller.consecutive_stable_count(), 0);
    }
}
