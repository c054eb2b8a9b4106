//! Smooths the raw, jittery distance readings coming off the face tracker.

use crate::distance_source::{Centimeters, DistanceSource};

use log::{debug, info, warn};
use std::collections::VecDeque;

/// How many of the most recent readings are averaged.
pub const BUFFER_SIZE: usize = 5;

/// Readings outside this open interval are noise, not a face.
pub const DEFAULT_PLAUSIBLE_CM: (Centimeters, Centimeters) = (5.0, 200.0);

/// The `DistanceTracker` accumulates readings and exposes their running
/// mean as the live viewing distance. It also remembers the target distance
/// the viewer chose before the test began.
///
/// It is meant to have a single owner; readings measured elsewhere are
/// handed over through a [`DistanceSource`] and drained with
/// [`DistanceTracker::drain_from`].
#[derive(Debug, Clone)]
pub struct DistanceTracker {
    recent: VecDeque<Centimeters>,
    plausible: (Centimeters, Centimeters),
    current: Centimeters,
    target: Centimeters,
}

impl Default for DistanceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PLAUSIBLE_CM)
    }
}

impl DistanceTracker {
    /// A tracker that drops readings not strictly inside `plausible`.
    pub fn new(plausible: (Centimeters, Centimeters)) -> Self {
        Self {
            recent: VecDeque::with_capacity(BUFFER_SIZE + 1),
            plausible,
            current: 0.0,
            target: 0.0,
        }
    }

    /// Whether `distance` may enter the smoothing buffer. NaN never does.
    pub fn is_plausible(&self, distance: Centimeters) -> bool {
        let (low, high) = self.plausible;
        distance > 0.0 && distance > low && distance < high
    }

    /// Feed one raw reading. Non-positive or implausible readings are dropped
    /// and `false` is returned; otherwise the oldest reading is evicted if
    /// needed and the smoothed distance recomputed.
    pub fn add_reading(&mut self, distance: Centimeters) -> bool {
        if !self.is_plausible(distance) {
            debug!("Dropping implausible distance reading {:.1} cm", distance);
            return false;
        }

        self.recent.push_back(distance);
        if self.recent.len() > BUFFER_SIZE {
            self.recent.pop_front();
        }

        self.current = self.recent.iter().sum::<Centimeters>() / self.recent.len() as f64;
        true
    }

    /// Pull every pending reading out of `source`. Returns how many were
    /// accepted.
    pub fn drain_from<S: DistanceSource>(&mut self, source: &mut S) -> usize {
        let mut accepted = 0;
        for reading in source.by_ref() {
            if self.add_reading(reading) {
                accepted += 1;
            }
        }
        accepted
    }

    /// The smoothed live distance, or 0.0 before any reading was accepted.
    /// Callers must check for zero before sizing anything with it.
    pub fn current_distance_cm(&self) -> Centimeters {
        self.current
    }

    /// The reference distance captured before the test, or 0.0 if none.
    pub fn target_distance_cm(&self) -> Centimeters {
        self.target
    }

    /// Set the reference distance directly, e.g. from a saved setting.
    pub fn set_target(&mut self, distance: Centimeters) {
        self.target = distance;
    }

    /// Capture `distance` as the test distance if it lies inside
    /// `capture_range` and is itself a plausible reading. The smoothing
    /// buffer restarts from that reading so the live value does not lag
    /// behind the new target.
    pub fn capture_target(
        &mut self,
        distance: Centimeters,
        capture_range: (Centimeters, Centimeters),
    ) -> bool {
        let (low, high) = capture_range;
        if !(distance >= low && distance <= high) || !self.is_plausible(distance) {
            warn!(
                "Distance {:.1} cm is outside the capture range {:.0}-{:.0} cm",
                distance, low, high
            );
            return false;
        }

        self.target = distance;
        self.recent.clear();
        self.recent.push_back(distance);
        self.current = distance;
        info!("Target distance captured: {:.1} cm", distance);
        true
    }

    /// Snap the live distance back to the target, dropping buffered readings.
    /// Used when a new test starts so stale readings don't pause it at once.
    pub fn reset_to_target(&mut self) {
        self.recent.clear();
        self.current = self.target;
    }

    /// Number of readings currently averaged.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether no reading is buffered.
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_buffer::FaceBuffer;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_tracker_reads_zero() {
        let tracker = DistanceTracker::default();
        assert_eq!(tracker.current_distance_cm(), 0.0);
        assert!(tracker.is_empty());
    }

    #[test]
    fn averages_the_last_five() {
        let mut tracker = DistanceTracker::default();
        for d in [30.0, 32.0, 34.0, 36.0, 38.0, 40.0] {
            assert!(tracker.add_reading(d));
        }
        assert_eq!(tracker.len(), BUFFER_SIZE);
        // 30 was evicted
        assert!(close(tracker.current_distance_cm(), (32.0 + 34.0 + 36.0 + 38.0 + 40.0) / 5.0));
    }

    #[test]
    fn partial_buffer_uses_what_it_has() {
        let mut tracker = DistanceTracker::default();
        tracker.add_reading(40.0);
        tracker.add_reading(44.0);
        assert!(close(tracker.current_distance_cm(), 42.0));
    }

    #[test]
    fn implausible_readings_never_enter_the_buffer() {
        let mut tracker = DistanceTracker::default();
        tracker.add_reading(40.0);
        assert!(!tracker.add_reading(0.0));
        assert!(!tracker.add_reading(-3.0));
        assert!(!tracker.add_reading(4.0));
        assert!(!tracker.add_reading(250.0));
        assert!(!tracker.add_reading(f64::NAN));
        assert_eq!(tracker.len(), 1);
        assert!(close(tracker.current_distance_cm(), 40.0));
    }

    #[test]
    fn capture_respects_range_and_reseeds() {
        let mut tracker = DistanceTracker::default();
        tracker.add_reading(80.0);
        assert!(!tracker.capture_target(120.0, (10.0, 100.0)));
        assert_eq!(tracker.target_distance_cm(), 0.0);

        assert!(tracker.capture_target(45.0, (10.0, 100.0)));
        assert_eq!(tracker.target_distance_cm(), 45.0);
        assert_eq!(tracker.current_distance_cm(), 45.0);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn capture_rejects_nan_and_implausible() {
        let mut tracker = DistanceTracker::default();
        assert!(!tracker.capture_target(f64::NAN, (10.0, 100.0)));
        assert!(tracker.is_empty());
        assert_eq!(tracker.target_distance_cm(), 0.0);

        // inside a too-wide capture range but outside the plausible band
        assert!(!tracker.capture_target(2.0, (1.0, 100.0)));
        assert!(!tracker.capture_target(f64::INFINITY, (10.0, f64::INFINITY)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn drains_a_source() {
        let mut source = FaceBuffer::new(None);
        for d in [40.0, 0.0, 42.0, 500.0] {
            source.add_reading(d);
        }
        let mut tracker = DistanceTracker::default();
        assert_eq!(tracker.drain_from(&mut source), 2);
        assert!(close(tracker.current_distance_cm(), 41.0));
        assert_eq!(source.next(), None);
    }
}
