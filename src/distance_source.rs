//! What the face tracker hands us, and the trait every distance provider
//! implements.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A distance in centimeters.
pub type Centimeters = f64;
/// A distance in meters.
pub type Meters = f64;

/// Positions closer to the origin than this are treated as "not tracked yet".
const MIN_TRACKED_LENGTH: Meters = 0.001;

/// Half a typical adult interpupillary distance.
const HALF_INTERPUPILLARY_M: Meters = 0.0315;

/// Which eye is being tested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
/// An eye, the one under test or the one covered.
pub enum Eye {
    /// The left eye.
    Left,
    /// The right eye.
    Right,
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eye::Left => write!(f, "Left"),
            Eye::Right => write!(f, "Right"),
        }
    }
}

/// A point in tracker world space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    /// Meters right of the origin.
    pub x: Meters,
    /// Meters up from the origin.
    pub y: Meters,
    /// Meters in front of the origin.
    pub z: Meters,
}

impl Point3 {
    /// A point at `(x, y, z)`.
    pub fn new(x: Meters, y: Meters, z: Meters) -> Self {
        Self { x, y, z }
    }

    /// Distance from the origin.
    pub fn length(&self) -> Meters {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// Straight-line distance to `other`.
    pub fn distance_to(&self, other: &Self) -> Meters {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

/// One frame of face tracking: both eye positions and the camera position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSample {
    /// Left eye position.
    pub left_eye: Point3,
    /// Right eye position.
    pub right_eye: Point3,
    /// Camera position.
    pub camera: Point3,
}

impl FaceSample {
    /// Distance from the camera to the eye under test, in centimeters. With
    /// no eye under test (calibration) both eyes are averaged.
    ///
    /// Returns `None` while either eye has not been located yet.
    pub fn distance_cm(&self, eye: Option<Eye>) -> Option<Centimeters> {
        if self.left_eye.length() < MIN_TRACKED_LENGTH
            || self.right_eye.length() < MIN_TRACKED_LENGTH
        {
            return None;
        }

        let left = self.left_eye.distance_to(&self.camera);
        let right = self.right_eye.distance_to(&self.camera);
        let meters = match eye {
            Some(Eye::Left) => left,
            Some(Eye::Right) => right,
            None => (left + right) / 2.0,
        };

        Some(meters * 100.0)
    }

    /// A frame with the camera at the origin and both eyes straight ahead
    /// of it at `distance`, as a simulated tracker would report.
    pub fn facing_camera(distance: Centimeters) -> Self {
        let z = distance / 100.0;
        let half_ipd = HALF_INTERPUPILLARY_M;
        FaceSample {
            left_eye: Point3::new(-half_ipd, 0.0, z),
            right_eye: Point3::new(half_ipd, 0.0, z),
            camera: Point3::default(),
        }
    }
}

/// `DistanceSource`
///
/// A clearable iterator that emits raw distance readings (cm) when iterated
/// upon. Anything that measures the viewer, real or simulated, implements it.
pub trait DistanceSource: Iterator<Item = Centimeters> {
    /// Drop every pending reading.
    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FaceSample {
        FaceSample {
            left_eye: Point3::new(-0.03, 0.0, 0.40),
            right_eye: Point3::new(0.03, 0.0, 0.50),
            camera: Point3::new(-0.03, 0.0, 0.0),
        }
    }

    #[test]
    fn measures_the_tested_eye() {
        let s = sample();
        let left = s.distance_cm(Some(Eye::Left)).unwrap();
        assert!((left - 40.0).abs() < 1e-9);

        let right = s.distance_cm(Some(Eye::Right)).unwrap();
        let expected = (0.06f64.powi(2) + 0.5f64.powi(2)).sqrt() * 100.0;
        assert!((right - expected).abs() < 1e-9);
    }

    #[test]
    fn facing_camera_is_about_the_distance() {
        let s = FaceSample::facing_camera(40.0);
        let left = s.distance_cm(Some(Eye::Left)).unwrap();
        assert!((left - 40.0).abs() < 0.2);
        assert_eq!(s.distance_cm(Some(Eye::Right)), Some(left));
    }

    #[test]
    fn calibration_averages_both_eyes() {
        let s = sample();
        let both = s.distance_cm(None).unwrap();
        let left = s.distance_cm(Some(Eye::Left)).unwrap();
        let right = s.distance_cm(Some(Eye::Right)).unwrap();
        assert!((both - (left + right) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn untracked_eyes_yield_nothing() {
        let s = FaceSample {
            left_eye: Point3::default(),
            ..sample()
        };
        assert_eq!(s.distance_cm(Some(Eye::Right)), None);
    }
}
