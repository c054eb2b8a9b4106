//! The thread-safe buffer where face-tracking frames land, already turned
//! into distances.

use crate::distance_source::{Centimeters, DistanceSource, Eye, FaceSample};

use log::debug;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// A [`DistanceSource`] that acts as a thread-safe buffer where the tracking
/// callback can drop [`FaceSample`]s. Each sample is reduced to the distance
/// of the eye under test on the way in.
#[derive(Debug, Clone, Default)]
pub struct FaceBuffer {
    eye: Option<Eye>,
    readings: Arc<Mutex<VecDeque<Centimeters>>>,
}

impl FaceBuffer {
    /// A buffer measuring `eye`, or both eyes averaged when `None`.
    pub fn new(eye: Option<Eye>) -> Self {
        FaceBuffer {
            eye,
            readings: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Reduce a [`FaceSample`] to a distance and queue it. Frames where the
    /// eyes are not tracked yet are skipped.
    pub fn add_sample(&self, sample: FaceSample) {
        match sample.distance_cm(self.eye) {
            Some(cm) => self.readings.lock().unwrap().push_back(cm),
            None => debug!("Skipping face sample without tracked eyes"),
        }
    }

    /// Queue an already-measured distance.
    pub fn add_reading(&self, cm: Centimeters) {
        self.readings.lock().unwrap().push_back(cm);
    }
}

impl Iterator for FaceBuffer {
    type Item = Centimeters;

    fn next(&mut self) -> Option<Self::Item> {
        self.readings.lock().unwrap().pop_front()
    }
}

impl DistanceSource for FaceBuffer {
    fn clear(&mut self) {
        self.readings.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance_source::Point3;
    use std::thread;

    fn sample_at(z: f64) -> FaceSample {
        FaceSample {
            left_eye: Point3::new(-0.03, 0.0, z),
            right_eye: Point3::new(0.03, 0.0, z),
            camera: Point3::new(-0.03, 0.0, 0.0),
        }
    }

    #[test]
    fn drains_in_arrival_order() {
        let mut buf = FaceBuffer::new(Some(Eye::Left));
        buf.add_sample(sample_at(0.30));
        buf.add_sample(sample_at(0.35));
        let got: Vec<_> = buf.by_ref().collect();
        assert_eq!(got.len(), 2);
        assert!((got[0] - 30.0).abs() < 1e-9);
        assert!((got[1] - 35.0).abs() < 1e-9);
        assert_eq!(buf.next(), None);
    }

    #[test]
    fn clones_share_one_queue() {
        let mut reader = FaceBuffer::new(None);
        let writer = reader.clone();
        thread::spawn(move || {
            for cm in [40.0, 41.0, 42.0] {
                writer.add_reading(cm);
            }
        })
        .join()
        .unwrap();

        assert_eq!(reader.by_ref().count(), 3);
    }

    #[test]
    fn clear_drops_pending_readings() {
        let mut buf = FaceBuffer::new(None);
        buf.add_reading(40.0);
        buf.clear();
        assert_eq!(buf.next(), None);
    }
}
