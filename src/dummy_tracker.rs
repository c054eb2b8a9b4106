//! A stand-in face tracker. A background thread produces noisy distance
//! readings around a configurable true distance at a fixed rate, the way a
//! phone camera would while someone holds it at arm's length.

use crate::distance_source::{Centimeters, DistanceSource};

use log::{info, warn};
use rand::prelude::*;
use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Readings emitted per second unless told otherwise.
pub const DEFAULT_RATE_HZ: f64 = 10.0;

/// A simulated face tracker, read as a [DistanceSource].
pub struct DummyTracker {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
    readings: Arc<Mutex<VecDeque<Centimeters>>>,
    truth: Arc<Mutex<Centimeters>>,
    paused: bool,
}

enum Signal {
    Distance(Centimeters),
    Noise(Centimeters),
    GlitchRate(f64),
    Pause(bool),
    Stop,
}

/// Configures a [DummyTracker] before its thread starts.
#[derive(Debug, Clone)]
pub struct DummyTrackerBuilder {
    distance: Centimeters,
    noise: Centimeters,
    glitch_rate: f64,
    rate_hz: f64,
}

impl Default for DummyTrackerBuilder {
    fn default() -> Self {
        Self {
            distance: 40.0,
            noise: 0.5,
            glitch_rate: 0.0,
            rate_hz: DEFAULT_RATE_HZ,
        }
    }
}

impl DummyTrackerBuilder {
    /// The true viewing distance the readings scatter around.
    pub fn distance(mut self, distance: Centimeters) -> Self {
        self.distance = distance;
        self
    }

    /// Half-width of the uniform noise added to every reading.
    pub fn noise(mut self, noise: Centimeters) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Probability that a reading is garbage (zero or far out of range),
    /// like a tracker briefly losing the face.
    pub fn glitch_rate(mut self, rate: f64) -> Self {
        self.glitch_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Readings per second.
    pub fn rate_hz(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    /// Start the generator thread.
    pub fn build(self) -> DummyTracker {
        DummyTracker::spawn(self)
    }
}

impl DummyTracker {
    /// A builder with the default settings.
    pub fn builder() -> DummyTrackerBuilder {
        DummyTrackerBuilder::default()
    }

    fn spawn(settings: DummyTrackerBuilder) -> Self {
        let (tx, rx) = mpsc::channel::<Signal>();
        let readings = Arc::new(Mutex::new(VecDeque::new()));
        let truth = Arc::new(Mutex::new(settings.distance));
        let th_readings = Arc::clone(&readings);
        let th_truth = Arc::clone(&truth);
        let period = Duration::from_secs_f64(1.0 / settings.rate_hz.max(0.1));

        let handle = thread::spawn(move || {
            let mut rng = thread_rng();
            let mut noise = settings.noise;
            let mut glitch_rate = settings.glitch_rate;
            let mut running = true;
            let mut paused = false;
            while running {
                while let Ok(received) = rx.try_recv() {
                    match received {
                        Signal::Distance(d) => *th_truth.lock().unwrap() = d,
                        Signal::Noise(n) => noise = n,
                        Signal::GlitchRate(g) => glitch_rate = g,
                        Signal::Pause(p) => paused = p,
                        Signal::Stop => running = false,
                    }
                }
                if !running {
                    break;
                }
                if paused {
                    spin_sleep::sleep(period);
                    continue;
                }

                let distance = *th_truth.lock().unwrap();
                let reading = if rng.gen_bool(glitch_rate) {
                    if rng.gen_bool(0.5) {
                        0.0
                    } else {
                        distance * 10.0
                    }
                } else {
                    distance + rng.gen_range(-noise..=noise)
                };
                th_readings.lock().unwrap().push_back(reading);
                spin_sleep::sleep(period);
            }
            info!("DummyTracker : terminated.");
        });

        DummyTracker {
            handle: Some(handle),
            tx,
            readings,
            truth,
            paused: false,
        }
    }

    /// The distance the readings are currently centered on.
    pub fn true_distance(&self) -> Centimeters {
        *self.truth.lock().unwrap()
    }

    /// Move the simulated viewer.
    pub fn set_distance(&self, distance: Centimeters) {
        self.signal(Signal::Distance(distance));
    }

    /// Half-width of the noise on each reading.
    pub fn set_noise(&self, noise: Centimeters) {
        self.signal(Signal::Noise(noise.abs()));
    }

    /// Probability that a reading is garbage.
    pub fn set_glitch_rate(&self, rate: f64) {
        self.signal(Signal::GlitchRate(rate.clamp(0.0, 1.0)));
    }

    /// Stop producing readings until [DummyTracker::resume], like a camera
    /// that lost sight of the viewer. Pending readings stay queued.
    pub fn pause(&mut self) {
        self.paused = true;
        self.signal(Signal::Pause(true));
    }

    /// Start producing readings again.
    pub fn resume(&mut self) {
        self.paused = false;
        self.signal(Signal::Pause(false));
    }

    /// Whether [DummyTracker::pause] is in effect.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the generator thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn signal(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            warn!("DummyTracker : thread is no longer running.");
        }
    }

    /// Stops the generator thread and waits for it.
    pub fn stop(&mut self) {
        // The thread may already be gone, that's fine.
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            if thread.join().is_err() {
                warn!("DummyTracker : thread panicked.");
            }
        }
    }
}

impl Drop for DummyTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Iterator for DummyTracker {
    type Item = Centimeters;
    fn next(&mut self) -> Option<Self::Item> {
        self.readings.lock().unwrap().pop_front()
    }
}

impl DistanceSource for DummyTracker {
    fn clear(&mut self) {
        self.readings.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn readings_stay_within_noise() {
        let mut tracker = DummyTracker::builder()
            .distance(50.0)
            .noise(1.0)
            .rate_hz(200.0)
            .build();
        sleep(Duration::from_millis(100));
        tracker.stop();

        let readings: Vec<_> = tracker.by_ref().collect();
        assert!(!readings.is_empty());
        assert!(readings.iter().all(|r| (49.0..=51.0).contains(r)));
    }

    #[test]
    fn follows_new_distance() {
        let mut tracker = DummyTracker::builder()
            .distance(30.0)
            .noise(0.0)
            .rate_hz(200.0)
            .build();
        tracker.set_distance(60.0);
        sleep(Duration::from_millis(50));
        tracker.clear();
        sleep(Duration::from_millis(50));
        tracker.stop();

        assert_eq!(tracker.true_distance(), 60.0);
        let readings: Vec<_> = tracker.by_ref().collect();
        assert!(!readings.is_empty());
        assert!(readings.iter().all(|&r| r == 60.0));
    }

    #[test]
    fn paused_tracker_stays_quiet() {
        let mut tracker = DummyTracker::builder().rate_hz(200.0).build();
        tracker.pause();
        assert!(tracker.is_paused());
        sleep(Duration::from_millis(30));
        tracker.clear();
        sleep(Duration::from_millis(50));
        assert_eq!(tracker.by_ref().count(), 0);

        tracker.resume();
        sleep(Duration::from_millis(50));
        assert!(tracker.by_ref().count() > 0);

        assert!(tracker.is_running());
        tracker.stop();
        assert!(!tracker.is_running());
    }
}
