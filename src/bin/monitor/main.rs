mod gui;

use eyechart::{
    config::TestConfig, distance_gate::DistanceGate, distance_tracker::DistanceTracker,
    dummy_tracker::DummyTracker,
};
use gui::{engage_gui, TrackerSettings};

fn main() {
    env_logger::init();
    let config = TestConfig::default();
    let target = config.default_target_distance_cm;

    let settings = TrackerSettings {
        noise: 1.5,
        glitch_rate: 0.05,
    };
    let tracker = DummyTracker::builder()
        .distance(target)
        .noise(settings.noise)
        .glitch_rate(settings.glitch_rate)
        .build();
    let mut smoother = DistanceTracker::new(config.plausible_distance_cm);
    smoother.capture_target(target, config.capture_range_cm);
    let gate = DistanceGate::new(target, config.distance_tolerance, config.resume_margin_cm);

    if let Err(err) = engage_gui(tracker, settings, smoother, gate) {
        eprintln!("{}", err);
    }
}
