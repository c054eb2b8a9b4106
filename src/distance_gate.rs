//! Keeps the viewer near the captured test distance. The test pauses when
//! the live distance leaves a band around the target and resumes only once
//! it is comfortably back inside, so it doesn't flicker at the edge.

use crate::distance_source::Centimeters;

use log::info;

/// Which way the viewer has to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    /// The viewer is too far away.
    MoveCloser,
    /// The viewer is too close.
    MoveFarther,
}

impl Guidance {
    /// The sentence narrated to the viewer.
    pub fn instruction(self) -> &'static str {
        match self {
            Guidance::MoveCloser => "Move closer.",
            Guidance::MoveFarther => "Move farther.",
        }
    }
}

/// What a new distance did to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChange {
    /// Still running, distance in range.
    Steady,
    /// Just left the band.
    Paused(Guidance),
    /// Still paused but now off on the other side.
    Redirect(Guidance),
    /// Still paused, same side as before.
    StillPaused,
    /// Back inside the band.
    Resumed,
}

/// Pauses the test when the viewer leaves the band around the target distance.
#[derive(Debug, Clone)]
pub struct DistanceGate {
    lower: Centimeters,
    upper: Centimeters,
    resume_margin: Centimeters,
    paused: Option<Guidance>,
}

impl DistanceGate {
    /// A band of `target * (1 ± tolerance)`, with `resume_margin` of
    /// hysteresis on each side while paused.
    pub fn new(target: Centimeters, tolerance: f64, resume_margin: Centimeters) -> Self {
        Self {
            lower: target * (1.0 - tolerance),
            upper: target * (1.0 + tolerance),
            resume_margin,
            paused: None,
        }
    }

    /// Lower and upper edge of the band.
    pub fn bounds(&self) -> (Centimeters, Centimeters) {
        (self.lower, self.upper)
    }

    /// Whether the test is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    fn guidance_for(&self, live: Centimeters) -> Option<Guidance> {
        if live < self.lower {
            Some(Guidance::MoveFarther)
        } else if live > self.upper {
            Some(Guidance::MoveCloser)
        } else {
            None
        }
    }

    /// Feed the current smoothed distance.
    pub fn check(&mut self, live: Centimeters) -> GateChange {
        match self.paused {
            None => match self.guidance_for(live) {
                None => GateChange::Steady,
                Some(guidance) => {
                    info!("Pausing test, distance out of range: {:.1} cm", live);
                    self.paused = Some(guidance);
                    GateChange::Paused(guidance)
                }
            },
            Some(previous) => {
                if live > self.lower + self.resume_margin && live < self.upper - self.resume_margin {
                    info!("Resuming test, distance back in range: {:.1} cm", live);
                    self.paused = None;
                    return GateChange::Resumed;
                }

                match self.guidance_for(live) {
                    Some(guidance) if guidance != previous => {
                        self.paused = Some(guidance);
                        GateChange::Redirect(guidance)
                    }
                    _ => GateChange::StillPaused,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> DistanceGate {
        // band 32..48, resume inside 35..45
        DistanceGate::new(40.0, 0.2, 3.0)
    }

    #[test]
    fn bounds_are_twenty_percent() {
        let (lo, hi) = gate().bounds();
        assert!((lo - 32.0).abs() < 1e-9);
        assert!((hi - 48.0).abs() < 1e-9);
    }

    #[test]
    fn pauses_with_the_right_instruction() {
        let mut g = gate();
        assert_eq!(g.check(40.0), GateChange::Steady);
        assert_eq!(g.check(50.0), GateChange::Paused(Guidance::MoveCloser));
        assert!(g.is_paused());

        let mut g = gate();
        assert_eq!(g.check(20.0), GateChange::Paused(Guidance::MoveFarther));
        assert_eq!(Guidance::MoveFarther.instruction(), "Move farther.");
    }

    #[test]
    fn resumes_only_well_inside_the_band() {
        let mut g = gate();
        g.check(50.0);
        // back in the band, but within the hysteresis margin
        assert_eq!(g.check(46.0), GateChange::StillPaused);
        assert!(g.is_paused());
        assert_eq!(g.check(44.0), GateChange::Resumed);
        assert!(!g.is_paused());
    }

    #[test]
    fn redirects_when_overshooting() {
        let mut g = gate();
        g.check(50.0);
        assert_eq!(g.check(52.0), GateChange::StillPaused);
        assert_eq!(g.check(20.0), GateChange::Redirect(Guidance::MoveFarther));
        assert_eq!(g.check(21.0), GateChange::StillPaused);
    }
}
