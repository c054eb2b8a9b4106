//! One eye's test, from the first optotype to the final score.
//!
//! A [TestSession] is the single owner of all mutable test state: the
//! staircase, the distance tracker, the distance gate and the trial log.
//! Everything that happens to a test arrives as a [SessionEvent] and the
//! session answers with the [SessionEffect]s its collaborators (screen,
//! speech recognizer, narrator) should carry out. Readings measured on
//! another thread reach it through [TestSession::drain_distances], so the
//! smoothed distance is only ever touched here.

use crate::{
    acuity::{AcuityChart, AcuityLevel},
    classifier::{Classification, RawResponse, ResponseClassifier, TestKind},
    config::TestConfig,
    distance_gate::{DistanceGate, GateChange, Guidance},
    distance_source::{Centimeters, DistanceSource, Eye},
    distance_tracker::DistanceTracker,
    optotype_sizer::{size_for, OptotypeSize},
    score::{FinalScore, ScoreCalculator, ScoreError},
    staircase::{AcuityStaircase, StaircaseState, Step},
};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, time::Instant};

/// Something that happened to a running test.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A raw distance reading for the eye under test.
    Distance(Centimeters),
    /// The recognizer produced a transcript or a swipe.
    Response(RawResponse),
    /// Nothing was recognized in time.
    ListenTimeout,
    /// The viewer left the test.
    Cancel,
}

/// Something the session wants done.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect<S> {
    /// Draw a new optotype.
    ShowOptotype {
        /// The optotype.
        symbol: S,
        /// Level it is drawn at.
        level: AcuityLevel,
        /// Size for the current distance.
        size: OptotypeSize,
    },
    /// Redraw the current optotype at a new size.
    Resize(OptotypeSize),
    /// Start the recognizer.
    StartListening,
    /// Stop the recognizer.
    StopListening,
    /// Say this to the viewer.
    Narrate(String),
    /// The viewer is out of range and must move.
    Paused(Guidance),
    /// The viewer is back in range.
    Resumed,
    /// The eye is done.
    Finished(FinalScore),
}

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built but not started.
    Ready,
    /// Waiting for an answer.
    Listening,
    /// The viewer is out of range.
    Paused,
    /// The staircase reached a score.
    Finished,
    /// The viewer left the test.
    Cancelled,
}

/// One scored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// The eye tested.
    pub eye: Eye,
    /// The kind of test.
    pub kind: TestKind,
    /// Level the optotype was shown at.
    pub acuity: AcuityLevel,
    /// The optotype shown.
    pub shown: String,
    /// The raw response.
    pub response: String,
    /// Whether the answer was right.
    pub is_correct: bool,
    /// 1-based position of this trial within its level.
    pub trial_in_level: u32,
    /// Smoothed viewing distance when the answer came.
    pub distance_cm: Centimeters,
    /// Time from listening to answer, pauses excluded.
    pub response_time_ms: u64,
    /// When the answer was scored.
    pub recorded_at: DateTime<Utc>,
}

/// A session could not go on.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The staircase ended on a level that can't be scored.
    Score(ScoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            SessionError::Score(error) => Cow::from(format!("scoring failed: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for SessionError {}

impl From<ScoreError> for SessionError {
    fn from(value: ScoreError) -> Self {
        SessionError::Score(value)
    }
}

type Effects<C> = Vec<SessionEffect<<C as ResponseClassifier>::Shown>>;

/// One eye's test. See the module docs.
pub struct TestSession<C: ResponseClassifier> {
    classifier: C,
    eye: Eye,
    config: TestConfig,
    staircase: AcuityStaircase,
    tracker: DistanceTracker,
    gate: DistanceGate,
    phase: Phase,
    shown: Option<C::Shown>,
    shown_at: Instant,
    sized_at: Centimeters,
    trials: Vec<TrialResult>,
    score: Option<FinalScore>,
    rng: StdRng,
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl<C: ResponseClassifier> TestSession<C> {
    /// A session for `eye` using the settings in `config` and a chart
    /// already checked with [TestConfig::validate]. The target distance
    /// starts at the configured default.
    pub fn new(classifier: C, eye: Eye, config: &TestConfig, chart: AcuityChart) -> Self {
        let mut tracker = DistanceTracker::new(config.plausible_distance_cm);
        tracker.set_target(config.default_target_distance_cm);
        tracker.reset_to_target();
        let gate = DistanceGate::new(
            config.default_target_distance_cm,
            config.distance_tolerance,
            config.resume_margin_cm,
        );

        Self {
            classifier,
            eye,
            config: config.clone(),
            staircase: AcuityStaircase::new(chart, config.rules(), None),
            tracker,
            gate,
            phase: Phase::Ready,
            shown: None,
            shown_at: Instant::now(),
            sized_at: config.default_target_distance_cm,
            trials: vec![],
            score: None,
            rng: StdRng::from_entropy(),
            session_id: None,
            started_at: None,
        }
    }

    /// Start at `level` instead of the top of the chart. Only takes effect
    /// before [TestSession::start].
    pub fn starting_at(mut self, level: AcuityLevel) -> Self {
        if self.phase == Phase::Ready {
            self.staircase = AcuityStaircase::new(
                self.staircase.chart().clone(),
                self.config.rules(),
                Some(level),
            );
        }
        self
    }

    /// Make optotype draws reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Use `distance` as the test distance if it is inside the capture range.
    pub fn capture_target(&mut self, distance: Centimeters) -> bool {
        if !self
            .tracker
            .capture_target(distance, self.config.capture_range_cm)
        {
            return false;
        }
        self.gate = DistanceGate::new(
            distance,
            self.config.distance_tolerance,
            self.config.resume_margin_cm,
        );
        self.sized_at = distance;
        true
    }

    /// The eye under test.
    pub fn eye(&self) -> Eye {
        self.eye
    }

    /// The kind of test.
    pub fn kind(&self) -> TestKind {
        self.classifier.kind()
    }

    /// Where the session is.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Finished or cancelled.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Cancelled)
    }

    /// The staircase.
    pub fn staircase(&self) -> &AcuityStaircase {
        &self.staircase
    }

    /// The distance tracker.
    pub fn tracker(&self) -> &DistanceTracker {
        &self.tracker
    }

    /// The distance gate.
    pub fn gate(&self) -> &DistanceGate {
        &self.gate
    }

    /// The settings the session runs with.
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// The optotype on screen, if any.
    pub fn shown(&self) -> Option<C::Shown> {
        self.shown
    }

    /// Every scored response so far.
    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    /// `<kind>_<eye>_<start time>`, set by [TestSession::start].
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// When [TestSession::start] was called.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// The final score, once finished.
    pub fn score(&self) -> Option<FinalScore> {
        self.score
    }

    /// The distance letters are sized for: the live one, or the target
    /// before any reading arrived.
    pub fn sizing_distance(&self) -> Centimeters {
        let live = self.tracker.current_distance_cm();
        if live > 0.0 {
            live
        } else {
            self.tracker.target_distance_cm()
        }
    }

    /// Size of the optotype at the current level and distance.
    pub fn optotype_size(&self) -> Option<OptotypeSize> {
        self.staircase.current_level().map(|level| {
            size_for(
                level.denominator(),
                self.sizing_distance(),
                self.config.pixels_per_inch,
            )
        })
    }

    /// Show the first optotype and start listening.
    pub fn start(&mut self) -> Effects<C> {
        if self.phase != Phase::Ready {
            warn!("{} eye test already started", self.eye);
            return vec![];
        }

        let started_at = Utc::now();
        let session_id = format!(
            "{}_{}_{}",
            self.kind(),
            self.eye,
            started_at.format("%Y%m%d_%H%M%S_%3f")
        );
        info!("Starting {} test for the {} eye as {}", self.kind(), self.eye, session_id);
        self.started_at = Some(started_at);
        self.session_id = Some(session_id);

        let other = match self.eye {
            Eye::Left => Eye::Right,
            Eye::Right => Eye::Left,
        };
        let mut effects = vec![SessionEffect::Narrate(format!(
            "Cover your {} eye.",
            other.to_string().to_lowercase()
        ))];

        self.tracker.reset_to_target();
        self.phase = Phase::Listening;
        effects.extend(self.next_optotype());
        effects
    }

    /// Pull every reading waiting in `source` through the session.
    pub fn drain_distances<S: DistanceSource>(&mut self, source: &mut S) -> Effects<C> {
        let mut effects = vec![];
        for reading in source.by_ref() {
            effects.extend(self.on_distance(reading));
        }
        effects
    }

    /// Feed one event.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Effects<C>, SessionError> {
        match event {
            SessionEvent::Distance(cm) => Ok(self.on_distance(cm)),
            SessionEvent::Response(raw) => self.on_response(&raw),
            SessionEvent::ListenTimeout => Ok(self.on_timeout()),
            SessionEvent::Cancel => Ok(self.on_cancel()),
        }
    }

    /// Feed a whole sequence of events, stopping early once the test is
    /// over. Returns every effect in order.
    pub fn replay<I>(&mut self, events: I) -> Result<Effects<C>, SessionError>
    where
        I: IntoIterator<Item = SessionEvent>,
    {
        let mut effects = vec![];
        for event in events {
            if self.is_over() {
                warn!("{} eye test is over, ignoring the remaining events", self.eye);
                break;
            }
            effects.extend(self.handle(event)?);
        }
        Ok(effects)
    }

    fn next_optotype(&mut self) -> Effects<C> {
        let (level, size) = match (self.staircase.current_level(), self.optotype_size()) {
            (Some(level), Some(size)) => (level, size),
            _ => return vec![],
        };
        let symbol = self.classifier.draw(&mut self.rng);
        debug!("Showing {} at {}", symbol, level);

        self.shown = Some(symbol);
        self.shown_at = Instant::now();
        self.sized_at = self.sizing_distance();

        vec![
            SessionEffect::ShowOptotype {
                symbol,
                level,
                size,
            },
            SessionEffect::StartListening,
        ]
    }

    fn on_distance(&mut self, cm: Centimeters) -> Effects<C> {
        if !self.tracker.add_reading(cm) {
            return vec![];
        }
        if !matches!(self.phase, Phase::Listening | Phase::Paused) {
            return vec![];
        }

        let live = self.tracker.current_distance_cm();
        match self.gate.check(live) {
            GateChange::Steady => {
                if (live - self.sized_at).abs() < self.config.rescale_threshold_cm {
                    return vec![];
                }
                self.sized_at = live;
                self.optotype_size()
                    .map(SessionEffect::Resize)
                    .into_iter()
                    .collect()
            }
            GateChange::Paused(guidance) => {
                self.phase = Phase::Paused;
                vec![
                    SessionEffect::StopListening,
                    SessionEffect::Paused(guidance),
                    SessionEffect::Narrate(guidance.instruction().to_string()),
                ]
            }
            GateChange::Redirect(guidance) => vec![
                SessionEffect::Paused(guidance),
                SessionEffect::Narrate(guidance.instruction().to_string()),
            ],
            GateChange::StillPaused => vec![],
            GateChange::Resumed => {
                self.phase = Phase::Listening;
                self.sized_at = live;
                // time spent out of range doesn't count against the viewer
                self.shown_at = Instant::now();
                let mut effects = vec![SessionEffect::Resumed];
                effects.extend(self.optotype_size().map(SessionEffect::Resize));
                effects.push(SessionEffect::StartListening);
                effects
            }
        }
    }

    fn on_response(&mut self, raw: &RawResponse) -> Result<Effects<C>, SessionError> {
        if self.phase != Phase::Listening {
            debug!("Dropping {} while {:?}", raw, self.phase);
            return Ok(vec![]);
        }
        let shown = match self.shown {
            Some(shown) => shown,
            None => return Ok(vec![]),
        };

        let is_correct = match self.classifier.classify(raw) {
            Classification::Ignore => {
                debug!("Ignoring {}, listening again", raw);
                return Ok(vec![SessionEffect::StartListening]);
            }
            Classification::NoMatch => false,
            Classification::Answer(answer) => self.classifier.is_correct(shown, answer),
        };

        let (level, trial_in_level) = match (self.staircase.current_level(), self.staircase.state()) {
            (Some(level), StaircaseState::InProgress { trial_in_level, .. }) => {
                (level, trial_in_level + 1)
            }
            _ => return Ok(vec![]),
        };

        self.trials.push(TrialResult {
            eye: self.eye,
            kind: self.kind(),
            acuity: level,
            shown: shown.to_string(),
            response: raw.to_string(),
            is_correct,
            trial_in_level,
            distance_cm: self.sizing_distance(),
            response_time_ms: self.shown_at.elapsed().as_millis() as u64,
            recorded_at: Utc::now(),
        });
        self.shown = None;

        let mut effects = vec![SessionEffect::StopListening];
        match self.staircase.record(is_correct) {
            Step::Continue | Step::Advanced(_) | Step::Retreated(_) => {
                effects.extend(self.next_optotype());
            }
            Step::Finished(terminal) => {
                let calculator =
                    ScoreCalculator::new(self.staircase.chart(), self.config.trials_per_level);
                let score = calculator.score_terminal(&terminal)?;
                info!("{} eye finished: {}", self.eye, score);
                self.score = Some(score);
                self.phase = Phase::Finished;
                effects.push(SessionEffect::Finished(score));
            }
            Step::AlreadyFinished => {}
        }

        Ok(effects)
    }

    fn on_timeout(&mut self) -> Effects<C> {
        if self.phase == Phase::Listening {
            debug!("Nothing heard, listening again");
            vec![SessionEffect::StartListening]
        } else {
            warn!("Stale listen timeout while {:?}", self.phase);
            vec![]
        }
    }

    fn on_cancel(&mut self) -> Effects<C> {
        if self.is_over() {
            return vec![];
        }
        info!("{} eye test cancelled", self.eye);
        self.phase = Phase::Cancelled;
        self.shown = None;
        vec![SessionEffect::StopListening]
    }
}
