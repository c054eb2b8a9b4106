//! A full examination: the right eye, then the left.

use crate::{
    acuity::{AcuityChart, AcuityLevel},
    classifier::ResponseClassifier,
    config::TestConfig,
    distance_source::{Centimeters, Eye},
    export::{ExamRecord, SessionRecord},
    score::FinalScore,
    session::{Phase, SessionError, SessionEffect, SessionEvent, TestSession},
};

use log::info;
use std::collections::BTreeMap;

/// The order eyes are tested in.
pub const EYE_ORDER: [Eye; 2] = [Eye::Right, Eye::Left];

/// Runs one [TestSession] per eye with the same classifier and settings,
/// keeping each eye's score.
pub struct Examination<C: ResponseClassifier + Clone> {
    classifier: C,
    config: TestConfig,
    chart: AcuityChart,
    start: Option<AcuityLevel>,
    target: Option<Centimeters>,
    seed: Option<u64>,
    next_eye: usize,
    session: Option<TestSession<C>>,
    results: BTreeMap<Eye, FinalScore>,
    record: ExamRecord,
    cut_short: bool,
}

impl<C: ResponseClassifier + Clone> Examination<C> {
    /// An exam with one session per eye, none started yet.
    pub fn new(classifier: C, config: &TestConfig, chart: AcuityChart) -> Self {
        let record = ExamRecord::new(classifier.kind(), config.pixels_per_inch);
        Self {
            classifier,
            config: config.clone(),
            chart,
            start: None,
            target: None,
            seed: None,
            next_eye: 0,
            session: None,
            results: BTreeMap::new(),
            record,
            cut_short: false,
        }
    }

    /// Start each eye at `level`.
    pub fn starting_at(mut self, level: AcuityLevel) -> Self {
        self.start = Some(level);
        self
    }

    /// Test at `distance` instead of the configured default. Ignored when it
    /// is outside the capture range.
    pub fn at_distance(mut self, distance: Centimeters) -> Self {
        self.target = Some(distance);
        self
    }

    /// Seed every session's optotype draws.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The eye that the next call to [Examination::begin_next_eye] tests.
    /// `None` once both eyes are done or a session was cancelled.
    pub fn next_eye(&self) -> Option<Eye> {
        if self.cut_short {
            return None;
        }
        EYE_ORDER.get(self.next_eye).copied()
    }

    /// Set up and start the session for the next eye. Returns `None` once
    /// the exam is complete or while a session is still running.
    pub fn begin_next_eye(&mut self) -> Option<Vec<SessionEffect<C::Shown>>> {
        if self.session.as_ref().is_some_and(|s| !s.is_over()) {
            return None;
        }
        let eye = self.next_eye()?;
        self.next_eye += 1;

        let mut session = TestSession::new(self.classifier.clone(), eye, &self.config, self.chart.clone());
        if let Some(level) = self.start {
            session = session.starting_at(level);
        }
        if let Some(seed) = self.seed {
            session = session.with_seed(seed.wrapping_add(self.next_eye as u64));
        }
        if let Some(target) = self.target {
            session.capture_target(target);
        }

        let effects = session.start();
        self.session = Some(session);
        Some(effects)
    }

    /// The running (or just finished) session.
    pub fn session(&self) -> Option<&TestSession<C>> {
        self.session.as_ref()
    }

    /// Forward an event to the current session, keeping its result when it
    /// ends.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionEffect<C::Shown>>, SessionError> {
        let session = match self.session.as_mut() {
            Some(session) if !session.is_over() => session,
            _ => return Ok(vec![]),
        };

        let effects = session.handle(event)?;
        if session.is_over() {
            let eye = session.eye();
            if let Some(score) = session.score() {
                info!("{} eye: {}", eye, score);
                self.results.insert(eye, score);
            }
            self.record.sessions.push(SessionRecord::from_session(session));
            if session.phase() == Phase::Cancelled {
                info!("{} eye cancelled, ending the exam", eye);
                self.cut_short = true;
            }
        }
        Ok(effects)
    }

    /// Scores of the eyes finished so far.
    pub fn results(&self) -> &BTreeMap<Eye, FinalScore> {
        &self.results
    }

    /// Score of `eye`, if it finished.
    pub fn result(&self, eye: Eye) -> Option<FinalScore> {
        self.results.get(&eye).copied()
    }

    /// Both eyes have been tested, or a cancelled session cut the exam
    /// short.
    pub fn is_complete(&self) -> bool {
        self.next_eye().is_none() && self.session.as_ref().map_or(true, |s| s.is_over())
    }

    /// Whether a cancelled session ended the exam early.
    pub fn was_cut_short(&self) -> bool {
        self.cut_short
    }

    /// Everything recorded so far.
    pub fn record(&self) -> &ExamRecord {
        &self.record
    }

    /// One line per eye, right first.
    pub fn summary(&self) -> Vec<String> {
        EYE_ORDER
            .iter()
            .map(|eye| match self.results.get(eye) {
                Some(score) => format!("{} eye: {}", eye, score),
                None => format!("{} eye: not assessed", eye),
            })
            .collect()
    }
}
