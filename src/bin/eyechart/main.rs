//! Runs an eye exam in the terminal, or replays a scripted one.

use clap::Parser;
use eyechart::{
    acuity::{AcuityChart, AcuityLevel},
    args::{CommandTask, EyeChartArgs, ReplayCommand},
    classifier::{DirectionClassifier, PhoneticLetterClassifier, ResponseClassifier, TestKind},
    config::TestConfig,
    dummy_tracker::DummyTracker,
    event_decoder::parse_script,
    exam::Examination,
    export::{ExamRecord, SessionRecord},
    gui::{acuity_picker, run_exam},
    session::TestSession,
};

use log::{info, warn};
use std::{error::Error, fs, path::Path};

// Example:
// cargo run --bin eyechart -- --ppi 458 --distance 40 exam etdrs
// cargo run --bin eyechart -- -s 63 replay run.txt --kind tumbling-e --seed 7

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = EyeChartArgs::parse();

    let mut config = match &args.config {
        Some(path) => TestConfig::from_path(path)?,
        None => TestConfig::default(),
    };
    if let Some(ppi) = args.ppi {
        config.pixels_per_inch = ppi;
    }
    let chart = config.validate()?;
    let start = args.start.map(AcuityLevel);
    let outfile = args.outfile.as_deref();

    match &args.command {
        CommandTask::Exam(exam) => {
            let start = match start {
                Some(level) => level,
                None => match acuity_picker(chart.levels())? {
                    Some(level) => level,
                    None => return Ok(()),
                },
            };
            let setup = ExamSetup {
                config: &config,
                chart,
                start,
                distance: args.distance,
                outfile,
            };
            match exam.kind {
                TestKind::Etdrs => setup.run(PhoneticLetterClassifier::new()),
                TestKind::TumblingE => setup.run(DirectionClassifier),
            }
        }
        CommandTask::Replay(replay) => {
            let setup = ReplaySetup {
                config: &config,
                chart,
                start,
                distance: args.distance,
                outfile,
                command: replay,
            };
            match replay.kind {
                TestKind::Etdrs => setup.run(PhoneticLetterClassifier::new()),
                TestKind::TumblingE => setup.run(DirectionClassifier),
            }
        }
    }
}

struct ExamSetup<'a> {
    config: &'a TestConfig,
    chart: AcuityChart,
    start: AcuityLevel,
    distance: Option<f64>,
    outfile: Option<&'a Path>,
}

impl ExamSetup<'_> {
    fn run<C: ResponseClassifier + Clone>(self, classifier: C) -> Result<(), Box<dyn Error>> {
        let (low, high) = self.config.capture_range_cm;
        let requested = self.distance.filter(|d| (low..=high).contains(d));
        if self.distance.is_some() && requested.is_none() {
            warn!("Distance is outside the capture range, testing at the default distance instead");
        }
        let distance = requested.unwrap_or(self.config.default_target_distance_cm);
        let mut exam = Examination::new(classifier, self.config, self.chart).starting_at(self.start);
        if requested.is_some() {
            exam = exam.at_distance(distance);
        }

        let tracker = DummyTracker::builder()
            .distance(distance)
            .noise(0.8)
            .glitch_rate(0.02)
            .build();
        let exam = run_exam(exam, tracker, self.config.listen_timeout())?;

        for line in exam.summary() {
            println!("{}", line);
        }
        if let Some(path) = self.outfile {
            exam.record().to_path(path)?;
            info!("Wrote exam to {}", path.display());
        }
        Ok(())
    }
}

struct ReplaySetup<'a> {
    config: &'a TestConfig,
    chart: AcuityChart,
    start: Option<AcuityLevel>,
    distance: Option<f64>,
    outfile: Option<&'a Path>,
    command: &'a ReplayCommand,
}

impl ReplaySetup<'_> {
    fn run<C: ResponseClassifier>(self, classifier: C) -> Result<(), Box<dyn Error>> {
        let text = fs::read_to_string(&self.command.script)?;
        let events = parse_script(&text)?;

        let mut session = TestSession::new(classifier, self.command.eye, self.config, self.chart);
        if let Some(level) = self.start {
            session = session.starting_at(level);
        }
        if let Some(seed) = self.command.seed {
            session = session.with_seed(seed);
        }
        if let Some(distance) = self.distance {
            if !session.capture_target(distance) {
                warn!("Testing at the default distance instead");
            }
        }

        session.start();
        session.replay(events)?;

        match session.score() {
            Some(score) => println!("{} eye: {}", session.eye(), score),
            None => println!("{} eye: not assessed", session.eye()),
        }
        if let Some(path) = self.outfile {
            let mut record = ExamRecord::new(session.kind(), self.config.pixels_per_inch);
            record.sessions.push(SessionRecord::from_session(&session));
            record.to_path(path)?;
            info!("Wrote replay to {}", path.display());
        }
        Ok(())
    }
}
