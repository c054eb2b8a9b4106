use eyechart::{
    acuity::AcuityLevel,
    classifier::{DirectionClassifier, PhoneticLetterClassifier, TestKind},
    config::TestConfig,
    distance_gate::Guidance,
    distance_source::Eye,
    event_decoder::parse_script,
    export::{ExamRecord, SessionRecord},
    session::{Phase, SessionEffect, TestSession},
    staircase::TerminalReason,
};
use std::{thread, time::Duration};

/// Ten unrecognizable letters at 20/200, with chatter, a timeout and a
/// stretch where the viewer leans back out of range.
const FLOOR_SCRIPT: &str = r#"
# settle at the target
distance 40
distance 40.5
say "X"
say "what is this letter supposed to be"
timeout
say "X"

# lean back
distance 70
distance 70
distance 70
distance 70
distance 70
say "X"   # dropped, the test is paused
distance 40
distance 40
distance 40
distance 40
distance 40

say "X"
say "X"
say "X"
say "X"
say "X"
say "X"
say "X"
say "X"
"#;

#[test]
fn failing_the_largest_letters_cannot_assess() {
    let config = TestConfig::default();
    let chart = config.validate().unwrap();
    let mut session = TestSession::new(PhoneticLetterClassifier::new(), Eye::Right, &config, chart);
    session.start();

    let events = parse_script(FLOOR_SCRIPT).unwrap();
    let effects = session.replay(events).unwrap();

    assert!(effects.contains(&SessionEffect::Paused(Guidance::MoveCloser)));
    assert!(effects.contains(&SessionEffect::Narrate("Move closer.".to_string())));
    assert!(effects.contains(&SessionEffect::Resumed));

    // the paused answer and the chatter never became trials
    assert_eq!(session.trials().len(), 10);
    assert!(session.trials().iter().all(|t| !t.is_correct));
    assert!(session
        .trials()
        .iter()
        .all(|t| t.acuity == AcuityLevel(200)));

    let terminal = session.staircase().terminal().unwrap();
    assert_eq!(terminal.reason, TerminalReason::CouldNotAssess);
    assert_eq!(terminal.primary.level, AcuityLevel(160));

    let score = session.score().unwrap();
    assert!((score.logmar - 1.1).abs() < 1e-9);
    assert_eq!(score.to_string(), "LogMAR: 1.1000, Snellen: 20/251");
    assert_eq!(session.phase(), Phase::Finished);
}

#[test]
fn cancelled_replay_exports_its_trials() {
    let config = TestConfig::default();
    let chart = config.validate().unwrap();
    let mut session = TestSession::new(DirectionClassifier, Eye::Left, &config, chart)
        .starting_at(AcuityLevel(50))
        .with_seed(11);
    session.start();

    let script = "distance 39\nswipe up\nswipe left\nsay \"up\"\nswipe down\ncancel\nswipe right\n";
    session.replay(parse_script(script).unwrap()).unwrap();

    assert_eq!(session.phase(), Phase::Cancelled);
    // the transcript is ignored by a swipe test, the last swipe came too late
    assert_eq!(session.trials().len(), 3);
    assert_eq!(session.score(), None);

    let mut record = ExamRecord::new(session.kind(), config.pixels_per_inch);
    record.sessions.push(SessionRecord::from_session(&session));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("left.ron");
    record.to_path(&path).unwrap();
    let back = ExamRecord::from_path(&path).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.sessions[0].trials[0].acuity, AcuityLevel(50));
    assert_eq!(back.score_for(Eye::Left), None);

    // identity and timing survive the file
    let id = session.session_id().unwrap();
    assert!(id.starts_with("Tumbling_E_Left_"));
    let saved = back.session(id).unwrap();
    assert_eq!(saved.started_at, session.started_at());
    let stamps: Vec<_> = saved.trials.iter().map(|t| t.recorded_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(stamps[0] >= saved.started_at.unwrap());
}

#[test]
fn separate_runs_are_told_apart_and_ordered() {
    let config = TestConfig::default();
    let mut record = ExamRecord::new(TestKind::Etdrs, config.pixels_per_inch);
    for _ in 0..2 {
        let chart = config.validate().unwrap();
        let mut session =
            TestSession::new(PhoneticLetterClassifier::new(), Eye::Right, &config, chart);
        session.start();
        session
            .replay(parse_script("say \"X\"\ncancel\n").unwrap())
            .unwrap();
        record.sessions.push(SessionRecord::from_session(&session));
        thread::sleep(Duration::from_millis(5));
    }

    let mut text = vec![];
    record.to_file(&mut text).unwrap();
    let back = ExamRecord::from_file(&mut text.as_slice()).unwrap();

    let (first, second) = (&back.sessions[0], &back.sessions[1]);
    assert_ne!(first.session_id, second.session_id);
    assert!(first.started_at < second.started_at);
    assert!(first.trials[0].recorded_at < second.trials[0].recorded_at);
}
