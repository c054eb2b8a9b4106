use std::{
    collections::VecDeque,
    fmt::Display,
    io::{self, stdout},
    sync::mpsc::{channel, Sender},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crate::{
    acuity::AcuityLevel,
    classifier::{self, RawResponse, ResponseClassifier},
    component::{run_component, DistanceMeasurer, MeasuredDistances},
    distance_gate::Guidance,
    distance_source::{DistanceSource, Eye, FaceSample},
    dummy_tracker::DummyTracker,
    exam::Examination,
    gui::error::ChartGuiError,
    optotype_sizer::OptotypeSize,
    session::{SessionEffect, SessionEvent},
    staircase::StaircaseState,
};

use crossterm::{
    event::{self, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use log::info;
use ratatui::{
    backend::Backend,
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

const TICK: Duration = Duration::from_millis(16);
const NARRATION_LINES: usize = 6;
/// How far one keypress moves the simulated viewer.
const STEP_CM: f64 = 5.0;

/// What the screen currently shows, rebuilt from session effects.
#[derive(Debug)]
pub struct ExamScreen<S> {
    /// The optotype on screen, its level and size.
    pub shown: Option<(S, AcuityLevel, OptotypeSize)>,
    /// Whether the recognizer is on.
    pub listening: bool,
    /// When listening last started.
    pub listening_since: Instant,
    /// The guidance shown while paused.
    pub paused: Option<Guidance>,
    /// The latest narration, oldest first.
    pub narration: VecDeque<String>,
    /// What the viewer has typed so far.
    pub typed: String,
}

impl<S> Default for ExamScreen<S> {
    fn default() -> Self {
        Self {
            shown: None,
            listening: false,
            listening_since: Instant::now(),
            paused: None,
            narration: VecDeque::new(),
            typed: String::new(),
        }
    }
}

impl<S: Display> ExamScreen<S> {
    fn say(&mut self, line: String) {
        self.narration.push_back(line);
        while self.narration.len() > NARRATION_LINES {
            self.narration.pop_front();
        }
    }

    /// Carry out what the session asked for.
    pub fn apply(&mut self, effects: Vec<SessionEffect<S>>) {
        for effect in effects {
            match effect {
                SessionEffect::ShowOptotype {
                    symbol,
                    level,
                    size,
                } => self.shown = Some((symbol, level, size)),
                SessionEffect::Resize(size) => {
                    if let Some((_, _, current)) = self.shown.as_mut() {
                        *current = size;
                    }
                }
                SessionEffect::StartListening => {
                    self.listening = true;
                    self.listening_since = Instant::now();
                }
                SessionEffect::StopListening => self.listening = false,
                SessionEffect::Narrate(line) => self.say(line),
                SessionEffect::Paused(guidance) => self.paused = Some(guidance),
                SessionEffect::Resumed => self.paused = None,
                SessionEffect::Finished(score) => {
                    self.shown = None;
                    self.listening = false;
                    self.say(format!("Finished. {}", score));
                }
            }
        }
    }

    /// The listening window ran out.
    pub fn timed_out(&self, timeout: Duration) -> bool {
        self.listening && self.listening_since.elapsed() >= timeout
    }
}

/// A [DistanceMeasurer] running for one eye, fed simulated frames.
struct MeasurerLink {
    frames: Sender<FaceSample>,
    distances: MeasuredDistances,
    handle: JoinHandle<()>,
}

impl MeasurerLink {
    fn start(eye: Eye) -> Self {
        let (frames, frame_rx) = channel();
        let (dist_tx, dist_rx) = channel();
        let handle = run_component(
            Box::new(DistanceMeasurer::new(Some(eye))),
            frame_rx,
            dist_tx,
        );
        Self {
            frames,
            distances: MeasuredDistances::new(dist_rx),
            handle,
        }
    }

    fn stop(self) -> Result<(), ChartGuiError> {
        drop(self.frames);
        self.handle.join().map_err(|_| ChartGuiError::JoinError)
    }
}

/// Feed `event` to the exam and show the result.
fn dispatch<C>(
    exam: &mut Examination<C>,
    screen: &mut ExamScreen<C::Shown>,
    event: SessionEvent,
) -> Result<(), ChartGuiError>
where
    C: ResponseClassifier + Clone,
{
    let effects = exam.handle(event)?;
    screen.apply(effects);
    Ok(())
}

/// Wait up to `tick` for a keypress on the real terminal.
fn crossterm_keys(tick: Duration) -> io::Result<Option<KeyEvent>> {
    if event::poll(tick)? {
        if let event::Event::Key(key) = event::read()? {
            return Ok(Some(key));
        }
    }
    Ok(None)
}

/// Everything a running exam owns besides the terminal.
struct ExamRun<C: ResponseClassifier + Clone> {
    exam: Examination<C>,
    tracker: DummyTracker,
    link: Option<MeasurerLink>,
    screen: ExamScreen<C::Shown>,
    start_next: bool,
    listen_timeout: Duration,
}

impl<C: ResponseClassifier + Clone> ExamRun<C> {
    fn new(exam: Examination<C>, mut tracker: DummyTracker, listen_timeout: Duration) -> Self {
        // nobody is measured until the first eye starts
        tracker.pause();
        Self {
            exam,
            tracker,
            link: None,
            screen: ExamScreen::default(),
            start_next: true,
            listen_timeout,
        }
    }

    fn begin_next_eye(&mut self) {
        let eye = match self.exam.next_eye() {
            Some(eye) => eye,
            None => return,
        };
        if let Some(effects) = self.exam.begin_next_eye() {
            self.tracker.clear();
            self.tracker.resume();
            self.link = Some(MeasurerLink::start(eye));
            self.screen.paused = None;
            self.screen.apply(effects);
        }
    }

    /// Stop measuring once an eye is done, until the next one starts.
    fn end_eye(&mut self) -> Result<(), ChartGuiError> {
        self.tracker.pause();
        if let Some(measurer) = self.link.take() {
            measurer.stop()?;
        }
        self.tracker.clear();
        Ok(())
    }

    /// Stop the tracker and the measurer, whatever state they are in.
    fn shut_down(&mut self) -> Result<(), ChartGuiError> {
        self.tracker.stop();
        match self.link.take() {
            Some(measurer) => measurer.stop(),
            None => Ok(()),
        }
    }

    /// The exam loop. Returns when the viewer quits or on the first error,
    /// leaving cleanup to the caller.
    fn run<B, K>(&mut self, terminal: &mut Terminal<B>, mut next_key: K) -> Result<(), ChartGuiError>
    where
        B: Backend,
        K: FnMut(Duration) -> io::Result<Option<KeyEvent>>,
    {
        loop {
            if self.start_next && self.link.is_none() {
                self.start_next = false;
                self.begin_next_eye();
            }

            if let Some(measurer) = self.link.as_mut() {
                for reading in self.tracker.by_ref() {
                    measurer.frames.send(FaceSample::facing_camera(reading))?;
                }
                let distances: Vec<_> = measurer.distances.by_ref().collect();
                for cm in distances {
                    dispatch(&mut self.exam, &mut self.screen, SessionEvent::Distance(cm))?;
                }
            }

            if self.screen.timed_out(self.listen_timeout) {
                dispatch(&mut self.exam, &mut self.screen, SessionEvent::ListenTimeout)?;
            }

            terminal.draw(|frame| {
                ui(frame, &self.exam, &self.screen, self.tracker.true_distance())
            })?;

            let eye_over = self.exam.session().map_or(false, |s| s.is_over());
            if eye_over && self.link.is_some() {
                self.end_eye()?;
            }

            let key = match next_key(TICK)? {
                Some(key) if key.kind == KeyEventKind::Press => key,
                _ => continue,
            };
            let (exam, screen) = (&mut self.exam, &mut self.screen);
            match key.code {
                KeyCode::Esc => {
                    dispatch(exam, screen, SessionEvent::Cancel)?;
                    return Ok(());
                }
                KeyCode::Char('+') => self
                    .tracker
                    .set_distance(self.tracker.true_distance() + STEP_CM),
                KeyCode::Char('-') => self
                    .tracker
                    .set_distance((self.tracker.true_distance() - STEP_CM).max(STEP_CM)),
                KeyCode::Up => swipe(exam, screen, classifier::Direction::Up)?,
                KeyCode::Down => swipe(exam, screen, classifier::Direction::Down)?,
                KeyCode::Left => swipe(exam, screen, classifier::Direction::Left)?,
                KeyCode::Right => swipe(exam, screen, classifier::Direction::Right)?,
                KeyCode::Backspace => {
                    screen.typed.pop();
                }
                KeyCode::Char(c) if c.is_alphanumeric() || c == ' ' => screen.typed.push(c),
                KeyCode::Enter if !screen.typed.is_empty() => {
                    let text = std::mem::take(&mut screen.typed);
                    let response = SessionEvent::Response(RawResponse::Transcript(text));
                    dispatch(exam, screen, response)?;
                }
                KeyCode::Enter if exam.is_complete() => return Ok(()),
                KeyCode::Enter if eye_over => self.start_next = true,
                _ => {}
            }
        }
    }
}

/// Run both eyes of `exam` in the terminal. The simulated `tracker` stands
/// in for the camera; `+`/`-` move the simulated viewer away or closer.
/// The terminal is restored and the tracker stopped even when the exam
/// fails part way.
pub fn run_exam<C>(
    exam: Examination<C>,
    tracker: DummyTracker,
    listen_timeout: Duration,
) -> Result<Examination<C>, ChartGuiError>
where
    C: ResponseClassifier + Clone,
{
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let mut run = ExamRun::new(exam, tracker, listen_timeout);
    let res = Terminal::new(CrosstermBackend::new(stdout()))
        .map_err(ChartGuiError::from)
        .and_then(|mut terminal| {
            terminal.clear()?;
            run.run(&mut terminal, crossterm_keys)
        });
    let stopped = run.shut_down();

    // restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    res?;
    stopped?;
    info!("Exam over: {}", run.exam.summary().join("; "));
    Ok(run.exam)
}

fn swipe<C>(
    exam: &mut Examination<C>,
    screen: &mut ExamScreen<C::Shown>,
    direction: classifier::Direction,
) -> Result<(), ChartGuiError>
where
    C: ResponseClassifier + Clone,
{
    let response = SessionEvent::Response(RawResponse::Swipe(direction));
    dispatch(exam, screen, response)
}

fn ui<C>(frame: &mut Frame, exam: &Examination<C>, screen: &ExamScreen<C::Shown>, viewer_cm: f64)
where
    C: ResponseClassifier + Clone,
{
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(NARRATION_LINES as u16 + 2),
        ])
        .split(frame.size());

    let status = match exam.session() {
        Some(session) => {
            let (lower, upper) = session.gate().bounds();
            let trial = match session.staircase().state() {
                StaircaseState::InProgress { trial_in_level, .. } => trial_in_level + 1,
                StaircaseState::Terminal(_) => session.config().trials_per_level,
            };
            format!(
                " {} eye | {} | trial {} | live {:.1} cm (band {:.0}-{:.0}) | viewer {:.0} cm ",
                session.eye(),
                session.kind(),
                trial,
                session.tracker().current_distance_cm(),
                lower,
                upper,
                viewer_cm,
            )
        }
        None => " No eye under test ".to_string(),
    };
    frame.render_widget(
        Paragraph::new(status).block(Block::default().borders(Borders::ALL)),
        areas[0],
    );

    let mut lines = vec![];
    if let Some(guidance) = screen.paused {
        lines.push(Line::from(guidance.instruction().red().bold()));
    } else if let Some((symbol, level, size)) = &screen.shown {
        lines.push(Line::from(Span::styled(
            symbol.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(format!(
            "{}  {:.1} x {:.1} px, {:.1} pt",
            level, size.width_px, size.height_px, size.font_size_pt
        )));
    } else if exam.is_complete() {
        lines.extend(exam.summary().into_iter().map(Line::from));
        lines.push(Line::from("Press <Enter> to finish".magenta()));
    } else if let Some(eye) = exam.next_eye() {
        lines.push(Line::from(format!("Press <Enter> to test the {} eye", eye)));
    }
    if screen.listening {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Listening... {}", screen.typed),
            Style::default().fg(Color::Green),
        )));
    }

    let instructions = Title::from(Line::from(vec![
        " Answer ".into(),
        "<Letters><Enter>/<Arrows>".magenta().bold(),
        " Move ".into(),
        "<+>/<->".magenta().bold(),
        " Quit ".into(),
        "<Esc> ".magenta().bold(),
    ]));
    let block = Block::default()
        .title(Title::from(" Eye Chart ".magenta().bold()).alignment(Alignment::Center))
        .title(
            instructions
                .alignment(Alignment::Center)
                .position(Position::Bottom),
        )
        .borders(Borders::ALL);
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block),
        areas[1],
    );

    let narration = List::new(screen.narration.iter().map(|s| s.as_str()))
        .block(Block::default().title(" Narration ").borders(Borders::ALL));
    frame.render_widget(narration, areas[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{DirectionClassifier, PhoneticLetterClassifier, Rotation};
    use crate::config::TestConfig;
    use crate::score::FinalScore;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use std::thread::sleep;

    fn exam_run<C: ResponseClassifier + Clone>(classifier: C) -> ExamRun<C> {
        let config = TestConfig::default();
        let chart = config.validate().unwrap();
        let exam = Examination::new(classifier, &config, chart).with_seed(5);
        let tracker = DummyTracker::builder().noise(0.2).rate_hz(100.0).build();
        ExamRun::new(exam, tracker, Duration::from_secs(3600))
    }

    fn press(code: KeyCode) -> Option<KeyEvent> {
        Some(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn failing_terminal_still_shuts_down() {
        let mut run = exam_run(DirectionClassifier);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let mut reads = 0;
        let res = run.run(&mut terminal, |_| {
            reads += 1;
            if reads < 3 {
                Ok(None)
            } else {
                Err(io::Error::new(io::ErrorKind::Other, "terminal went away"))
            }
        });
        assert!(matches!(res, Err(ChartGuiError::IOError(_))));
        // the right eye was mid-test
        assert!(run.link.is_some());
        assert!(run.tracker.is_running());

        run.shut_down().unwrap();
        assert!(run.link.is_none());
        assert!(!run.tracker.is_running());
        assert_eq!(run.exam.session().map(|s| s.eye()), Some(Eye::Right));
    }

    #[test]
    fn tracker_rests_between_eyes() {
        let mut run = exam_run(PhoneticLetterClassifier::new());
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        // ten unreadable answers end the right eye at the top of the chart
        let mut keys = vec![];
        for _ in 0..10 {
            keys.push(press(KeyCode::Char('x')));
            keys.push(press(KeyCode::Enter));
        }
        keys.push(None);
        keys.push(press(KeyCode::Esc));
        let mut keys = keys.into_iter();
        run.run(&mut terminal, |_| Ok(keys.next().flatten())).unwrap();

        assert!(run.exam.result(Eye::Right).is_some());
        assert_eq!(run.exam.next_eye(), Some(Eye::Left));
        assert!(run.link.is_none());
        assert!(run.tracker.is_paused());

        run.tracker.clear();
        sleep(Duration::from_millis(50));
        assert_eq!(run.tracker.by_ref().count(), 0);
        run.shut_down().unwrap();
    }

    fn size() -> OptotypeSize {
        OptotypeSize {
            width_px: 50.0,
            height_px: 10.0,
            font_size_pt: 3.0,
        }
    }

    #[test]
    fn screen_follows_effects() {
        let mut screen = ExamScreen::<Rotation>::default();
        screen.apply(vec![
            SessionEffect::Narrate("Cover your left eye.".into()),
            SessionEffect::ShowOptotype {
                symbol: Rotation::Deg90,
                level: AcuityLevel(200),
                size: size(),
            },
            SessionEffect::StartListening,
        ]);
        assert!(screen.listening);
        assert_eq!(screen.shown.map(|(s, _, _)| s), Some(Rotation::Deg90));

        let bigger = OptotypeSize {
            height_px: 12.0,
            ..size()
        };
        screen.apply(vec![
            SessionEffect::StopListening,
            SessionEffect::Paused(Guidance::MoveCloser),
            SessionEffect::Resize(bigger),
        ]);
        assert!(!screen.listening);
        assert_eq!(screen.paused, Some(Guidance::MoveCloser));
        assert_eq!(screen.shown.map(|(_, _, s)| s), Some(bigger));

        screen.apply(vec![
            SessionEffect::Resumed,
            SessionEffect::Finished(FinalScore {
                logmar: 1.0,
                snellen_denominator: 200.0,
            }),
        ]);
        assert_eq!(screen.paused, None);
        assert!(screen.shown.is_none());
        assert_eq!(
            screen.narration.back().map(String::as_str),
            Some("Finished. LogMAR: 1.0000, Snellen: 20/200")
        );
    }

    #[test]
    fn narration_keeps_the_latest_lines() {
        let mut screen = ExamScreen::<Rotation>::default();
        for i in 0..10 {
            screen.apply(vec![SessionEffect::Narrate(i.to_string())]);
        }
        assert_eq!(screen.narration.len(), NARRATION_LINES);
        assert_eq!(screen.narration.front().map(String::as_str), Some("4"));
    }

    #[test]
    fn times_out_only_while_listening() {
        let mut screen = ExamScreen::<Rotation>::default();
        assert!(!screen.timed_out(Duration::ZERO));
        screen.apply(vec![SessionEffect::StartListening]);
        assert!(screen.timed_out(Duration::ZERO));
        assert!(!screen.timed_out(Duration::from_secs(3600)));
    }
}
