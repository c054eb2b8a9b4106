use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Chart, Dataset, GraphType},
    Frame, Terminal,
};
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use eyechart::{
    distance_gate::{DistanceGate, GateChange},
    distance_source::FaceSample,
    distance_tracker::DistanceTracker,
    dummy_tracker::{DummyTracker, DEFAULT_RATE_HZ},
    face_buffer::FaceBuffer,
};

/// Seconds of history kept on screen.
const WINDOW_SECS: f64 = 20.0;
/// Raw readings are clipped to this so glitches stay on the chart.
const Y_MAX: f64 = 100.0;
const STEP_CM: f64 = 5.0;
const NOISE_STEP_CM: f64 = 0.5;
const GLITCH_RATE: f64 = 0.05;

/// How the simulated tracker starts out.
pub struct TrackerSettings {
    pub noise: f64,
    pub glitch_rate: f64,
}

struct App {
    tracker: DummyTracker,
    settings: TrackerSettings,
    frames: FaceBuffer,
    smoother: DistanceTracker,
    gate: DistanceGate,
    raw: Vec<(f64, f64)>,
    smoothed: Vec<(f64, f64)>,
    lower: Vec<(f64, f64)>,
    upper: Vec<(f64, f64)>,
    t: f64,
    status: String,
}

impl App {
    fn new(
        tracker: DummyTracker,
        settings: TrackerSettings,
        smoother: DistanceTracker,
        gate: DistanceGate,
    ) -> App {
        App {
            tracker,
            settings,
            // both eyes, the way a calibration reads them
            frames: FaceBuffer::new(None),
            smoother,
            gate,
            raw: vec![],
            smoothed: vec![],
            lower: vec![],
            upper: vec![],
            t: 0.0,
            status: "Steady".to_string(),
        }
    }

    fn on_tick(&mut self) {
        let readings: Vec<_> = self.tracker.by_ref().collect();
        for reading in readings {
            self.t += 1.0 / DEFAULT_RATE_HZ;
            self.raw.push((self.t, reading.clamp(0.0, Y_MAX)));
            self.frames.add_sample(FaceSample::facing_camera(reading));
        }

        if self.smoother.drain_from(&mut self.frames) > 0 {
            let live = self.smoother.current_distance_cm();
            self.smoothed.push((self.t, live));
            match self.gate.check(live) {
                GateChange::Paused(g) | GateChange::Redirect(g) => {
                    self.status = format!("Paused: {}", g.instruction())
                }
                GateChange::Resumed => self.status = "Resumed".to_string(),
                GateChange::Steady | GateChange::StillPaused => {}
            }
        }

        let start = self.t - WINDOW_SECS;
        self.raw.retain(|&(t, _)| t >= start);
        self.smoothed.retain(|&(t, _)| t >= start);
        let (lower, upper) = self.gate.bounds();
        self.lower = vec![(start, lower), (self.t, lower)];
        self.upper = vec![(start, upper), (self.t, upper)];
    }
}

pub fn engage_gui(
    tracker: DummyTracker,
    settings: TrackerSettings,
    smoother: DistanceTracker,
    gate: DistanceGate,
) -> Result<(), Box<dyn Error>> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // create app and run it
    let tick_rate = Duration::from_millis(100);
    let app = App::new(tracker, settings, smoother, gate);
    let res = run_app(&mut terminal, app, tick_rate);

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => {
                        app.tracker.stop();
                        return Ok(());
                    }
                    KeyCode::Char('+') => {
                        app.tracker.set_distance(app.tracker.true_distance() + STEP_CM)
                    }
                    KeyCode::Char('-') => app
                        .tracker
                        .set_distance((app.tracker.true_distance() - STEP_CM).max(STEP_CM)),
                    KeyCode::Char('n') => {
                        app.settings.noise += NOISE_STEP_CM;
                        app.tracker.set_noise(app.settings.noise);
                    }
                    KeyCode::Char('N') => {
                        app.settings.noise = (app.settings.noise - NOISE_STEP_CM).max(0.0);
                        app.tracker.set_noise(app.settings.noise);
                    }
                    KeyCode::Char('g') => {
                        app.settings.glitch_rate = if app.settings.glitch_rate > 0.0 {
                            0.0
                        } else {
                            GLITCH_RATE
                        };
                        app.tracker.set_glitch_rate(app.settings.glitch_rate);
                    }
                    _ => {}
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let start = (app.t - WINDOW_SECS).max(0.0);
    let title = format!(
        "Distance (cm), viewer at {:.0} cm, noise {:.1} cm, glitches {:.0}%, {}  \
         [+/- move, n/N noise, g glitches, q quit]",
        app.tracker.true_distance(),
        app.settings.noise,
        app.settings.glitch_rate * 100.0,
        app.status
    );
    let chart = Chart::new(vec![
        Dataset::default()
            .name("Raw")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Cyan))
            .data(&app.raw),
        Dataset::default()
            .name("Smoothed")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&app.smoothed),
        Dataset::default()
            .name("Band")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&app.lower),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&app.upper),
    ])
    .block(Block::default().title(title))
    .x_axis(
        Axis::default()
            .title(Span::styled("Time (s)", Style::default().fg(Color::Red)))
            .style(Style::default().fg(Color::White))
            .bounds([start, start + WINDOW_SECS])
            .labels(vec![
                Span::from(format!("{:.0}", start)),
                Span::from(format!("{:.0}", start + WINDOW_SECS / 2.0)),
                Span::from(format!("{:.0}", start + WINDOW_SECS)),
            ]),
    )
    .y_axis(
        Axis::default()
            .title(Span::styled("cm", Style::default().fg(Color::Red)))
            .style(Style::default().fg(Color::White))
            .bounds([0.0, Y_MAX])
            .labels(
                ["0", "25", "50", "75", "100"]
                    .iter()
                    .cloned()
                    .map(Span::from)
                    .collect(),
            ),
    );

    f.render_widget(chart, f.size());
}
