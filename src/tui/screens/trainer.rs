use std::time::{Duration, Instant};

use rand::Rng;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use ratatui::crossterm::event::{KeyCode, KeyEventKind};

use crate::engine::matching::Telemetry;
use crate::engine::session::{FrameSource, Session, TickOutcome, TonePlayer};
use crate::engine::{Mode, Target, TrainerConfig};
use crate::theory;
use crate::tui::event::{AppEvent, EventHandler};
use crate::tui::widgets::tuner::TunerWidget;
use crate::tui::Tui;

/// Engine tick and render cadence (~30 fps).
const TICK_RATE_MS: u64 = 33;

/// Session summary reported back to the CLI after the screen exits.
pub struct TrainerOutcome {
    pub solved: usize,
    pub elapsed_secs: u64,
    pub average_note_secs: f64,
}

/// Per-session counters kept by the screen, not the engine.
struct Stats {
    solved: usize,
    note_started_ms: f64,
    last_note_secs: u64,
    total_solved_secs: u64,
    last_label: Option<String>,
}

impl Stats {
    fn record_solved(
        &mut self,
        target: &Target,
        cfg: &TrainerConfig,
        now_ms: f64,
        rng: &mut impl Rng,
    ) {
        self.solved += 1;
        self.last_note_secs = ((now_ms - self.note_started_ms) / 1000.0).floor() as u64;
        self.total_solved_secs += self.last_note_secs;
        self.note_started_ms = now_ms;
        self.last_label = Some(solved_label(target, cfg, rng));
    }

    fn average_secs(&self) -> f64 {
        if self.solved == 0 {
            0.0
        } else {
            self.total_solved_secs as f64 / self.solved as f64
        }
    }
}

/// Label shown for a just-confirmed target: a checkmark in continuous
/// mode (there is no meaningful note name), the interval relative to the
/// root in tonal mode, and a randomly spelled note name otherwise.
fn solved_label(target: &Target, cfg: &TrainerConfig, rng: &mut impl Rng) -> String {
    match (cfg.mode, target.note) {
        (Mode::Continuous, _) | (_, None) => "\u{2714}".into(),
        (Mode::Tonal, Some(note)) => theory::interval_label(note, cfg.root_pc).into(),
        (_, Some(note)) => {
            theory::enharmonic_name(theory::display_note(note, cfg.transpose), rng)
        }
    }
}

/// Run the training screen until the user quits.
///
/// The configuration is owned by the screen and handed fresh into every
/// engine call; the adjustment keys below mutate it live between ticks.
pub fn run<S, P>(
    terminal: &mut Tui,
    session: &mut Session<S, P>,
    cfg: &mut TrainerConfig,
) -> anyhow::Result<TrainerOutcome>
where
    S: FrameSource,
    P: TonePlayer,
{
    let events = EventHandler::new(Duration::from_millis(TICK_RATE_MS));
    let start = Instant::now();
    let mut rng = rand::thread_rng();

    let mut stats = Stats {
        solved: 0,
        note_started_ms: 0.0,
        last_note_secs: 0,
        total_solved_secs: 0,
        last_label: None,
    };
    let mut last_telemetry: Option<Telemetry> = None;
    let mut show_debug = false;

    loop {
        let now_ms = start.elapsed().as_secs_f64() * 1000.0;

        if let Some(TickOutcome { telemetry, solved }) = session.tick(cfg, now_ms, &mut rng) {
            if let Some(target) = solved {
                stats.record_solved(&target, cfg, now_ms, &mut rng);
            }
            last_telemetry = Some(telemetry);
        }

        let elapsed_secs = start.elapsed().as_secs();
        terminal.draw(|frame| {
            render_trainer(
                frame.area(),
                frame,
                cfg,
                &stats,
                elapsed_secs,
                last_telemetry.as_ref(),
                show_debug,
            );
        })?;

        match events.next()? {
            AppEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('t') => session.play_tonic(cfg, &mut rng),
                KeyCode::Char('r') => cfg.replay = !cfg.replay,
                KeyCode::Char('d') => show_debug = !show_debug,
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    cfg.tolerance_cents = (cfg.tolerance_cents + 1.0).min(200.0);
                }
                KeyCode::Char('-') => {
                    cfg.tolerance_cents = (cfg.tolerance_cents - 1.0).max(1.0);
                }
                _ => {}
            },
            AppEvent::Key(_) | AppEvent::Tick | AppEvent::Resize(_, _) => {}
        }
    }

    session.stop();

    Ok(TrainerOutcome {
        solved: stats.solved,
        elapsed_secs: start.elapsed().as_secs(),
        average_note_secs: stats.average_secs(),
    })
}

#[allow(clippy::too_many_arguments)]
fn render_trainer(
    area: Rect,
    frame: &mut ratatui::Frame,
    cfg: &TrainerConfig,
    stats: &Stats,
    elapsed_secs: u64,
    telemetry: Option<&Telemetry>,
    show_debug: bool,
) {
    let outer = Block::default()
        .title(" pitchgym ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::White));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let rows = Layout::vertical([
        Constraint::Length(3), // last note + mode
        Constraint::Length(4), // tuner
        Constraint::Length(3), // stats
        Constraint::Length(if show_debug { 2 } else { 0 }),
        Constraint::Min(0),
        Constraint::Length(1), // key hints
    ])
    .split(inner);

    render_note_row(frame, rows[0], cfg, stats);
    let tuner_cents = telemetry.and_then(|t| t.tuner_cents);
    frame.render_widget(TunerWidget::new(tuner_cents, cfg.tolerance_cents), rows[1]);
    render_stats_row(frame, rows[2], stats, elapsed_secs);
    if show_debug {
        render_debug_row(frame, rows[3], cfg, telemetry);
    }
    render_hints(frame, rows[5], cfg);
}

fn render_note_row(frame: &mut ratatui::Frame, area: Rect, cfg: &TrainerConfig, stats: &Stats) {
    let block = Block::default().title(" Last note ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label = stats.last_label.as_deref().unwrap_or("Listen\u{2026}");
    let text = format!("{label}   [{}]", cfg.mode);
    let line = Line::from(Span::styled(
        format!("{:^width$}", text, width = inner.width as usize),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(line), inner);
}

fn render_stats_row(frame: &mut ratatui::Frame, area: Rect, stats: &Stats, elapsed_secs: u64) {
    let block = Block::default().title(" Stats ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = Line::from(vec![
        Span::raw(format!("  Elapsed {elapsed_secs}s")),
        Span::raw("   "),
        Span::styled(
            format!("Correct {}", stats.solved),
            Style::default().fg(Color::Green),
        ),
        Span::raw("   "),
        Span::raw(format!("Note {}s", stats.last_note_secs)),
        Span::raw("   "),
        Span::raw(format!("Avg {:.2}s", stats.average_secs())),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
}

fn render_debug_row(
    frame: &mut ratatui::Frame,
    area: Rect,
    cfg: &TrainerConfig,
    telemetry: Option<&Telemetry>,
) {
    let text = match telemetry {
        Some(t) => format!(
            "  f {:7.2} Hz  goal {:7.2} Hz  diff {:>6}  clarity {:.3}  {:6.1} dB  \
             loud {}  clear {}  input {}  locked {}  tol {:.0}  [{}]",
            t.frequency_hz,
            t.goal_hz,
            t.deviation_cents
                .map(|c| format!("{c:+.1}"))
                .unwrap_or_else(|| "-".into()),
            t.clarity,
            t.loudness_db,
            yes_no(t.loud_enough),
            yes_no(t.clear_enough),
            yes_no(t.has_input),
            yes_no(t.locked),
            cfg.tolerance_cents,
            t.mode,
        ),
        None => "  (no ticks yet)".into(),
    };
    let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(line), area);
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "n"
    }
}

fn render_hints(frame: &mut ratatui::Frame, area: Rect, cfg: &TrainerConfig) {
    let mut spans = vec![
        Span::styled("  [q]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" stop  "),
        Span::styled("[+/-]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" tolerance  "),
        Span::styled("[r]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(if cfg.replay { " replay on  " } else { " replay off  " }),
        Span::styled("[d]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" debug"),
    ];
    if cfg.mode == Mode::Tonal {
        spans.push(Span::styled(
            "  [t]",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" tonic"));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn solved_label_by_mode() {
        let mut rng = Pcg32::seed_from_u64(1);

        let continuous = TrainerConfig {
            mode: Mode::Continuous,
            ..TrainerConfig::default()
        };
        let free = Target {
            note: Some(60),
            frequency_hz: 262.3,
        };
        assert_eq!(solved_label(&free, &continuous, &mut rng), "\u{2714}");

        let tonal = TrainerConfig {
            mode: Mode::Tonal,
            root_pc: 0,
            ..TrainerConfig::default()
        };
        let third = Target::from_note(64, 440.0);
        assert_eq!(solved_label(&third, &tonal, &mut rng), "3");

        let minmax = TrainerConfig::default();
        let a4 = Target::from_note(69, 440.0);
        assert_eq!(solved_label(&a4, &minmax, &mut rng), "A4");
    }

    #[test]
    fn solved_label_applies_display_transpose() {
        let mut rng = Pcg32::seed_from_u64(1);
        let cfg = TrainerConfig {
            transpose: -2,
            ..TrainerConfig::default()
        };
        // Concert C4 reads as D4 on a Bb instrument.
        let target = Target::from_note(60, 440.0);
        assert_eq!(solved_label(&target, &cfg, &mut rng), "D4");
    }

    #[test]
    fn stats_average_over_solved_notes() {
        let mut stats = Stats {
            solved: 0,
            note_started_ms: 0.0,
            last_note_secs: 0,
            total_solved_secs: 0,
            last_label: None,
        };
        assert_eq!(stats.average_secs(), 0.0);

        let cfg = TrainerConfig::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let target = Target::from_note(60, 440.0);
        stats.record_solved(&target, &cfg, 3200.0, &mut rng);
        stats.record_solved(&target, &cfg, 8400.0, &mut rng);

        assert_eq!(stats.solved, 2);
        assert_eq!(stats.last_note_secs, 5);
        assert_eq!(stats.total_solved_secs, 8);
        assert!((stats.average_secs() - 4.0).abs() < 1e-9);
    }
}
