use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

/// Needle range in cents; readings are pinned to the ends beyond this.
const MAX_CENTS: f64 = 50.0;

/// Tuner readout: a centered needle bar plus a signed cents label.
/// `cents` of `None` renders the no-signal state.
pub struct TunerWidget {
    cents: Option<f64>,
    tolerance_cents: f64,
}

impl TunerWidget {
    pub fn new(cents: Option<f64>, tolerance_cents: f64) -> Self {
        Self {
            cents,
            tolerance_cents,
        }
    }
}

impl Widget for TunerWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().title(" Tuner ").borders(Borders::ALL);
        let inner = block.inner(area);
        block.render(area, buf);

        let Some(cents) = self.cents else {
            let line = Line::from(Span::styled(
                format!("{:^width$}", "---", width = inner.width as usize),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            ));
            Paragraph::new(line).render(inner, buf);
            return;
        };

        let in_tune = cents.abs() < self.tolerance_cents;
        let color = if in_tune {
            Color::Green
        } else if cents.abs() <= MAX_CENTS {
            Color::Yellow
        } else {
            Color::Red
        };

        let rows = Layout::vertical([
            Constraint::Length(1), // needle bar
            Constraint::Length(1), // cents label
        ])
        .split(inner);

        // Needle bar: center tick = on pitch, left = flat, right = sharp.
        let bar_width = (inner.width as usize).saturating_sub(2);
        if bar_width > 0 {
            let center = bar_width / 2;
            let clamped = cents.clamp(-MAX_CENTS, MAX_CENTS);
            let offset = ((clamped / MAX_CENTS) * center as f64) as i32;
            let pos = (center as i32 + offset).clamp(0, bar_width as i32 - 1) as usize;

            let mut bar = vec!['━'; bar_width];
            bar[center] = '┃';
            bar[pos] = '●';

            let bar_str: String = bar.into_iter().collect();
            let bar_line = Line::from(Span::styled(
                format!("◄{bar_str}►"),
                Style::default().fg(color),
            ));
            Paragraph::new(bar_line).render(rows[0], buf);
        }

        if rows.len() > 1 {
            let sign = if cents >= 0.0 { "+" } else { "" };
            let label = format!("{sign}{:.0}\u{00a2}", cents.clamp(-MAX_CENTS, MAX_CENTS));
            let line = Line::from(Span::styled(
                format!("{:^width$}", label, width = inner.width as usize),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
            Paragraph::new(line).render(rows[1], buf);
        }
    }
}
