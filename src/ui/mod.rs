//! Terminal UI rendering.
//!
//! One frame is a title bar, the piano roll, and a status/help bar. The
//! roll rendering reads the editor's geometry model; nothing here touches
//! note data directly.

mod piano_roll;
mod status;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Renders one frame and records the grid region for mouse hit testing.
pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(5),    // Piano roll
            Constraint::Length(2), // Status + help
        ])
        .split(frame.area());

    render_title(frame, chunks[0], app);
    piano_roll::render_piano_roll(frame, chunks[1], app);
    status::render_status(frame, chunks[2], app);
}

fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let state = if app.session.is_recording() {
        Span::styled(
            " ● REC ",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )
    } else if app.session.is_playing() {
        Span::styled(
            " ▶ PLAY ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(" ■ IDLE ", Style::default().fg(Color::DarkGray))
    };

    let tempo = match &app.tempo_entry {
        Some(entry) => format!("tempo: {}▏", entry),
        None => format!("{:.0} BPM", app.melody.tempo),
    };

    let modified = if app.is_modified() { "*" } else { "" };

    let line = Line::from(vec![
        Span::styled(
            " humtui ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        state,
        Span::raw(format!(
            " {}{}  |  {}  |  {} notes  |  beat {:.2}",
            app.melody.name,
            modified,
            tempo,
            app.melody.note_count(),
            app.session.playhead(),
        )),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}
