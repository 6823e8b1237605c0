//! Piano roll rendering.
//!
//! Displays the editor's note boxes on a grid with pitch on the Y-axis and
//! time on the X-axis. One terminal row is one pitch row; one cell is one
//! roll device unit, so box rects map directly onto cells.

use crate::app::App;
use crate::melody::note_to_name;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Width of the note-name label column.
const LABEL_WIDTH: u16 = 5;

/// Pitch rows whose piano key is black, within the lowest octave.
const BLACK_KEYS: [u8; 5] = [1, 3, 6, 8, 10];

/// Renders the roll and stores the grid region on the app for mouse
/// handling.
pub fn render_piano_roll(frame: &mut Frame, area: Rect, app: &mut App) {
    if area.width <= LABEL_WIDTH + 2 || area.height < 2 {
        app.grid_area = Rect::default();
        return;
    }

    let grid = Rect::new(
        area.x + LABEL_WIDTH,
        area.y,
        area.width - LABEL_WIDTH,
        area.height,
    );
    app.grid_area = grid;

    let metrics = *app.editor.metrics();
    let selected = app.editor.selected();
    let playhead_x = metrics.x_from_beats(app.session.playhead());
    let show_playhead = app.session.is_playing() || app.session.is_recording();

    for row in 0..area.height {
        let y = app.scroll_y + row as f64;
        let pitch = metrics.pitch_from_y(y);
        let screen_y = area.y + row;

        if !(0..=127).contains(&pitch) {
            continue;
        }
        let pitch = pitch as u8;
        let is_black_key = BLACK_KEYS.contains(&(pitch % 12));
        let is_c = pitch % 12 == 0;

        // Note name label (piano key column)
        let key_style = if is_black_key {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        } else if is_c {
            Style::default().bg(Color::White).fg(Color::Black)
        } else {
            Style::default().bg(Color::Gray).fg(Color::Black)
        };
        let label = if is_c || pitch % 12 == 5 {
            format!("{:>4} ", note_to_name(pitch))
        } else {
            "     ".to_string()
        };
        frame.render_widget(
            Paragraph::new(label).style(key_style),
            Rect::new(area.x, screen_y, LABEL_WIDTH, 1),
        );

        // Grid row
        let mut cells: Vec<Span> = Vec::with_capacity(grid.width as usize);
        for col in 0..grid.width {
            let x = app.scroll_x + col as f64;

            // The box under this cell, if any: first hit in list order
            let box_here = app
                .editor
                .boxes()
                .iter()
                .find(|b| b.rect.contains(x, y + 0.5));

            let is_playhead = show_playhead && (x..x + 1.0).contains(&playhead_x);
            let is_beat_line = (x / metrics.beat_width).fract() == 0.0;

            let (ch, style) = if let Some(b) = box_here {
                let is_start = x < b.rect.x + 1.0;
                let bg = if selected == Some(b.note_id) {
                    Color::Magenta
                } else {
                    Color::Green
                };
                let ch = if is_start { '[' } else { '=' };
                (ch, Style::default().fg(Color::Black).bg(bg))
            } else if is_playhead {
                (
                    '|',
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )
            } else {
                let bg = if is_black_key {
                    Color::Rgb(30, 30, 30)
                } else {
                    Color::Rgb(40, 40, 40)
                };
                let (ch, fg) = if is_beat_line {
                    (':', Color::DarkGray)
                } else {
                    ('.', Color::Rgb(60, 60, 60))
                };
                (ch, Style::default().fg(fg).bg(bg))
            };

            cells.push(Span::styled(ch.to_string(), style));
        }

        frame.render_widget(
            Paragraph::new(Line::from(cells)),
            Rect::new(grid.x, screen_y, grid.width, 1),
        );
    }
}
