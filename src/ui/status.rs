//! Status and help bar.

use crate::app::App;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

const HELP_LINE: &str =
    " r record  space play  n insert  d delete  t tempo  m metronome  s/l save/load  e mid  w wav  arrows scroll  q quit";

pub fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    if area.height == 0 {
        return;
    }

    let message = if app.session.is_recording() {
        format!(" ● {} samples buffered", app.live_samples)
    } else {
        match app.status() {
            Some(message) => format!(" {}", message),
            None => format!(" {}", app.session_config_summary()),
        }
    };

    frame.render_widget(
        Paragraph::new(message).style(Style::default().fg(Color::Yellow)),
        Rect::new(area.x, area.y, area.width, 1),
    );

    if area.height > 1 {
        frame.render_widget(
            Paragraph::new(HELP_LINE).style(Style::default().fg(Color::DarkGray)),
            Rect::new(area.x, area.y + 1, area.width, 1),
        );
    }
}
