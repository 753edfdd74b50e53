// src/ui/widgets/input.rs
use ratatui::{prelude::*, widgets::{Block, Borders, Paragraph}};
use crate::app::{App, AppState};

/// Renders the target input box. Shows the scanned host once a scan has started.
pub fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let (title, text) = match (&app.state, &app.target) {
        (AppState::Idle | AppState::Disclaimer, _) | (_, None) => ("Target Domain", app.input.as_str()),
        (_, Some(target)) => ("Target", target.as_str()),
    };
    let input_block = Block::default().borders(Borders::ALL).title(title);
    let input_paragraph = Paragraph::new(text)
        .block(input_block)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(input_paragraph, area);

    if let AppState::Idle = app.state {
        frame.set_cursor_position((area.x + app.input.chars().count() as u16 + 1, area.y + 1));
    }
}
