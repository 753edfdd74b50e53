// src/ui/widgets/progress.rs

use crate::app::{App, AppState, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge},
};

/// Renders the scan progress gauge with the latest milestone message.
pub fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    let (label, color) = match app.state {
        AppState::Scanning => (
            format!("{} {}", SPINNER_CHARS[app.spinner_frame], app.status_message),
            Color::Cyan,
        ),
        AppState::Finished => ("Scan complete!".to_string(), Color::Green),
        AppState::Failed => (
            format!("Failed: {}", app.error.as_deref().unwrap_or("unknown error")),
            Color::Red,
        ),
        AppState::Idle | AppState::Disclaimer => ("Idle".to_string(), Color::DarkGray),
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(color))
        .percent(u16::from(app.progress.min(100)))
        .label(label);
    frame.render_widget(gauge, area);
}
