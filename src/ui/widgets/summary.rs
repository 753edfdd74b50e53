// src/ui/widgets/summary.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
};
use serde_json::Value;
use vanguard_recon::core::models::{Stage, Technology};

/// Renders the score, per-category checks, issue counts and detected
/// technologies. Empty until a scan has finished.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Score & rating
            Constraint::Length(1), // Gauge
            Constraint::Length(1),
            Constraint::Length(5), // Security checks
            Constraint::Length(1),
            Constraint::Length(4), // Issues
            Constraint::Length(1),
            Constraint::Min(0), // Technologies
        ])
        .split(area);

    if !matches!(app.state, AppState::Finished) {
        return;
    }

    // --- Score & Rating ---
    let (rating_text, rating_style) = match app.summary.score {
        90..=100 => ("Excellent", Style::default().fg(Color::Green)),
        75..=89 => ("Good", Style::default().fg(Color::Cyan)),
        50..=74 => ("Needs Improvement", Style::default().fg(Color::Yellow)),
        _ => ("Poor", Style::default().fg(Color::Red)),
    };
    let score_line = Line::from(format!("{}/100 ({})", app.summary.score, rating_text)).style(rating_style);
    let score_text = Text::from(vec![Line::from("Overall Score".bold()), score_line]);
    frame.render_widget(Paragraph::new(score_text).alignment(Alignment::Center), summary_chunks[0]);

    let score_gauge = Gauge::default()
        .percent(u16::from(app.displayed_score))
        .label("")
        .style(Style::default().fg(if app.displayed_score >= 80 {
            Color::Green
        } else if app.displayed_score >= 50 {
            Color::Yellow
        } else {
            Color::Red
        }));
    frame.render_widget(score_gauge, summary_chunks[1]);

    // --- Security Checks ---
    let checks = [
        ("DNS & Email", app.summary.dns_check_passed),
        ("SSL/TLS Certificate", app.summary.ssl_check_passed),
        ("HTTP Security Headers", app.summary.headers_check_passed),
        ("Exposed Services", app.summary.network_check_passed),
    ];
    let checks_lines: Vec<Line> = checks
        .into_iter()
        .map(|(name, passed)| {
            let (icon, style) = if passed {
                ("✓", Style::default().fg(Color::Green))
            } else {
                ("✗", Style::default().fg(Color::Red))
            };
            Line::from(vec![Span::styled(format!("{icon} "), style), Span::raw(name)])
        })
        .collect();
    let checks_block = Block::default().title("SECURITY CHECKS".bold());
    frame.render_widget(Paragraph::new(checks_lines).block(checks_block), summary_chunks[3]);

    // --- Issues ---
    let total_vulnerabilities = app
        .document
        .as_ref()
        .map(|d| d.summary.total_vulnerabilities)
        .unwrap_or_default();
    let details_text = Text::from(vec![
        Line::from(vec![
            Span::raw("Critical: "),
            Span::styled(app.summary.critical_issues.to_string(), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::raw("Warnings: "),
            Span::styled(app.summary.warning_issues.to_string(), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(format!("Vulnerabilities: {total_vulnerabilities}")),
    ]);
    let issues_block = Block::default().title("ISSUES FOUND".bold());
    frame.render_widget(Paragraph::new(details_text).block(issues_block), summary_chunks[5]);

    // --- Technologies ---
    let tech_block = Block::default().title("TECHNOLOGIES".bold());
    let fingerprint = app
        .document
        .as_ref()
        .and_then(|d| d.results.get(Stage::Fingerprint.key()));
    let tech_lines = match fingerprint {
        Some(Value::String(e)) => vec![Line::from(Span::styled(
            format!("Scan failed: {e}"),
            Style::default().fg(Color::Red),
        ))],
        Some(value) => match serde_json::from_value::<Vec<Technology>>(value.clone()) {
            Ok(techs) if !techs.is_empty() => techs
                .into_iter()
                .map(|tech| {
                    let label = match tech.version {
                        Some(version) => format!("{} {}", tech.name, version),
                        None => tech.name,
                    };
                    Line::from(vec![Span::raw("- "), Span::styled(label, Style::default().fg(Color::Cyan))])
                })
                .collect(),
            _ => vec![Line::from("Not identified.")],
        },
        None => Vec::new(),
    };
    frame.render_widget(Paragraph::new(tech_lines).block(tech_block), summary_chunks[7]);
}
