// src/ui/widgets/analysis_view.rs

use crate::app::{App, AppState, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use vanguard_recon::core::knowledge_base::{self, FindingCategory};
use vanguard_recon::core::models::Severity;

pub fn render_analysis_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let main_block = Block::default()
        .borders(Borders::ALL)
        .title("Findings (Navigate with ↑ ↓)");

    if !matches!(app.state, AppState::Finished) {
        let content = match app.state {
            AppState::Scanning => Paragraph::new(Line::from(vec![
                Span::styled(format!("{} ", SPINNER_CHARS[app.spinner_frame]), Style::default().fg(Color::Cyan)),
                Span::raw("Scanning... Please wait."),
            ]))
            .alignment(Alignment::Center),
            AppState::Failed => Paragraph::new(vec![
                Line::from("SCAN FAILED".bold().red()),
                Line::from(""),
                Line::from(app.error.clone().unwrap_or_default()),
            ])
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center),
            _ => Paragraph::new("Scan results will appear here...").alignment(Alignment::Center),
        };
        frame.render_widget(content.block(main_block), area);
        return;
    }

    let inner_area = main_block.inner(area);
    frame.render_widget(main_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Min(0)])
        .split(inner_area);

    let items: Vec<ListItem> = app
        .all_findings
        .iter()
        .map(|f| {
            let category_prefix = match knowledge_base::get_finding_detail(&f.code).map(|d| d.category) {
                Some(FindingCategory::Dns) => "[DNS] ",
                Some(FindingCategory::Ssl) => "[SSL/TLS] ",
                Some(FindingCategory::Http) => "[HTTP] ",
                Some(FindingCategory::Network) => "[NET] ",
                None => "[?] ",
            };
            let title_style = match f.severity {
                Severity::Critical => Style::default().fg(Color::Red),
                Severity::Warning => Style::default().fg(Color::Yellow),
                Severity::Info => Style::default().fg(Color::Cyan),
            };
            ListItem::new(Line::from(vec![
                Span::styled(category_prefix, Style::default().fg(Color::DarkGray)),
                Span::styled(f.title.clone(), title_style),
            ]))
        })
        .collect();

    let findings_list = List::new(items)
        .block(Block::default())
        .highlight_style(Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(findings_list, chunks[0], &mut app.analysis_list_state);

    let detail_block = Block::default().borders(Borders::TOP).title("Details");
    let selected = app
        .analysis_list_state
        .selected()
        .and_then(|index| app.all_findings.get(index));

    match selected {
        Some(finding) => {
            let mut text = Vec::new();
            if let Some(evidence) = &finding.evidence {
                text.push(Line::from(vec!["EVIDENCE: ".yellow().bold(), Span::raw(evidence.clone())]));
            }
            if let Some(detail) = knowledge_base::get_finding_detail(&finding.code) {
                text.extend([
                    Line::from(""),
                    Line::from("WHAT IT IS:".yellow().bold()),
                    Line::from(detail.description),
                    Line::from(""),
                    Line::from("HOW TO FIX:".yellow().bold()),
                    Line::from(detail.remediation),
                ]);
            }
            let p = Paragraph::new(text).wrap(Wrap { trim: true }).block(detail_block);
            frame.render_widget(p, chunks[1]);
        }
        None => render_placeholder_details(frame, app, detail_block, chunks[1]),
    }
}

fn render_placeholder_details(frame: &mut Frame, app: &App, block: Block, area: Rect) {
    let total_issues = app.summary.critical_issues + app.summary.warning_issues;

    let placeholder_text = if total_issues == 0 {
        Text::from(vec![
            Line::from(""),
            Line::from("✓ NO CRITICAL OR WARNING ISSUES".bold().fg(Color::Green)),
            Line::from(""),
            Line::from("The detectors found nothing above informational level."),
        ])
    } else {
        Text::from("Select an item above to see details.")
    };

    let p = Paragraph::new(placeholder_text).alignment(Alignment::Center).block(block);
    frame.render_widget(p, area);
}
