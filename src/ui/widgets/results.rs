// src/ui/widgets/results.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use serde_json::Value;
use vanguard_recon::core::models::{ResultDocument, Stage, TlsInspection, WhoisRecord};

/// Renders the raw reconnaissance data of a finished scan.
pub fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let results_block = Block::default().borders(Borders::ALL).title("Reconnaissance");
    let Some(document) = &app.document else {
        frame.render_widget(results_block, area);
        return;
    };

    let paragraph = Paragraph::new(build_results_text(document))
        .block(results_block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn heading(label: &str) -> Span<'static> {
    Span::styled(format!("{label:<12}"), Style::default().bold())
}

fn error_line(label: &str, message: &str) -> Line<'static> {
    Line::from(vec![
        heading(label),
        Span::styled(message.to_string(), Style::default().fg(Color::Red)),
    ])
}

fn list_line(label: &str, items: &[String]) -> Line<'static> {
    let text = if items.is_empty() { "none".to_string() } else { items.join(", ") };
    Line::from(vec![heading(label), Span::raw(text)])
}

fn build_results_text(document: &ResultDocument) -> Text<'static> {
    let mut lines = Vec::new();
    let stage = |s: Stage| document.results.get(s.key());

    match stage(Stage::Dns) {
        Some(Value::String(e)) => lines.push(error_line("Addresses", e)),
        Some(value) => {
            let addresses: Vec<String> = serde_json::from_value(value.clone()).unwrap_or_default();
            lines.push(list_line("Addresses", &addresses));
        }
        None => {}
    }

    match stage(Stage::Whois) {
        Some(Value::String(e)) => lines.push(error_line("Registrar", e)),
        Some(value) => {
            if let Ok(whois) = serde_json::from_value::<WhoisRecord>(value.clone()) {
                let registrar = whois.registrar.unwrap_or_else(|| "unknown".to_string());
                let expires = whois
                    .expiration_date
                    .map(|d| format!(" (expires {})", d.format("%Y-%m-%d")))
                    .unwrap_or_default();
                lines.push(Line::from(vec![heading("Registrar"), Span::raw(format!("{registrar}{expires}"))]));
            }
        }
        None => {}
    }

    match stage(Stage::SslTls) {
        Some(Value::String(e)) => lines.push(error_line("TLS", e)),
        Some(value) => {
            if let Ok(tls) = serde_json::from_value::<TlsInspection>(value.clone()) {
                let negotiated = format!(
                    "{} {}",
                    tls.version.unwrap_or_default(),
                    tls.cipher.unwrap_or_default()
                );
                lines.push(Line::from(vec![heading("TLS"), Span::raw(negotiated)]));
                if let Some(cert) = tls.peer_cert {
                    let style = if cert.is_valid { Color::Green } else { Color::Red };
                    lines.push(Line::from(vec![
                        heading("Certificate"),
                        Span::styled(
                            format!("{} ({} days left)", cert.subject, cert.days_until_expiry),
                            Style::default().fg(style),
                        ),
                    ]));
                }
            }
        }
        None => {}
    }

    if let Some(Value::String(reachability)) = stage(Stage::Network) {
        let color = if reachability == "Reachable" { Color::Green } else { Color::Yellow };
        lines.push(Line::from(vec![
            heading("Network"),
            Span::styled(reachability.clone(), Style::default().fg(color)),
        ]));
    }

    let summary = &document.summary;
    let ports: Vec<String> = summary.open_ports.iter().map(u16::to_string).collect();
    lines.push(list_line("Open ports", &ports));
    lines.push(list_line("Subdomains", &summary.subdomains));
    lines.push(list_line("Endpoints", &summary.api_endpoints));

    Text::from(lines)
}
