// src/app.rs

use chrono::Local;
use ratatui::widgets::{ListState, ScrollbarState};
use url::Url;
use vanguard_recon::core::knowledge_base::{self, FindingCategory};
use vanguard_recon::core::models::{Finding, ResultDocument, Severity, Stage};
use vanguard_recon::core::notify::ScanEvent;

pub const SPINNER_CHARS: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Oldest entries are dropped once the event log grows past this.
const MAX_EVENT_LINES: usize = 200;

pub enum AppState {
    Disclaimer,
    Idle,
    Scanning,
    Finished,
    Failed,
}

/// Score and pass/fail flags shown in the summary panel.
#[derive(Debug, Default)]
pub struct RiskSummary {
    pub score: u8,
    pub critical_issues: usize,
    pub warning_issues: usize,
    pub dns_check_passed: bool,
    pub ssl_check_passed: bool,
    pub headers_check_passed: bool,
    pub network_check_passed: bool,
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub input: String,
    pub scan_id: Option<String>,
    pub target: Option<String>,
    pub progress: u8,
    pub status_message: String,
    pub event_log: Vec<String>,
    pub document: Option<ResultDocument>,
    pub error: Option<String>,
    pub all_findings: Vec<Finding>,
    pub analysis_list_state: ListState,
    pub summary: RiskSummary,
    pub displayed_score: u8,
    pub spinner_frame: usize,
    pub show_logs: bool,
    pub log_horizontal_scroll: usize,
    pub log_horizontal_scroll_state: ScrollbarState,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            state: AppState::Disclaimer,
            input: String::new(),
            scan_id: None,
            target: None,
            progress: 0,
            status_message: String::new(),
            event_log: Vec::new(),
            document: None,
            error: None,
            all_findings: Vec::new(),
            analysis_list_state: ListState::default(),
            summary: RiskSummary::default(),
            displayed_score: 0,
            spinner_frame: 0,
            show_logs: true,
            log_horizontal_scroll: 0,
            log_horizontal_scroll_state: ScrollbarState::default(),
        }
    }

    /// Advances the spinner and walks the displayed score towards the real one.
    pub fn on_tick(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_CHARS.len();
        if matches!(self.state, AppState::Finished) && self.displayed_score < self.summary.score {
            self.displayed_score = (self.displayed_score + 2).min(self.summary.score);
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn acknowledge_disclaimer(&mut self) {
        self.state = AppState::Idle;
    }

    pub fn toggle_logs(&mut self) {
        self.show_logs = !self.show_logs;
    }

    /// The host part of whatever was typed, with or without a scheme.
    pub fn target_domain(&self) -> Option<String> {
        extract_host(&self.input)
    }

    pub fn begin_scan(&mut self, scan_id: &str, domain: &str) {
        self.state = AppState::Scanning;
        self.scan_id = Some(scan_id.to_string());
        self.target = Some(domain.to_string());
        self.progress = 0;
        self.status_message = "Queued...".to_string();
        self.push_log(format!("Submitted scan {scan_id} for {domain}"));
    }

    /// Applies a sink event. Events for other scans are ignored.
    pub fn apply_event(&mut self, event: ScanEvent) {
        if self.scan_id.as_deref() != Some(event.scan_id()) {
            return;
        }
        match event {
            ScanEvent::Progress(progress) => {
                self.progress = progress.progress;
                self.status_message = progress.message.clone();
                self.push_log(format!("[{:>3}%] {}", progress.progress, progress.message));
            }
            ScanEvent::Complete(complete) => match serde_json::from_str::<ResultDocument>(&complete.results) {
                Ok(document) => self.finish(document),
                Err(e) => self.fail(format!("Unreadable result document: {e}")),
            },
        }
    }

    pub fn finish(&mut self, document: ResultDocument) {
        self.all_findings = collect_findings(&document);
        self.document = Some(document);
        self.state = AppState::Finished;
        self.progress = 100;
        self.displayed_score = 0;
        self.analysis_list_state = ListState::default();
        self.update_summary();
    }

    pub fn fail(&mut self, message: String) {
        if matches!(self.state, AppState::Failed) {
            return;
        }
        self.push_log(format!("Scan failed: {message}"));
        self.error = Some(message);
        self.state = AppState::Failed;
    }

    pub fn next_finding(&mut self) {
        if self.all_findings.is_empty() {
            return;
        }
        let next = match self.analysis_list_state.selected() {
            Some(i) if i + 1 < self.all_findings.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.analysis_list_state.select(Some(next));
    }

    pub fn previous_finding(&mut self) {
        if let Some(i) = self.analysis_list_state.selected() {
            self.analysis_list_state.select(Some(i.saturating_sub(1)));
        }
    }

    pub fn scroll_left(&mut self) {
        self.log_horizontal_scroll = self.log_horizontal_scroll.saturating_sub(4);
        self.log_horizontal_scroll_state = self.log_horizontal_scroll_state.position(self.log_horizontal_scroll);
    }

    pub fn scroll_right(&mut self) {
        self.log_horizontal_scroll = self.log_horizontal_scroll.saturating_add(4);
        self.log_horizontal_scroll_state = self.log_horizontal_scroll_state.position(self.log_horizontal_scroll);
    }

    pub fn update_summary(&mut self) {
        let criticals = self.all_findings.iter().filter(|f| f.severity == Severity::Critical).count();
        let warnings = self.all_findings.iter().filter(|f| f.severity == Severity::Warning).count();
        let score = 100_usize.saturating_sub(criticals * 15).saturating_sub(warnings * 5);

        let passed = |category: FindingCategory| {
            !self.all_findings.iter().any(|f| {
                f.severity != Severity::Info
                    && knowledge_base::get_finding_detail(&f.code).is_some_and(|d| d.category == category)
            })
        };

        self.summary = RiskSummary {
            score: score as u8,
            critical_issues: criticals,
            warning_issues: warnings,
            dns_check_passed: passed(FindingCategory::Dns),
            ssl_check_passed: passed(FindingCategory::Ssl),
            headers_check_passed: passed(FindingCategory::Http),
            network_check_passed: passed(FindingCategory::Network),
        };
    }

    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.input = String::new();
        self.scan_id = None;
        self.target = None;
        self.progress = 0;
        self.status_message = String::new();
        self.document = None;
        self.error = None;
        self.all_findings = Vec::new();
        self.analysis_list_state = ListState::default();
        self.summary = RiskSummary::default();
        self.displayed_score = 0;
    }

    fn push_log(&mut self, line: String) {
        self.event_log
            .push(format!("{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), line));
        if self.event_log.len() > MAX_EVENT_LINES {
            let excess = self.event_log.len() - MAX_EVENT_LINES;
            self.event_log.drain(..excess);
        }
    }
}

/// Reduces user input to a bare host name.
pub fn extract_host(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&with_scheme)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.trim_end_matches('.').to_lowercase()))
        .filter(|host| !host.is_empty())
}

/// Findings from both detector stages, most severe first.
fn collect_findings(document: &ResultDocument) -> Vec<Finding> {
    let mut findings: Vec<Finding> = [Stage::Vulnerabilities, Stage::SecurityMisconfigs]
        .iter()
        .filter_map(|stage| document.results.get(stage.key()))
        .filter_map(|value| serde_json::from_value::<Vec<Finding>>(value.clone()).ok())
        .flatten()
        .collect();
    findings.sort_by_key(|f| f.severity);
    findings
}
