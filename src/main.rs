// src/main.rs

use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{error, info, warn};

use vanguard_recon::config::{AppConfig, StorageBackend};
use vanguard_recon::core::notify::{BroadcastSink, ScanEvent};
use vanguard_recon::core::pipeline::Pipeline;
use vanguard_recon::core::runner::{ScanHandle, ScanRunner};
use vanguard_recon::core::store::{MemoryStore, ScanStore, SqliteStore};
use vanguard_recon::logging;

mod app;
mod ui;

use app::{App, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = logging::initialize_logging()?;
    info!(log = %log_path.display(), "Starting {}.", env!("CARGO_PKG_NAME"));

    let config = AppConfig::load(None)?;
    let store: Arc<dyn ScanStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => {
            let path = config.storage.resolved_database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::open(&path)?)
        }
    };

    let sink = Arc::new(BroadcastSink::new(256));
    let mut events = sink.subscribe();
    let pipeline = Pipeline::standard(&config.probes)?;
    let runner = ScanRunner::new(store, sink, pipeline, config.scan.clone());

    // --- Setup ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let result = run(&mut terminal, &runner, &mut events).await;

    // --- Restore Terminal ---
    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    result
}

async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    runner: &ScanRunner,
    events: &mut broadcast::Receiver<ScanEvent>,
) -> Result<()> {
    let mut app = App::new();
    let mut handle: Option<ScanHandle> = None;

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if event::poll(Duration::from_millis(100))? {
            handle_events(&mut app, runner, &mut handle).await?;
        }
        app.on_tick();

        loop {
            match events.try_recv() {
                Ok(event) => app.apply_event(event),
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind."),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        // A scan that ends without a completion event has failed; the task's
        // error carries the reason.
        if matches!(app.state, AppState::Scanning) && handle.as_ref().is_some_and(ScanHandle::is_finished) {
            if let Some(finished) = handle.take() {
                if let Err(e) = finished.wait().await {
                    app.fail(e.to_string());
                }
            }
        }
    }

    // The scan must record its failure before the runtime goes away.
    if let Some(running) = handle.take() {
        let scan_id = running.scan_id().to_string();
        match running.shutdown().await {
            Ok(_) => info!(scan_id = %scan_id, "Scan finished before exit."),
            Err(e) => info!(scan_id = %scan_id, reason = %e, "Scan stopped on exit."),
        }
    }
    Ok(())
}

async fn handle_events(app: &mut App, runner: &ScanRunner, handle: &mut Option<ScanHandle>) -> Result<()> {
    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            match app.state {
                AppState::Disclaimer => match key.code {
                    KeyCode::Enter => app.acknowledge_disclaimer(),
                    KeyCode::Char('q') => app.quit(),
                    _ => {}
                },
                AppState::Idle => handle_idle_input(app, key.code, runner, handle).await,
                AppState::Scanning => handle_scanning_input(app, key.code, handle),
                AppState::Finished | AppState::Failed => handle_report_input(app, key.code),
            }
        }
    }
    Ok(())
}

async fn handle_idle_input(app: &mut App, key_code: KeyCode, runner: &ScanRunner, handle: &mut Option<ScanHandle>) {
    match key_code {
        KeyCode::Esc => app.quit(),
        KeyCode::Char(c) => app.input.push(c),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Enter => {
            let Some(domain) = app.target_domain() else {
                return;
            };
            match runner.submit(&domain).await {
                Ok(submitted) => {
                    app.begin_scan(submitted.scan_id(), &domain);
                    *handle = Some(submitted);
                }
                Err(e) => {
                    error!(domain = %domain, error = %e, "Could not submit scan.");
                    app.fail(e.to_string());
                }
            }
        }
        _ => {}
    }
}

fn handle_scanning_input(app: &mut App, key_code: KeyCode, handle: &Option<ScanHandle>) {
    match key_code {
        KeyCode::Char('c') => {
            if let Some(running) = handle {
                running.cancel();
            }
        }
        KeyCode::Char('q') => {
            if let Some(running) = handle {
                running.cancel();
            }
            app.quit();
        }
        KeyCode::Char('l') => app.toggle_logs(),
        _ => {}
    }
}

fn handle_report_input(app: &mut App, key_code: KeyCode) {
    match key_code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('n') => app.reset(),
        KeyCode::Char('l') => app.toggle_logs(),
        KeyCode::Up => app.previous_finding(),
        KeyCode::Down => app.next_finding(),
        KeyCode::Left => app.scroll_left(),
        KeyCode::Right => app.scroll_right(),
        _ => {}
    }
}
