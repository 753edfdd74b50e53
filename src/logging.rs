// src/logging.rs

use std::path::PathBuf;

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use time::macros::format_description;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase();
    /// Log filter override, e.g. `VANGUARD_RECON_LOGLEVEL=debug`.
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.as_str());
    /// Path of an alternative config file.
    pub static ref CONFIG_ENV: String = format!("{}_CONFIG", PROJECT_NAME.as_str());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

pub fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vanguard-rs", env!("CARGO_PKG_NAME"))
}

/// Directory holding the log file and, by default, the scan database.
pub fn get_data_dir() -> PathBuf {
    match project_directory() {
        Some(proj_dirs) => proj_dirs.data_local_dir().to_path_buf(),
        None => PathBuf::from(".").join(".data"),
    }
}

pub fn log_file_path() -> PathBuf {
    get_data_dir().join(LOG_FILE.as_str())
}

/// `RUST_LOG` wins over the project variable; without either, only this
/// crate logs, at `info`.
fn filter_directive(rust_log: Option<String>, project_log: Option<String>) -> String {
    rust_log
        .or(project_log)
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Installs color-eyre and a file-based tracing subscriber.
///
/// The terminal belongs to the TUI, so nothing goes to stdout or stderr. The
/// log file is truncated on every start. Returns its path.
pub fn initialize_logging() -> Result<PathBuf> {
    color_eyre::install()?;

    std::fs::create_dir_all(get_data_dir())?;
    let log_path = log_file_path();
    let log_file = std::fs::File::create(&log_path)?;

    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var(LOG_ENV.as_str()).ok(),
    );

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_timer(LocalTime::new(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        )))
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .init();

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_names_derive_from_the_crate_name() {
        assert_eq!(LOG_ENV.as_str(), "VANGUARD_RECON_LOGLEVEL");
        assert_eq!(CONFIG_ENV.as_str(), "VANGUARD_RECON_CONFIG");
        assert!(log_file_path().ends_with("vanguard-recon.log"));
    }

    #[test]
    fn rust_log_takes_precedence() {
        assert_eq!(
            filter_directive(Some("debug".into()), Some("warn".into())),
            "debug"
        );
        assert_eq!(filter_directive(None, Some("warn".into())), "warn");
        assert_eq!(filter_directive(None, None), "vanguard_recon=info");
        assert_eq!(filter_directive(Some("  ".into()), None), "vanguard_recon=info");
    }
}
