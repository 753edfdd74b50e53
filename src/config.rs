// src/config.rs

//! Runtime configuration.
//!
//! Loaded from a TOML file; every section and field is optional and falls back
//! to the defaults below. The file is looked up in `$VANGUARD_RECON_CONFIG`,
//! then `<config dir>/config.toml`. A missing file is not an error.
//!
//! ```
//! use vanguard_recon::config::AppConfig;
//!
//! let config = AppConfig::from_toml_str("[scan]\nmax_concurrent_scans = 2\n").unwrap();
//! assert_eq!(config.scan.max_concurrent_scans, 2);
//! assert_eq!(config.probes.ports.len(), 9);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::logging::{get_data_dir, project_directory, CONFIG_ENV};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanSettings,
    pub probes: ProbeSettings,
    pub storage: StorageSettings,
}

/// Limits applied to whole scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Scans allowed to run at once; further submissions wait for a slot.
    pub max_concurrent_scans: usize,
    /// Deadline for a whole scan, checked between steps. 0 disables it.
    pub scan_timeout_secs: u64,
    /// Outer bound for any single probe.
    pub probe_timeout_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 5,
            scan_timeout_secs: 300,
            probe_timeout_secs: 30,
        }
    }
}

/// Timeouts and candidate lists used by the probe library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub connect_timeout_ms: u64,
    pub dns_timeout_ms: u64,
    pub http_timeout_ms: u64,
    pub whois_timeout_ms: u64,
    pub user_agent: String,
    pub ports: Vec<u16>,
    pub subdomain_prefixes: Vec<String>,
    pub endpoint_paths: Vec<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            dns_timeout_ms: 3_000,
            http_timeout_ms: 5_000,
            whois_timeout_ms: 8_000,
            user_agent: "VanguardRecon/0.1".to_string(),
            ports: vec![21, 22, 23, 25, 53, 80, 110, 443, 3389],
            subdomain_prefixes: ["www", "mail", "blog", "api", "dev"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            endpoint_paths: ["/api/v1/resource", "/api/v2/resource", "/api/v1/users"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ProbeSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_millis(self.whois_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// SQLite file. Empty means `<data dir>/vanguard-recon.db`.
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_path: String::new(),
        }
    }
}

impl StorageSettings {
    pub fn resolved_database_path(&self) -> PathBuf {
        if self.database_path.is_empty() {
            get_data_dir().join(format!("{}.db", env!("CARGO_PKG_NAME")))
        } else {
            PathBuf::from(&self.database_path)
        }
    }
}

impl AppConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `path`, or from the default location when
    /// `path` is `None`. Falls back to defaults if the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file found, using defaults.");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), "Loaded configuration.");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.max_concurrent_scans == 0 {
            return Err(invalid("scan.max_concurrent_scans", "must be at least 1"));
        }
        if self.scan.probe_timeout_secs == 0 {
            return Err(invalid("scan.probe_timeout_secs", "must be greater than 0"));
        }
        let timeouts = [
            ("probes.connect_timeout_ms", self.probes.connect_timeout_ms),
            ("probes.dns_timeout_ms", self.probes.dns_timeout_ms),
            ("probes.http_timeout_ms", self.probes.http_timeout_ms),
            ("probes.whois_timeout_ms", self.probes.whois_timeout_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }
        if self.probes.ports.contains(&0) {
            return Err(invalid("probes.ports", "port 0 is not a valid target"));
        }
        if let Some(path) = self.probes.endpoint_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid(
                "probes.endpoint_paths",
                &format!("'{path}' must start with '/'"),
            ));
        }
        if self.probes.subdomain_prefixes.iter().any(|p| p.is_empty() || p.contains('.')) {
            return Err(invalid(
                "probes.subdomain_prefixes",
                "prefixes must be single, non-empty labels",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV.as_str()) {
        return PathBuf::from(path);
    }
    match project_directory() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from(".").join("config.toml"),
    }
}
