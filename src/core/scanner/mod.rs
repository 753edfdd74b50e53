// src/core/scanner/mod.rs

// Probe library. Every probe is independent of the pipeline: it takes the
// target, does its network work under its own timeout and hands back either a
// JSON value or a `ProbeError`.
pub mod dns_scanner;
pub mod endpoint_scanner;
pub mod fingerprint_scanner;
pub mod headers_scanner;
pub mod network_scanner;
pub mod ssl_scanner;
pub mod whois_scanner;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::config::ProbeSettings;
use crate::core::models::Stage;
use crate::core::results::ScanResults;
use crate::error::ProbeError;

/// The host a scan is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub scan_id: String,
    pub domain: String,
}

impl ProbeTarget {
    pub fn new(scan_id: &str, domain: &str) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// One pipeline stage.
///
/// `results` holds the outcomes of every stage that ran before this one; it
/// is a read-only view owned by the coordinator.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The accumulator key this probe fills.
    fn stage(&self) -> Stage;

    async fn run(&self, target: &ProbeTarget, results: &ScanResults) -> Result<Value, ProbeError>;
}

/// Serializes a probe value, reporting failures as internal errors.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, ProbeError> {
    serde_json::to_value(value).map_err(|e| {
        error!(error = %e, "Failed to serialize probe outcome.");
        ProbeError::Internal(format!("could not serialize outcome: {e}"))
    })
}

/// Builds the DNS resolver shared by the DNS, subdomain and email checks.
pub fn build_resolver(settings: &ProbeSettings) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = settings.dns_timeout();
    opts.attempts = 1;
    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

fn http_client_builder(settings: &ProbeSettings) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.http_timeout())
        .connect_timeout(settings.connect_timeout())
}

/// Same settings as the shared client, but redirects are returned as-is so a
/// candidate path only counts when it answers 2xx itself.
pub(crate) fn endpoint_client_builder(settings: &ProbeSettings) -> reqwest::ClientBuilder {
    http_client_builder(settings).redirect(reqwest::redirect::Policy::none())
}

fn finish_client(builder: reqwest::ClientBuilder) -> Result<reqwest::Client, ProbeError> {
    builder.build().map_err(|e| {
        error!(error = %e, "Failed to build HTTP client.");
        ProbeError::Internal(format!("Failed to build HTTP client: {e}"))
    })
}

/// Builds the HTTP client shared by the fingerprint and header checks.
pub fn build_http_client(settings: &ProbeSettings) -> Result<reqwest::Client, ProbeError> {
    finish_client(http_client_builder(settings))
}

/// Builds the non-redirecting client used by endpoint discovery.
pub fn build_endpoint_client(settings: &ProbeSettings) -> Result<reqwest::Client, ProbeError> {
    finish_client(endpoint_client_builder(settings))
}
