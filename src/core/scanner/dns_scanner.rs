// src/core/scanner/dns_scanner.rs

use async_trait::async_trait;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{to_value, Probe, ProbeTarget};
use crate::core::models::Stage;
use crate::core::results::ScanResults;
use crate::error::ProbeError;

/// `true` for answers that only mean "this name has no such record".
fn is_negative_answer(error: &ResolveError) -> bool {
    matches!(error.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

/// Resolves the target's A records.
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
}

impl DnsProbe {
    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn stage(&self) -> Stage {
        Stage::Dns
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let addresses = resolve_addresses(&self.resolver, &target.domain).await?;
        to_value(&addresses)
    }
}

/// Resolves `domain` to its IPv4 addresses, in the order the resolver returned them.
pub async fn resolve_addresses(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<Vec<String>, ProbeError> {
    info!(domain, "Resolving A records.");
    match resolver.ipv4_lookup(domain).await {
        Ok(lookup) => {
            let addresses: Vec<String> = lookup.iter().map(|a| a.to_string()).collect();
            info!(domain, count = addresses.len(), "A records resolved.");
            Ok(addresses)
        }
        Err(e) => {
            warn!(domain, error = %e, "A record lookup failed.");
            Err(ProbeError::Resolve(e.to_string()))
        }
    }
}

/// Brute-forces a fixed list of subdomain prefixes.
pub struct SubdomainProbe {
    resolver: TokioAsyncResolver,
    prefixes: Vec<String>,
}

impl SubdomainProbe {
    pub fn new(resolver: TokioAsyncResolver, prefixes: Vec<String>) -> Self {
        Self { resolver, prefixes }
    }
}

#[async_trait]
impl Probe for SubdomainProbe {
    fn stage(&self) -> Stage {
        Stage::Subdomains
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let found = enumerate_subdomains(&self.resolver, &target.domain, &self.prefixes).await?;
        to_value(&found)
    }
}

/// Resolves `prefix.domain` for every prefix concurrently and returns the
/// names that resolved, in prefix order.
///
/// NXDOMAIN / empty answers and per-name timeouts are negatives. Any other
/// resolver failure fails the whole probe.
pub async fn enumerate_subdomains(
    resolver: &TokioAsyncResolver,
    domain: &str,
    prefixes: &[String],
) -> Result<Vec<String>, ProbeError> {
    info!(domain, candidates = prefixes.len(), "Starting subdomain enumeration.");

    let mut lookups = JoinSet::new();
    for (index, prefix) in prefixes.iter().enumerate() {
        let resolver = resolver.clone();
        let fqdn = format!("{prefix}.{domain}");
        lookups.spawn(async move {
            let outcome = resolver.lookup_ip(fqdn.as_str()).await;
            (index, fqdn, outcome)
        });
    }

    let mut found = Vec::new();
    while let Some(joined) = lookups.join_next().await {
        let (index, fqdn, outcome) = joined
            .map_err(|e| ProbeError::Internal(format!("subdomain lookup task failed: {e}")))?;
        match outcome {
            Ok(lookup) if lookup.iter().next().is_some() => {
                debug!(subdomain = %fqdn, "Subdomain resolved.");
                found.push((index, fqdn));
            }
            Ok(_) => debug!(subdomain = %fqdn, "Empty answer."),
            Err(e) if is_negative_answer(&e) => debug!(subdomain = %fqdn, "No such subdomain."),
            Err(e) if matches!(e.kind(), ResolveErrorKind::Timeout) => {
                warn!(subdomain = %fqdn, "Subdomain lookup timed out, treating as absent.");
            }
            Err(e) => {
                warn!(subdomain = %fqdn, error = %e, "Subdomain lookup failed.");
                return Err(ProbeError::Resolve(format!("{fqdn}: {e}")));
            }
        }
    }

    found.sort_by_key(|(index, _)| *index);
    let found: Vec<String> = found.into_iter().map(|(_, fqdn)| fqdn).collect();
    info!(domain, count = found.len(), "Subdomain enumeration finished.");
    Ok(found)
}

// --- Email authentication records (used by the misconfiguration detectors) ---

/// Returns the SPF record (`v=spf1 ...`) published at `domain`, if any.
pub async fn lookup_spf(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<Option<String>, ProbeError> {
    debug!(domain, "Looking up SPF record.");
    match resolver.txt_lookup(domain).await {
        Ok(txt_records) => Ok(txt_records
            .iter()
            .map(|record| record.to_string())
            .find(|record| record.starts_with("v=spf1"))),
        Err(e) if is_negative_answer(&e) => Ok(None),
        Err(e) => {
            warn!(domain, error = %e, "SPF lookup failed.");
            Err(ProbeError::Resolve(e.to_string()))
        }
    }
}

/// A DMARC record and its `p=` policy tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmarcRecord {
    pub record: String,
    pub policy: Option<String>,
}

/// Returns the DMARC record published at `_dmarc.domain`, if any.
pub async fn lookup_dmarc(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<Option<DmarcRecord>, ProbeError> {
    let dmarc_target = format!("_dmarc.{domain}");
    debug!(name = %dmarc_target, "Looking up DMARC record.");
    match resolver.txt_lookup(dmarc_target.as_str()).await {
        Ok(txt_records) => Ok(txt_records
            .iter()
            .map(|record| record.to_string())
            .find(|record| record.starts_with("v=DMARC1"))
            .map(|record| DmarcRecord {
                policy: parse_dmarc_policy(&record),
                record,
            })),
        Err(e) if is_negative_answer(&e) => Ok(None),
        Err(e) => {
            warn!(name = %dmarc_target, error = %e, "DMARC lookup failed.");
            Err(ProbeError::Resolve(e.to_string()))
        }
    }
}

/// Extracts the `p=` tag from a DMARC record.
pub fn parse_dmarc_policy(record: &str) -> Option<String> {
    record
        .split(';')
        .map(str::trim)
        .find_map(|tag| tag.strip_prefix("p="))
        .map(|policy| policy.trim().to_lowercase())
}

/// Returns the CAA records of `domain` (empty when none are published).
pub async fn lookup_caa(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<Vec<String>, ProbeError> {
    debug!(domain, "Looking up CAA records.");
    match resolver.lookup(domain, RecordType::CAA).await {
        Ok(caa_lookup) => Ok(caa_lookup.iter().map(|r| r.to_string()).collect()),
        Err(e) if is_negative_answer(&e) => Ok(Vec::new()),
        Err(e) => {
            warn!(domain, error = %e, "CAA lookup failed.");
            Err(ProbeError::Resolve(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmarc_policy_is_extracted() {
        assert_eq!(
            parse_dmarc_policy("v=DMARC1; p=reject; rua=mailto:d@example.com"),
            Some("reject".to_string())
        );
        assert_eq!(parse_dmarc_policy("v=DMARC1;p=None"), Some("none".to_string()));
        assert_eq!(parse_dmarc_policy("v=DMARC1; sp=reject"), None);
    }

    #[test]
    fn other_resolver_errors_are_not_negative_answers() {
        let err = ResolveError::from(ResolveErrorKind::Message("boom"));
        assert!(!is_negative_answer(&err));
    }
}
