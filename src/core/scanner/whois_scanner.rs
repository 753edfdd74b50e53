// src/core/scanner/whois_scanner.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::{to_value, Probe, ProbeTarget};
use crate::core::models::{Stage, WhoisRecord};
use crate::core::results::ScanResults;
use crate::error::ProbeError;

/// Root server that knows which registry serves each TLD.
const IANA_WHOIS: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
/// Upper bound on a single WHOIS answer.
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

pub struct WhoisProbe {
    timeout: Duration,
}

impl WhoisProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for WhoisProbe {
    fn stage(&self) -> Stage {
        Stage::Whois
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let record = tokio::time::timeout(self.timeout, lookup_whois(&target.domain))
            .await
            .map_err(|_| {
                warn!(domain = %target.domain, "WHOIS lookup timed out.");
                ProbeError::Timeout(self.timeout.as_millis() as u64)
            })??;
        to_value(&record)
    }
}

/// Asks IANA for the registry's WHOIS server, then asks that server about
/// `domain`. Only one referral is followed.
pub async fn lookup_whois(domain: &str) -> Result<WhoisRecord, ProbeError> {
    info!(domain, "Starting WHOIS lookup.");
    let iana_answer = query(IANA_WHOIS, domain).await?;

    let (server, answer) = match find_referral(&iana_answer) {
        Some(referral) => {
            debug!(domain, server = %referral, "Following WHOIS referral.");
            let answer = query(&referral, domain).await?;
            (referral, answer)
        }
        None => (IANA_WHOIS.to_string(), iana_answer),
    };

    let record = parse_whois(&server, &answer);
    if record.registrar.is_none() && record.creation_date.is_none() && record.name_servers.is_empty() {
        warn!(domain, server = %server, "WHOIS answer carried no registration data.");
        return Err(ProbeError::Whois(format!(
            "no registration data returned by {server}"
        )));
    }

    info!(domain, server = %server, registrar = ?record.registrar, "WHOIS lookup finished.");
    Ok(record)
}

async fn query(server: &str, domain: &str) -> Result<String, ProbeError> {
    let mut stream = TcpStream::connect((server, WHOIS_PORT))
        .await
        .map_err(|e| ProbeError::Whois(format!("{server}: {e}")))?;
    stream
        .write_all(format!("{domain}\r\n").as_bytes())
        .await
        .map_err(|e| ProbeError::Whois(format!("{server}: {e}")))?;

    let mut raw = Vec::new();
    stream
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut raw)
        .await
        .map_err(|e| ProbeError::Whois(format!("{server}: {e}")))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Splits a WHOIS line into a lowercased key and a trimmed, non-empty value.
fn split_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
        return None;
    }
    let (key, value) = line.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((key.trim().to_lowercase(), value))
}

/// Extracts the `refer:` (or `whois:`) server from an IANA answer.
pub fn find_referral(answer: &str) -> Option<String> {
    answer
        .lines()
        .filter_map(split_line)
        .find(|(key, _)| key == "refer" || key == "whois")
        .map(|(_, value)| value.to_lowercase())
}

/// Parses the common `Key: value` WHOIS layouts into a [`WhoisRecord`].
/// The first occurrence wins for single-valued fields.
pub fn parse_whois(server: &str, answer: &str) -> WhoisRecord {
    let mut record = WhoisRecord {
        server: server.to_string(),
        ..Default::default()
    };

    for (key, value) in answer.lines().filter_map(split_line) {
        match key.as_str() {
            "registrar" | "sponsoring registrar" | "registrar name" => {
                record.registrar.get_or_insert_with(|| value.to_string());
            }
            "creation date" | "created" | "created on" | "registered on" | "registration time" => {
                if record.creation_date.is_none() {
                    record.creation_date = parse_date(value);
                }
            }
            "registry expiry date"
            | "registrar registration expiration date"
            | "expiration date"
            | "expiry date"
            | "expires"
            | "paid-till" => {
                if record.expiration_date.is_none() {
                    record.expiration_date = parse_date(value);
                }
            }
            "updated date" | "last updated" | "last-update" | "changed" => {
                if record.updated_date.is_none() {
                    record.updated_date = parse_date(value);
                }
            }
            "name server" | "nserver" => {
                let ns = value
                    .split_whitespace()
                    .next()
                    .unwrap_or(value)
                    .trim_end_matches('.')
                    .to_lowercase();
                if !record.name_servers.contains(&ns) {
                    record.name_servers.push(ns);
                }
            }
            "domain status" | "status" => {
                let status = value.split_whitespace().next().unwrap_or(value).to_string();
                if !record.status.contains(&status) {
                    record.status.push(status);
                }
            }
            _ => {}
        }
    }

    record
}

/// Registries disagree on date formats; try the ones seen in practice.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    let first_token = raw.split_whitespace().next()?;
    for format in ["%Y-%m-%d", "%d-%b-%Y", "%Y.%m.%d", "%d.%m.%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(first_token, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const IANA_COM: &str = "\
% IANA WHOIS server
% for more information on IANA, visit http://www.iana.org

domain:       COM

organisation: VeriSign Global Registry Services
refer:        whois.verisign-grs.com
";

    const VERISIGN_EXAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Registrar URL: http://res-dom.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   DNSSEC: signedDelegation
>>> Last update of whois database: 2024-09-01T10:00:00Z <<<
";

    #[test]
    fn follows_iana_refer_line() {
        assert_eq!(find_referral(IANA_COM), Some("whois.verisign-grs.com".to_string()));
        assert_eq!(find_referral("% nothing here\n"), None);
    }

    #[test]
    fn parses_registry_answer() {
        let record = parse_whois("whois.verisign-grs.com", VERISIGN_EXAMPLE);
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(
            record.creation_date,
            Some(Utc.with_ymd_and_hms(1995, 8, 14, 4, 0, 0).unwrap())
        );
        assert_eq!(
            record.expiration_date,
            Some(Utc.with_ymd_and_hms(2025, 8, 13, 4, 0, 0).unwrap())
        );
        assert_eq!(record.name_servers, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(
            record.status,
            vec!["clientDeleteProhibited", "clientTransferProhibited"]
        );
    }

    #[test]
    fn parses_assorted_date_formats() {
        let expected = Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2021-03-04"), Some(expected));
        assert_eq!(parse_date("04-Mar-2021"), Some(expected));
        assert_eq!(parse_date("2021.03.04"), Some(expected));
        assert_eq!(parse_date("2021-03-04 00:00:00"), Some(expected));
        assert_eq!(parse_date("2021-03-04T00:00:00+00:00"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn whois_dates_serialize_as_iso_strings() {
        let record = parse_whois("whois.verisign-grs.com", VERISIGN_EXAMPLE);
        let value = to_value(&record).unwrap();
        assert_eq!(value["creation_date"], "1995-08-14T04:00:00Z");
    }
}
