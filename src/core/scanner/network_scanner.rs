// src/core/scanner/network_scanner.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{to_value, Probe, ProbeTarget};
use crate::core::models::{Reachability, Stage};
use crate::core::results::ScanResults;
use crate::error::ProbeError;

/// Ports tried, in order, to decide whether the host answers at all.
const REACHABILITY_PORTS: [u16; 2] = [443, 80];

/// Attempts a single TCP connect bounded by `limit`.
pub async fn is_port_open(host: &str, port: u16, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "Connection refused or failed.");
            false
        }
        Err(_) => {
            debug!(host, port, "Connection attempt timed out.");
            false
        }
    }
}

pub struct ReachabilityProbe {
    timeout: Duration,
}

impl ReachabilityProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for ReachabilityProbe {
    fn stage(&self) -> Stage {
        Stage::Network
    }

    /// Never fails: an unreachable host is a valid answer.
    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let mut reachability = Reachability::Unreachable;
        for port in REACHABILITY_PORTS {
            if is_port_open(&target.domain, port, self.timeout).await {
                reachability = Reachability::Reachable;
                break;
            }
        }
        info!(domain = %target.domain, %reachability, "Reachability test finished.");
        to_value(&reachability)
    }
}

pub struct PortScanProbe {
    ports: Vec<u16>,
    timeout: Duration,
}

impl PortScanProbe {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }
}

#[async_trait]
impl Probe for PortScanProbe {
    fn stage(&self) -> Stage {
        Stage::OpenPorts
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let open = scan_ports(&target.domain, &self.ports, self.timeout).await?;
        to_value(&open)
    }
}

/// Connects to every port concurrently and returns the ones that accepted,
/// sorted ascending.
pub async fn scan_ports(host: &str, ports: &[u16], limit: Duration) -> Result<Vec<u16>, ProbeError> {
    info!(host, ports = ports.len(), "Starting port scan.");

    let mut attempts = JoinSet::new();
    for &port in ports {
        let host = host.to_string();
        attempts.spawn(async move { (port, is_port_open(&host, port, limit).await) });
    }

    let mut open = Vec::new();
    while let Some(joined) = attempts.join_next().await {
        let (port, is_open) =
            joined.map_err(|e| ProbeError::Internal(format!("port probe task failed: {e}")))?;
        if is_open {
            debug!(host, port, "Port open.");
            open.push(port);
        }
    }
    open.sort_unstable();
    open.dedup();

    info!(host, open = ?open, "Port scan finished.");
    Ok(open)
}
