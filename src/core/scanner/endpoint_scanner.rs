// src/core/scanner/endpoint_scanner.rs

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::{to_value, Probe, ProbeTarget};
use crate::core::models::Stage;
use crate::core::results::ScanResults;
use crate::error::ProbeError;

/// Probes a fixed list of API paths over plain HTTP.
pub struct EndpointProbe {
    client: reqwest::Client,
    paths: Vec<String>,
}

impl EndpointProbe {
    pub fn new(client: reqwest::Client, paths: Vec<String>) -> Self {
        Self { client, paths }
    }
}

#[async_trait]
impl Probe for EndpointProbe {
    fn stage(&self) -> Stage {
        Stage::ApiEndpoints
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let found = discover_endpoints(&self.client, &target.domain, &self.paths).await?;
        to_value(&found)
    }
}

/// Requests every `http://{domain}{path}` concurrently and returns the URLs
/// that answered with a 2xx status, in path order. A failing candidate only
/// drops that candidate.
pub async fn discover_endpoints(
    client: &reqwest::Client,
    domain: &str,
    paths: &[String],
) -> Result<Vec<String>, ProbeError> {
    info!(domain, candidates = paths.len(), "Starting endpoint discovery.");

    let mut requests = JoinSet::new();
    for (index, path) in paths.iter().enumerate() {
        let client = client.clone();
        let url = format!("http://{domain}{path}");
        requests.spawn(async move {
            let status = client.get(&url).send().await.map(|r| r.status());
            (index, url, status)
        });
    }

    let mut found = Vec::new();
    while let Some(joined) = requests.join_next().await {
        let (index, url, status) = joined
            .map_err(|e| ProbeError::Internal(format!("endpoint request task failed: {e}")))?;
        match status {
            Ok(status) if status.is_success() => {
                debug!(url = %url, %status, "Endpoint found.");
                found.push((index, url));
            }
            Ok(status) => debug!(url = %url, %status, "Endpoint not available."),
            Err(e) => debug!(url = %url, error = %e, "Endpoint request failed."),
        }
    }

    found.sort_by_key(|(index, _)| *index);
    let found: Vec<String> = found.into_iter().map(|(_, url)| url).collect();
    info!(domain, count = found.len(), "Endpoint discovery finished.");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeSettings;
    use crate::core::scanner::endpoint_client_builder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 server: 200 for `/` and `/api/v1/users`, a redirect to
    /// `/` for `/api/v1/resource`, 404 for anything else.
    async fn spawn_api_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let status = if request.starts_with("GET /api/v1/users ")
                        || request.starts_with("GET / ")
                    {
                        "200 OK"
                    } else if request.starts_with("GET /api/v1/resource ") {
                        "301 Moved Permanently\r\nlocation: /"
                    } else {
                        "404 Not Found"
                    };
                    let response =
                        format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        addr.to_string()
    }

    fn direct_client() -> reqwest::Client {
        endpoint_client_builder(&ProbeSettings::default())
            .no_proxy()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn keeps_only_successful_paths() {
        let host = spawn_api_server().await;
        let paths: Vec<String> = ["/api/v1/resource", "/api/v2/resource", "/api/v1/users"]
            .iter()
            .map(|p| p.to_string())
            .collect();

        let found = discover_endpoints(&direct_client(), &host, &paths)
            .await
            .unwrap();
        assert_eq!(found, vec![format!("http://{host}/api/v1/users")]);
    }

    #[tokio::test]
    async fn redirect_to_a_live_page_is_not_an_endpoint() {
        let host = spawn_api_server().await;
        let found = discover_endpoints(&direct_client(), &host, &["/api/v1/resource".to_string()])
            .await
            .unwrap();
        assert!(found.is_empty());

        // The same path does resolve when redirects are followed.
        let following = reqwest::Client::builder().no_proxy().build().unwrap();
        let followed = discover_endpoints(&following, &host, &["/api/v1/resource".to_string()])
            .await
            .unwrap();
        assert_eq!(followed, vec![format!("http://{host}/api/v1/resource")]);
    }

    #[tokio::test]
    async fn unreachable_host_yields_empty_list() {
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let found = discover_endpoints(&direct_client(), &closed, &["/api".to_string()])
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
