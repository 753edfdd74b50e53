// src/core/scanner/headers_scanner.rs

use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

use crate::error::ProbeError;

/// The security headers returned by the landing page, `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHeaders {
    pub hsts: Option<String>,
    pub csp: Option<String>,
    pub x_frame_options: Option<String>,
    pub x_content_type_options: Option<String>,
}

impl SecurityHeaders {
    /// Reads the four security headers out of a response header map.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            hsts: check_header(headers, "strict-transport-security"),
            csp: check_header(headers, "content-security-policy"),
            x_frame_options: check_header(headers, "x-frame-options"),
            x_content_type_options: check_header(headers, "x-content-type-options"),
        }
    }
}

/// Checks for the presence of a specific HTTP header in a `HeaderMap`.
///
/// # Arguments
/// * `headers` - A reference to the `HeaderMap` from the HTTP response.
/// * `name` - The name of the header to check (e.g., "content-security-policy").
///
/// # Returns
/// `Some(value)` if the header is present, `None` otherwise. A value that is not
/// valid UTF-8 still counts as present.
fn check_header(headers: &HeaderMap, name: &str) -> Option<String> {
    debug!(header_name = name, "Checking for header.");
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(s) => {
            debug!(header_name = name, value = s, "Header found.");
            Some(s.to_string())
        }
        Err(_) => {
            warn!(header_name = name, "Header found but contained invalid UTF-8.");
            Some("[Invalid UTF-8]".to_string())
        }
    }
}

/// Sends a GET to `https://{domain}` and collects its security headers.
///
/// # Arguments
/// * `client` - The shared HTTP client (carries user agent and timeouts).
/// * `domain` - The host to query.
pub async fn fetch_security_headers(
    client: &reqwest::Client,
    domain: &str,
) -> Result<SecurityHeaders, ProbeError> {
    info!(domain, "Starting headers scan.");
    let url = format!("https://{domain}");

    let response = client.get(&url).send().await.map_err(|e| {
        warn!(url = %url, error = %e, "HTTP request failed for headers scan.");
        ProbeError::Http(e.to_string())
    })?;

    info!(status = %response.status(), "Received HTTP response for headers scan.");
    Ok(SecurityHeaders::from_headers(response.headers()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, STRICT_TRANSPORT_SECURITY, X_FRAME_OPTIONS};

    #[test]
    fn collects_present_headers_only() {
        let mut headers = HeaderMap::new();
        headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static("max-age=63072000"));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

        let found = SecurityHeaders::from_headers(&headers);
        assert_eq!(found.hsts.as_deref(), Some("max-age=63072000"));
        assert_eq!(found.x_frame_options.as_deref(), Some("DENY"));
        assert_eq!(found.csp, None);
        assert_eq!(found.x_content_type_options, None);
    }

    #[test]
    fn non_utf8_value_still_counts_as_present() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-security-policy",
            HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap(),
        );
        let found = SecurityHeaders::from_headers(&headers);
        assert_eq!(found.csp.as_deref(), Some("[Invalid UTF-8]"));
    }
}
