// src/core/scanner/fingerprint_scanner.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{to_value, Probe, ProbeTarget};
use crate::core::models::{Stage, Technology};
use crate::core::results::ScanResults;
use crate::error::ProbeError;

/// Where a rule looks for its signature.
enum Check<'a> {
    Header(&'a str, &'a Lazy<Regex>),
    /// Matches whenever the header is sent, whatever its value.
    HeaderPresent(&'a str),
    MetaTag(&'a str, &'a Lazy<Regex>),
    Body(&'a Lazy<Regex>),
    ScriptSrc(&'a Lazy<Regex>),
    LinkHref(&'a Lazy<Regex>),
    Cookie(&'a Lazy<Regex>),
}

struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    check: Check<'a>,
}

// The first capture group, when present, is the version.
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"nginx(?:/([\d\.]+))?").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache(?:/([\d\.]+))?").unwrap());
static RE_APACHE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache Server at").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Microsoft-IIS(?:/([\d\.]+))?").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"cloudflare").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"LiteSpeed").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ?([\d\.]+)?").unwrap());
static RE_WP_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Drupal ?([\d\.]+)?").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP(?:/([\d\.]+))?").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([\d\.]+)$").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_EXPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Express").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ?([\d\.]+)?").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d\.]+)""#).unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery[-\.]?([\d]+\.[\d\.]+)?(?:\.min|\.slim)?\.js").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap(?:@([\d\.]+))?[^\s]*\.css").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> = Lazy::new(|| Regex::new(r"google-analytics\.com/|googletagmanager\.com/").unwrap());

static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Body(&RE_APACHE_ERROR) },
    FingerprintRule { tech_name: "IIS", category: "Web Server", check: Check::Header("server", &RE_IIS) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "LiteSpeed", category: "Web Server", check: Check::Header("server", &RE_LITESPEED) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_EMBED) },
    FingerprintRule { tech_name: "Joomla", category: "CMS", check: Check::MetaTag("generator", &RE_JOOMLA) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::MetaTag("generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Shopify", category: "E-commerce", check: Check::HeaderPresent("x-shopid") },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-aspnet-version", &RE_ASPNET) },
    FingerprintRule { tech_name: "Java", category: "Language", check: Check::Cookie(&RE_JSESSIONID) },
    FingerprintRule { tech_name: "Python/Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Express", category: "Framework", check: Check::Header("x-powered-by", &RE_EXPRESS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::Header("x-powered-by", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    FingerprintRule { tech_name: "Angular", category: "JS Framework", check: Check::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "React", category: "JS Library", check: Check::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Vue.js", category: "JS Library", check: Check::Body(&RE_VUE) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "Bootstrap", category: "UI Framework", check: Check::LinkHref(&RE_BOOTSTRAP) },
    FingerprintRule { tech_name: "Google Analytics", category: "Analytics", check: Check::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
];

pub struct FingerprintProbe {
    client: reqwest::Client,
}

impl FingerprintProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for FingerprintProbe {
    fn stage(&self) -> Stage {
        Stage::Fingerprint
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        info!(domain = %target.domain, "Starting fingerprint scan.");
        let url = format!("https://{}", target.domain);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            ProbeError::Http(e.to_string())
        })?;
        info!(status = %response.status(), "Received HTTP response.");

        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read response body");
            ProbeError::Http(format!("Failed to read response body: {e}"))
        })?;
        debug!(bytes = body.len(), "Successfully read response body.");

        let technologies = fingerprint_response(&headers, &body);
        info!(count = technologies.len(), "Fingerprint scan finished.");
        to_value(&technologies)
    }
}

/// Applies every rule to a response and returns the detected technologies,
/// sorted by name. A versioned match upgrades an earlier versionless one.
pub fn fingerprint_response(headers: &HeaderMap, body: &str) -> Vec<Technology> {
    let cookies = headers
        .get_all("set-cookie")
        .into_iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    let document = Html::parse_document(body);

    let mut found: BTreeMap<&str, Technology> = BTreeMap::new();
    for rule in RULES {
        let version = match &rule.check {
            Check::Header(name, re) => check_with_regex(headers.get(*name).and_then(|v| v.to_str().ok()), re),
            Check::HeaderPresent(name) => headers.contains_key(*name).then_some(None),
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => check_with_regex(Some(body), re),
            Check::ScriptSrc(re) => check_attribute(&document, "script[src]", "src", re),
            Check::LinkHref(re) => check_attribute(&document, "link[href]", "href", re),
            Check::Cookie(re) => check_with_regex(Some(&cookies), re),
        };

        let Some(version) = version else { continue };
        debug!(tech = %rule.tech_name, version = ?version, "Rule matched.");
        found
            .entry(rule.tech_name)
            .and_modify(|tech| {
                if tech.version.is_none() {
                    tech.version = version.clone();
                }
            })
            .or_insert_with(|| Technology {
                name: rule.tech_name.to_string(),
                category: rule.category.to_string(),
                version,
            });
    }

    found.into_values().collect()
}

/// `None` when the pattern does not match; `Some(version)` otherwise, where
/// `version` is the non-empty first capture group, if any.
fn check_with_regex(text_option: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text_option.and_then(|text| {
        re.captures(text).map(|caps| {
            caps.get(1)
                .map(|m| m.as_str().trim_end_matches('.').to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(&format!("meta[name='{name}']")).ok()?;
    let content = doc.select(&selector).next().and_then(|el| el.value().attr("content"));
    check_with_regex(content, re)
}

/// First match of `re` among the `attribute` values of elements matching `selector`.
fn check_attribute(doc: &Html, selector: &str, attribute: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr(attribute))
        .find_map(|value| check_with_regex(Some(value), re))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn names(techs: &[Technology]) -> Vec<&str> {
        techs.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn detects_server_and_language_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx/1.25.3"));
        headers.insert("x-powered-by", HeaderValue::from_static("PHP/8.2.1"));

        let techs = fingerprint_response(&headers, "<html></html>");
        assert_eq!(names(&techs), vec!["Nginx", "PHP"]);
        assert_eq!(techs[0].version.as_deref(), Some("1.25.3"));
        assert_eq!(techs[1].version.as_deref(), Some("8.2.1"));
    }

    #[test]
    fn versionless_banner_is_still_detected() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx"));
        let techs = fingerprint_response(&headers, "");
        assert_eq!(names(&techs), vec!["Nginx"]);
        assert_eq!(techs[0].version, None);
    }

    #[test]
    fn detects_cms_and_libraries_from_markup() {
        let body = r#"<html><head>
            <meta name="generator" content="WordPress 6.4.2">
            <link rel="stylesheet" href="/css/bootstrap.min.css">
            <script src="/js/jquery-3.7.1.min.js"></script>
            </head><body><img src="/wp-content/uploads/logo.png"></body></html>"#;

        let techs = fingerprint_response(&HeaderMap::new(), body);
        assert_eq!(names(&techs), vec!["Bootstrap", "WordPress", "jQuery"]);
        let wordpress = techs.iter().find(|t| t.name == "WordPress").unwrap();
        assert_eq!(wordpress.version.as_deref(), Some("6.4.2"));
        let jquery = techs.iter().find(|t| t.name == "jQuery").unwrap();
        assert_eq!(jquery.version.as_deref(), Some("3.7.1"));
    }

    #[test]
    fn shop_header_counts_even_when_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-shopid", HeaderValue::from_static(""));
        let techs = fingerprint_response(&headers, "");
        assert_eq!(names(&techs), vec!["Shopify"]);
        assert_eq!(techs[0].category, "E-commerce");
        assert_eq!(techs[0].version, None);
    }

    #[test]
    fn plain_page_yields_nothing() {
        assert!(fingerprint_response(&HeaderMap::new(), "<p>hello</p>").is_empty());
    }
}
