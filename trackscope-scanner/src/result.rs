use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A page the crawler fetched with a 2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub url: String,
    pub depth: usize,
    pub title: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

/// A page that could not be crawled. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlError {
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl CrawlError {
    pub fn new(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdge {
    pub from: String,
    pub to: String,
}

/// Everything a crawl produced: the page inventory, the failures and the link graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOutcome {
    pub pages: Vec<PageInfo>,
    pub errors: Vec<CrawlError>,
    pub links: Vec<LinkEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Seconds since the Unix epoch. `None` for session cookies.
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
    pub is_third_party: bool,
    pub found_on_url: String,
}

impl Cookie {
    /// A bare first-party session cookie; tests and collaborators fill in the rest.
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: false,
            same_site: None,
            is_third_party: false,
            found_on_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Inline,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub is_third_party: bool,
    pub found_on_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub url: String,
    pub resource_type: String,
    pub is_third_party: bool,
    pub found_on_url: String,
}

/// Tracking state observed in one isolated browser context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapturePhaseResult {
    pub cookies: Vec<Cookie>,
    pub scripts: Vec<Script>,
    pub requests: Vec<NetworkRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentTestResult {
    pub url: String,
    pub before_consent: CapturePhaseResult,
    pub after_accept_all: CapturePhaseResult,
    pub after_reject_all: CapturePhaseResult,
    pub consent_mechanism_found: bool,
    pub consent_vendor: Option<String>,
}

/// A single no-interaction capture of one crawled page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageScan {
    pub url: String,
    pub cookies: Vec<Cookie>,
    pub scripts: Vec<Script>,
    pub requests: Vec<NetworkRequest>,
    pub timestamp: DateTime<Utc>,
}

impl PageScan {
    pub fn from_phase(url: impl Into<String>, phase: CapturePhaseResult) -> Self {
        Self {
            url: url.into(),
            cookies: phase.cookies,
            scripts: phase.scripts,
            requests: phase.requests,
            timestamp: Utc::now(),
        }
    }
}
