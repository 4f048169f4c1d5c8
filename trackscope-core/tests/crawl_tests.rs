// Tests for crawl, consent audit and scan orchestration against a fake site

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use trackscope_core::config::CrawlConfig;
use trackscope_core::crawl::{audit_consent, crawl_site, scan_site};
use trackscope_scanner::browser::{RawCookie, RawScript, RawSnapshot};
use trackscope_scanner::error::Result;
use trackscope_scanner::{
    CaptureContext, CaptureDriver, CaptureSettings, FetchedPage, Navigator, ScanError,
};

const ROOT: &str = "https://shop.example.com/";

/// Pages keyed by URL: (links, cookie names set on load).
struct FakeSite {
    pages: HashMap<String, (Vec<&'static str>, Vec<&'static str>)>,
    broken_capture: Option<&'static str>,
    launch_fails: bool,
}

impl FakeSite {
    fn new() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            ROOT.to_string(),
            (vec!["/about", "/shop"], vec!["_ga", "session"]),
        );
        pages.insert(
            "https://shop.example.com/about".to_string(),
            (vec!["/"], vec!["_ga", "_hjSessionUser"]),
        );
        pages.insert(
            "https://shop.example.com/shop".to_string(),
            (vec![], vec!["cart"]),
        );
        Self {
            pages,
            broken_capture: None,
            launch_fails: false,
        }
    }
}

#[async_trait]
impl Navigator for FakeSite {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let Some((links, _)) = self.pages.get(url) else {
            return Ok(FetchedPage {
                url: url.to_string(),
                status_code: Some(404),
                title: String::new(),
                html: String::new(),
            });
        };
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{}">x</a>"#, l))
            .collect();
        Ok(FetchedPage {
            url: url.to_string(),
            status_code: Some(200),
            title: format!("Page {}", url),
            html: format!("<html><body>{}</body></html>", anchors),
        })
    }
}

struct FakeContext {
    cookies: HashMap<String, Vec<&'static str>>,
    broken: Option<&'static str>,
    url: Option<String>,
}

#[async_trait]
impl CaptureDriver for FakeSite {
    async fn open_context(&self) -> Result<Box<dyn CaptureContext>> {
        if self.launch_fails {
            return Err(ScanError::BrowserLaunch("chrome not found".into()));
        }
        Ok(Box::new(FakeContext {
            cookies: self
                .pages
                .iter()
                .map(|(url, (_, cookies))| (url.clone(), cookies.clone()))
                .collect(),
            broken: self.broken_capture,
            url: None,
        }))
    }
}

#[async_trait]
impl CaptureContext for FakeContext {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        Ok(selector == "#onetrust-accept-btn-handler")
    }

    async fn click(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<RawSnapshot> {
        let url = self.url.clone().unwrap_or_default();
        if self.broken == Some(url.as_str()) {
            return Err(ScanError::Browser("target crashed".into()));
        }
        let cookies = self
            .cookies
            .get(&url)
            .map(|names| {
                names
                    .iter()
                    .map(|name| RawCookie {
                        name: name.to_string(),
                        value: "1".to_string(),
                        domain: ".example.com".to_string(),
                        path: "/".to_string(),
                        expires: None,
                        http_only: false,
                        secure: true,
                        same_site: Some("Lax".to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(RawSnapshot {
            cookies,
            scripts: vec![RawScript {
                src: Some("https://www.googletagmanager.com/gtm.js".to_string()),
                content: None,
            }],
            requests: Vec::new(),
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn config() -> CrawlConfig {
    CrawlConfig {
        delay: 0,
        ..CrawlConfig::new(ROOT)
    }
}

fn instant() -> CaptureSettings {
    CaptureSettings {
        settle: Duration::ZERO,
        post_click_settle: Duration::ZERO,
    }
}

// ============================================================================
// Crawl Tests
// ============================================================================

#[tokio::test]
async fn test_crawl_site_follows_links() {
    let site = FakeSite::new();

    let outcome = crawl_site(&site, &config(), None).await.unwrap();

    let urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            ROOT,
            "https://shop.example.com/about",
            "https://shop.example.com/shop"
        ]
    );
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_crawl_site_honours_max_pages() {
    let site = FakeSite::new();
    let config = CrawlConfig {
        max_pages: 1,
        ..config()
    };

    let outcome = crawl_site(&site, &config, None).await.unwrap();

    assert_eq!(outcome.pages.len(), 1);
}

// ============================================================================
// Consent Audit Tests
// ============================================================================

#[tokio::test]
async fn test_audit_consent_classifies_every_phase() {
    let site = FakeSite::new();

    let audit = audit_consent(&site, &config(), instant()).await.unwrap();

    assert!(audit.result.consent_mechanism_found);
    assert_eq!(audit.result.consent_vendor.as_deref(), Some("OneTrust"));
    assert_eq!(audit.analysis.before_consent.len(), 2);
    assert_eq!(audit.analysis.after_accept_all.len(), 2);
    assert_eq!(audit.analysis.after_reject_all.len(), 2);
    assert_eq!(
        audit.result.before_consent.scripts[0].category.as_deref(),
        Some("analytics")
    );
    assert_eq!(audit.config.url, ROOT);
}

// ============================================================================
// Scan Tests
// ============================================================================

#[tokio::test]
async fn test_scan_site_aggregates_crawled_pages() {
    let site = FakeSite::new();

    let report = scan_site(&site, &config(), instant(), None).await.unwrap();

    assert_eq!(report.crawl.pages.len(), 3);
    assert_eq!(report.results.scan_results.len(), 3);
    assert_eq!(report.results.total_cookies, 5);
    // _ga appears on two pages
    assert_eq!(report.results.unique_cookies.len(), 4);
    assert_eq!(report.results.unique_scripts.len(), 1);
    assert_eq!(report.results.cookie_analysis.len(), 4);
}

#[tokio::test]
async fn test_scan_failure_is_recorded_not_raised() {
    let mut site = FakeSite::new();
    site.broken_capture = Some("https://shop.example.com/shop");

    let report = scan_site(&site, &config(), instant(), None).await.unwrap();

    assert_eq!(report.results.scan_results.len(), 2);
    assert_eq!(report.crawl.errors.len(), 1);
    assert!(report.crawl.errors[0].error.starts_with("Scan failed"));
}

#[tokio::test]
async fn test_launch_failure_aborts_scan() {
    let mut site = FakeSite::new();
    site.launch_fails = true;

    let result = scan_site(&site, &config(), instant(), None).await;

    assert!(result.is_err());
}
