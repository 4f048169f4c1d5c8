use crate::browser::{CaptureContext, CaptureDriver, RawSnapshot};
use crate::consent::{ACCEPT_SELECTORS, REJECT_SELECTORS, vendor_for_selector};
use crate::error::{Result, ScanError};
use crate::result::{
    CapturePhaseResult, ConsentTestResult, Cookie, NetworkRequest, PageScan, Script, ScriptKind,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Wait after navigation so late scripts can set cookies.
    pub settle: Duration,
    /// Wait after clicking a consent control.
    pub post_click_settle: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            post_click_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeConsent,
    AcceptAll,
    RejectAll,
}

impl Phase {
    fn selectors(self) -> &'static [&'static str] {
        match self {
            Phase::BeforeConsent => &[],
            Phase::AcceptAll => ACCEPT_SELECTORS,
            Phase::RejectAll => REJECT_SELECTORS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Phase::BeforeConsent => "before consent",
            Phase::AcceptAll => "accept all",
            Phase::RejectAll => "reject all",
        }
    }
}

/// Lowercased host with any leading `.` and `www.` removed.
fn bare_host(host: &str) -> String {
    let host = host.trim_start_matches('.').to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Whether `host` is third-party relative to `page_host`: after stripping
/// `www.`, the captured host must end with the page host to count as first-party.
pub fn is_third_party_host(host: &str, page_host: &str) -> bool {
    !bare_host(host).ends_with(&bare_host(page_host))
}

/// Third-party check for a full URL. Data, blob and other host-less URLs are first-party.
pub fn is_third_party_url(url: &str, page_host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| is_third_party_host(h, page_host)))
        .unwrap_or(false)
}

/// Attach provenance and third-party flags to a raw browser snapshot.
pub fn annotate(snapshot: RawSnapshot, page_url: &str, page_host: &str) -> CapturePhaseResult {
    let cookies = snapshot
        .cookies
        .into_iter()
        .map(|c| Cookie {
            is_third_party: is_third_party_host(&c.domain, page_host),
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            expires: c.expires,
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site,
            found_on_url: page_url.to_string(),
        })
        .collect();

    let scripts = snapshot
        .scripts
        .into_iter()
        .map(|s| match s.src {
            Some(src) => Script {
                is_third_party: is_third_party_url(&src, page_host),
                url: src,
                kind: ScriptKind::External,
                found_on_url: page_url.to_string(),
                content: None,
                category: None,
            },
            None => Script {
                url: page_url.to_string(),
                kind: ScriptKind::Inline,
                is_third_party: false,
                found_on_url: page_url.to_string(),
                content: s.content,
                category: None,
            },
        })
        .collect();

    let requests = snapshot
        .requests
        .into_iter()
        .map(|r| NetworkRequest {
            is_third_party: is_third_party_url(&r.url, page_host),
            url: r.url,
            resource_type: r.resource_type,
            found_on_url: page_url.to_string(),
        })
        .collect();

    CapturePhaseResult {
        cookies,
        scripts,
        requests,
    }
}

struct PhaseOutcome {
    result: CapturePhaseResult,
    matched_selector: Option<&'static str>,
}

/// Runs the three consent phases against one URL, each in its own browser
/// context, strictly one after the other.
pub struct ConsentTester<'a, D: CaptureDriver + ?Sized> {
    driver: &'a D,
    settings: CaptureSettings,
}

impl<'a, D: CaptureDriver + ?Sized> ConsentTester<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self {
            driver,
            settings: CaptureSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn test_consent(&self, url: &str) -> Result<ConsentTestResult> {
        let page_host = page_host(url)?;
        info!("Testing consent behaviour of {}", url);

        let before = self.run_phase(Phase::BeforeConsent, url, &page_host).await?;
        let accept = self.run_phase(Phase::AcceptAll, url, &page_host).await?;
        let reject = self.run_phase(Phase::RejectAll, url, &page_host).await?;

        let consent_mechanism_found = accept.matched_selector.is_some();
        let consent_vendor = accept
            .matched_selector
            .and_then(vendor_for_selector)
            .map(str::to_string);

        info!(
            "Consent test of {} complete (mechanism found: {}, vendor: {})",
            url,
            consent_mechanism_found,
            consent_vendor.as_deref().unwrap_or("unknown")
        );

        Ok(ConsentTestResult {
            url: url.to_string(),
            before_consent: before.result,
            after_accept_all: accept.result,
            after_reject_all: reject.result,
            consent_mechanism_found,
            consent_vendor,
        })
    }

    /// Capture a page without touching any consent control.
    pub async fn scan_page(&self, url: &str) -> Result<PageScan> {
        let page_host = page_host(url)?;
        let outcome = self.run_phase(Phase::BeforeConsent, url, &page_host).await?;
        Ok(PageScan::from_phase(url, outcome.result))
    }

    async fn run_phase(&self, phase: Phase, url: &str, page_host: &str) -> Result<PhaseOutcome> {
        debug!("Phase '{}' for {}", phase.label(), url);
        let mut context = self.driver.open_context().await?;
        let outcome = self.drive(context.as_mut(), phase, url, page_host).await;
        let closed = context.close().await;

        let outcome = outcome?;
        if let Err(e) = closed {
            warn!("Closing '{}' context for {} failed: {}", phase.label(), url, e);
        }
        Ok(outcome)
    }

    async fn drive(
        &self,
        context: &mut dyn CaptureContext,
        phase: Phase,
        url: &str,
        page_host: &str,
    ) -> Result<PhaseOutcome> {
        if let Err(e) = context.navigate(url).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("Navigation during '{}' for {} failed: {}", phase.label(), url, e);
        }
        tokio::time::sleep(self.settings.settle).await;

        let mut matched_selector = None;
        for selector in phase.selectors() {
            match context.has_element(selector).await {
                Ok(true) => {
                    matched_selector = Some(*selector);
                    break;
                }
                Ok(false) => {}
                Err(e) => debug!("Selector {} lookup failed: {}", selector, e),
            }
        }

        if let Some(selector) = matched_selector {
            debug!("Clicking {} on {}", selector, url);
            if let Err(e) = context.click(selector).await {
                warn!("Clicking {} on {} failed: {}", selector, url, e);
            }
            tokio::time::sleep(self.settings.post_click_settle).await;
        }

        let snapshot = context.snapshot().await?;
        Ok(PhaseOutcome {
            result: annotate(snapshot, url, page_host),
            matched_selector,
        })
    }
}

fn page_host(url: &str) -> Result<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| ScanError::InvalidUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{RawCookie, RawRequest, RawScript};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn cookie(name: &str, domain: &str) -> RawCookie {
        RawCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: true,
            same_site: Some("Lax".to_string()),
        }
    }

    /// A fake site: the banner is present when `banner` is set, and each
    /// context's cookie jar depends on which control was clicked in it.
    struct FakeSite {
        banner: Option<(&'static str, &'static str)>,
        log: Arc<Mutex<Vec<String>>>,
        next_id: Mutex<usize>,
    }

    impl FakeSite {
        fn new(banner: Option<(&'static str, &'static str)>) -> Self {
            Self {
                banner,
                log: Arc::new(Mutex::new(Vec::new())),
                next_id: Mutex::new(0),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    struct FakeContext {
        id: usize,
        banner: Option<(&'static str, &'static str)>,
        clicked: Mutex<Option<String>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CaptureDriver for FakeSite {
        async fn open_context(&self) -> Result<Box<dyn CaptureContext>> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            self.log.lock().unwrap().push(format!("open {}", *next));
            Ok(Box::new(FakeContext {
                id: *next,
                banner: self.banner,
                clicked: Mutex::new(None),
                log: self.log.clone(),
            }))
        }
    }

    #[async_trait]
    impl CaptureContext for FakeContext {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("navigate {} {}", self.id, url));
            Ok(())
        }

        async fn has_element(&self, selector: &str) -> Result<bool> {
            Ok(self
                .banner
                .is_some_and(|(accept, reject)| selector == accept || selector == reject))
        }

        async fn click(&self, selector: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("click {} {}", self.id, selector));
            *self.clicked.lock().unwrap() = Some(selector.to_string());
            Ok(())
        }

        async fn snapshot(&mut self) -> Result<RawSnapshot> {
            let mut cookies = vec![cookie("session", "www.shop.com")];
            let clicked = self.clicked.lock().unwrap().clone();
            if let Some((accept, _)) = self.banner
                && clicked.as_deref() == Some(accept)
            {
                cookies.push(cookie("_ga", ".shop.com"));
                cookies.push(cookie("IDE", ".doubleclick.net"));
            }
            Ok(RawSnapshot {
                cookies,
                scripts: vec![
                    RawScript {
                        src: Some("https://www.googletagmanager.com/gtm.js".into()),
                        content: None,
                    },
                    RawScript {
                        src: None,
                        content: Some("window.dataLayer = [];".into()),
                    },
                ],
                requests: vec![RawRequest {
                    url: "https://cdn.shop.com/app.js".into(),
                    resource_type: "script".into(),
                }],
            })
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.log.lock().unwrap().push(format!("close {}", self.id));
            Ok(())
        }
    }

    fn instant() -> CaptureSettings {
        CaptureSettings {
            settle: Duration::ZERO,
            post_click_settle: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_phases_run_in_isolated_contexts_in_order() {
        let site = FakeSite::new(Some((
            "#onetrust-accept-btn-handler",
            "#onetrust-reject-all-handler",
        )));
        let tester = ConsentTester::new(&site).with_settings(instant());

        tester.test_consent("https://www.shop.com/").await.unwrap();

        assert_eq!(
            site.log(),
            vec![
                "open 1",
                "navigate 1 https://www.shop.com/",
                "close 1",
                "open 2",
                "navigate 2 https://www.shop.com/",
                "click 2 #onetrust-accept-btn-handler",
                "close 2",
                "open 3",
                "navigate 3 https://www.shop.com/",
                "click 3 #onetrust-reject-all-handler",
                "close 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_vendor_detected_from_accept_selector() {
        let site = FakeSite::new(Some((
            "#onetrust-accept-btn-handler",
            "#onetrust-reject-all-handler",
        )));
        let result = ConsentTester::new(&site)
            .with_settings(instant())
            .test_consent("https://www.shop.com/")
            .await
            .unwrap();

        assert!(result.consent_mechanism_found);
        assert_eq!(result.consent_vendor.as_deref(), Some("OneTrust"));
        assert_eq!(result.before_consent.cookies.len(), 1);
        assert_eq!(result.after_accept_all.cookies.len(), 3);
        assert_eq!(result.after_reject_all.cookies.len(), 1);
    }

    #[tokio::test]
    async fn test_generic_banner_has_no_vendor() {
        let site = FakeSite::new(Some((ACCEPT_SELECTORS[0], REJECT_SELECTORS[0])));
        let result = ConsentTester::new(&site)
            .with_settings(instant())
            .test_consent("https://www.shop.com/")
            .await
            .unwrap();

        assert!(result.consent_mechanism_found);
        assert_eq!(result.consent_vendor, None);
    }

    #[tokio::test]
    async fn test_no_banner_means_no_click() {
        let site = FakeSite::new(None);
        let result = ConsentTester::new(&site)
            .with_settings(instant())
            .test_consent("https://www.shop.com/")
            .await
            .unwrap();

        assert!(!result.consent_mechanism_found);
        assert!(result.consent_vendor.is_none());
        assert!(!site.log().iter().any(|l| l.starts_with("click")));
    }

    #[tokio::test]
    async fn test_provenance_and_third_party_flags() {
        let site = FakeSite::new(Some(("#onetrust-accept-btn-handler", "#x")));
        let result = ConsentTester::new(&site)
            .with_settings(instant())
            .test_consent("https://www.shop.com/")
            .await
            .unwrap();

        let accept = &result.after_accept_all;
        assert!(
            accept
                .cookies
                .iter()
                .all(|c| c.found_on_url == "https://www.shop.com/")
        );
        let ide = accept.cookies.iter().find(|c| c.name == "IDE").unwrap();
        assert!(ide.is_third_party);
        let ga = accept.cookies.iter().find(|c| c.name == "_ga").unwrap();
        assert!(!ga.is_third_party);

        let gtm = &accept.scripts[0];
        assert_eq!(gtm.kind, ScriptKind::External);
        assert!(gtm.is_third_party);
        let inline = &accept.scripts[1];
        assert_eq!(inline.kind, ScriptKind::Inline);
        assert_eq!(inline.content.as_deref(), Some("window.dataLayer = [];"));

        assert!(!accept.requests[0].is_third_party);
        assert_eq!(accept.requests[0].found_on_url, "https://www.shop.com/");
    }

    #[tokio::test]
    async fn test_scan_page_uses_one_context() {
        let site = FakeSite::new(Some(("#onetrust-accept-btn-handler", "#x")));
        let scan = ConsentTester::new(&site)
            .with_settings(instant())
            .scan_page("https://www.shop.com/")
            .await
            .unwrap();

        assert_eq!(scan.cookies.len(), 1);
        assert_eq!(
            site.log(),
            vec!["open 1", "navigate 1 https://www.shop.com/", "close 1"]
        );
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let site = FakeSite::new(None);
        let result = ConsentTester::new(&site).test_consent("nope").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
        assert!(site.log().is_empty());
    }

    #[test]
    fn test_third_party_host() {
        assert!(!is_third_party_host("www.example.com", "example.com"));
        assert!(!is_third_party_host(".example.com", "www.example.com"));
        assert!(!is_third_party_host("cdn.example.com", "example.com"));
        assert!(is_third_party_host("doubleclick.net", "example.com"));
        assert!(is_third_party_host("example.com", "shop.example.com"));
    }

    #[test]
    fn test_third_party_url_without_host() {
        assert!(!is_third_party_url("data:text/plain,hi", "example.com"));
        assert!(is_third_party_url("https://connect.facebook.net/x.js", "example.com"));
    }
}
