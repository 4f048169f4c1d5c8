//! Headless browser driver.
//!
//! The crawler and the consent tester only talk to the [`Navigator`] and
//! [`CaptureDriver`] traits; [`ChromiumBrowser`] implements both on top of a
//! single chromiumoxide browser process.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieSameSite, EventRequestWillBeSent, EventResponseReceived, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long to wait for a main-document response that has not arrived by the
/// time navigation resolves.
const STATUS_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub navigation_timeout: Duration,
    /// Capacity of the per-context request channel. Overflow is dropped.
    pub request_buffer: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(30),
            request_buffer: 1024,
        }
    }
}

/// A page as the crawler sees it after navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// `None` when no main-document response was observed.
    pub status_code: Option<u16>,
    pub title: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawScript {
    pub src: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub url: String,
    pub resource_type: String,
}

/// Unannotated tracking state of one browser context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub cookies: Vec<RawCookie>,
    pub scripts: Vec<RawScript>,
    pub requests: Vec<RawRequest>,
}

/// Loads one URL in a fresh tab and reports what came back.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Hands out isolated browser contexts, each with its own cookie jar.
#[async_trait]
pub trait CaptureDriver: Send + Sync {
    async fn open_context(&self) -> Result<Box<dyn CaptureContext>>;
}

#[async_trait]
pub trait CaptureContext: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether `selector` resolves to at least one element.
    async fn has_element(&self, selector: &str) -> Result<bool>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn snapshot(&mut self) -> Result<RawSnapshot>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Split a `css:has-text("label")` selector into its CSS part and the
/// lowercased text the element must contain.
pub fn split_text_selector(selector: &str) -> (String, Option<String>) {
    const MARKER: &str = ":has-text(";

    if let Some(start) = selector.find(MARKER)
        && selector.ends_with(')')
    {
        let css = &selector[..start];
        let inner = &selector[start + MARKER.len()..selector.len() - 1];
        let text = inner.trim().trim_matches(|c| c == '"' || c == '\'');
        let css = if css.is_empty() { "*" } else { css };
        return (css.to_string(), Some(text.to_lowercase()));
    }

    (selector.to_string(), None)
}

/// JavaScript that locates the first element matching `selector` and
/// optionally clicks it. Evaluates to `true` when an element was found.
fn locate_script(selector: &str, click: bool) -> Result<String> {
    let (css, text) = split_text_selector(selector);
    let css = serde_json::to_string(&css).map_err(|e| ScanError::ParseError(e.to_string()))?;
    let text = serde_json::to_string(&text).map_err(|e| ScanError::ParseError(e.to_string()))?;

    Ok(format!(
        r#"(() => {{
    const needle = {text};
    const candidates = Array.from(document.querySelectorAll({css}));
    const el = needle === null
        ? candidates[0]
        : candidates.find(e => (e.innerText || e.textContent || '').trim().toLowerCase().includes(needle));
    if (!el) return false;
    if ({click}) el.click();
    return true;
}})()"#
    ))
}

const SCRIPTS_JS: &str = r#"Array.from(document.scripts).map(s => ({
    src: s.src || null,
    content: s.src ? null : (s.textContent || '').slice(0, 500)
}))"#;

fn resource_type_name(kind: &ResourceType) -> String {
    format!("{:?}", kind).to_lowercase()
}

fn same_site_name(same_site: &CookieSameSite) -> String {
    match same_site {
        CookieSameSite::Strict => "Strict",
        CookieSameSite::Lax => "Lax",
        CookieSameSite::None => "None",
    }
    .to_string()
}

/// One Chrome/Chromium process shared by every page and context of a run.
pub struct ChromiumBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    options: BrowserOptions,
}

impl ChromiumBrowser {
    /// Launch the browser process. Failure here is fatal for the run.
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(options.navigation_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScanError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScanError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("Browser launched (headless: {})", options.headless);
        Ok(Self {
            browser: Arc::new(browser),
            handler,
            options,
        })
    }

    /// Shut the browser process down and stop the event handler.
    pub async fn close(self) -> Result<()> {
        let result = match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                if let Err(e) = browser.wait().await {
                    debug!("Waiting for browser exit failed: {}", e);
                }
                closed
            }
            Err(shared) => shared.execute(CloseParams::default()).await.map(|_| ()),
        };
        self.handler.abort();
        info!("Browser closed");
        result.map_err(ScanError::from)
    }

    /// A blank tab inside a fresh browser context, so no cookies or storage
    /// carry over from earlier pages.
    async fn isolated_page(&self) -> Result<(BrowserContextId, Page)> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(ScanError::Browser)?;
        match self.browser.new_page(params).await {
            Ok(page) => Ok((context_id, page)),
            Err(e) => {
                if let Err(dispose) = self
                    .browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    debug!("Disposing unused context failed: {}", dispose);
                }
                Err(e.into())
            }
        }
    }

    async fn load(&self, page: &Page, url: &str) -> Result<FetchedPage> {
        let mut responses = page.event_listener::<EventResponseReceived>().await?;

        tokio::time::timeout(self.options.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| ScanError::Timeout(url.to_string()))?
            .map_err(|e| ScanError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let main_frame = page.mainframe().await?;
        let is_main_document = |event: &EventResponseReceived, seen: bool| {
            event.r#type == ResourceType::Document
                && match (&main_frame, &event.frame_id) {
                    (Some(main), Some(frame)) => main == frame,
                    _ => !seen,
                }
        };

        let mut status_code = None;
        while let Some(Some(event)) = responses.next().now_or_never() {
            if is_main_document(&event, status_code.is_some()) {
                status_code = u16::try_from(event.response.status).ok();
            }
        }
        if status_code.is_none() {
            // the response event can trail the load event
            let late = tokio::time::timeout(STATUS_GRACE, async {
                while let Some(event) = responses.next().await {
                    if is_main_document(&event, false) {
                        return u16::try_from(event.response.status).ok();
                    }
                }
                None
            })
            .await;
            status_code = late.ok().flatten();
            if status_code.is_none() {
                debug!("No document response observed for {}", url);
            }
        }

        let final_url = page.url().await?.unwrap_or_else(|| url.to_string());
        let title = page.get_title().await?.unwrap_or_default();
        let html = page.content().await?;

        Ok(FetchedPage {
            url: final_url,
            status_code,
            title,
            html,
        })
    }
}

#[async_trait]
impl Navigator for ChromiumBrowser {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching {}", url);
        let (context_id, page) = self.isolated_page().await?;
        let result = self.load(&page, url).await;
        if let Err(e) = page.close().await {
            debug!("Closing tab for {} failed: {}", url, e);
        }
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            debug!("Disposing context for {} failed: {}", url, e);
        }
        result
    }
}

#[async_trait]
impl CaptureDriver for ChromiumBrowser {
    async fn open_context(&self) -> Result<Box<dyn CaptureContext>> {
        let (context_id, page) = self.isolated_page().await?;

        let mut events = page.event_listener::<EventRequestWillBeSent>().await?;
        let (tx, rx) = mpsc::channel(self.options.request_buffer.max(1));
        let forwarder = tokio::spawn(async move {
            let mut dropped = 0usize;
            while let Some(event) = events.next().await {
                let request = RawRequest {
                    url: event.request.url.clone(),
                    resource_type: event
                        .r#type
                        .as_ref()
                        .map(resource_type_name)
                        .unwrap_or_else(|| "other".to_string()),
                };
                match tx.try_send(request) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => dropped += 1,
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            if dropped > 0 {
                warn!("Request buffer full, dropped {} requests", dropped);
            }
        });

        debug!("Opened browser context {:?}", context_id);
        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id,
            page,
            requests: rx,
            forwarder,
            navigation_timeout: self.options.navigation_timeout,
        }))
    }
}

/// A browser context with a single tab and its request capture.
struct ChromiumContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
    requests: mpsc::Receiver<RawRequest>,
    forwarder: JoinHandle<()>,
    navigation_timeout: Duration,
}

#[async_trait]
impl CaptureContext for ChromiumContext {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        tokio::time::timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| ScanError::Timeout(url.to_string()))?
            .map_err(|e| ScanError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        let script = locate_script(selector, false)?;
        match self.page.evaluate(script).await {
            Ok(result) => Ok(result.into_value::<bool>().unwrap_or(false)),
            Err(e) => {
                debug!("Selector {} failed to evaluate: {}", selector, e);
                Ok(false)
            }
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let script = locate_script(selector, true)?;
        let clicked = self
            .page
            .evaluate(script)
            .await?
            .into_value::<bool>()
            .map_err(|e| ScanError::ParseError(e.to_string()))?;
        if clicked {
            Ok(())
        } else {
            Err(ScanError::Browser(format!("no element for {}", selector)))
        }
    }

    async fn snapshot(&mut self) -> Result<RawSnapshot> {
        let mut params = GetCookiesParams::default();
        params.browser_context_id = Some(self.context_id.clone());
        let cookies = self
            .browser
            .execute(params)
            .await?
            .result
            .cookies
            .into_iter()
            .map(|c| RawCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: (!c.session && c.expires > 0.0).then_some(c.expires),
                http_only: c.http_only,
                secure: c.secure,
                same_site: c.same_site.as_ref().map(same_site_name),
            })
            .collect();

        let scripts = self
            .page
            .evaluate(SCRIPTS_JS)
            .await?
            .into_value::<Vec<RawScript>>()
            .map_err(|e| ScanError::ParseError(e.to_string()))?;

        let mut requests = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            requests.push(request);
        }

        Ok(RawSnapshot {
            cookies,
            scripts,
            requests,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.forwarder.abort();
        let closed = this.page.close().await;
        this.browser
            .execute(DisposeBrowserContextParams::new(this.context_id))
            .await?;
        closed?;
        Ok(())
    }
}
