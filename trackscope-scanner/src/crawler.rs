use crate::browser::{FetchedPage, Navigator};
use crate::error::{Result, ScanError};
use crate::frontier::{Frontier, FrontierItem};
use crate::result::{CrawlError, CrawlOutcome, LinkEdge, PageInfo};
use chrono::Utc;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Called before each fetch with the number of pages crawled so far and the URL.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Breadth-first, single-host crawler. Each call to [`Crawler::crawl`] owns a
/// fresh [`Frontier`]; pages are fetched one at a time in queue order.
pub struct Crawler {
    max_depth: usize,
    max_pages: usize,
    delay: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Self {
        Self {
            max_depth: 3,
            max_pages: 50,
            delay: Duration::from_millis(1000),
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn crawl<N>(&self, navigator: &N, start_url: &str) -> Result<CrawlOutcome>
    where
        N: Navigator + ?Sized,
    {
        info!(
            "Starting crawl of {} (max depth {}, max pages {})",
            start_url, self.max_depth, self.max_pages
        );

        let mut frontier = Frontier::for_url(start_url)
            .ok_or_else(|| ScanError::InvalidUrl(start_url.to_string()))?;
        if !frontier.enqueue(FrontierItem::root(start_url)) {
            warn!("Start URL {} is not a crawlable page", start_url);
        }

        let mut outcome = CrawlOutcome::default();
        let mut fetched_any = false;

        while outcome.pages.len() < self.max_pages {
            let Some(item) = frontier.dequeue() else {
                break;
            };

            if item.depth > self.max_depth {
                debug!("Skipping {} at depth {}", item.url, item.depth);
                continue;
            }

            if fetched_any && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            fetched_any = true;

            if let Some(ref callback) = self.progress_callback {
                callback(outcome.pages.len(), item.url.clone());
            }

            let page = match navigator.fetch(&item.url).await {
                Ok(page) => page,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Crawl error for {}: {}", item.url, e);
                    outcome.errors.push(CrawlError::new(&item.url, e.to_string()));
                    continue;
                }
            };

            let status_code = match check_status(page.status_code) {
                Ok(code) => code,
                Err(reason) => {
                    warn!("{}: {}", item.url, reason);
                    outcome.errors.push(CrawlError::new(&item.url, reason));
                    continue;
                }
            };

            outcome.pages.push(PageInfo {
                url: item.url.clone(),
                depth: item.depth,
                title: page.title.clone(),
                status_code,
                timestamp: Utc::now(),
            });
            frontier.mark_visited(&item.url);

            if item.depth < self.max_depth {
                self.follow_links(&mut frontier, &item, &page, &mut outcome);
            }
        }

        info!(
            "Crawl complete. {} pages, {} errors, {} still queued",
            outcome.pages.len(),
            outcome.errors.len(),
            frontier.len()
        );
        Ok(outcome)
    }

    fn follow_links(
        &self,
        frontier: &mut Frontier,
        item: &FrontierItem,
        page: &FetchedPage,
        outcome: &mut CrawlOutcome,
    ) {
        // relative hrefs resolve against where the page actually ended up
        let links = match extract_links(&page.html, &page.url) {
            Ok(links) => links,
            Err(e) => {
                warn!("Link extraction failed for {}: {}", item.url, e);
                outcome.errors.push(CrawlError::new(&item.url, e.to_string()));
                return;
            }
        };

        debug!("Found {} links on {}", links.len(), item.url);
        for link in links {
            if frontier.enqueue(item.child(link.clone())) {
                outcome.links.push(LinkEdge {
                    from: item.url.clone(),
                    to: link,
                });
            }
        }
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept a 2xx status, otherwise describe why the page is an error.
fn check_status(status: Option<u16>) -> std::result::Result<u16, String> {
    match status {
        Some(code) if (200..300).contains(&code) => Ok(code),
        Some(code) => Err(format!("HTTP {}", code)),
        None => Err("No HTTP response received for document".to_string()),
    }
}

/// Every `<a href>` in `html`, resolved against `current_url`.
pub fn extract_links(html: &str, current_url: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let link_selector =
        Selector::parse("a[href]").map_err(|e| ScanError::ParseError(e.to_string()))?;

    Ok(document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_url(current_url, href))
        .collect())
}

pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}
