use crate::aggregate::{AggregatedScanResults, aggregate_scans};
use crate::classify::{CookieAnalysis, analyze_cookies};
use crate::config::CrawlConfig;
use crate::error::Result;
use crate::vendors::categorize_scripts;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trackscope_scanner::{
    BrowserOptions, CaptureDriver, CaptureSettings, ChromiumBrowser, ConsentTestResult,
    ConsentTester, CrawlError, CrawlOutcome, Crawler, Navigator, ProgressCallback,
};

/// Cookie analyses for each consent phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseAnalysis {
    pub before_consent: Vec<CookieAnalysis>,
    pub after_accept_all: Vec<CookieAnalysis>,
    pub after_reject_all: Vec<CookieAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentAudit {
    pub config: CrawlConfig,
    pub result: ConsentTestResult,
    pub analysis: PhaseAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub config: CrawlConfig,
    pub crawl: CrawlOutcome,
    pub results: AggregatedScanResults,
}

pub fn spinner(enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting...");
    Some(pb)
}

/// Breadth-first crawl of `config.url` through any navigator.
pub async fn crawl_site<N>(
    navigator: &N,
    config: &CrawlConfig,
    progress: Option<&ProgressBar>,
) -> Result<CrawlOutcome>
where
    N: Navigator + ?Sized,
{
    let mut crawler = Crawler::new()
        .with_max_depth(config.max_depth)
        .with_max_pages(config.max_pages)
        .with_delay(config.delay_duration());

    if let Some(pb) = progress {
        let pb = pb.clone();
        let max_pages = config.max_pages;
        let callback: ProgressCallback = Arc::new(move |done: usize, url: String| {
            pb.set_message(format!("Crawling [{}/{}] {}", done + 1, max_pages, url));
        });
        crawler = crawler.with_progress_callback(callback);
    }

    let outcome = crawler.crawl(navigator, &config.url).await?;
    info!(
        "Crawl of {} finished: {} pages, {} errors",
        config.url,
        outcome.pages.len(),
        outcome.errors.len()
    );
    Ok(outcome)
}

/// Three-phase consent capture of `config.url`, with every phase's cookies
/// classified and scripts categorized.
pub async fn audit_consent<D>(
    driver: &D,
    config: &CrawlConfig,
    settings: CaptureSettings,
) -> Result<ConsentAudit>
where
    D: CaptureDriver + ?Sized,
{
    let mut result = ConsentTester::new(driver)
        .with_settings(settings)
        .test_consent(&config.url)
        .await?;

    for phase in [
        &mut result.before_consent,
        &mut result.after_accept_all,
        &mut result.after_reject_all,
    ] {
        categorize_scripts(&mut phase.scripts);
    }

    let analysis = PhaseAnalysis {
        before_consent: analyze_cookies(&result.before_consent.cookies),
        after_accept_all: analyze_cookies(&result.after_accept_all.cookies),
        after_reject_all: analyze_cookies(&result.after_reject_all.cookies),
    };

    Ok(ConsentAudit {
        config: config.clone(),
        result,
        analysis,
    })
}

/// Crawl, capture every crawled page once, and aggregate. A page whose
/// capture fails is recorded as a crawl error.
pub async fn scan_site<D>(
    driver: &D,
    config: &CrawlConfig,
    settings: CaptureSettings,
    progress: Option<&ProgressBar>,
) -> Result<ScanReport>
where
    D: Navigator + CaptureDriver + ?Sized,
{
    let mut crawl = crawl_site(driver, config, progress).await?;
    let tester = ConsentTester::new(driver).with_settings(settings);

    let urls: Vec<String> = crawl.pages.iter().map(|p| p.url.clone()).collect();
    let mut scans = Vec::with_capacity(urls.len());
    for (idx, url) in urls.iter().enumerate() {
        if let Some(pb) = progress {
            pb.set_message(format!("Scanning [{}/{}] {}", idx + 1, urls.len(), url));
        }
        match tester.scan_page(url).await {
            Ok(scan) => scans.push(scan),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Scan of {} failed: {}", url, e);
                crawl
                    .errors
                    .push(CrawlError::new(url, format!("Scan failed: {}", e)));
            }
        }
    }

    let results = aggregate_scans(scans);
    info!(
        "Scanned {} pages: {} unique cookies, {} unique scripts",
        results.scan_results.len(),
        results.unique_cookies.len(),
        results.unique_scripts.len()
    );

    Ok(ScanReport {
        config: config.clone(),
        crawl,
        results,
    })
}

async fn launch(config: &CrawlConfig) -> Result<ChromiumBrowser> {
    let options = BrowserOptions {
        headless: config.headless,
        ..Default::default()
    };
    Ok(ChromiumBrowser::launch(options).await?)
}

async fn shutdown(browser: ChromiumBrowser) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser cleanly: {}", e);
    }
}

/// Finish the spinner with `message`, or clear it when the run failed.
fn finish(progress: Option<ProgressBar>, message: Option<String>) {
    match (progress, message) {
        (Some(pb), Some(message)) => pb.finish_with_message(message),
        (Some(pb), None) => pb.finish_and_clear(),
        (None, _) => {}
    }
}

/// Validate, launch a browser, crawl, and close the browser on every path.
pub async fn execute_crawl(config: &CrawlConfig, show_progress: bool) -> Result<CrawlOutcome> {
    config.validate()?;
    let browser = launch(config).await?;
    let progress = spinner(show_progress);

    let outcome = crawl_site(&browser, config, progress.as_ref()).await;
    shutdown(browser).await;

    finish(
        progress,
        outcome
            .as_ref()
            .ok()
            .map(|o| format!("Crawl complete! {} pages", o.pages.len())),
    );
    outcome
}

pub async fn execute_consent_test(
    config: &CrawlConfig,
    show_progress: bool,
) -> Result<ConsentAudit> {
    config.validate()?;
    let browser = launch(config).await?;
    let progress = spinner(show_progress);
    if let Some(ref pb) = progress {
        pb.set_message(format!("Testing consent behaviour of {}", config.url));
    }

    let audit = audit_consent(&browser, config, CaptureSettings::default()).await;
    shutdown(browser).await;

    finish(
        progress,
        audit.is_ok().then(|| "Consent test complete!".to_string()),
    );
    audit
}

pub async fn execute_scan(config: &CrawlConfig, show_progress: bool) -> Result<ScanReport> {
    config.validate()?;
    let browser = launch(config).await?;
    let progress = spinner(show_progress);

    let report = scan_site(
        &browser,
        config,
        CaptureSettings::default(),
        progress.as_ref(),
    )
    .await;
    shutdown(browser).await;

    finish(
        progress,
        report
            .as_ref()
            .ok()
            .map(|r| format!("Scan complete! {} pages scanned", r.results.scan_results.len())),
    );
    report
}
