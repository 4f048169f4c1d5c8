use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::collections::BTreeMap;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trackscope_core::classify::{CookieAnalysis, RiskLevel};
use trackscope_core::config::CrawlConfig;
use trackscope_core::crawl::{
    ConsentAudit, ScanReport, execute_consent_test, execute_crawl, execute_scan,
};
use trackscope_core::output::OutputWriter;
use trackscope_scanner::{CapturePhaseResult, CrawlOutcome};
use url::Url;

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.has_host()
    {
        return Some(with_scheme);
    }

    None
}

/// Turn subcommand arguments into a run configuration. Flags a subcommand
/// does not define keep their defaults.
pub fn build_config(args: &ArgMatches) -> Result<CrawlConfig> {
    let raw = args
        .get_one::<String>("url")
        .context("--url is required")?;
    let Some(url) = parse_url_line(raw) else {
        bail!("'{}' is not a valid URL", raw);
    };

    let mut config = CrawlConfig::new(url);
    config.headless = !args.get_flag("headed");
    if let Some(dir) = args.get_one::<String>("output-dir") {
        config.output_dir = dir.clone();
    }
    if let Ok(Some(depth)) = args.try_get_one::<usize>("max-depth") {
        config.max_depth = *depth;
    }
    if let Ok(Some(pages)) = args.try_get_one::<usize>("max-pages") {
        config.max_pages = *pages;
    }
    if let Ok(Some(delay)) = args.try_get_one::<u64>("delay") {
        config.delay = *delay;
    }
    if let Ok(Some(frameworks)) = args.try_get_many::<String>("framework") {
        config.frameworks = frameworks.cloned().collect();
    }

    config.validate()?;
    debug!("Run configuration: {:?}", config);
    Ok(config)
}

/// Install the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn divider() -> String {
    "═".repeat(60).bright_blue().bold().to_string()
}

fn status_colored(code: u16) -> String {
    let text = code.to_string();
    match code {
        200..=299 => text.green().to_string(),
        300..=399 => text.cyan().to_string(),
        400..=499 => text.yellow().to_string(),
        500..=599 => text.red().to_string(),
        _ => text,
    }
}

fn risk_colored(level: RiskLevel) -> String {
    match level {
        RiskLevel::Low => "low".green().to_string(),
        RiskLevel::Medium => "medium".yellow().to_string(),
        RiskLevel::High => "high".bright_red().to_string(),
        RiskLevel::Critical => "critical".red().bold().to_string(),
    }
}

fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        })
        .unwrap_or_else(|_| url.to_string())
}

pub fn crawl_summary(outcome: &CrawlOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", divider()));
    out.push_str(&format!("{}\n", "  CRAWL SUMMARY".bright_white().bold()));
    out.push_str(&format!("  Pages crawled: {}\n", outcome.pages.len()));
    out.push_str(&format!("  Links recorded: {}\n", outcome.links.len()));
    out.push_str(&format!("  Errors: {}\n", outcome.errors.len()));
    out.push_str(&format!("{}\n", divider()));

    for page in &outcome.pages {
        out.push_str(&format!(
            "  {} {} {}\n",
            status_colored(page.status_code),
            path_of(&page.url),
            format!("[depth {}]", page.depth).dimmed()
        ));
    }
    for error in &outcome.errors {
        out.push_str(&format!(
            "  {} {} {}\n",
            "✗".red().bold(),
            path_of(&error.url),
            error.error.dimmed()
        ));
    }
    out
}

fn risk_breakdown(analyses: &[CookieAnalysis]) -> String {
    let mut counts: BTreeMap<RiskLevel, usize> = BTreeMap::new();
    for analysis in analyses {
        *counts.entry(analysis.risk_level).or_default() += 1;
    }
    counts
        .iter()
        .rev()
        .map(|(level, n)| format!("{} {}", n, risk_colored(*level)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn phase_line(label: &str, phase: &CapturePhaseResult, analyses: &[CookieAnalysis]) -> String {
    let third_party = phase.cookies.iter().filter(|c| c.is_third_party).count();
    format!(
        "  {:<16} {} cookies ({} third-party), {} scripts, {} requests\n  {:<16} {}\n",
        label,
        phase.cookies.len(),
        third_party,
        phase.scripts.len(),
        phase.requests.len(),
        "",
        risk_breakdown(analyses)
    )
}

pub fn consent_summary(audit: &ConsentAudit) -> String {
    let result = &audit.result;
    let mut out = String::new();
    out.push_str(&format!("{}\n", divider()));
    out.push_str(&format!("{}\n", "  CONSENT TEST".bright_white().bold()));
    out.push_str(&format!("  Target: {}\n", result.url.bright_white()));

    let mechanism = if result.consent_mechanism_found {
        format!(
            "{} {}",
            "✓".green().bold(),
            result.consent_vendor.as_deref().unwrap_or("generic banner")
        )
    } else {
        format!("{} none detected", "✗".red().bold())
    };
    out.push_str(&format!("  Consent mechanism: {}\n", mechanism));
    out.push_str(&format!("{}\n", divider()));

    out.push_str(&phase_line(
        "Before consent",
        &result.before_consent,
        &audit.analysis.before_consent,
    ));
    out.push_str(&phase_line(
        "After accept",
        &result.after_accept_all,
        &audit.analysis.after_accept_all,
    ));
    out.push_str(&phase_line(
        "After reject",
        &result.after_reject_all,
        &audit.analysis.after_reject_all,
    ));
    out
}

pub fn scan_summary(report: &ScanReport) -> String {
    let results = &report.results;
    let mut out = crawl_summary(&report.crawl);
    out.push_str(&format!("{}\n", "  SCAN RESULTS".bright_white().bold()));
    out.push_str(&format!(
        "  Cookies: {} seen, {} unique, {} third-party\n",
        results.total_cookies,
        results.unique_cookies.len(),
        results.third_party_cookies
    ));
    out.push_str(&format!(
        "  Scripts: {} seen, {} unique, {} third-party\n",
        results.total_scripts,
        results.unique_scripts.len(),
        results.third_party_scripts
    ));
    out.push_str(&format!("  Requests: {}\n", results.total_requests));
    out.push_str(&format!(
        "  Cookie risk: {}\n",
        risk_breakdown(&results.cookie_analysis)
    ));
    if !report.config.frameworks.is_empty() {
        out.push_str(&format!(
            "  Frameworks: {}\n",
            report.config.frameworks.join(", ")
        ));
    }
    out
}

fn report_written(path: &std::path::Path) {
    println!("{} Results written to {}", "✓".green().bold(), path.display());
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = build_config(args)?;
    let outcome = execute_crawl(&config, !quiet).await?;
    println!("{}", crawl_summary(&outcome));

    let path = OutputWriter::new(config.output_path()).write("crawl", &outcome)?;
    report_written(&path);
    Ok(())
}

pub async fn handle_consent(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = build_config(args)?;
    let audit = execute_consent_test(&config, !quiet).await?;
    println!("{}", consent_summary(&audit));

    let path = OutputWriter::new(config.output_path()).write("consent", &audit)?;
    report_written(&path);
    Ok(())
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> Result<()> {
    let config = build_config(args)?;
    let report = execute_scan(&config, !quiet).await?;
    println!("{}", scan_summary(&report));

    let path = OutputWriter::new(config.output_path()).write("scan", &report)?;
    report_written(&path);
    Ok(())
}
