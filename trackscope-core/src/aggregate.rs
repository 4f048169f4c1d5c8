use crate::classify::{CookieAnalysis, analyze_cookies};
use crate::vendors::categorize_scripts;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use trackscope_scanner::{Cookie, PageScan, Script, ScriptKind};

/// Site-wide view over every scanned page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedScanResults {
    pub total_cookies: usize,
    pub total_scripts: usize,
    pub total_requests: usize,
    /// Cookies deduplicated by (name, domain), first sighting kept.
    pub unique_cookies: Vec<Cookie>,
    /// Scripts deduplicated by URL; inline scripts by page and content.
    pub unique_scripts: Vec<Script>,
    pub third_party_cookies: usize,
    pub third_party_scripts: usize,
    pub scan_results: Vec<PageScan>,
    pub cookie_analysis: Vec<CookieAnalysis>,
}

fn script_key(script: &Script) -> (String, Option<String>) {
    match script.kind {
        ScriptKind::External => (script.url.clone(), None),
        ScriptKind::Inline => (
            script.found_on_url.clone(),
            Some(script.content.clone().unwrap_or_default()),
        ),
    }
}

pub fn aggregate_scans(mut scans: Vec<PageScan>) -> AggregatedScanResults {
    for scan in scans.iter_mut() {
        categorize_scripts(&mut scan.scripts);
    }

    let mut seen_cookies = HashSet::new();
    let mut seen_scripts = HashSet::new();
    let mut results = AggregatedScanResults::default();

    for scan in &scans {
        results.total_cookies += scan.cookies.len();
        results.total_scripts += scan.scripts.len();
        results.total_requests += scan.requests.len();

        for cookie in &scan.cookies {
            if seen_cookies.insert((cookie.name.clone(), cookie.domain.clone())) {
                results.unique_cookies.push(cookie.clone());
            }
        }
        for script in &scan.scripts {
            if seen_scripts.insert(script_key(script)) {
                results.unique_scripts.push(script.clone());
            }
        }
    }

    results.third_party_cookies = results
        .unique_cookies
        .iter()
        .filter(|c| c.is_third_party)
        .count();
    results.third_party_scripts = results
        .unique_scripts
        .iter()
        .filter(|s| s.is_third_party)
        .count();
    results.cookie_analysis = analyze_cookies(&results.unique_cookies);
    results.scan_results = scans;

    results
}
