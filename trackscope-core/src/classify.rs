// Per-cookie vendor, category and risk analysis

use crate::vendors::{Category, lookup_vendor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trackscope_scanner::Cookie;

pub const FIRST_PARTY_VENDOR: &str = "First Party";
pub const EXCESSIVE_REASON_PREFIX: &str = "Excessive cookies from vendor";

/// Vendors with more than this many cookies in one batch are flagged.
pub const EXCESSIVE_VENDOR_THRESHOLD: usize = 5;

const LONG_EXPIRY_DAYS: f64 = 365.0;

const SYNCING_NAME_TOKENS: &[&str] = &["sync", "match", "uuid", "_uid", "guid", "partner_id"];

const SYNCING_DOMAINS: &[&str] = &[
    "doubleclick.net",
    "adnxs.com",
    "rubiconproject.com",
    "pubmatic.com",
    "openx.net",
    "casalemedia.com",
    "criteo.com",
    "criteo.net",
    "demdex.net",
    "bluekai.com",
    "adsrvr.org",
    "bidswitch.net",
    "everesttech.net",
    "rlcdn.com",
    "tapad.com",
    "agkn.com",
    "mathtag.com",
    "scorecardresearch.com",
];

/// Conversion-linker cookies duplicate data the ad platform already holds.
const CONVERSION_LINKER_PREFIXES: &[&str] = &["_gcl_au", "_gcl_aw", "_gcl_dc", "_gcl_gb", "_gcl_gs"];

/// Universal Analytics cookies, superseded by `_ga`/`_gid`.
const LEGACY_ANALYTICS_PREFIX: &str = "__utm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            8.. => RiskLevel::Critical,
            6..=7 => RiskLevel::High,
            3..=5 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieAnalysis {
    pub cookie: Cookie,
    pub actual_vendor: String,
    pub is_actually_third_party: bool,
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    pub risk_reasons: Vec<String>,
    pub purpose: String,
    pub category: Category,
    pub is_cookie_syncing: bool,
    pub is_unnecessary: bool,
}

pub fn analyze_cookie(cookie: &Cookie) -> CookieAnalysis {
    analyze_cookie_at(cookie, Utc::now())
}

/// Analyze against a fixed clock, so expiry scoring is reproducible.
pub fn analyze_cookie_at(cookie: &Cookie, now: DateTime<Utc>) -> CookieAnalysis {
    let vendor = lookup_vendor(&cookie.name, &cookie.domain);

    let (actual_vendor, purpose, category, vendor_third_party) = match vendor {
        Some(info) => (
            info.vendor.to_string(),
            info.purpose.to_string(),
            info.category,
            info.is_third_party,
        ),
        None if cookie.is_third_party => (
            cookie.domain.trim_start_matches('.').to_string(),
            "Unknown".to_string(),
            Category::Unknown,
            false,
        ),
        None => (
            FIRST_PARTY_VENDOR.to_string(),
            "Unknown".to_string(),
            Category::Unknown,
            false,
        ),
    };
    let third_party = vendor_third_party || cookie.is_third_party;

    let mut score = 0;
    let mut reasons = Vec::new();

    if third_party {
        score += 3;
        reasons.push(format!("Third-party cookie set by {}", actual_vendor));
    }

    match category {
        Category::Advertising => {
            score += 3;
            reasons.push("Advertising/tracking cookie".to_string());
        }
        Category::Analytics => {
            score += 2;
            reasons.push("Analytics cookie".to_string());
        }
        Category::Social => {
            score += 2;
            reasons.push("Social media tracking cookie".to_string());
        }
        Category::Necessary | Category::Functional | Category::Unknown => {}
    }

    if third_party && !cookie.secure {
        score += 2;
        reasons.push("Third-party cookie without Secure flag".to_string());
    }
    if third_party && !cookie.http_only {
        score += 1;
        reasons.push("Third-party cookie readable by scripts (no HttpOnly)".to_string());
    }

    match cookie.same_site.as_deref().map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("none") => {
            score += 2;
            reasons.push("SameSite=None allows cross-site sending".to_string());
        }
        None | Some("") => {
            score += 2;
            reasons.push("SameSite attribute not set".to_string());
        }
        Some(_) => {}
    }

    if let Some(expires) = cookie.expires {
        let days = (expires - now.timestamp() as f64) / 86_400.0;
        if days > LONG_EXPIRY_DAYS {
            score += 1;
            reasons.push(format!("Long expiration ({} days)", days.round() as i64));
        }
    }

    CookieAnalysis {
        cookie: cookie.clone(),
        actual_vendor,
        is_actually_third_party: third_party,
        risk_level: RiskLevel::from_score(score),
        risk_score: score,
        risk_reasons: reasons,
        purpose,
        category,
        is_cookie_syncing: is_cookie_syncing(cookie),
        is_unnecessary: is_unnecessary(&cookie.name),
    }
}

pub fn is_cookie_syncing(cookie: &Cookie) -> bool {
    let name = cookie.name.to_lowercase();
    if SYNCING_NAME_TOKENS.iter().any(|t| name.contains(t)) {
        return true;
    }

    let domain = cookie.domain.trim_start_matches('.').to_lowercase();
    SYNCING_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{}", d)))
}

pub fn is_unnecessary(name: &str) -> bool {
    let name = name.to_lowercase();
    CONVERSION_LINKER_PREFIXES.iter().any(|p| name.starts_with(p))
        || name.starts_with(LEGACY_ANALYTICS_PREFIX)
}

/// Analyze every cookie, then flag vendors that set more than
/// [`EXCESSIVE_VENDOR_THRESHOLD`] cookies in the batch.
pub fn analyze_cookies(cookies: &[Cookie]) -> Vec<CookieAnalysis> {
    analyze_cookies_at(cookies, Utc::now())
}

pub fn analyze_cookies_at(cookies: &[Cookie], now: DateTime<Utc>) -> Vec<CookieAnalysis> {
    let mut analyses: Vec<CookieAnalysis> =
        cookies.iter().map(|c| analyze_cookie_at(c, now)).collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for analysis in &analyses {
        *counts.entry(analysis.actual_vendor.clone()).or_default() += 1;
    }

    for analysis in analyses.iter_mut() {
        let count = counts.get(&analysis.actual_vendor).copied().unwrap_or(0);
        if count <= EXCESSIVE_VENDOR_THRESHOLD || analysis.category == Category::Necessary {
            continue;
        }
        analysis.is_unnecessary = true;
        if !analysis
            .risk_reasons
            .iter()
            .any(|r| r.starts_with(EXCESSIVE_REASON_PREFIX))
        {
            analysis.risk_reasons.push(format!(
                "{} ({} sets {} cookies)",
                EXCESSIVE_REASON_PREFIX, analysis.actual_vendor, count
            ));
        }
    }

    analyses
}
