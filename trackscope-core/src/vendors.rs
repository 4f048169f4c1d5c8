//! Static vendor reference data for cookies and scripts.
//!
//! Both tables are ordered and evaluated top to bottom; the first matching
//! rule wins, so more specific patterns must precede broader ones (`_gat`
//! before `_ga`, `_fbp` before the Facebook domain rule).

use serde::{Deserialize, Serialize};
use std::fmt;
use trackscope_scanner::Script;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Necessary,
    Functional,
    Analytics,
    Advertising,
    Social,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Necessary => "necessary",
            Category::Functional => "functional",
            Category::Analytics => "analytics",
            Category::Advertising => "advertising",
            Category::Social => "social",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorInfo {
    pub vendor: &'static str,
    pub is_third_party: bool,
    pub purpose: &'static str,
    pub category: Category,
}

/// How a cookie rule is tested. Patterns are lowercase; cookie names and
/// domains are lowercased before matching.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    NameExact(&'static str),
    NamePrefix(&'static str),
    NameContains(&'static str),
    DomainContains(&'static str),
}

impl Matcher {
    pub fn matches(&self, name: &str, domain: &str) -> bool {
        match self {
            Matcher::NameExact(p) => name == *p,
            Matcher::NamePrefix(p) => name.starts_with(p),
            Matcher::NameContains(p) => name.contains(p),
            Matcher::DomainContains(p) => domain.contains(p),
        }
    }
}

pub struct VendorRule {
    pub matcher: Matcher,
    pub info: VendorInfo,
}

const fn rule(
    matcher: Matcher,
    vendor: &'static str,
    is_third_party: bool,
    purpose: &'static str,
    category: Category,
) -> VendorRule {
    VendorRule {
        matcher,
        info: VendorInfo {
            vendor,
            is_third_party,
            purpose,
            category,
        },
    }
}

use Category::*;
use Matcher::*;

#[rustfmt::skip]
pub static VENDOR_RULES: &[VendorRule] = &[
    // Google
    rule(NamePrefix("_gac_"), "Google Ads", true, "Campaign data linked through Google Analytics", Advertising),
    rule(NamePrefix("_gat"), "Google Analytics", true, "Throttles analytics request rate", Analytics),
    rule(NamePrefix("_gid"), "Google Analytics", true, "Distinguishes users for 24 hours", Analytics),
    rule(NamePrefix("_ga"), "Google Analytics", true, "Distinguishes unique users", Analytics),
    rule(NamePrefix("__utm"), "Google Analytics", true, "Legacy Universal Analytics tracking", Analytics),
    rule(NamePrefix("_gcl_"), "Google Ads", true, "Conversion linker for ad click attribution", Advertising),
    rule(NameExact("__gads"), "Google AdSense", true, "Ad serving and impression measurement", Advertising),
    rule(NameExact("__gpi"), "Google AdSense", true, "Ad serving and impression measurement", Advertising),
    rule(NameExact("__gsas"), "Google AdSense", true, "Ad serving and impression measurement", Advertising),
    rule(NameExact("ide"), "DoubleClick", true, "Ad targeting and retargeting", Advertising),
    rule(NameExact("test_cookie"), "DoubleClick", true, "Checks whether the browser accepts cookies", Advertising),
    rule(DomainContains("doubleclick.net"), "DoubleClick", true, "Ad targeting and retargeting", Advertising),
    rule(NameExact("nid"), "Google", true, "Stores preferences and ad personalisation", Advertising),
    rule(NameExact("1p_jar"), "Google", true, "Ad personalisation", Advertising),
    // Meta
    rule(NamePrefix("_fbp"), "Facebook Pixel", true, "Tracks visits for ad delivery", Advertising),
    rule(NamePrefix("_fbc"), "Facebook Pixel", true, "Stores last ad click identifier", Advertising),
    rule(DomainContains("facebook.com"), "Facebook", true, "Social plugins and tracking", Social),
    rule(DomainContains("instagram.com"), "Instagram", true, "Social embeds and tracking", Social),
    // Microsoft
    rule(NamePrefix("_uet"), "Microsoft Advertising", true, "Bing Ads conversion tracking", Advertising),
    rule(NameExact("muid"), "Microsoft Advertising", true, "Identifies browsers across Microsoft sites", Advertising),
    rule(NamePrefix("_clck"), "Microsoft Clarity", true, "Session recording user identifier", Analytics),
    rule(NamePrefix("_clsk"), "Microsoft Clarity", true, "Session recording page views", Analytics),
    rule(DomainContains("clarity.ms"), "Microsoft Clarity", true, "Session recording", Analytics),
    rule(DomainContains("bing.com"), "Microsoft Advertising", true, "Bing Ads tracking", Advertising),
    // Social networks
    rule(NameExact("li_fat_id"), "LinkedIn Insight Tag", true, "Conversion tracking for LinkedIn ads", Advertising),
    rule(NameExact("li_sugr"), "LinkedIn Insight Tag", true, "Browser identifier for LinkedIn ads", Advertising),
    rule(DomainContains("linkedin.com"), "LinkedIn", true, "Social plugins and ad tracking", Social),
    rule(NameExact("_ttp"), "TikTok Pixel", true, "Tracks visits for TikTok ads", Advertising),
    rule(DomainContains("tiktok.com"), "TikTok", true, "Social embeds and ad tracking", Social),
    rule(NamePrefix("_pin_unauth"), "Pinterest Tag", true, "Tracks visits for Pinterest ads", Advertising),
    rule(DomainContains("pinterest.com"), "Pinterest", true, "Social plugins", Social),
    rule(DomainContains("twitter.com"), "Twitter", true, "Social embeds and ad tracking", Social),
    rule(DomainContains("youtube.com"), "YouTube", true, "Embedded video and viewing preferences", Social),
    // Ad tech
    rule(NameExact("__qca"), "Quantcast", true, "Audience measurement", Advertising),
    rule(NameExact("uuid2"), "Xandr", true, "Ad targeting identifier", Advertising),
    rule(DomainContains("adnxs.com"), "Xandr", true, "Real-time ad bidding", Advertising),
    rule(DomainContains("criteo"), "Criteo", true, "Retargeting", Advertising),
    rule(DomainContains("rubiconproject.com"), "Magnite", true, "Real-time ad bidding", Advertising),
    rule(DomainContains("pubmatic.com"), "PubMatic", true, "Real-time ad bidding", Advertising),
    rule(DomainContains("taboola.com"), "Taboola", true, "Content recommendation ads", Advertising),
    rule(DomainContains("outbrain.com"), "Outbrain", true, "Content recommendation ads", Advertising),
    rule(DomainContains("adsrvr.org"), "The Trade Desk", true, "Real-time ad bidding", Advertising),
    rule(DomainContains("demdex.net"), "Adobe Audience Manager", true, "Audience segmentation", Advertising),
    // Analytics and marketing
    rule(NamePrefix("_hj"), "Hotjar", true, "Heatmaps and session recording", Analytics),
    rule(NameExact("hubspotutk"), "HubSpot", true, "Tracks visitor identity for marketing", Analytics),
    rule(NamePrefix("__hs"), "HubSpot", true, "Session and visit tracking", Analytics),
    rule(NameContains("_mixpanel"), "Mixpanel", true, "Product analytics", Analytics),
    rule(NamePrefix("ajs_"), "Segment", true, "Customer data collection", Analytics),
    rule(NamePrefix("_pk_"), "Matomo", false, "Self-hosted web analytics", Analytics),
    rule(NamePrefix("amplitude_id"), "Amplitude", true, "Product analytics", Analytics),
    rule(NameExact("s_cc"), "Adobe Analytics", true, "Checks whether cookies are enabled", Analytics),
    rule(NameExact("s_vi"), "Adobe Analytics", true, "Visitor identifier", Analytics),
    rule(NamePrefix("_shopify_"), "Shopify", false, "Storefront analytics", Analytics),
    // Consent management
    rule(NameExact("optanonconsent"), "OneTrust", false, "Stores consent choices", Necessary),
    rule(NameExact("optanonalertboxclosed"), "OneTrust", false, "Records that the banner was dismissed", Necessary),
    rule(NameExact("cookieconsent"), "Cookiebot", false, "Stores consent choices", Necessary),
    rule(NameExact("cookieyes-consent"), "CookieYes", false, "Stores consent choices", Necessary),
    rule(NameExact("didomi_token"), "Didomi", false, "Stores consent choices", Necessary),
    rule(NameExact("euconsent-v2"), "IAB TCF", false, "Transparency and consent string", Necessary),
    rule(NameExact("notice_preferences"), "TrustArc", false, "Stores consent choices", Necessary),
    rule(NameContains("cmplz_"), "Complianz", false, "Stores consent choices", Necessary),
    // Infrastructure
    rule(NameExact("__cf_bm"), "Cloudflare", false, "Bot management", Necessary),
    rule(NameExact("cf_clearance"), "Cloudflare", false, "Challenge clearance", Necessary),
    rule(NamePrefix("__cfruid"), "Cloudflare", false, "Rate limiting", Necessary),
    rule(NamePrefix("__stripe_"), "Stripe", false, "Fraud prevention for payments", Necessary),
    rule(NameExact("phpsessid"), "PHP", false, "Server session identifier", Necessary),
    rule(NameExact("jsessionid"), "Java", false, "Server session identifier", Necessary),
    rule(NameExact("asp.net_sessionid"), "ASP.NET", false, "Server session identifier", Necessary),
    rule(NamePrefix("csrftoken"), "First Party", false, "Cross-site request forgery protection", Necessary),
    rule(NamePrefix("xsrf-token"), "First Party", false, "Cross-site request forgery protection", Necessary),
    rule(NamePrefix("wordpress_"), "WordPress", false, "Login and session state", Necessary),
    rule(NamePrefix("wp-settings"), "WordPress", false, "Admin interface preferences", Functional),
    rule(NamePrefix("intercom-"), "Intercom", true, "Live chat session", Functional),
    rule(NamePrefix("__zlcmid"), "Zendesk", true, "Live chat session", Functional),
];

/// Company tokens checked against the domain when no rule matched.
pub static DOMAIN_KEYWORDS: &[(&str, &str, Category)] = &[
    ("google", "Google", Analytics),
    ("facebook", "Facebook", Advertising),
    ("meta", "Meta", Advertising),
    ("microsoft", "Microsoft", Advertising),
    ("amazon", "Amazon", Advertising),
    ("yahoo", "Yahoo", Advertising),
    ("adobe", "Adobe", Analytics),
    ("twitter", "Twitter", Social),
    ("linkedin", "LinkedIn", Social),
    ("hotjar", "Hotjar", Analytics),
    ("hubspot", "HubSpot", Analytics),
    ("analytics", "Analytics Provider", Analytics),
    ("tracking", "Tracking Provider", Analytics),
    ("adserver", "Ad Server", Advertising),
];

const KEYWORD_PURPOSE: &str = "Inferred from cookie domain";

/// Resolve a cookie to its vendor. `None` when neither a rule nor a domain
/// keyword matches.
pub fn lookup_vendor(name: &str, domain: &str) -> Option<VendorInfo> {
    let name = name.to_lowercase();
    let domain = domain.to_lowercase();

    if let Some(rule) = VENDOR_RULES
        .iter()
        .find(|r| r.matcher.matches(&name, &domain))
    {
        return Some(rule.info);
    }

    DOMAIN_KEYWORDS
        .iter()
        .find(|(token, _, _)| domain.contains(token))
        .map(|(_, vendor, category)| VendorInfo {
            vendor: *vendor,
            is_third_party: true,
            purpose: KEYWORD_PURPOSE,
            category: *category,
        })
}

/// Known script hosts (suffix match) and what loading them implies.
pub static SCRIPT_RULES: &[(&str, &str, Category)] = &[
    ("googletagmanager.com", "Google Tag Manager", Analytics),
    ("google-analytics.com", "Google Analytics", Analytics),
    ("googleadservices.com", "Google Ads", Advertising),
    ("googlesyndication.com", "Google AdSense", Advertising),
    ("doubleclick.net", "DoubleClick", Advertising),
    ("connect.facebook.net", "Facebook Pixel", Advertising),
    ("static.hotjar.com", "Hotjar", Analytics),
    ("clarity.ms", "Microsoft Clarity", Analytics),
    ("bat.bing.com", "Microsoft Advertising", Advertising),
    ("snap.licdn.com", "LinkedIn Insight Tag", Advertising),
    ("analytics.tiktok.com", "TikTok Pixel", Advertising),
    ("s.pinimg.com", "Pinterest Tag", Advertising),
    ("platform.twitter.com", "Twitter", Social),
    ("static.ads-twitter.com", "Twitter Ads", Advertising),
    ("youtube.com", "YouTube", Social),
    ("js.hs-scripts.com", "HubSpot", Analytics),
    ("cdn.segment.com", "Segment", Analytics),
    ("cdn.mxpnl.com", "Mixpanel", Analytics),
    ("plausible.io", "Plausible", Analytics),
    ("criteo.net", "Criteo", Advertising),
    ("taboola.com", "Taboola", Advertising),
    ("cdn.cookielaw.org", "OneTrust", Necessary),
    ("consent.cookiebot.com", "Cookiebot", Necessary),
    ("app.usercentrics.eu", "Usercentrics", Necessary),
    ("js.stripe.com", "Stripe", Necessary),
    ("widget.intercom.io", "Intercom", Functional),
];

/// Category of an external script by its host. Inline or unknown scripts
/// yield `None`.
pub fn categorize_script(url: &str) -> Option<Category> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?.to_lowercase();
    SCRIPT_RULES
        .iter()
        .find(|(suffix, _, _)| host == *suffix || host.ends_with(&format!(".{}", suffix)))
        .map(|(_, _, category)| *category)
}

/// Fill `category` on every external script that matches a known host.
pub fn categorize_scripts(scripts: &mut [Script]) {
    for script in scripts
        .iter_mut()
        .filter(|s| s.kind == trackscope_scanner::ScriptKind::External)
    {
        script.category = categorize_script(&script.url).map(|c| c.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_rules_precede_broad_ones() {
        let vendor = |name: &str, domain: &str| lookup_vendor(name, domain).unwrap();
        assert_eq!(vendor("_gat_UA-1", "example.com").purpose, "Throttles analytics request rate");
        assert_eq!(vendor("_gac_UA-1", "example.com").vendor, "Google Ads");
        assert_eq!(vendor("_fbp", "facebook.com").vendor, "Facebook Pixel");
        assert_eq!(vendor("datr", "facebook.com").vendor, "Facebook");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let info = lookup_vendor("PHPSESSID", "Shop.Example.com").unwrap();
        assert_eq!(info.vendor, "PHP");
        assert_eq!(info.category, Category::Necessary);
    }

    #[test]
    fn test_domain_keyword_fallback() {
        let info = lookup_vendor("xyz", "tracking.adobe.io").unwrap();
        assert_eq!(info.vendor, "Adobe");
        assert_eq!(info.category, Category::Analytics);
        assert!(info.is_third_party);
        assert!(lookup_vendor("prefs", "shop.example.com").is_none());
    }

    #[test]
    fn test_categorize_script() {
        assert_eq!(
            categorize_script("https://www.googletagmanager.com/gtm.js?id=GTM-X"),
            Some(Category::Analytics)
        );
        assert_eq!(
            categorize_script("https://connect.facebook.net/en_US/fbevents.js"),
            Some(Category::Advertising)
        );
        assert_eq!(categorize_script("https://cdn.example.com/app.js"), None);
        assert_eq!(categorize_script("not a url"), None);
        // suffix match only on label boundaries
        assert_eq!(categorize_script("https://notyoutube.com/x.js"), None);
    }

    #[test]
    fn test_category_display_matches_serde() {
        for category in [Necessary, Functional, Analytics, Advertising, Social, Unknown] {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }
}
