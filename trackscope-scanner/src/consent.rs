//! Consent banner selectors and consent-management platform detection.

/// Accept controls, most generic first. Text matchers cover hand-rolled
/// banners; the rest target specific consent-management platforms.
pub const ACCEPT_SELECTORS: &[&str] = &[
    r#"button:has-text("Accept all")"#,
    r#"button:has-text("Accept cookies")"#,
    r#"button:has-text("Allow all")"#,
    r#"button:has-text("I agree")"#,
    r#"button:has-text("Accept")"#,
    "#onetrust-accept-btn-handler",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "#CybotCookiebotDialogBodyButtonAccept",
    ".qc-cmp2-summary-buttons button[mode='primary']",
    "#truste-consent-button",
    "#didomi-notice-agree-button",
    "#uc-btn-accept-banner",
    "[data-testid='uc-accept-all-button']",
    ".cky-btn-accept",
    ".osano-cm-accept-all",
    ".t-acceptAllButton",
    ".iubenda-cs-accept-btn",
    ".cmplz-accept",
    ".klaro .cm-btn-accept-all",
    "#BorlabsCookieBox a[data-cookie-accept-all]",
];

/// Reject controls, in the same priority order as [`ACCEPT_SELECTORS`].
pub const REJECT_SELECTORS: &[&str] = &[
    r#"button:has-text("Reject all")"#,
    r#"button:has-text("Decline all")"#,
    r#"button:has-text("Reject")"#,
    r#"button:has-text("Decline")"#,
    r#"button:has-text("Only necessary")"#,
    "#onetrust-reject-all-handler",
    "#CybotCookiebotDialogBodyButtonDecline",
    ".qc-cmp2-summary-buttons button[mode='secondary']",
    "#truste-consent-required",
    "#didomi-notice-disagree-button",
    "[data-testid='uc-deny-all-button']",
    ".cky-btn-reject",
    ".osano-cm-denyAll",
    ".t-declineAllButton",
    ".iubenda-cs-reject-btn",
    ".cmplz-deny",
    ".klaro .cn-decline",
    "#BorlabsCookieBox a[data-cookie-refuse]",
];

/// Lowercase tokens found in a platform's selectors, and the platform's name.
const VENDOR_TOKENS: &[(&str, &str)] = &[
    ("onetrust", "OneTrust"),
    ("cybotcookiebot", "Cookiebot"),
    ("qc-cmp2", "Quantcast Choice"),
    ("truste", "TrustArc"),
    ("didomi", "Didomi"),
    ("uc-", "Usercentrics"),
    ("cky-", "CookieYes"),
    ("osano", "Osano"),
    ("t-acceptallbutton", "Termly"),
    ("t-declineallbutton", "Termly"),
    ("iubenda", "iubenda"),
    ("cmplz", "Complianz"),
    ("klaro", "Klaro"),
    ("borlabs", "Borlabs Cookie"),
];

/// Name of the consent-management platform a matched selector belongs to.
/// Generic text selectors identify no platform.
pub fn vendor_for_selector(selector: &str) -> Option<&'static str> {
    let lower = selector.to_lowercase();
    VENDOR_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, vendor)| *vendor)
}
