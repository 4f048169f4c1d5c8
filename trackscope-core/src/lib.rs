use colored::Colorize;

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod crawl;
pub mod error;
pub mod output;
pub mod vendors;

pub use aggregate::{AggregatedScanResults, aggregate_scans};
pub use classify::{CookieAnalysis, RiskLevel, analyze_cookie, analyze_cookies};
pub use config::CrawlConfig;
pub use error::CoreError;
pub use vendors::{Category, VendorInfo, categorize_script};

const BANNER: &str = r#"
  ╔════════════════════════════════════════════════════════════════╗
  ║ ████████╗██████╗  █████╗  ██████╗██╗  ██╗                      ║
  ║ ╚══██╔══╝██╔══██╗██╔══██╗██╔════╝██║ ██╔╝                      ║
  ║    ██║   ██████╔╝███████║██║     █████╔╝   s c o p e           ║
  ║    ██║   ██╔══██╗██╔══██║██║     ██╔═██╗                       ║
  ║    ██║   ██║  ██║██║  ██║╚██████╗██║  ██╗                      ║
  ║    ╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝ ╚═════╝╚═╝  ╚═╝                      ║
  ╚════════════════════════════════════════════════════════════════╝"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "cookie & consent compliance auditor".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
