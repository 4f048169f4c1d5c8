pub mod browser;
pub mod capture;
pub mod consent;
pub mod crawler;
pub mod error;
pub mod frontier;
pub mod result;

pub use browser::{
    BrowserOptions, CaptureContext, CaptureDriver, ChromiumBrowser, FetchedPage, Navigator,
};
pub use capture::{CaptureSettings, ConsentTester};
pub use crawler::{Crawler, ProgressCallback};
pub use error::ScanError;
pub use frontier::{Frontier, FrontierItem};
pub use result::{
    CapturePhaseResult, ConsentTestResult, Cookie, CrawlError, CrawlOutcome, LinkEdge,
    NetworkRequest, PageInfo, PageScan, Script, ScriptKind,
};
