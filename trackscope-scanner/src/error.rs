use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation to {0} timed out")]
    Timeout(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<chromiumoxide::error::CdpError> for ScanError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScanError::Browser(err.to_string())
    }
}

impl ScanError {
    /// Whether this error must abort the whole run rather than a single page.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::BrowserLaunch(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
