use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_OUTPUT_DIR: &str = "./trackscope-output";

/// Settings for one crawl, consent test or scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlConfig {
    pub url: String,
    pub max_depth: usize,
    pub max_pages: usize,
    pub headless: bool,
    /// Politeness delay between page fetches, in milliseconds.
    pub delay: u64,
    pub output_dir: String,
    /// Frameworks the audit is checked against (e.g. "gdpr", "ccpa"). Passed
    /// through to the output untouched.
    pub frameworks: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_depth: 3,
            max_pages: 50,
            headless: true,
            delay: 1000,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            frameworks: Vec::new(),
        }
    }
}

impl CrawlConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)
            .map_err(|e| CoreError::Config(format!("invalid url '{}': {}", self.url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "unsupported scheme '{}', expected http or https",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(CoreError::Config(format!("url '{}' has no host", self.url)));
        }
        if self.max_pages == 0 {
            return Err(CoreError::Config("maxPages must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    /// Output directory with `~` expanded.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output_dir).as_ref())
    }
}
