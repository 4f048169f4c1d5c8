use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub generator: &'static str,
    pub version: &'static str,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    metadata: Metadata,
    data: &'a T,
}

/// Writes the JSON artifacts of one run, all sharing a run id prefix.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    run_id: String,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pretty-print `value` to `<dir>/<run-id>-<name>.json`, creating the
    /// directory first.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let envelope = Envelope {
            metadata: Metadata {
                generator: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                run_id: self.run_id.clone(),
                generated_at: Utc::now(),
            },
            data: value,
        };

        let path = self.dir.join(format!("{}-{}.json", self.run_id, name));
        fs::write(&path, serde_json::to_string_pretty(&envelope)?)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }
}

/// One-off write with a fresh run id.
pub fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    OutputWriter::new(dir).write(name, value)
}
