use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use likes_archive_common::write_json_atomic;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{ErrorType, FetchError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub tweet_id: String,
    pub url: String,
    pub error: String,
    pub error_type: ErrorType,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl ErrorEntry {
    pub fn new(tweet_id: &str, url: &str, err: &FetchError) -> Self {
        Self {
            timestamp: Utc::now(),
            tweet_id: tweet_id.to_owned(),
            url: url.to_owned(),
            error: err.message.clone(),
            error_type: err.error_type,
            status_code: err.status_code,
        }
    }
}

/// Failures of the current run, rewritten to one timestamped file every
/// `flush_interval` entries and whenever the log is dropped
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    entries: Vec<ErrorEntry>,
    unflushed: usize,
    flush_interval: usize,
}

impl ErrorLog {
    pub fn create(logs_dir: impl AsRef<Path>, flush_interval: usize) -> Self {
        let logs_dir = logs_dir.as_ref();
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut path = logs_dir.join(format!("errors-{}.json", stamp));
        let mut n = 1;
        while path.exists() {
            path = logs_dir.join(format!("errors-{}-{}.json", stamp, n));
            n += 1;
        }
        Self {
            path,
            entries: vec![],
            unflushed: 0,
            flush_interval: flush_interval.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn record(&mut self, entry: ErrorEntry) {
        self.entries.push(entry);
        self.unflushed += 1;
        if self.unflushed >= self.flush_interval {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if self.unflushed == 0 {
            return;
        }
        match write_json_atomic(&self.path, &self.entries) {
            Ok(()) => self.unflushed = 0,
            Err(e) => error!("failed to write error log: {:#}", e),
        }
    }

    /// Every entry from every error log in `logs_dir`, oldest file first
    pub fn read_all(logs_dir: impl AsRef<Path>) -> std::io::Result<Vec<ErrorEntry>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(logs_dir.as_ref())?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("errors-") && n.ends_with(".json"))
            })
            .collect();
        files.sort();

        let mut entries = vec![];
        for file in files {
            let parsed = std::fs::read_to_string(&file)
                .map_err(|e| e.to_string())
                .and_then(|s| {
                    serde_json::from_str::<Vec<ErrorEntry>>(&s).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(e) => entries.extend(e),
                Err(e) => warn!(file = ?file, "skipping unreadable error log: {}", e),
            }
        }
        Ok(entries)
    }
}

impl Drop for ErrorLog {
    fn drop(&mut self) {
        self.flush();
    }
}
