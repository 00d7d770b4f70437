use std::collections::HashSet;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, warn};

lazy_static! {
    static ref MEDIA_RE: Regex = Regex::new(r"^(\d+)-\d+").unwrap();
    static ref METADATA_RE: Regex = Regex::new(r"^(\d+)-metadata\.json$").unwrap();
}

/// What the output directory already holds, by tweet id
#[derive(Debug, Default, Clone)]
pub struct DownloadedState {
    pub media_ids: HashSet<String>,
    pub metadata_ids: HashSet<String>,
}

/// Per-tweet view of [`DownloadedState`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence {
    pub has_media: bool,
    pub has_metadata: bool,
}

impl Presence {
    pub fn is_complete(&self) -> bool {
        self.has_media && self.has_metadata
    }
}

fn is_stale_temp(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(".temp")
}

impl DownloadedState {
    /// List `dir` once. An unreadable directory is logged and treated as empty.
    ///
    /// Leftover `.{stem}.temp` files from an interrupted download are removed.
    pub fn scan(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let read_dir = match std::fs::read_dir(dir) {
            Ok(r) => r,
            Err(e) => {
                error!(dir = ?dir, "unable to scan output directory: {}", e);
                return Self::default();
            }
        };

        let mut state = Self::default();
        for entry in read_dir.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_stale_temp(name) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => debug!("removed stale {}", name),
                    Err(e) => warn!("unable to remove stale {}: {}", name, e),
                }
                continue;
            }
            state.record(name);
        }
        state
    }

    fn record(&mut self, file_name: &str) {
        if let Some(c) = METADATA_RE.captures(file_name) {
            self.metadata_ids.insert(c[1].to_owned());
        } else if let Some(c) = MEDIA_RE.captures(file_name) {
            self.media_ids.insert(c[1].to_owned());
        }
    }

    pub fn presence(&self, tweet_id: &str) -> Presence {
        Presence {
            has_media: self.media_ids.contains(tweet_id),
            has_metadata: self.metadata_ids.contains(tweet_id),
        }
    }
}
