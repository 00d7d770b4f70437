//! Resume position for an interrupted run
//!
//! The checkpoint only positions the next run. Whether a tweet is actually
//! done is always re-derived from the output directory and the skip lists, so
//! `completed_index` may lag behind the real progress but never runs ahead.

use std::path::Path;

use chrono::{DateTime, Utc};
use likes_archive_common::write_json_atomic;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::stats::RunStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
    /// Number of archive entries handled, i.e. the index to resume from
    pub completed_index: usize,
    pub total_items: usize,
    pub stats: RunStats,
    pub remaining_items: usize,
}

impl Checkpoint {
    pub fn new(completed_index: usize, total_items: usize, stats: &RunStats) -> Self {
        Self {
            timestamp: Utc::now(),
            completed_index,
            total_items,
            stats: stats.clone(),
            remaining_items: total_items.saturating_sub(completed_index),
        }
    }

    /// Read a checkpoint. Missing or unreadable files yield `None`.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(path = ?path, "ignoring malformed checkpoint: {}", e);
                None
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        write_json_atomic(path, self)
    }

    pub fn remove(path: impl AsRef<Path>) {
        match std::fs::remove_file(path.as_ref()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("unable to remove checkpoint: {}", e),
        }
    }

    /// Where a run over `total_items` entries should start
    pub fn resume_index(checkpoint: Option<&Self>, total_items: usize) -> usize {
        match checkpoint {
            None => 0,
            Some(c) if c.total_items != total_items => {
                info!(
                    "checkpoint was for {} likes, archive has {}; starting over",
                    c.total_items, total_items
                );
                0
            }
            Some(c) => {
                let index = c.completed_index.min(total_items);
                info!("resuming at {}/{}", index, total_items);
                index
            }
        }
    }
}
