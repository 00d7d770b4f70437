use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::error::LikesError;

lazy_static! {
    static ref ASSIGNMENT_RE: Regex = Regex::new(r"(?s)^[^=\[]*=\s*(\[.*\])\s*;?\s*$").unwrap();
    static ref TWEET_ID_RE: Regex = Regex::new(r"^\d+$").unwrap();
}

/// One liked tweet from the export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeRecord {
    pub tweet_id: String,
    pub expanded_url: Option<String>,
}

impl LikeRecord {
    /// URL handed to the resolver, falling back to the canonical status URL
    pub fn url(&self) -> String {
        match &self.expanded_url {
            Some(u) if !u.is_empty() => u.clone(),
            _ => format!("https://twitter.com/i/web/status/{}", self.tweet_id),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ArchiveEntry {
    like: ArchiveLike,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ArchiveLike {
    tweet_id: String,
    expanded_url: Option<String>,
}

/// Read a `like.js` export, e.g. `window.YTD.like.part0 = [ ... ]`
pub fn read_likes(path: impl AsRef<Path>) -> Result<Vec<LikeRecord>, LikesError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| LikesError::ReadArchive {
        path: path.to_owned(),
        source,
    })?;
    parse_likes(&contents).map_err(|msg| LikesError::ParseArchive {
        path: path.to_owned(),
        msg,
    })
}

pub fn parse_likes(contents: &str) -> Result<Vec<LikeRecord>, String> {
    let trimmed = contents.trim_start_matches('\u{feff}').trim();
    let array = if trimmed.starts_with('[') {
        trimmed
    } else {
        ASSIGNMENT_RE
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .ok_or("no JSON array assignment found")?
            .as_str()
    };

    let entries: Vec<ArchiveEntry> = serde_json::from_str(array).map_err(|e| e.to_string())?;
    let likes = entries
        .into_iter()
        .filter_map(|e| {
            if TWEET_ID_RE.is_match(&e.like.tweet_id) {
                Some(LikeRecord {
                    tweet_id: e.like.tweet_id,
                    expanded_url: e.like.expanded_url,
                })
            } else {
                warn!(tweet_id = %e.like.tweet_id, "dropping like with malformed tweet id");
                None
            }
        })
        .collect();

    Ok(likes)
}
