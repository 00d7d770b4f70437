use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use likes_archive_common::write_json_atomic;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::ErrorType;

/// Durable reason for never fetching a tweet again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCategory {
    Generic,
    NotFound,
    Sensitive,
    ParseError,
    NoMedia,
}

impl SkipCategory {
    /// Lookup order: specific categories before the catch-all
    pub const ALL: [SkipCategory; 5] = [
        Self::NotFound,
        Self::Sensitive,
        Self::ParseError,
        Self::NoMedia,
        Self::Generic,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Generic => "skip.json",
            Self::NotFound => "not-found.json",
            Self::Sensitive => "sensitive.json",
            Self::ParseError => "parse-error.json",
            Self::NoMedia => "no-media.json",
        }
    }

    /// Where a failed tweet is filed. Media download failures are not filed
    /// anywhere so the next run retries them.
    pub fn for_error(error_type: ErrorType) -> Option<Self> {
        match error_type {
            ErrorType::NotFound => Some(Self::NotFound),
            ErrorType::SensitiveContent => Some(Self::Sensitive),
            ErrorType::Parse => Some(Self::ParseError),
            ErrorType::MediaDownload => None,
            _ => Some(Self::Generic),
        }
    }
}

/// Membership store for the skip categories
pub trait IdStore {
    /// The category holding `id`, if any
    fn category_of(&self, id: &str) -> Option<SkipCategory>;

    /// Record `id` under `category`. Returns `false` if nothing changed.
    /// An id already filed under any category is never added to a second one.
    fn add(&mut self, category: SkipCategory, id: &str) -> bool;

    /// Replace a whole category, used when rebuilding lists offline
    fn replace(&mut self, category: SkipCategory, ids: BTreeSet<String>);

    fn len(&self, category: SkipCategory) -> usize;

    fn is_member_of_any(&self, id: &str) -> bool {
        self.category_of(id).is_some()
    }
}

/// One JSON array file per category, rewritten in full on every insert
#[derive(Debug)]
pub struct JsonIdStore {
    dir: PathBuf,
    sets: HashMap<SkipCategory, BTreeSet<String>>,
}

impl JsonIdStore {
    /// Load every category from `dir`. Missing or malformed files load as empty sets.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_owned();
        let sets = SkipCategory::ALL
            .iter()
            .map(|c| (*c, load_set(&dir.join(c.file_name()))))
            .collect();
        Self { dir, sets }
    }

    fn path(&self, category: SkipCategory) -> PathBuf {
        self.dir.join(category.file_name())
    }

    fn persist(&self, category: SkipCategory) {
        let Some(set) = self.sets.get(&category) else {
            return;
        };
        if let Err(e) = write_json_atomic(self.path(category), set) {
            error!(category = ?category, "failed to persist skip list: {:#}", e);
        }
    }
}

fn load_set(path: &Path) -> BTreeSet<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            error!(path = ?path, "unable to read skip list: {}", e);
            return BTreeSet::new();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(set) => set,
        Err(e) => {
            error!(path = ?path, "malformed skip list, starting empty: {}", e);
            BTreeSet::new()
        }
    }
}

impl IdStore for JsonIdStore {
    fn category_of(&self, id: &str) -> Option<SkipCategory> {
        SkipCategory::ALL
            .into_iter()
            .find(|c| self.sets.get(c).is_some_and(|s| s.contains(id)))
    }

    fn add(&mut self, category: SkipCategory, id: &str) -> bool {
        match self.category_of(id) {
            Some(existing) if existing == category => return false,
            Some(existing) => {
                warn!(
                    tweet_id = id,
                    "already listed as {:?}, not adding to {:?}", existing, category
                );
                return false;
            }
            None => {}
        }
        self.sets
            .entry(category)
            .or_default()
            .insert(id.to_owned());
        self.persist(category);
        debug!(tweet_id = id, "added to {:?} list", category);
        true
    }

    fn replace(&mut self, category: SkipCategory, ids: BTreeSet<String>) {
        self.sets.insert(category, ids);
        self.persist(category);
    }

    fn len(&self, category: SkipCategory) -> usize {
        self.sets.get(&category).map_or(0, |s| s.len())
    }
}
