use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tracing::info;

use crate::error_log::ErrorLog;
use crate::id_sets::{IdStore, SkipCategory};

/// Categories rebuilt from error logs. No-media tweets never reach a log.
const REBUILT: [SkipCategory; 4] = [
    SkipCategory::NotFound,
    SkipCategory::Sensitive,
    SkipCategory::ParseError,
    SkipCategory::Generic,
];

/// Rebuild the error-driven skip lists from scratch out of every error log.
///
/// A tweet that failed more than once is filed by its most recent failure.
/// Tweets whose latest failure was a media download stay unlisted.
/// Returns the new size of each rebuilt category.
pub fn rebuild_lists(
    logs_dir: impl AsRef<Path>,
    store: &mut impl IdStore,
) -> std::io::Result<HashMap<SkipCategory, usize>> {
    let mut entries = ErrorLog::read_all(logs_dir)?;
    entries.sort_by_key(|e| e.timestamp);

    let mut latest: HashMap<String, Option<SkipCategory>> = HashMap::new();
    for entry in entries {
        latest.insert(entry.tweet_id, SkipCategory::for_error(entry.error_type));
    }

    let mut rebuilt: HashMap<SkipCategory, BTreeSet<String>> =
        REBUILT.iter().map(|c| (*c, BTreeSet::new())).collect();
    for (id, category) in latest {
        let Some(category) = category else {
            continue;
        };
        if store.category_of(&id) == Some(SkipCategory::NoMedia) {
            continue;
        }
        rebuilt.entry(category).or_default().insert(id);
    }

    let mut sizes = HashMap::new();
    for (category, ids) in rebuilt {
        info!("{:?}: {} ids", category, ids.len());
        sizes.insert(category, ids.len());
        store.replace(category, ids);
    }
    Ok(sizes)
}
