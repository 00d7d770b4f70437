use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::id_sets::SkipCategory;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipStats {
    pub generic: usize,
    pub not_found: usize,
    pub sensitive: usize,
    pub parse_error: usize,
    pub no_media: usize,
}

impl SkipStats {
    pub fn bump(&mut self, category: SkipCategory) {
        match category {
            SkipCategory::Generic => self.generic += 1,
            SkipCategory::NotFound => self.not_found += 1,
            SkipCategory::Sensitive => self.sensitive += 1,
            SkipCategory::ParseError => self.parse_error += 1,
            SkipCategory::NoMedia => self.no_media += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.generic + self.not_found + self.sensitive + self.parse_error + self.no_media
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub processed: usize,
    pub downloaded: usize,
    pub already_downloaded: usize,
    pub errors: usize,
    pub skipped: SkipStats,
    pub files_downloaded: usize,
    pub files_failed: usize,
    pub metadata_saved: usize,
    pub api_calls: usize,
}

impl Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "processed:          {}", self.processed)?;
        writeln!(f, "downloaded:         {}", self.downloaded)?;
        writeln!(f, "already downloaded: {}", self.already_downloaded)?;
        writeln!(f, "errors:             {}", self.errors)?;
        writeln!(
            f,
            "skipped:            {} (generic {}, not found {}, sensitive {}, parse error {}, no media {})",
            self.skipped.total(),
            self.skipped.generic,
            self.skipped.not_found,
            self.skipped.sensitive,
            self.skipped.parse_error,
            self.skipped.no_media
        )?;
        writeln!(
            f,
            "files:              {} downloaded, {} failed",
            self.files_downloaded, self.files_failed
        )?;
        writeln!(f, "metadata saved:     {}", self.metadata_saved)?;
        write!(f, "api calls:          {}", self.api_calls)
    }
}
