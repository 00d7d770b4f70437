use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use twitter_likes::{Paths, Settings};

use super::{deserialize_directory, deserialize_optional_directory};

#[derive(Deserialize, Debug)]
pub struct LikesConfig {
    /// Root of the archive; media, lists and logs live underneath
    #[serde(deserialize_with = "deserialize_directory")]
    pub directory: PathBuf,
    /// `like.js` from the Twitter data export
    #[serde(default, deserialize_with = "deserialize_optional_directory")]
    pub archive: Option<PathBuf>,
    /// Tweet resolver endpoint, `{url}` is replaced by the tweet URL
    pub resolver: String,

    pub max_retries: Option<u32>,
    pub special_retries: Option<u32>,
    pub retry_delay_secs: Option<f64>,
    pub api_call_delay_secs: Option<f64>,
    pub error_cooldown_secs: Option<f64>,
    pub error_cooldown_threshold: Option<u32>,
    pub download_timeout_secs: Option<f64>,
    pub max_redirects: Option<usize>,
    pub save_point_interval: Option<usize>,
    pub error_log_flush_interval: Option<usize>,
    pub strict_not_found: Option<bool>,
}

fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or_default()
}

impl LikesConfig {
    pub fn settings(&self, root: Option<&Path>) -> Settings {
        let root = root.unwrap_or(&self.directory);
        let mut settings = Settings::new(Paths::under(root));

        if let Some(v) = self.max_retries {
            settings.max_retries = v;
        }
        if let Some(v) = self.special_retries {
            settings.special_retries = v;
        }
        if let Some(v) = self.retry_delay_secs {
            settings.retry_delay = secs(v);
        }
        if let Some(v) = self.api_call_delay_secs {
            settings.api_call_delay = secs(v);
        }
        if let Some(v) = self.error_cooldown_secs {
            settings.error_cooldown = secs(v);
        }
        if let Some(v) = self.error_cooldown_threshold {
            settings.error_cooldown_threshold = v;
        }
        if let Some(v) = self.download_timeout_secs {
            settings.download_timeout = secs(v);
        }
        if let Some(v) = self.max_redirects {
            settings.max_redirects = v;
        }
        if let Some(v) = self.save_point_interval {
            settings.save_point_interval = v;
        }
        if let Some(v) = self.error_log_flush_interval {
            settings.error_log_flush_interval = v;
        }
        if let Some(v) = self.strict_not_found {
            settings.strict_not_found = v;
        }
        settings
    }
}
