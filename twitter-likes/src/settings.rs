use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for one run, built once and shared by reference
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: Paths,
    /// Retries after the first attempt for retryable fetch failures
    pub max_retries: u32,
    /// Extra rounds around the whole fetch for outcomes the upstream misreports
    pub special_retries: u32,
    /// Linear backoff unit, attempt `n` waits `n * retry_delay`
    pub retry_delay: Duration,
    pub api_call_delay: Duration,
    pub error_cooldown: Duration,
    /// Consecutive `api` failures that trigger [`Settings::error_cooldown`]
    pub error_cooldown_threshold: u32,
    pub download_timeout: Duration,
    pub max_redirects: usize,
    pub save_point_interval: usize,
    pub error_log_flush_interval: usize,
    /// Only trust a "not found" resolver error when it comes with an HTTP 404.
    /// A not-found reply envelope is always trusted.
    pub strict_not_found: bool,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub output_dir: PathBuf,
    pub lists_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub checkpoint: PathBuf,
}

impl Paths {
    /// Lay everything out under a single root directory
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            output_dir: root.join("media"),
            lists_dir: root.join("lists"),
            logs_dir: root.join("logs"),
            checkpoint: root.join("checkpoint.json"),
        }
    }

    pub fn create_all(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.lists_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        if let Some(parent) = self.checkpoint.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl Settings {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            max_retries: 3,
            special_retries: 2,
            retry_delay: Duration::from_secs(2),
            api_call_delay: Duration::from_millis(1500),
            error_cooldown: Duration::from_secs(60),
            error_cooldown_threshold: 3,
            download_timeout: Duration::from_secs(30),
            max_redirects: 5,
            save_point_interval: 20,
            error_log_flush_interval: 20,
            strict_not_found: true,
        }
    }

    /// Same as [`Settings::new`] with every delay zeroed
    pub fn without_delays(paths: Paths) -> Self {
        Self {
            retry_delay: Duration::ZERO,
            api_call_delay: Duration::ZERO,
            error_cooldown: Duration::ZERO,
            ..Self::new(paths)
        }
    }

    pub(crate) fn retry_delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    pub(crate) fn special_retry_delay_for(&self, round: u32) -> Duration {
        self.retry_delay.saturating_mul(2).saturating_mul(round)
    }
}
