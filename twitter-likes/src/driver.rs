use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::LikeRecord;
use crate::checkpoint::Checkpoint;
use crate::error::{ErrorType, FetchError, LikesError};
use crate::error_log::{ErrorEntry, ErrorLog};
use crate::id_sets::{IdStore, SkipCategory};
use crate::materializer::Materializer;
use crate::progress_bar::ProgressBar;
use crate::resolver::TweetResolver;
use crate::scanner::{DownloadedState, Presence};
use crate::settings::Settings;
use crate::stats::RunStats;

/// What a run has to do for one like, decided fresh every run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetClassification {
    AlreadyComplete,
    SkipListed(SkipCategory),
    NeedsFetch(Presence),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stopped by a shutdown signal before handling the entry at `at`
    Interrupted { at: usize },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stats: RunStats,
}

#[derive(Debug, Default)]
struct ItemOutcome {
    used_api: bool,
    error_type: Option<ErrorType>,
}

/// Walks the likes archive in order, one tweet at a time
pub struct BatchDriver<'a, R, S> {
    settings: &'a Settings,
    materializer: Materializer<'a, R>,
    store: &'a mut S,
    state: DownloadedState,
    error_log: ErrorLog,
}

impl<'a, R: TweetResolver, S: IdStore> BatchDriver<'a, R, S> {
    pub fn new(
        resolver: &'a R,
        store: &'a mut S,
        settings: &'a Settings,
    ) -> Result<Self, LikesError> {
        let state = DownloadedState::scan(&settings.paths.output_dir);
        info!(
            "{} tweets with media, {} with metadata already on disk",
            state.media_ids.len(),
            state.metadata_ids.len()
        );
        Ok(Self {
            settings,
            materializer: Materializer::new(resolver, settings)?,
            store,
            state,
            error_log: ErrorLog::create(
                &settings.paths.logs_dir,
                settings.error_log_flush_interval,
            ),
        })
    }

    pub fn classify(&self, like: &LikeRecord) -> TweetClassification {
        if let Some(category) = self.store.category_of(&like.tweet_id) {
            return TweetClassification::SkipListed(category);
        }
        let presence = self.state.presence(&like.tweet_id);
        if presence.is_complete() {
            TweetClassification::AlreadyComplete
        } else {
            TweetClassification::NeedsFetch(presence)
        }
    }

    /// Process `likes` until done or until `cancel` fires.
    ///
    /// With `resume`, a checkpoint written for an archive of the same length
    /// positions the start. A completed run removes the checkpoint; an
    /// interrupted one writes it at the entry that was in flight.
    pub async fn run<P: ProgressBar>(
        &mut self,
        likes: &[LikeRecord],
        resume: bool,
        cancel: &CancellationToken,
    ) -> RunReport {
        let total = likes.len();
        let checkpoint = if resume {
            Checkpoint::load(&self.settings.paths.checkpoint)
        } else {
            None
        };
        let start = Checkpoint::resume_index(checkpoint.as_ref(), total);

        let progress = P::init(total, "Archiving likes");
        progress.set_position(start);

        let mut stats = RunStats::default();
        let mut consecutive_api_errors = 0;
        let mut outcome = RunOutcome::Completed;

        for (index, like) in likes.iter().enumerate().skip(start) {
            if cancel.is_cancelled() {
                outcome = RunOutcome::Interrupted { at: index };
                break;
            }

            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = self.process_item(like, &mut stats) => Some(item),
            };
            let Some(item) = item else {
                outcome = RunOutcome::Interrupted { at: index };
                break;
            };

            stats.processed += 1;
            progress.increment();

            let interval = self.settings.save_point_interval.max(1);
            if (index + 1) % interval == 0 {
                self.save_checkpoint(index + 1, total, &stats);
            }

            if !item.used_api || index + 1 == total {
                continue;
            }
            if item.error_type == Some(ErrorType::Api) {
                consecutive_api_errors += 1;
            } else {
                consecutive_api_errors = 0;
            }
            let delay = if consecutive_api_errors >= self.settings.error_cooldown_threshold {
                warn!(
                    "{} consecutive API errors, cooling down for {:?}",
                    consecutive_api_errors, self.settings.error_cooldown
                );
                consecutive_api_errors = 0;
                self.settings.error_cooldown
            } else {
                self.settings.api_call_delay
            };
            pause(delay, cancel).await;
        }

        match outcome {
            RunOutcome::Completed => Checkpoint::remove(&self.settings.paths.checkpoint),
            RunOutcome::Interrupted { at } => {
                info!("Interrupted at {}/{}, saving checkpoint", at, total);
                self.save_checkpoint(at, total, &stats);
            }
        }
        self.error_log.flush();
        progress.destroy();
        info!("Run summary\n{}", stats);

        RunReport { outcome, stats }
    }

    async fn process_item(&mut self, like: &LikeRecord, stats: &mut RunStats) -> ItemOutcome {
        let tweet_id = like.tweet_id.as_str();
        let presence = match self.classify(like) {
            TweetClassification::SkipListed(category) => {
                debug!(tweet_id, "skip-listed as {:?}", category);
                stats.skipped.bump(category);
                return ItemOutcome::default();
            }
            TweetClassification::AlreadyComplete => {
                debug!(tweet_id, "already downloaded");
                stats.already_downloaded += 1;
                return ItemOutcome::default();
            }
            TweetClassification::NeedsFetch(presence) => presence,
        };

        let result = self
            .materializer
            .process_tweet_media(like, presence)
            .await;

        if result.used_api {
            stats.api_calls += 1;
        }
        stats.files_downloaded += result.downloaded_files.len();
        stats.files_failed += result.failed_files;
        if result.saved_metadata {
            stats.metadata_saved += 1;
            self.state.metadata_ids.insert(tweet_id.to_owned());
        }
        if !result.downloaded_files.is_empty() {
            self.state.media_ids.insert(tweet_id.to_owned());
        }

        if let Some(err) = &result.error {
            warn!(tweet_id, error_type = %err.error_type, "{}", err.message);
            if let Some(category) = SkipCategory::for_error(err.error_type) {
                self.store.add(category, tweet_id);
            }
            self.error_log
                .record(ErrorEntry::new(tweet_id, &like.url(), err));
            stats.errors += 1;
        } else if result.media_incomplete() {
            let err = FetchError::new(
                format!("all {} media downloads failed", result.failed_files),
                ErrorType::MediaDownload,
                None,
            );
            warn!(tweet_id, error_type = %err.error_type, "{}, retrying next run", err.message);
            self.error_log
                .record(ErrorEntry::new(tweet_id, &like.url(), &err));
            stats.errors += 1;
        } else if result.no_media {
            debug!(tweet_id, "no media");
            self.store.add(SkipCategory::NoMedia, tweet_id);
            stats.skipped.no_media += 1;
        } else {
            stats.downloaded += 1;
        }

        ItemOutcome {
            used_api: result.used_api,
            error_type: result.error.map(|e| e.error_type),
        }
    }

    fn save_checkpoint(&self, completed_index: usize, total: usize, stats: &RunStats) {
        let checkpoint = Checkpoint::new(completed_index, total, stats);
        if let Err(e) = checkpoint.save(&self.settings.paths.checkpoint) {
            warn!("unable to save checkpoint: {:#}", e);
        }
    }
}

async fn pause(delay: Duration, cancel: &CancellationToken) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = sleep(delay) => {}
    }
}
