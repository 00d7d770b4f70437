mod archive;
mod checkpoint;
mod driver;
mod error;
mod error_log;
mod fetch;
mod id_sets;
mod materializer;
mod progress_bar;
mod repair;
mod resolver;
mod scanner;
mod settings;
mod stats;
mod tweet;

pub use archive::{parse_likes, read_likes, LikeRecord};
pub use checkpoint::Checkpoint;
pub use driver::{BatchDriver, RunOutcome, RunReport, TweetClassification};
pub use error::{ErrorType, FetchError, LikesError};
pub use error_log::{ErrorEntry, ErrorLog};
pub use fetch::FetchClient;
pub use id_sets::{IdStore, JsonIdStore, SkipCategory};
pub use materializer::{extract_media, MediaItem, Materializer, TweetResult};
pub use progress_bar::{NoProgress, ProgressBar};
pub use repair::rebuild_lists;
pub use resolver::{HttpResolver, ResolveError, ResolverResponse, TweetResolver};
pub use scanner::{DownloadedState, Presence};
pub use settings::{Paths, Settings};
pub use stats::{RunStats, SkipStats};
pub use tweet::{MediaType, Tweet};
