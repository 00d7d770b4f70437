use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use likes_archive_common::{streamed_download, write_json_atomic};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::archive::LikeRecord;
use crate::error::{ErrorType, FetchError, LikesError};
use crate::fetch::FetchClient;
use crate::resolver::TweetResolver;
use crate::scanner::Presence;
use crate::settings::Settings;
use crate::tweet::{MediaType, Tweet};

/// One downloadable media file of a tweet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub url: String,
    /// `{tweet_id}-{n}`, n starting at 1
    pub stem: String,
    /// Extension taken from the URL, if it had one
    pub ext: Option<String>,
    pub media_type: MediaType,
}

impl MediaItem {
    fn fallback_ext(&self) -> &'static str {
        match self.media_type {
            MediaType::Photo => "jpg",
            _ => "mp4",
        }
    }

    /// Final file name, resolving the extension from the URL, then the
    /// response content type, then the media type
    pub fn file_name(&self, content_type: Option<&str>) -> String {
        let ext = self
            .ext
            .as_deref()
            .or_else(|| content_type.and_then(content_type_ext))
            .unwrap_or_else(|| self.fallback_ext());
        format!("{}.{}", self.stem, ext)
    }
}

fn content_type_ext(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim();
    match mime {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}

fn url_file_ext(url: &Url) -> Option<String> {
    let (_, ext) = url.path().rsplit_once('/')?.1.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Request the original-quality rendition of a photo
fn original_photo_url(raw: &str) -> Option<(String, Option<String>)> {
    let mut url = Url::parse(raw).ok()?;
    let path_ext = url_file_ext(&url);
    let format = url
        .query_pairs()
        .find(|(k, _)| k == "format")
        .map(|(_, v)| v.into_owned());
    let has_format = format.is_some();
    let has_name = url.query_pairs().any(|(k, _)| k == "name");
    let ext = format.or(path_ext);
    if !has_name {
        let mut pairs = url.query_pairs_mut();
        if !has_format {
            pairs.append_pair("format", ext.as_deref().unwrap_or("jpg"));
        }
        pairs.append_pair("name", "orig");
    }
    Some((url.into(), ext))
}

/// List the media files of a tweet. Entities without a usable URL are left out.
pub fn extract_media(tweet_id: &str, data: &Value) -> Result<Vec<MediaItem>, FetchError> {
    let tweet = Tweet::deserialize(data).map_err(|e| {
        FetchError::new(
            format!("unable to parse tweet data: {}", e),
            ErrorType::Parse,
            None,
        )
    })?;

    let mut items = vec![];
    for media in tweet.media() {
        let found = match media.media_type {
            MediaType::Photo => media
                .media_url_https
                .as_deref()
                .and_then(original_photo_url),
            MediaType::Video | MediaType::AnimatedGif => media
                .video_info
                .as_ref()
                .and_then(|v| v.best_mp4())
                .map(|v| {
                    let ext = Url::parse(&v.url).ok().and_then(|u| url_file_ext(&u));
                    (v.url.clone(), ext)
                }),
            MediaType::Unknown => None,
        };
        if let Some((url, ext)) = found {
            items.push(MediaItem {
                url,
                stem: format!("{}-{}", tweet_id, items.len() + 1),
                ext,
                media_type: media.media_type,
            });
        }
    }
    Ok(items)
}

/// Outcome of materializing one tweet
#[derive(Debug, Clone, Default)]
pub struct TweetResult {
    pub tweet_id: String,
    /// Whether the resolver was called, as opposed to reusing saved metadata
    pub used_api: bool,
    pub downloaded_files: Vec<String>,
    pub failed_files: usize,
    pub saved_metadata: bool,
    pub no_media: bool,
    pub error: Option<FetchError>,
}

impl TweetResult {
    fn new(tweet_id: &str) -> Self {
        Self {
            tweet_id: tweet_id.to_owned(),
            ..Default::default()
        }
    }

    /// Media was expected but not a single file made it to disk
    pub fn media_incomplete(&self) -> bool {
        self.error.is_none()
            && !self.no_media
            && self.downloaded_files.is_empty()
            && self.failed_files > 0
    }
}

/// Turns resolved tweet data into files in the output directory
pub struct Materializer<'a, R> {
    client: Client,
    fetcher: FetchClient<'a, R>,
    settings: &'a Settings,
}

impl<'a, R: TweetResolver> Materializer<'a, R> {
    pub fn new(resolver: &'a R, settings: &'a Settings) -> Result<Self, LikesError> {
        // Bounds connecting and each read, not the whole transfer
        let client = ClientBuilder::new()
            .connect_timeout(settings.download_timeout)
            .read_timeout(settings.download_timeout)
            .redirect(Policy::limited(settings.max_redirects))
            .build()?;
        Ok(Self {
            client,
            fetcher: FetchClient::new(resolver, settings),
            settings,
        })
    }

    fn output_dir(&self) -> &Path {
        &self.settings.paths.output_dir
    }

    pub fn metadata_path(&self, tweet_id: &str) -> PathBuf {
        self.output_dir()
            .join(format!("{}-metadata.json", tweet_id))
    }

    /// Write tweet data with a `downloadedAt` stamp. An existing file is left as is.
    /// Returns whether the metadata is on disk afterwards.
    pub async fn save_metadata(&self, tweet_id: &str, data: &Value) -> bool {
        let path = self.metadata_path(tweet_id);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return true;
        }

        let mut annotated = data.clone();
        let downloaded_at = Value::String(Utc::now().to_rfc3339());
        match annotated.as_object_mut() {
            Some(obj) => {
                obj.insert("downloadedAt".to_owned(), downloaded_at);
            }
            None => {
                annotated = serde_json::json!({ "tweet": data, "downloadedAt": downloaded_at });
            }
        }

        match write_json_atomic(&path, &annotated) {
            Ok(()) => true,
            Err(e) => {
                error!(tweet_id, "failed to save metadata: {:#}", e);
                false
            }
        }
    }

    async fn load_metadata(&self, tweet_id: &str) -> Option<Value> {
        let path = self.metadata_path(tweet_id);
        let contents = fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str::<Value>(&contents) {
            Ok(v) if v.is_object() => Some(v),
            _ => {
                warn!(tweet_id, "saved metadata unreadable, fetching again");
                None
            }
        }
    }

    /// Download one media file. Returns the final file name.
    ///
    /// A slot whose file already exists is not downloaded again, and a failed
    /// download never leaves a file under the final name.
    pub async fn download_one(
        &self,
        item: &MediaItem,
        on_progress: impl FnMut(u64),
    ) -> Result<String> {
        let planned = item.file_name(None);
        if fs::try_exists(self.output_dir().join(&planned))
            .await
            .unwrap_or(false)
        {
            debug!("{} already present", planned);
            return Ok(planned);
        }

        let downloaded = streamed_download(
            &self.client,
            &item.url,
            self.output_dir().join(&item.stem),
            on_progress,
        )
        .await
        .context(format!("Failed to download file {}", &item.url))?;

        let file_name = item.file_name(downloaded.content_type.as_deref());
        downloaded
            .persist(self.output_dir().join(&file_name))
            .await?;
        Ok(file_name)
    }

    /// Save whatever of metadata and media is missing for one tweet.
    ///
    /// Saved metadata is reused instead of calling the resolver. Failed media
    /// files are counted without stopping the remaining ones and never turn
    /// into an error, so a later run sees the media as missing and tries again.
    pub async fn process_tweet_media(&self, like: &LikeRecord, presence: Presence) -> TweetResult {
        let tweet_id = like.tweet_id.as_str();
        let mut result = TweetResult::new(tweet_id);

        let local = if presence.has_metadata {
            self.load_metadata(tweet_id).await
        } else {
            None
        };
        let data = match local {
            Some(v) => v,
            None => {
                result.used_api = true;
                match self.fetcher.fetch(&like.url()).await {
                    Ok(v) => v,
                    Err(e) => {
                        result.error = Some(e);
                        return result;
                    }
                }
            }
        };

        if !presence.has_metadata {
            result.saved_metadata = self.save_metadata(tweet_id, &data).await;
        }

        let items = match extract_media(tweet_id, &data) {
            Ok(items) => items,
            Err(e) => {
                result.error = Some(e);
                return result;
            }
        };
        if items.is_empty() {
            result.no_media = true;
            return result;
        }
        if presence.has_media {
            return result;
        }

        for item in &items {
            let stem = item.stem.as_str();
            match self
                .download_one(item, |bytes| trace!(bytes, "{}", stem))
                .await
            {
                Ok(file_name) => {
                    info!("Downloaded {}", file_name);
                    result.downloaded_files.push(file_name);
                }
                Err(e) => {
                    warn!(tweet_id, "{:#}", e);
                    result.failed_files += 1;
                }
            }
        }

        result
    }
}
