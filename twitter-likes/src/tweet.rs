use serde::Deserialize;

/// The parts of resolved tweet data the materializer reads.
/// Everything else is kept verbatim in the metadata file.
#[derive(Deserialize, Debug, Default)]
pub struct Tweet {
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub extended_entities: Option<Entities>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Entities {
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Deserialize, Debug)]
pub struct Media {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub media_url_https: Option<String>,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
    AnimatedGif,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
pub struct VideoInfo {
    #[serde(default)]
    pub variants: Vec<VideoVariant>,
}

#[derive(Deserialize, Debug)]
pub struct VideoVariant {
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub content_type: String,
    pub url: String,
}

impl Tweet {
    /// Media entities, preferring `extended_entities` which lists every item
    pub fn media(&self) -> &[Media] {
        match (&self.extended_entities, &self.entities) {
            (Some(e), _) if !e.media.is_empty() => &e.media,
            (_, Some(e)) => &e.media,
            _ => &[],
        }
    }
}

impl VideoInfo {
    /// Highest bitrate mp4 variant
    pub fn best_mp4(&self) -> Option<&VideoVariant> {
        self.variants
            .iter()
            .filter(|v| v.content_type == "video/mp4")
            .max_by_key(|v| v.bitrate.unwrap_or(0))
    }
}
