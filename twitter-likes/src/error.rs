use std::fmt::Display;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that stop a run before or outside the per-tweet loop
#[derive(Error, Debug)]
pub enum LikesError {
    #[error("unable to read likes archive {path:?}: {source}")]
    ReadArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse likes archive {path:?}: {msg}")]
    ParseArchive { path: PathBuf, msg: String },

    #[error("unable to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid resolver endpoint {endpoint}: {msg}")]
    ResolverEndpoint { endpoint: String, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Classification of a failed tweet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NotFound,
    SensitiveContent,
    Parse,
    Api,
    RateLimit,
    Authentication,
    Network,
    Timeout,
    MediaDownload,
    Other,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::SensitiveContent => "sensitive_content",
            Self::Parse => "parse",
            Self::Api => "api",
            Self::RateLimit => "rate_limit",
            Self::Authentication => "authentication",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::MediaDownload => "media_download",
            Self::Other => "other",
        }
    }

    /// Whether the inner fetch loop tries the same request again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api | Self::RateLimit | Self::Network | Self::Timeout
        )
    }

    /// Outcomes the upstream is known to report spuriously, worth a slower second look
    pub fn wants_special_retry(&self) -> bool {
        matches!(self, Self::NotFound | Self::RateLimit | Self::Api)
    }

    /// Classify an upstream failure from its message and optional HTTP status.
    ///
    /// With `strict_not_found`, a "not found" message only counts as
    /// [`ErrorType::NotFound`] when the status is 404; otherwise it is demoted
    /// to [`ErrorType::Api`] and retried.
    pub fn classify(message: &str, status: Option<u16>, strict_not_found: bool) -> Self {
        let msg = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

        if has(&["sensitive", "age-restricted", "age restricted", "nsfw"]) {
            return Self::SensitiveContent;
        }
        if status == Some(404) {
            return Self::NotFound;
        }
        if has(&[
            "not found",
            "no status found",
            "does not exist",
            "has been deleted",
            "no longer available",
        ]) {
            return if strict_not_found {
                Self::Api
            } else {
                Self::NotFound
            };
        }
        if status == Some(429) || has(&["rate limit", "too many requests"]) {
            return Self::RateLimit;
        }
        if matches!(status, Some(401) | Some(403))
            || has(&["unauthorized", "forbidden", "authentication", "auth token"])
        {
            return Self::Authentication;
        }
        if has(&["timeout", "timed out", "etimedout"]) {
            return Self::Timeout;
        }
        if has(&[
            "network",
            "connection",
            "econnreset",
            "econnrefused",
            "enotfound",
            "dns",
            "socket",
        ]) {
            return Self::Network;
        }
        if has(&["parse", "json", "unexpected token", "invalid response", "deserializ"]) {
            return Self::Parse;
        }
        if matches!(status, Some(s) if s >= 500) || has(&["api", "server error", "bad gateway"])
        {
            return Self::Api;
        }
        Self::Other
    }
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified failure to resolve or materialize one tweet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error_type}: {message}")]
pub struct FetchError {
    pub message: String,
    pub error_type: ErrorType,
    pub status_code: Option<u16>,
}

impl FetchError {
    pub fn new(message: impl Into<String>, error_type: ErrorType, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            error_type,
            status_code,
        }
    }
}
