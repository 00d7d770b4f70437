use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::error::LikesError;

/// Envelope returned by the tweet resolution service
#[derive(Deserialize, Debug, Clone)]
pub struct ResolverResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ResolverResponse {
    pub fn success(result: Value) -> Self {
        Self {
            status: "success".to_owned(),
            result: Some(result),
            message: None,
        }
    }

    pub fn failure(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            result: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// A failure raised while talking to the resolver, before classification
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl ResolveError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else if e.is_connect() {
            format!("connection error: {}", e)
        } else if e.is_decode() {
            format!("unable to parse resolver JSON: {}", e)
        } else {
            e.to_string()
        };
        Self {
            message,
            status_code: e.status().map(|s| s.as_u16()),
        }
    }
}

/// Turns a tweet URL into tweet data
#[async_trait]
pub trait TweetResolver: Send + Sync {
    async fn resolve(&self, tweet_url: &str) -> Result<ResolverResponse, ResolveError>;
}

/// Resolver backed by an HTTP service. `{url}` in the endpoint is replaced by
/// the URL-encoded tweet URL.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    endpoint: String,
}

impl HttpResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LikesError> {
        let endpoint = endpoint.into();
        if !endpoint.contains("{url}") {
            return Err(LikesError::ResolverEndpoint {
                endpoint,
                msg: "missing {url} placeholder".to_owned(),
            });
        }
        url::Url::parse(&endpoint.replace("{url}", "x")).map_err(|e| {
            LikesError::ResolverEndpoint {
                endpoint: endpoint.clone(),
                msg: e.to_string(),
            }
        })?;

        let client = ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, tweet_url: &str) -> String {
        self.endpoint
            .replace("{url}", &urlencoding::encode(tweet_url))
    }
}

#[async_trait]
impl TweetResolver for HttpResolver {
    async fn resolve(&self, tweet_url: &str) -> Result<ResolverResponse, ResolveError> {
        let resp = self.client.get(self.request_url(tweet_url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ResolverResponse>(&body)
                .ok()
                .and_then(|r| r.message)
                .unwrap_or_else(|| format!("resolver returned {}", status));
            return Err(ResolveError::new(message, Some(status.as_u16())));
        }
        Ok(resp.json().await?)
    }
}
