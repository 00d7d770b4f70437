use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{ErrorType, FetchError};
use crate::resolver::{ResolverResponse, TweetResolver};
use crate::settings::Settings;

/// Resolves tweet URLs, hiding transient upstream failures behind bounded retries.
///
/// Two loops nest here. The inner one repeats retryable failures
/// (`api`, `rate_limit`, `network`, `timeout`) up to `max_retries` more times
/// with linear backoff. The outer one gives `not_found`, `rate_limit` and `api`
/// outcomes `special_retries` more rounds at twice the delay, since the
/// upstream sometimes reports transient failures as permanent ones.
pub struct FetchClient<'a, R> {
    resolver: &'a R,
    settings: &'a Settings,
}

impl<'a, R: TweetResolver> FetchClient<'a, R> {
    pub fn new(resolver: &'a R, settings: &'a Settings) -> Self {
        Self { resolver, settings }
    }

    pub async fn fetch(&self, tweet_url: &str) -> Result<Value, FetchError> {
        let mut round = 0;
        loop {
            match self.fetch_with_retries(tweet_url).await {
                Ok(v) => return Ok(v),
                Err(e)
                    if e.error_type.wants_special_retry()
                        && round < self.settings.special_retries =>
                {
                    round += 1;
                    let delay = self.settings.special_retry_delay_for(round);
                    warn!(
                        "{} for {}, second look {}/{} in {:?}",
                        e.error_type, tweet_url, round, self.settings.special_retries, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_with_retries(&self, tweet_url: &str) -> Result<Value, FetchError> {
        let total_attempts = self.settings.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(tweet_url).await {
                Ok(v) => return Ok(v),
                Err(e) if e.error_type.is_retryable() && attempt < total_attempts => {
                    let delay = self.settings.retry_delay_for(attempt);
                    warn!(
                        "retryable error (attempt {}/{}) for {}, retrying in {:?}: {}",
                        attempt, total_attempts, tweet_url, delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, tweet_url: &str) -> Result<Value, FetchError> {
        let strict = self.settings.strict_not_found;
        match self.resolver.resolve(tweet_url).await {
            Ok(resp) if resp.is_success() => match resp.result {
                Some(v) if v.is_object() => Ok(v),
                _ => Err(FetchError::new(
                    "resolver reported success without tweet data",
                    ErrorType::Parse,
                    None,
                )),
            },
            // A reply envelope is the resolver's own verdict, trusted without a 404
            Ok(ResolverResponse {
                status, message, ..
            }) => {
                let message = message.unwrap_or_else(|| format!("resolver status {}", status));
                let error_type = ErrorType::classify(&message, None, false);
                Err(FetchError::new(message, error_type, None))
            }
            Err(e) => {
                let error_type = ErrorType::classify(&e.message, e.status_code, strict);
                Err(FetchError::new(e.message, error_type, e.status_code))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::resolver::ResolveError;
    use crate::settings::Paths;

    /// Replays scripted replies, repeating the last one once the script runs out
    pub(crate) struct ScriptedResolver {
        script: Mutex<VecDeque<Result<ResolverResponse, ResolveError>>>,
        pub(crate) calls: AtomicU32,
    }

    impl ScriptedResolver {
        pub(crate) fn new(script: Vec<Result<ResolverResponse, ResolveError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TweetResolver for ScriptedResolver {
        async fn resolve(&self, _tweet_url: &str) -> Result<ResolverResponse, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    fn settings() -> Settings {
        Settings::without_delays(Paths::under("/tmp/unused"))
    }

    fn network_error() -> Result<ResolverResponse, ResolveError> {
        Err(ResolveError::new("connection reset by peer", None))
    }

    #[tokio::test]
    async fn network_failure_exhausts_inner_budget_only() {
        let settings = settings();
        let resolver = ScriptedResolver::new(vec![network_error()]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("https://twitter.com/i/web/status/1")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::Network);
        assert_eq!(resolver.calls(), settings.max_retries + 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let settings = settings();
        let resolver = ScriptedResolver::new(vec![
            network_error(),
            Err(ResolveError::new("request timed out", None)),
            Ok(ResolverResponse::success(json!({ "id_str": "1" }))),
        ]);
        let tweet = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap();
        assert_eq!(tweet["id_str"], "1");
        assert_eq!(resolver.calls(), 3);
    }

    #[tokio::test]
    async fn confirmed_not_found_gets_special_rounds_only() {
        let settings = settings();
        let resolver =
            ScriptedResolver::new(vec![Err(ResolveError::new("Tweet not found", Some(404)))]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
        assert_eq!(err.status_code, Some(404));
        assert_eq!(resolver.calls(), 1 + settings.special_retries);
    }

    #[tokio::test]
    async fn not_found_reply_is_trusted_without_status() {
        let settings = settings();
        assert!(settings.strict_not_found);
        let resolver = ScriptedResolver::new(vec![Ok(ResolverResponse::failure(
            "error",
            "Tweet not found",
        ))]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
        assert_eq!(resolver.calls(), 1 + settings.special_retries);
    }

    #[tokio::test]
    async fn thrown_not_found_without_404_is_retried_as_api() {
        let settings = settings();
        let resolver =
            ScriptedResolver::new(vec![Err(ResolveError::new("Tweet not found", None))]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::Api);
        assert_eq!(
            resolver.calls(),
            (settings.max_retries + 1) * (settings.special_retries + 1)
        );
    }

    #[tokio::test]
    async fn sensitive_is_terminal() {
        let settings = settings();
        let resolver = ScriptedResolver::new(vec![Ok(ResolverResponse::failure(
            "error",
            "This tweet contains sensitive content",
        ))]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::SensitiveContent);
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn rate_limit_uses_both_budgets() {
        let settings = settings();
        let resolver =
            ScriptedResolver::new(vec![Err(ResolveError::new("Too Many Requests", Some(429)))]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::RateLimit);
        assert_eq!(
            resolver.calls(),
            (settings.max_retries + 1) * (settings.special_retries + 1)
        );
    }

    #[tokio::test]
    async fn success_without_data_is_parse_error() {
        let settings = settings();
        let resolver = ScriptedResolver::new(vec![Ok(ResolverResponse {
            status: "success".into(),
            result: None,
            message: None,
        })]);
        let err = FetchClient::new(&resolver, &settings)
            .fetch("u")
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::Parse);
        assert_eq!(resolver.calls(), 1);
    }
}
