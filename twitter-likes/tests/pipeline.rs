use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use twitter_likes::{
    parse_likes, BatchDriver, IdStore, JsonIdStore, LikeRecord, NoProgress, Paths,
    ResolveError, ResolverResponse, RunOutcome, Settings, SkipCategory, TweetResolver,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers by tweet id and counts calls per id
struct FakeResolver {
    replies: HashMap<String, Result<ResolverResponse, ResolveError>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeResolver {
    fn new(replies: Vec<(&str, Result<ResolverResponse, ResolveError>)>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|(id, r)| (id.to_owned(), r))
                .collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, id: &str) -> u32 {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl TweetResolver for FakeResolver {
    async fn resolve(&self, tweet_url: &str) -> Result<ResolverResponse, ResolveError> {
        let id = tweet_url.rsplit('/').next().unwrap_or_default().to_owned();
        *self.calls.lock().unwrap().entry(id.clone()).or_default() += 1;
        self.replies
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::new("unexpected tweet", None)))
    }
}

fn photo_tweet(server: &MockServer, file: &str) -> Value {
    json!({
        "full_text": "look",
        "extended_entities": { "media": [
            { "type": "photo", "media_url_https": format!("{}/media/{}", server.uri(), file) }
        ] }
    })
}

fn settings(root: &Path) -> Settings {
    let settings = Settings::without_delays(Paths::under(root));
    settings.paths.create_all().unwrap();
    settings
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn read_list(settings: &Settings, category: SkipCategory) -> Vec<String> {
    let path = settings.paths.lists_dir.join(category.file_name());
    match std::fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap(),
        Err(_) => vec![],
    }
}

async fn media_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(vec![7u8; 128]),
        )
        .mount(&server)
        .await;
    server
}

const ARCHIVE: &str = r#"window.YTD.like.part0 = [
  { "like": { "tweetId": "100" } },
  { "like": { "tweetId": "200", "expandedUrl": "https://twitter.com/i/web/status/200" } },
  { "like": { "tweetId": "300" } }
]"#;

#[tokio::test]
async fn converges_and_reruns_without_network() {
    let server = media_server().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let likes = parse_likes(ARCHIVE).unwrap();

    let resolver = FakeResolver::new(vec![
        ("100", Ok(ResolverResponse::success(photo_tweet(&server, "a.jpg")))),
        ("200", Err(ResolveError::new("Tweet not found", Some(404)))),
        ("300", Ok(ResolverResponse::success(json!({ "full_text": "text only" })))),
    ]);

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.stats.downloaded, 1);
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.skipped.no_media, 1);
    assert_eq!(report.stats.files_downloaded, 1);
    assert_eq!(report.stats.metadata_saved, 2);
    assert_eq!(
        files_in(&settings.paths.output_dir),
        vec!["100-1.jpg", "100-metadata.json", "300-metadata.json"]
    );
    assert_eq!(read_list(&settings, SkipCategory::NotFound), vec!["200"]);
    assert_eq!(read_list(&settings, SkipCategory::NoMedia), vec!["300"]);
    assert!(read_list(&settings, SkipCategory::Generic).is_empty());
    assert!(!settings.paths.checkpoint.exists());
    assert_eq!(files_in(&settings.paths.logs_dir).len(), 1);

    let first_run_calls = resolver.total_calls();

    // Second run over the same archive and directory
    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(resolver.total_calls(), first_run_calls);
    assert_eq!(report.stats.downloaded, 0);
    assert_eq!(report.stats.already_downloaded, 1);
    assert_eq!(report.stats.skipped.not_found, 1);
    assert_eq!(report.stats.skipped.no_media, 1);
    assert_eq!(report.stats.errors, 0);
    assert_eq!(report.stats.api_calls, 0);
    assert_eq!(
        files_in(&settings.paths.output_dir),
        vec!["100-1.jpg", "100-metadata.json", "300-metadata.json"]
    );
    assert_eq!(read_list(&settings, SkipCategory::NotFound), vec!["200"]);
    assert_eq!(read_list(&settings, SkipCategory::NoMedia), vec!["300"]);
    assert_eq!(store.len(SkipCategory::NotFound), 1);
}

#[tokio::test]
async fn not_found_is_never_fetched_again_in_any_order() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let resolver = FakeResolver::new(vec![(
        "200",
        Err(ResolveError::new("Tweet not found", Some(404))),
    )]);

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let likes = parse_likes(ARCHIVE).unwrap();
    let only_200: Vec<LikeRecord> = likes.iter().filter(|l| l.tweet_id == "200").cloned().collect();
    driver
        .run::<NoProgress>(&only_200, true, &CancellationToken::new())
        .await;
    drop(driver);
    let after_first = resolver.calls("200");
    assert_eq!(after_first, 1 + settings.special_retries);

    let mut reversed = likes.clone();
    reversed.reverse();
    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    driver
        .run::<NoProgress>(&reversed, true, &CancellationToken::new())
        .await;
    drop(driver);
    assert_eq!(resolver.calls("200"), after_first);
}

#[tokio::test]
async fn network_failures_surface_as_errors() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let resolver = FakeResolver::new(vec![(
        "100",
        Err(ResolveError::new("error sending request: connection reset", None)),
    )]);

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let likes = vec![LikeRecord {
        tweet_id: "100".into(),
        expanded_url: None,
    }];
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(resolver.calls("100"), settings.max_retries + 1);
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.downloaded, 0);
    assert_eq!(store.category_of("100"), Some(SkipCategory::Generic));

    let logs = twitter_likes::ErrorLog::read_all(&settings.paths.logs_dir).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_type, twitter_likes::ErrorType::Network);
}

#[tokio::test]
async fn partial_state_fills_only_what_is_missing() {
    let server = media_server().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let out = &settings.paths.output_dir;

    // 100 has metadata but no media, 300 has media but no metadata
    let mut saved = photo_tweet(&server, "a.jpg");
    saved["downloadedAt"] = json!("2024-01-01T00:00:00Z");
    std::fs::write(
        out.join("100-metadata.json"),
        serde_json::to_vec_pretty(&saved).unwrap(),
    )
    .unwrap();
    std::fs::write(out.join("300-1.jpg"), b"old").unwrap();

    let resolver = FakeResolver::new(vec![(
        "300",
        Ok(ResolverResponse::success(photo_tweet(&server, "a.jpg"))),
    )]);
    let likes = vec![
        LikeRecord {
            tweet_id: "100".into(),
            expanded_url: None,
        },
        LikeRecord {
            tweet_id: "300".into(),
            expanded_url: None,
        },
    ];

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(resolver.calls("100"), 0);
    assert_eq!(resolver.calls("300"), 1);
    assert_eq!(report.stats.downloaded, 2);
    assert_eq!(report.stats.files_downloaded, 1);
    assert_eq!(report.stats.metadata_saved, 1);
    assert_eq!(std::fs::read(out.join("300-1.jpg")).unwrap(), b"old");
    assert_eq!(std::fs::read(out.join("100-1.jpg")).unwrap().len(), 128);

    let kept: Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("100-metadata.json")).unwrap())
            .unwrap();
    assert_eq!(kept["downloadedAt"], "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn not_found_reply_without_status_is_filed_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    assert!(settings.strict_not_found);
    let resolver = FakeResolver::new(vec![(
        "200",
        Ok(ResolverResponse::failure("error", "Tweet not found")),
    )]);
    let likes = vec![LikeRecord {
        tweet_id: "200".into(),
        expanded_url: None,
    }];

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(report.stats.errors, 1);
    assert_eq!(resolver.calls("200"), 1 + settings.special_retries);
    assert_eq!(store.category_of("200"), Some(SkipCategory::NotFound));
    assert_eq!(read_list(&settings, SkipCategory::NotFound), vec!["200"]);
    assert!(read_list(&settings, SkipCategory::Generic).is_empty());
}

#[tokio::test]
async fn failed_media_is_retried_on_the_next_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(vec![7u8; 128]),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let out = &settings.paths.output_dir;
    let resolver = FakeResolver::new(vec![(
        "100",
        Ok(ResolverResponse::success(photo_tweet(&server, "a.jpg"))),
    )]);
    let likes = vec![LikeRecord {
        tweet_id: "100".into(),
        expanded_url: None,
    }];

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(report.stats.downloaded, 0);
    assert_eq!(report.stats.files_failed, 1);
    assert_eq!(store.category_of("100"), None);
    assert_eq!(files_in(out), vec!["100-metadata.json"]);
    let logs = twitter_likes::ErrorLog::read_all(&settings.paths.logs_dir).unwrap();
    assert_eq!(logs[0].error_type, twitter_likes::ErrorType::MediaDownload);

    let mut store = JsonIdStore::load(&settings.paths.lists_dir);
    let mut driver = BatchDriver::new(&resolver, &mut store, &settings).unwrap();
    let report = driver
        .run::<NoProgress>(&likes, true, &CancellationToken::new())
        .await;
    drop(driver);

    assert_eq!(report.stats.downloaded, 1);
    assert_eq!(report.stats.api_calls, 0);
    assert_eq!(resolver.calls("100"), 1);
    assert_eq!(files_in(out), vec!["100-1.jpg", "100-metadata.json"]);
}
