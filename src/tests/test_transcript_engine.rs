use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::TieredCache;
use crate::config::{CachePolicy, ProxyCredentials, TranscriptConfig};
use crate::errors::TranscriptUnavailable;
use crate::language::resolve_preferences;
use crate::models::TranscriptPayload;
use crate::provider_pool::ProviderPool;
use crate::strategy::{FetchFlags, ProxiedTranscriptStrategy, TranscriptStrategy};
use crate::transcript_engine::TranscriptEngine;
use crate::video_id::extract_video_id;

fn payload(code: &str, text: &str) -> TranscriptPayload {
    TranscriptPayload::new(
        text.to_string(),
        code.to_string(),
        code.to_string(),
        false,
        vec![],
        None,
    )
}

/// Primary stub: counts invocations, sleeps, then returns a fixed outcome.
struct StubPrimary {
    calls: AtomicUsize,
    delay: Duration,
    result: Option<TranscriptPayload>,
}

impl StubPrimary {
    fn success(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            result: Some(payload("en", text)),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            result: None,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptStrategy for StubPrimary {
    async fn fetch(
        &self,
        _video_id: &str,
        _languages: &[String],
        _flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.result.clone())
    }

    fn name(&self) -> &'static str {
        "stub-primary"
    }

    fn supports_proxy(&self) -> bool {
        true
    }
}

#[async_trait]
impl ProxiedTranscriptStrategy for StubPrimary {
    async fn fetch_with_client(
        &self,
        _client: &reqwest::Client,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        self.fetch(video_id, languages, flags).await
    }
}

/// Fallback stub with its own delay and outcome.
struct StubFallback {
    name: &'static str,
    calls: AtomicUsize,
    delay: Duration,
    result: Option<TranscriptPayload>,
}

#[async_trait]
impl TranscriptStrategy for StubFallback {
    async fn fetch(
        &self,
        _video_id: &str,
        _languages: &[String],
        _flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.result.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

fn test_config() -> TranscriptConfig {
    TranscriptConfig {
        default_langs: vec!["en".to_string()],
        max_timedtext_langs: 3,
        proxy_attempt_timeout: Duration::from_secs(2),
        attempts_per_provider: 2,
        failure_threshold: 2,
        cooldown: Duration::from_secs(300),
        parallel_deadline: Duration::from_secs(2),
        inflight_wait: Duration::from_secs(5),
        cache: CachePolicy {
            max_entries: 16,
            ttl: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(30),
        },
    }
}

fn build_engine(
    primary: Arc<dyn ProxiedTranscriptStrategy>,
    fallbacks: Vec<Arc<dyn TranscriptStrategy>>,
    pool: ProviderPool,
) -> (TranscriptEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open(dir.path().join("cache")).unwrap();
    let tree = db.open_tree("entries").unwrap();
    let config = test_config();
    let cache = TieredCache::new(tree, &config.cache);
    (
        TranscriptEngine::new(cache, Arc::new(pool), primary, fallbacks, config),
        dir,
    )
}

fn default_prefs() -> crate::language::LanguagePreferences {
    resolve_preferences(None, None, &["en".to_string()])
}

#[tokio::test]
async fn test_concurrent_requests_share_one_upstream_call() {
    let primary = StubPrimary::success("shared text", Duration::from_millis(100));
    let (engine, _dir) = build_engine(
        primary.clone(),
        vec![],
        ProviderPool::with_providers(vec![]),
    );
    let engine = Arc::new(engine);
    let video_id = extract_video_id("AAAAAAAAAAA").unwrap();

    let a = {
        let engine = Arc::clone(&engine);
        let video_id = video_id.clone();
        tokio::spawn(async move {
            engine
                .get(&video_id, &default_prefs(), FetchFlags::default())
                .await
        })
    };
    let b = {
        let engine = Arc::clone(&engine);
        let video_id = video_id.clone();
        tokio::spawn(async move {
            engine
                .get(&video_id, &default_prefs(), FetchFlags::default())
                .await
        })
    };

    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(
        serde_json::to_vec(&a).unwrap(),
        serde_json::to_vec(&b).unwrap()
    );
    assert_eq!(primary.call_count(), 1);
}

#[tokio::test]
async fn test_repeat_request_within_ttl_hits_cache() {
    let primary = StubPrimary::success("cached text", Duration::ZERO);
    let (engine, _dir) = build_engine(
        primary.clone(),
        vec![],
        ProviderPool::with_providers(vec![]),
    );
    let video_id = extract_video_id("AAAAAAAAAAA").unwrap();

    let first = engine
        .get(&video_id, &default_prefs(), FetchFlags::default())
        .await
        .unwrap();
    let second = engine
        .get(&video_id, &default_prefs(), FetchFlags::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(primary.call_count(), 1);
}

#[tokio::test]
async fn test_negative_result_cached_without_second_upstream_call() {
    let primary = StubPrimary::empty();
    let (engine, _dir) = build_engine(
        primary.clone(),
        vec![],
        ProviderPool::with_providers(vec![]),
    );
    let video_id = extract_video_id("AAAAAAAAAAA").unwrap();

    assert!(engine
        .get(&video_id, &default_prefs(), FetchFlags::default())
        .await
        .is_err());
    assert_eq!(primary.call_count(), 1);

    assert!(engine
        .get(&video_id, &default_prefs(), FetchFlags::default())
        .await
        .is_err());
    assert_eq!(primary.call_count(), 1);
}

#[tokio::test]
async fn test_parallel_fallback_first_non_empty_wins() {
    let primary = StubPrimary::empty();
    let slow_empty: Arc<dyn TranscriptStrategy> = Arc::new(StubFallback {
        name: "slow-empty",
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
        result: None,
    });
    let fast_hit: Arc<dyn TranscriptStrategy> = Arc::new(StubFallback {
        name: "fast-hit",
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(10),
        result: Some(payload("en", "fallback text")),
    });

    let (engine, _dir) = build_engine(
        primary,
        vec![slow_empty, fast_hit],
        ProviderPool::with_providers(vec![]),
    );
    let video_id = extract_video_id("AAAAAAAAAAA").unwrap();

    let result = engine
        .get(&video_id, &default_prefs(), FetchFlags::default())
        .await
        .unwrap();
    assert_eq!(result.text, "fallback text");
}

#[tokio::test]
async fn test_language_aware_keys_are_isolated() {
    let primary = StubPrimary::success("text", Duration::ZERO);
    let (engine, _dir) = build_engine(
        primary.clone(),
        vec![],
        ProviderPool::with_providers(vec![]),
    );
    let video_id = extract_video_id("AAAAAAAAAAA").unwrap();

    let default_prefs = default_prefs();
    let caller_prefs =
        resolve_preferences(Some(&["es".to_string()]), None, &["en".to_string()]);

    engine
        .get(&video_id, &default_prefs, FetchFlags::default())
        .await
        .unwrap();
    engine
        .get(&video_id, &caller_prefs, FetchFlags::default())
        .await
        .unwrap();

    // Distinct cache keys mean a second upstream call.
    assert_eq!(primary.call_count(), 2);
}

#[tokio::test]
async fn test_provider_failures_enter_cooldown() {
    let creds = ProxyCredentials {
        generic_http: Some("http://exit-a.proxynet.io:3128".to_string()),
        ..Default::default()
    };
    let config = test_config();
    let pool = ProviderPool::from_settings(&creds, &config);
    assert_eq!(pool.len(), 1);
    let provider = pool.providers()[0].clone();

    let primary = StubPrimary::empty();
    let (engine, _dir) = build_engine(primary.clone(), vec![], pool);
    let video_id = extract_video_id("AAAAAAAAAAA").unwrap();

    assert!(engine
        .get(&video_id, &default_prefs(), FetchFlags::default())
        .await
        .is_err());

    // attempts_per_provider empty results hit the failure threshold.
    assert_eq!(primary.call_count(), 2);
    assert!(!provider.is_available());
    assert!(provider.cooldown_remaining() > Duration::from_secs(290));
}
