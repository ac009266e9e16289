use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::TieredCache;
use crate::comment_engine::{ChainEntry, CommentEngine, BLOCK_WARNING};
use crate::config::{CachePolicy, CommentConfig};
use crate::errors::CommentError;
use crate::strategy::CommentStrategy;
use crate::video_id::extract_video_id;

enum Behavior {
    Empty,
    List(Vec<String>),
    Block,
    Fail,
}

struct StubComments {
    name: &'static str,
    calls: AtomicUsize,
    behavior: Behavior,
}

impl StubComments {
    fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicUsize::new(0),
            behavior,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentStrategy for StubComments {
    async fn fetch(&self, _video_id: &str, _use_proxy: bool) -> Result<Vec<String>, CommentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Empty => Ok(Vec::new()),
            Behavior::List(items) => Ok(items.clone()),
            Behavior::Block => Err(CommentError::PermanentBlock("signin_required".to_string())),
            Behavior::Fail => Err(CommentError::Failed("boom".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

fn test_config(limit: usize) -> CommentConfig {
    CommentConfig {
        limit,
        max_fetch: limit,
        inflight_wait: Duration::from_secs(5),
        cache: CachePolicy {
            max_entries: 16,
            ttl: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(1),
        },
    }
}

fn build_engine(
    chain: Vec<ChainEntry>,
    limit: usize,
) -> (CommentEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open(dir.path().join("cache")).unwrap();
    let tree = db.open_tree("entries").unwrap();
    let config = test_config(limit);
    let cache = TieredCache::new(tree, &config.cache);
    (CommentEngine::new(cache, chain, config), dir)
}

fn entry(strategy: Arc<StubComments>, use_proxy: bool) -> ChainEntry {
    ChainEntry {
        strategy,
        use_proxy,
    }
}

fn comments(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("comment {}", i)).collect()
}

#[tokio::test]
async fn test_chain_takes_first_non_empty_result() {
    let direct = StubComments::new("downloader", Behavior::Empty);
    let proxied = StubComments::new("downloader", Behavior::List(comments(7)));
    let extractor = StubComments::new("extractor", Behavior::List(comments(3)));

    let (engine, _dir) = build_engine(
        vec![
            entry(direct.clone(), false),
            entry(proxied.clone(), true),
            entry(extractor.clone(), false),
        ],
        50,
    );
    let video_id = extract_video_id("BBBBBBBBBBB").unwrap();

    let outcome = engine.get(&video_id).await;
    assert_eq!(outcome.comments, comments(7));
    assert!(outcome.warning.is_none());

    // The chain stopped at the first non-empty result.
    assert_eq!(direct.call_count(), 1);
    assert_eq!(proxied.call_count(), 1);
    assert_eq!(extractor.call_count(), 0);
}

#[tokio::test]
async fn test_permanent_block_short_circuits_and_warns() {
    let blocked = StubComments::new("extractor", Behavior::Block);
    let never_reached = StubComments::new("extractor", Behavior::List(comments(5)));

    let (engine, _dir) = build_engine(
        vec![entry(blocked.clone(), false), entry(never_reached.clone(), true)],
        50,
    );
    let video_id = extract_video_id("CCCCCCCCCCC").unwrap();

    let outcome = engine.get(&video_id).await;
    assert!(outcome.comments.is_empty());
    assert_eq!(outcome.warning.as_deref(), Some(BLOCK_WARNING));
    assert_eq!(never_reached.call_count(), 0);

    // The empty list is cached: a repeat request makes no further attempts
    // and the warning is not replayed.
    let repeat = engine.get(&video_id).await;
    assert!(repeat.comments.is_empty());
    assert!(repeat.warning.is_none());
    assert_eq!(blocked.call_count(), 1);
}

#[tokio::test]
async fn test_blocked_empty_list_expires_on_short_schedule() {
    let blocked = StubComments::new("extractor", Behavior::Block);
    let (engine, _dir) = build_engine(vec![entry(blocked.clone(), false)], 50);
    let video_id = extract_video_id("CCCCCCCCCCC").unwrap();

    engine.get(&video_id).await;
    assert_eq!(blocked.call_count(), 1);

    // negative_ttl is 1s in the test config; the entry expires and the
    // chain runs again.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    engine.get(&video_id).await;
    assert_eq!(blocked.call_count(), 2);
}

#[tokio::test]
async fn test_failures_fall_through_to_next_strategy() {
    let failing = StubComments::new("downloader", Behavior::Fail);
    let recovering = StubComments::new("extractor", Behavior::List(comments(2)));

    let (engine, _dir) = build_engine(
        vec![entry(failing.clone(), false), entry(recovering.clone(), false)],
        50,
    );
    let video_id = extract_video_id("BBBBBBBBBBB").unwrap();

    let outcome = engine.get(&video_id).await;
    assert_eq!(outcome.comments, comments(2));
    assert_eq!(failing.call_count(), 1);
}

#[tokio::test]
async fn test_all_empty_caches_empty_list() {
    let a = StubComments::new("downloader", Behavior::Empty);
    let b = StubComments::new("extractor", Behavior::Empty);

    let (engine, _dir) = build_engine(vec![entry(a.clone(), false), entry(b.clone(), true)], 50);
    let video_id = extract_video_id("BBBBBBBBBBB").unwrap();

    let outcome = engine.get(&video_id).await;
    assert!(outcome.comments.is_empty());
    assert!(outcome.warning.is_none());

    // An empty comment section is a valid, cached result.
    engine.get(&video_id).await;
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn test_result_truncated_to_limit() {
    let many = StubComments::new("downloader", Behavior::List(comments(60)));
    let (engine, _dir) = build_engine(vec![entry(many, false)], 50);
    let video_id = extract_video_id("BBBBBBBBBBB").unwrap();

    let outcome = engine.get(&video_id).await;
    assert_eq!(outcome.comments.len(), 50);
    assert_eq!(outcome.comments[0], "comment 0");
}
