//! Comment acquisition engine.
//!
//! Strictly serial fallback chain: downloader direct, downloader proxied,
//! extractor direct, extractor proxied. The first non-empty list wins. A
//! permanent block short-circuits the chain, caches an empty list on the
//! short schedule, and surfaces an advisory warning to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::cache::{CacheEntry, TieredCache};
use crate::config::CommentConfig;
use crate::errors::CommentError;
use crate::models::CommentOutcome;
use crate::single_flight::{self, FlightRole, SingleFlight};
use crate::strategy::CommentStrategy;
use crate::video_id::VideoId;

/// Warning attached when a permanent block ended the chain.
pub const BLOCK_WARNING: &str = "YouTube is temporarily blocking comments for this video.";

/// Warning attached when every strategy failed with an internal error.
pub const FAILURE_WARNING: &str = "Comments could not be fetched due to a technical issue.";

/// Upper bound on any single strategy attempt, over and above the
/// adapters' own socket timeouts.
const ATTEMPT_BOUND: Duration = Duration::from_secs(20);

/// One entry in the fallback chain: a strategy plus whether this pass
/// routes through the proxy gateway.
pub struct ChainEntry {
    pub strategy: Arc<dyn CommentStrategy>,
    pub use_proxy: bool,
}

impl ChainEntry {
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.strategy.name(),
            if self.use_proxy { "with proxy" } else { "no proxy" }
        )
    }
}

pub struct CommentEngine {
    cache: TieredCache<Vec<String>>,
    flights: SingleFlight,
    chain: Vec<ChainEntry>,
    config: CommentConfig,
}

impl CommentEngine {
    pub fn new(
        cache: TieredCache<Vec<String>>,
        chain: Vec<ChainEntry>,
        config: CommentConfig,
    ) -> Self {
        Self {
            cache,
            flights: SingleFlight::new(),
            chain,
            config,
        }
    }

    /// Acquire up to the configured number of top-level comments. Never
    /// fails: an empty list (with an optional warning) is a valid result.
    pub async fn get(&self, video_id: &VideoId) -> CommentOutcome {
        let key = video_id.as_str().to_string();

        let mut waits = 0u32;
        loop {
            if let Some(entry) = self.cache.get(&key).await {
                info!(video_id = %video_id, cache = "hit", "comments served from cache");
                return Self::from_entry(entry);
            }

            match self.flights.join(&key) {
                FlightRole::Leader(guard) => {
                    let outcome = self.lead(&key, video_id).await;
                    drop(guard);
                    return outcome;
                }
                FlightRole::Follower(rx) => {
                    // Re-elect after the wait: a dead leader's entry is gone,
                    // so exactly one waiting follower takes over.
                    waits += 1;
                    if waits > 2 {
                        warn!(video_id = %video_id, "comment leader still in flight after repeated waits");
                        return CommentOutcome {
                            comments: Vec::new(),
                            warning: Some(FAILURE_WARNING.to_string()),
                        };
                    }
                    single_flight::wait_for_leader(rx, self.config.inflight_wait).await;
                }
            }
        }
    }

    fn from_entry(entry: CacheEntry<Vec<String>>) -> CommentOutcome {
        match entry {
            CacheEntry::Value(comments) => CommentOutcome {
                comments,
                warning: None,
            },
            // Comments never write the negative marker; treat a stray one
            // as an empty list.
            CacheEntry::NotAvailable => CommentOutcome::default(),
        }
    }

    async fn lead(&self, key: &str, video_id: &VideoId) -> CommentOutcome {
        let workflow_start = Instant::now();

        for entry in &self.chain {
            let label = entry.label();
            let started = Instant::now();

            let result = tokio::time::timeout(
                ATTEMPT_BOUND,
                entry.strategy.fetch(video_id.as_str(), entry.use_proxy),
            )
            .await
            .unwrap_or_else(|_| {
                Err(CommentError::Failed(format!(
                    "attempt exceeded {}s bound",
                    ATTEMPT_BOUND.as_secs()
                )))
            });

            match result {
                Ok(comments) if !comments.is_empty() => {
                    let mut comments = comments;
                    comments.truncate(self.config.limit);
                    info!(
                        video_id = %video_id,
                        step = %label,
                        count = comments.len(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        workflow_ms = workflow_start.elapsed().as_millis() as u64,
                        "comment strategy succeeded"
                    );
                    self.cache.put(key, comments.clone()).await;
                    return CommentOutcome {
                        comments,
                        warning: None,
                    };
                }
                Ok(_) => {
                    info!(
                        video_id = %video_id,
                        step = %label,
                        result = "empty",
                        duration_ms = started.elapsed().as_millis() as u64,
                        "comment strategy returned nothing"
                    );
                }
                Err(CommentError::PermanentBlock(reason)) => {
                    warn!(
                        video_id = %video_id,
                        step = %label,
                        reason = %reason,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "permanent comment block detected, stopping chain"
                    );
                    self.cache.put_short(key, Vec::new()).await;
                    return CommentOutcome {
                        comments: Vec::new(),
                        warning: Some(BLOCK_WARNING.to_string()),
                    };
                }
                Err(CommentError::Failed(e)) => {
                    warn!(
                        video_id = %video_id,
                        step = %label,
                        error = %e,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "comment strategy failed"
                    );
                }
            }
        }

        warn!(
            video_id = %video_id,
            workflow_ms = workflow_start.elapsed().as_millis() as u64,
            "all comment strategies failed"
        );
        self.cache.put(key, Vec::new()).await;
        CommentOutcome::default()
    }
}
