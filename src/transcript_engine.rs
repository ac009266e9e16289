//! Transcript acquisition engine.
//!
//! Wires the cache, single-flight coordination, the proxy provider pool,
//! and the strategy adapters into the request-facing flow: cache lookup,
//! leader election on miss, the proxied primary loop, then the two-way
//! direct parallel fallback under a shared deadline. First non-empty
//! result fills both cache tiers and wakes any followers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{info, warn};

use crate::cache::{CacheEntry, TieredCache};
use crate::config::TranscriptConfig;
use crate::errors::{TranscriptUnavailable, UnavailabilityReason};
use crate::language::LanguagePreferences;
use crate::models::TranscriptPayload;
use crate::provider_pool::ProviderPool;
use crate::single_flight::{self, FlightRole, SingleFlight};
use crate::strategy::{FetchFlags, ProxiedTranscriptStrategy, TranscriptStrategy};
use crate::video_id::VideoId;

pub struct TranscriptEngine {
    cache: TieredCache<TranscriptPayload>,
    flights: SingleFlight,
    pool: Arc<ProviderPool>,
    primary: Arc<dyn ProxiedTranscriptStrategy>,
    /// Direct-only strategies raced in the parallel fallback stage
    fallbacks: Vec<Arc<dyn TranscriptStrategy>>,
    config: TranscriptConfig,
}

impl TranscriptEngine {
    pub fn new(
        cache: TieredCache<TranscriptPayload>,
        pool: Arc<ProviderPool>,
        primary: Arc<dyn ProxiedTranscriptStrategy>,
        fallbacks: Vec<Arc<dyn TranscriptStrategy>>,
        config: TranscriptConfig,
    ) -> Self {
        Self {
            cache,
            flights: SingleFlight::new(),
            pool,
            primary,
            fallbacks,
            config,
        }
    }

    /// Acquire a transcript for `video_id` under the resolved preferences.
    ///
    /// Cache hits (either tier, including the negative marker) return
    /// immediately; on miss exactly one concurrent requester per cache key
    /// drives the fallback chain while the rest wait for its result.
    pub async fn get(
        &self,
        video_id: &VideoId,
        prefs: &LanguagePreferences,
        flags: FetchFlags,
    ) -> Result<TranscriptPayload, TranscriptUnavailable> {
        let key = prefs.cache_key(video_id.as_str());

        let mut waits = 0u32;
        loop {
            if let Some(entry) = self.cache.get(&key).await {
                info!(video_id = %video_id, cache = "hit", "transcript served from cache");
                return self.respond(video_id, prefs, entry);
            }

            match self.flights.join(&key) {
                FlightRole::Leader(guard) => {
                    let result = self.lead(&key, video_id, prefs, &flags).await;
                    drop(guard);
                    return result;
                }
                FlightRole::Follower(rx) => {
                    // Re-entering the loop after the wait re-reads the cache
                    // and re-elects: if the leader died, exactly one waiting
                    // follower wins the next registration.
                    waits += 1;
                    if waits > 2 {
                        warn!(video_id = %video_id, "leader still in flight after repeated waits");
                        return Err(self.not_found(video_id, prefs));
                    }
                    single_flight::wait_for_leader(rx, self.config.inflight_wait).await;
                }
            }
        }
    }

    fn respond(
        &self,
        video_id: &VideoId,
        prefs: &LanguagePreferences,
        entry: CacheEntry<TranscriptPayload>,
    ) -> Result<TranscriptPayload, TranscriptUnavailable> {
        match entry {
            CacheEntry::Value(payload) => Ok(payload),
            CacheEntry::NotAvailable => Err(self.not_found(video_id, prefs)),
        }
    }

    fn not_found(&self, video_id: &VideoId, prefs: &LanguagePreferences) -> TranscriptUnavailable {
        TranscriptUnavailable::new(
            video_id.as_str(),
            UnavailabilityReason::NoTranscriptFound {
                requested_language_codes: prefs.base_codes.clone(),
            },
        )
    }

    /// Drive the acquisition as leader (or promoted follower), with one
    /// retry after a transient network failure.
    async fn lead(
        &self,
        key: &str,
        video_id: &VideoId,
        prefs: &LanguagePreferences,
        flags: &FetchFlags,
    ) -> Result<TranscriptPayload, TranscriptUnavailable> {
        let mut attempt = 0u32;
        loop {
            match self.orchestrate(video_id, &prefs.expanded, flags).await {
                Ok(Some(payload)) => {
                    self.cache.put(key, payload.clone()).await;
                    return Ok(payload);
                }
                Ok(None) => {
                    self.cache.put_negative(key).await;
                    return Err(self.not_found(video_id, prefs));
                }
                Err(e) if e.is_transient() && attempt == 0 => {
                    attempt += 1;
                    warn!(video_id = %video_id, error = %e, "transient failure, retrying once");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => {
                    warn!(video_id = %video_id, error = %e, "transcript unavailable after retry");
                    return Err(self.not_found(video_id, prefs));
                }
            }
        }
    }

    /// The fallback chain: primary adapter through every selected proxy
    /// provider (direct once when none are configured), then the remaining
    /// strategies raced direct-only under the shared deadline.
    async fn orchestrate(
        &self,
        video_id: &VideoId,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        let workflow_start = Instant::now();
        let mut transient: Option<TranscriptUnavailable> = None;

        let providers = self.pool.select();
        if providers.is_empty() {
            let started = Instant::now();
            let attempt = tokio::time::timeout(
                self.config.proxy_attempt_timeout,
                self.primary.fetch(video_id.as_str(), languages, flags),
            )
            .await;
            match attempt {
                Ok(Ok(Some(payload))) => {
                    info!(
                        video_id = %video_id,
                        method = "watch-page-api",
                        proxy = "direct",
                        duration_ms = started.elapsed().as_millis() as u64,
                        text_len = payload.text.len(),
                        "transcript strategy succeeded"
                    );
                    return Ok(Some(payload));
                }
                Ok(Ok(None)) => {
                    info!(video_id = %video_id, method = "watch-page-api", proxy = "direct", result = "empty", "transcript strategy empty");
                }
                Ok(Err(e)) => {
                    warn!(video_id = %video_id, method = "watch-page-api", proxy = "direct", reason = e.kind(), error = %e, "transcript strategy failed");
                    if e.is_transient() {
                        transient = Some(e);
                    }
                }
                Err(_) => {
                    warn!(video_id = %video_id, method = "watch-page-api", proxy = "direct", result = "timeout", "transcript strategy timed out");
                }
            }
        } else {
            for provider in providers {
                for attempt in 1..=self.config.attempts_per_provider {
                    let started = Instant::now();
                    let result = tokio::time::timeout(
                        self.config.proxy_attempt_timeout,
                        self.primary.fetch_with_client(
                            provider.client(),
                            video_id.as_str(),
                            languages,
                            flags,
                        ),
                    )
                    .await;

                    match result {
                        Ok(Ok(Some(payload))) => {
                            provider.record_success();
                            info!(
                                video_id = %video_id,
                                method = "watch-page-api",
                                provider = provider.name,
                                attempt,
                                duration_ms = started.elapsed().as_millis() as u64,
                                text_len = payload.text.len(),
                                "transcript strategy succeeded via proxy"
                            );
                            return Ok(Some(payload));
                        }
                        Ok(Ok(None)) => {
                            let cooled = provider.record_failure();
                            info!(
                                video_id = %video_id,
                                method = "watch-page-api",
                                provider = provider.name,
                                attempt,
                                result = "empty",
                                entered_cooldown = cooled,
                                "transcript strategy empty via proxy"
                            );
                        }
                        Ok(Err(e)) => {
                            let cooled = provider.record_failure();
                            warn!(
                                video_id = %video_id,
                                method = "watch-page-api",
                                provider = provider.name,
                                attempt,
                                reason = e.kind(),
                                entered_cooldown = cooled,
                                error = %e,
                                "transcript strategy failed via proxy"
                            );
                        }
                        Err(_) => {
                            let cooled = provider.record_failure();
                            warn!(
                                video_id = %video_id,
                                method = "watch-page-api",
                                provider = provider.name,
                                attempt,
                                result = "timeout",
                                entered_cooldown = cooled,
                                "transcript strategy timed out via proxy"
                            );
                        }
                    }
                }
            }
        }

        // Parallel fallback: remaining strategies race direct-only; the
        // first non-empty payload wins and the losers are dropped.
        let deadline = tokio::time::Instant::now() + self.config.parallel_deadline;
        let mut futures = FuturesUnordered::new();
        for strategy in &self.fallbacks {
            let strategy = Arc::clone(strategy);
            let video_id = video_id.as_str().to_string();
            let languages = languages.to_vec();
            let flags = *flags;
            futures.push(
                async move {
                    let started = Instant::now();
                    let result = strategy.fetch(&video_id, &languages, &flags).await;
                    (strategy.name(), started.elapsed(), result)
                }
                .boxed(),
            );
        }

        loop {
            match tokio::time::timeout_at(deadline, futures.next()).await {
                Ok(Some((name, elapsed, Ok(Some(payload))))) => {
                    info!(
                        video_id = %video_id,
                        method = name,
                        proxy = "direct",
                        duration_ms = elapsed.as_millis() as u64,
                        text_len = payload.text.len(),
                        workflow_ms = workflow_start.elapsed().as_millis() as u64,
                        "transcript strategy succeeded"
                    );
                    return Ok(Some(payload));
                }
                Ok(Some((name, elapsed, Ok(None)))) => {
                    info!(
                        video_id = %video_id,
                        method = name,
                        result = "empty",
                        duration_ms = elapsed.as_millis() as u64,
                        "transcript strategy empty"
                    );
                }
                Ok(Some((name, elapsed, Err(e)))) => {
                    warn!(
                        video_id = %video_id,
                        method = name,
                        reason = e.kind(),
                        duration_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "transcript strategy failed"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        video_id = %video_id,
                        deadline_ms = self.config.parallel_deadline.as_millis() as u64,
                        "parallel fallback deadline exceeded"
                    );
                    break;
                }
            }
        }

        warn!(
            video_id = %video_id,
            workflow_ms = workflow_start.elapsed().as_millis() as u64,
            "all transcript strategies failed"
        );
        match transient {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
