//! Application state: engines and their wiring, built once at startup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::cache::TieredCache;
use crate::comment_downloader::CommentDownloader;
use crate::comment_engine::{ChainEntry, CommentEngine};
use crate::config::Settings;
use crate::consent;
use crate::http_client;
use crate::provider_pool::ProviderPool;
use crate::strategy::TranscriptStrategy;
use crate::timedtext::TimedtextAdapter;
use crate::transcript_api::PrimaryApiAdapter;
use crate::transcript_engine::TranscriptEngine;
use crate::ytdlp::{YtDlpCommentAdapter, YtDlpRunner, YtDlpSubtitleAdapter};

/// Timeout for the long-lived direct clients; individual attempts set
/// tighter per-request bounds.
const DIRECT_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct AppState {
    pub transcripts: TranscriptEngine,
    pub comments: CommentEngine,
    pub default_langs: Vec<String>,
    started_at: Instant,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&settings.cache_dir)
            .with_context(|| format!("creating cache dir {}", settings.cache_dir.display()))?;

        let transcript_db = sled::open(settings.cache_dir.join("transcript_cache"))
            .context("opening transcript cache store")?;
        let comment_db = sled::open(settings.cache_dir.join("comment_cache"))
            .context("opening comment cache store")?;
        let transcript_tree = transcript_db.open_tree("entries")?;
        let comment_tree = comment_db.open_tree("entries")?;

        let pool = Arc::new(ProviderPool::from_settings(
            &settings.proxy,
            &settings.transcript,
        ));
        tracing::info!(
            providers = pool.len(),
            "proxy provider pool initialized"
        );

        let direct_client = http_client::build_direct_client(DIRECT_CLIENT_TIMEOUT)
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let primary = Arc::new(PrimaryApiAdapter::new(direct_client.clone()));

        // The parallel fallback stage runs direct-only; the timedtext
        // adapter is built without a proxied client on purpose.
        let timedtext: Arc<dyn TranscriptStrategy> = Arc::new(TimedtextAdapter::new(
            direct_client.clone(),
            None,
            settings.transcript.max_timedtext_langs,
        ));

        let cookie_file = consent::resolve_cookie_file(
            settings.ytdlp.cookie_file.as_deref(),
            &settings.cache_dir,
        );
        let runner = YtDlpRunner::new(
            settings.ytdlp.bin.clone(),
            cookie_file,
            settings.ytdlp.timeout,
        );
        let ytdlp_subtitles: Arc<dyn TranscriptStrategy> =
            Arc::new(YtDlpSubtitleAdapter::new(runner.clone()));

        let transcripts = TranscriptEngine::new(
            TieredCache::new(transcript_tree, &settings.transcript.cache),
            Arc::clone(&pool),
            primary,
            vec![timedtext, ytdlp_subtitles],
            settings.transcript.clone(),
        );

        let downloader = Arc::new(CommentDownloader::new(
            direct_client,
            pool.gateway_client().cloned(),
            settings.comments.limit,
            settings.comments.max_fetch,
        ));
        let ytdlp_comments = Arc::new(YtDlpCommentAdapter::new(
            runner,
            pool.gateway_url(),
            settings.comments.max_fetch,
            settings.comments.limit,
        ));

        let chain = vec![
            ChainEntry {
                strategy: downloader.clone(),
                use_proxy: false,
            },
            ChainEntry {
                strategy: downloader,
                use_proxy: true,
            },
            ChainEntry {
                strategy: ytdlp_comments.clone(),
                use_proxy: false,
            },
            ChainEntry {
                strategy: ytdlp_comments,
                use_proxy: true,
            },
        ];

        let comments = CommentEngine::new(
            TieredCache::new(comment_tree, &settings.comments.cache),
            chain,
            settings.comments.clone(),
        );

        Ok(Self {
            transcripts,
            comments,
            default_langs: settings.transcript.default_langs.clone(),
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
