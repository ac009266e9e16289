//! # tubetext
//!
//! A resilient acquisition service for YouTube transcripts and comments.
//!
//! Given a video identifier, the service returns the best available
//! transcript in a caller-preferred language and a bounded sample of
//! top-level comments. YouTube exposes no stable public API for either, so
//! the interesting machinery is the fallback pipeline behind the two
//! endpoints:
//!
//! - **Ordered strategy adapters**: a watch-page adapter, the unofficial
//!   timedtext endpoint, and a subprocess extractor for transcripts; an
//!   innertube continuation walker and the extractor for comments.
//! - **Proxy provider pool**: fixed ordered providers with failure
//!   accounting and cooldown, consulted by the primary transcript path.
//! - **Two-tier cache**: a bounded TTL memory tier over an embedded
//!   persistent store, with short-TTL negative entries.
//! - **Single-flight coordination**: at most one concurrent acquisition
//!   per cache key; concurrent requesters share the leader's result.
//!
//! ## Serving
//!
//! The `tubetext` binary wires everything into an axum router:
//!
//! ```text
//! GET /transcript?videoId=dQw4w9WgXcQ&languages=es,pt
//! GET /comments?videoId=dQw4w9WgXcQ
//! GET /healthz
//! ```
//!
//! ## Library use
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tubetext::config::Settings;
//! use tubetext::state::AppState;
//! use tubetext::strategy::FetchFlags;
//! use tubetext::{extract_video_id, language};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env();
//! let state = Arc::new(AppState::new(&settings)?);
//!
//! let video_id = extract_video_id("https://youtu.be/dQw4w9WgXcQ").ok_or("bad id")?;
//! let prefs = language::resolve_preferences(None, None, &settings.transcript.default_langs);
//!
//! let transcript = state
//!     .transcripts
//!     .get(&video_id, &prefs, FetchFlags::default())
//!     .await?;
//! println!("[{}] {}", transcript.language.code, transcript.text);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod caption_parser;
pub mod comment_downloader;
pub mod comment_engine;
pub mod config;
pub mod consent;
pub mod errors;
pub mod http;
pub mod http_client;
pub mod js_var_parser;
pub mod language;
pub mod models;
pub mod page_fetcher;
pub mod playability;
pub mod provider_pool;
pub mod proxies;
pub mod single_flight;
pub mod state;
pub mod strategy;
pub mod timedtext;
pub mod track_list;
pub mod transcript_api;
pub mod transcript_engine;
pub mod video_id;
pub mod ytdlp;

#[cfg(test)]
mod tests;

pub use cache::{CacheEntry, TieredCache};
pub use comment_engine::CommentEngine;
pub use errors::{CommentError, TranscriptUnavailable, UnavailabilityReason};
pub use models::{
    CaptionTrack, CommentOutcome, TranscriptLanguage, TranscriptPayload, TranscriptSnippet,
};
pub use provider_pool::{ProviderPool, ProxyProvider};
pub use proxies::{GenericProxyConfig, InvalidProxyConfig, ProxyConfig, WebshareProxyConfig};
pub use single_flight::SingleFlight;
pub use strategy::{CommentStrategy, FetchFlags, TranscriptStrategy};
pub use transcript_engine::TranscriptEngine;
pub use video_id::{extract_video_id, is_valid_video_id, VideoId};
