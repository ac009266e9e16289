//! Strategy adapter contracts.
//!
//! Every path to a transcript or comment list is an adapter with the same
//! shape; the orchestrators are written against these traits and only
//! differ in the adapter list and serial-versus-parallel execution.

use async_trait::async_trait;

use crate::errors::{CommentError, TranscriptUnavailable};
use crate::models::TranscriptPayload;

/// Caller options threaded through the transcript orchestrator as one
/// immutable record.
#[derive(Debug, Clone, Copy)]
pub struct FetchFlags {
    /// Prefer the video's original track over language matching
    pub prefer_original: bool,

    /// Only ever return a requested language; disables the any-track and
    /// original-first rungs
    pub strict_languages: bool,

    /// Permit translated renditions as a last resort
    pub allow_translate: bool,
}

impl Default for FetchFlags {
    fn default() -> Self {
        Self {
            prefer_original: true,
            strict_languages: false,
            allow_translate: false,
        }
    }
}

/// One path to a transcript. `Ok(None)` means the source answered but had
/// nothing usable; errors carry the classification the orchestrator logs
/// and accounts against providers.
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable>;

    /// Stable name for telemetry events.
    fn name(&self) -> &'static str;

    /// Whether the adapter can route through a proxy at all.
    fn supports_proxy(&self) -> bool {
        false
    }
}

/// A transcript strategy the orchestrator can route through arbitrary
/// clients, one per proxy provider. The plain `fetch` goes direct.
#[async_trait]
pub trait ProxiedTranscriptStrategy: TranscriptStrategy {
    async fn fetch_with_client(
        &self,
        client: &reqwest::Client,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable>;
}

/// One path to a comment list. An empty vector means "nothing obtained,
/// try the next strategy"; `CommentError::PermanentBlock` stops the chain.
#[async_trait]
pub trait CommentStrategy: Send + Sync {
    async fn fetch(&self, video_id: &str, use_proxy: bool) -> Result<Vec<String>, CommentError>;

    fn name(&self) -> &'static str;
}
