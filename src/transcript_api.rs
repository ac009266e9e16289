//! Primary transcript adapter.
//!
//! The highest-fidelity path: fetch the watch page, extract the player
//! response, assert playability, build the track manifest, and walk the
//! selection ladder until a track yields text. This is the only transcript
//! adapter the orchestrator routes through proxy providers.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::caption_parser;
use crate::errors::{TranscriptUnavailable, UnavailabilityReason};
use crate::js_var_parser::JsVarParser;
use crate::models::{TranscriptPayload, TranscriptSnippet};
use crate::page_fetcher::PageFetcher;
use crate::playability::PlayabilityAsserter;
use crate::strategy::{FetchFlags, ProxiedTranscriptStrategy, TranscriptStrategy};
use crate::track_list::{TrackCandidate, TrackList};

pub struct PrimaryApiAdapter {
    page_fetcher: PageFetcher,
    direct_client: Client,
}

impl PrimaryApiAdapter {
    pub fn new(direct_client: Client) -> Self {
        Self {
            page_fetcher: PageFetcher::new(),
            direct_client,
        }
    }

    /// Test seam: redirect the watch-page URL.
    pub fn with_page_fetcher(page_fetcher: PageFetcher, direct_client: Client) -> Self {
        Self {
            page_fetcher,
            direct_client,
        }
    }

    /// Run the full pipeline over a specific client. The provider loop
    /// calls this with each provider's client; the plain strategy fetch
    /// uses the direct client.
    async fn run_pipeline(
        &self,
        client: &Client,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        let html = self.page_fetcher.fetch_video_page(client, video_id).await?;
        let player_response = JsVarParser::new("ytInitialPlayerResponse").parse(&html, video_id)?;
        PlayabilityAsserter::assert_playability(&player_response, video_id)?;

        let captions = TrackList::extract_captions_data(&player_response, video_id)?;
        let track_list = TrackList::build(video_id.to_string(), &captions);
        if track_list.is_empty() {
            return Ok(None);
        }

        let manifest = track_list.manifest();
        for candidate in track_list.select_candidates(languages, flags) {
            match self.fetch_candidate(client, video_id, &candidate).await {
                Ok(Some((text, snippets))) => {
                    debug!(
                        video_id,
                        language = %candidate.language_code,
                        rung = candidate.rung,
                        "caption track fetched"
                    );
                    return Ok(Some(TranscriptPayload::new(
                        text,
                        candidate.language_code,
                        candidate.language_label,
                        candidate.is_generated,
                        manifest,
                        Some(snippets),
                    )));
                }
                Ok(None) => continue,
                Err(e) => {
                    debug!(
                        video_id,
                        language = %candidate.language_code,
                        rung = candidate.rung,
                        error = %e,
                        "caption track fetch failed, trying next candidate"
                    );
                    continue;
                }
            }
        }

        Ok(None)
    }

    async fn fetch_candidate(
        &self,
        client: &Client,
        video_id: &str,
        candidate: &TrackCandidate,
    ) -> Result<Option<(String, Vec<TranscriptSnippet>)>, TranscriptUnavailable> {
        let response = client.get(&candidate.url).send().await.map_err(|e| {
            TranscriptUnavailable::new(video_id, UnavailabilityReason::RequestFailed(e.to_string()))
        })?;

        if !response.status().is_success() {
            return Err(TranscriptUnavailable::new(
                video_id,
                UnavailabilityReason::RequestFailed(format!(
                    "caption endpoint returned status code: {}",
                    response.status()
                )),
            ));
        }

        let raw = response.text().await.map_err(|e| {
            TranscriptUnavailable::new(video_id, UnavailabilityReason::RequestFailed(e.to_string()))
        })?;

        let snippets = caption_parser::parse_timed_xml(&raw).map_err(|e| {
            TranscriptUnavailable::new(
                video_id,
                UnavailabilityReason::DataUnparsable(e.to_string()),
            )
        })?;

        let text = caption_parser::join_snippets(&snippets);
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some((text, snippets)))
    }
}

#[async_trait]
impl TranscriptStrategy for PrimaryApiAdapter {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        self.run_pipeline(&self.direct_client, video_id, languages, flags)
            .await
    }

    fn name(&self) -> &'static str {
        "watch-page-api"
    }

    fn supports_proxy(&self) -> bool {
        true
    }
}

#[async_trait]
impl ProxiedTranscriptStrategy for PrimaryApiAdapter {
    async fn fetch_with_client(
        &self,
        client: &Client,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        self.run_pipeline(client, video_id, languages, flags).await
    }
}
