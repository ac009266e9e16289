//! Timedtext transcript adapter.
//!
//! Talks to the unofficial caption endpoint directly: enumerate tracks via
//! the list call, then fetch VTT per language base in a fixed order
//! (manual before ASR, direct before proxied, translation last). When the
//! list call fails, falls back to brute-force fetches per base.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::caption_parser;
use crate::errors::TranscriptUnavailable;
use crate::http_client;
use crate::language;
use crate::models::{CaptionTrack, TranscriptPayload};
use crate::strategy::{FetchFlags, TranscriptStrategy};

/// The unofficial caption endpoint.
pub const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

const LIST_TIMEOUT: Duration = Duration::from_secs(6);
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

pub struct TimedtextAdapter {
    base_url: String,
    client: Client,
    /// Gateway-routed client for the proxied attempts; `None` disables them
    proxy_client: Option<Client>,
    max_langs: usize,
}

impl TimedtextAdapter {
    pub fn new(client: Client, proxy_client: Option<Client>, max_langs: usize) -> Self {
        Self {
            base_url: TIMEDTEXT_URL.to_string(),
            client,
            proxy_client,
            max_langs,
        }
    }

    /// Test seam: redirect the endpoint.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn list_tracks(&self, client: &Client, video_id: &str) -> Vec<(String, String)> {
        let result = client
            .get(&self.base_url)
            .query(&[("v", video_id), ("type", "list")])
            .timeout(LIST_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(video_id, status = %response.status(), "timedtext list returned non-success");
                return Vec::new();
            }
            Err(e) => {
                debug!(video_id, error = %e, "timedtext list request failed");
                return Vec::new();
            }
        };

        match response.text().await {
            Ok(xml) => caption_parser::parse_track_list(&xml),
            Err(e) => {
                debug!(video_id, error = %e, "timedtext list body unreadable");
                Vec::new()
            }
        }
    }

    async fn fetch_vtt(
        &self,
        client: &Client,
        video_id: &str,
        lang: &str,
        asr: bool,
        tlang: Option<&str>,
    ) -> Option<String> {
        let mut params: Vec<(&str, &str)> = vec![("v", video_id), ("fmt", "vtt"), ("lang", lang)];
        if asr {
            params.push(("kind", "asr"));
        }
        if let Some(tlang) = tlang {
            params.push(("tlang", tlang));
        }

        let accept_language = format!("{};q=1.0, en;q=0.8", lang);
        let result = client
            .get(&self.base_url)
            .query(&params)
            .header("Accept-Language", accept_language)
            .header("User-Agent", http_client::random_user_agent())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(_) => return None,
            Err(e) => {
                debug!(video_id, lang, asr, error = %e, "timedtext fetch failed");
                return None;
            }
        };

        let body = response.text().await.ok()?;
        let trimmed = body.trim();
        if trimmed.is_empty() || (trimmed.starts_with("<?xml") && trimmed.contains("<transcript/>"))
        {
            return None;
        }

        let text = caption_parser::parse_vtt(trimmed);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn clients(&self) -> Vec<(&Client, bool)> {
        let mut out: Vec<(&Client, bool)> = vec![(&self.client, false)];
        if let Some(proxy_client) = &self.proxy_client {
            out.push((proxy_client, true));
        }
        out
    }

    /// The full discovery-then-fetch ladder for one request.
    pub async fn try_languages(
        &self,
        video_id: &str,
        languages: &[String],
        allow_translate: bool,
    ) -> Option<TranscriptPayload> {
        let mut base_langs = language::base_codes(languages);
        if base_langs.len() > self.max_langs {
            debug!(
                video_id,
                trimmed_from = base_langs.len(),
                trimmed_to = self.max_langs,
                "timedtext language list capped"
            );
            base_langs.truncate(self.max_langs);
        }
        if base_langs.is_empty() {
            return None;
        }

        let mut tracks = self.list_tracks(&self.client, video_id).await;
        if tracks.is_empty() {
            if let Some(proxy_client) = &self.proxy_client {
                tracks = self.list_tracks(proxy_client, video_id).await;
            }
        }

        let manifest: Vec<CaptionTrack> = tracks
            .iter()
            .map(|(code, kind)| CaptionTrack {
                code: code.clone(),
                label: code.clone(),
                is_generated: kind == "asr",
                is_translatable: false,
                base_url: String::new(),
            })
            .collect();

        if !tracks.is_empty() {
            debug!(video_id, count = tracks.len(), "timedtext tracks found");

            // Manual then ASR, direct then proxied, in requested base order.
            for (want_kind, asr) in [("manual", false), ("asr", true)] {
                for (client, proxied) in self.clients() {
                    for base in &base_langs {
                        for (code, kind) in &tracks {
                            if kind == want_kind && code.starts_with(base.as_str()) {
                                if let Some(text) =
                                    self.fetch_vtt(client, video_id, code, asr, None).await
                                {
                                    debug!(video_id, lang = %code, kind = want_kind, proxied, "timedtext success");
                                    return Some(TranscriptPayload::new(
                                        text,
                                        code.clone(),
                                        code.clone(),
                                        asr,
                                        manifest.clone(),
                                        None,
                                    ));
                                }
                            }
                        }
                    }
                }
            }

            // Translation of any manual track into the first preferred base.
            if allow_translate {
                if let Some(target) = base_langs.first() {
                    for (client, proxied) in self.clients() {
                        for (code, kind) in &tracks {
                            if kind == "manual" && !code.starts_with(target.as_str()) {
                                if let Some(text) = self
                                    .fetch_vtt(client, video_id, code, false, Some(target))
                                    .await
                                {
                                    debug!(video_id, lang = %code, tlang = %target, proxied, "timedtext translation success");
                                    return Some(TranscriptPayload::new(
                                        text,
                                        target.clone(),
                                        target.clone(),
                                        false,
                                        manifest.clone(),
                                        None,
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }

        // List failed or nothing matched: brute-force per base.
        for (asr, kind) in [(false, "manual"), (true, "asr")] {
            for (client, proxied) in self.clients() {
                for base in &base_langs {
                    if let Some(text) = self.fetch_vtt(client, video_id, base, asr, None).await {
                        debug!(video_id, lang = %base, kind, proxied, "timedtext brute-force success");
                        return Some(TranscriptPayload::new(
                            text,
                            base.clone(),
                            base.clone(),
                            asr,
                            manifest.clone(),
                            None,
                        ));
                    }
                }
            }
        }

        None
    }
}

#[async_trait]
impl TranscriptStrategy for TimedtextAdapter {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        Ok(self
            .try_languages(video_id, languages, flags.allow_translate)
            .await)
    }

    fn name(&self) -> &'static str {
        "timedtext"
    }

    fn supports_proxy(&self) -> bool {
        true
    }
}
