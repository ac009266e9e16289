//! Watch-page fetching.
//!
//! Fetches the upstream watch page for a video, handling the cookie consent
//! interstitial some regions serve and classifying block responses so the
//! orchestrator can account provider failures correctly.

use regex::Regex;
use reqwest::{Client, StatusCode};

use crate::errors::{TranscriptUnavailable, UnavailabilityReason};

/// The URL template for watch pages; `{video_id}` is substituted per request.
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v={video_id}";

/// Fetches watch pages over a caller-supplied client (direct or proxied).
pub struct PageFetcher {
    watch_url: String,
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self {
            watch_url: WATCH_URL.to_string(),
        }
    }
}

impl PageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base-URL override for tests.
    pub fn with_watch_url(watch_url: String) -> Self {
        Self { watch_url }
    }

    /// Fetch the watch-page HTML for `video_id`.
    ///
    /// A consent form in the response triggers one retry with an explicit
    /// consent cookie; HTTP 403/429 are classified as blocks.
    pub async fn fetch_video_page(
        &self,
        client: &Client,
        video_id: &str,
    ) -> Result<String, TranscriptUnavailable> {
        let url = self.watch_url.replace("{video_id}", video_id);

        let html = self.fetch_html(client, &url, video_id, None).await?;

        if !is_consent_page(&html) {
            return Ok(html);
        }

        // Extract the consent form token and retry once with the cookie set.
        let consent_cookie = extract_consent_value(&html)
            .map(|v| format!("CONSENT=YES+{}", v))
            .unwrap_or_else(|| "CONSENT=YES+1".to_string());

        let html = self
            .fetch_html(client, &url, video_id, Some(&consent_cookie))
            .await?;

        if is_consent_page(&html) {
            return Err(TranscriptUnavailable::new(
                video_id,
                UnavailabilityReason::RequestBlocked,
            ));
        }

        Ok(html)
    }

    async fn fetch_html(
        &self,
        client: &Client,
        url: &str,
        video_id: &str,
        cookie: Option<&str>,
    ) -> Result<String, TranscriptUnavailable> {
        let mut request = client.get(url).header("Accept-Language", "en-US");
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie.to_string());
        }

        let response = request.send().await.map_err(|e| {
            TranscriptUnavailable::new(video_id, UnavailabilityReason::RequestFailed(e.to_string()))
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                return Err(TranscriptUnavailable::new(
                    video_id,
                    UnavailabilityReason::RequestBlocked,
                ));
            }
            status => {
                return Err(TranscriptUnavailable::new(
                    video_id,
                    UnavailabilityReason::RequestFailed(format!(
                        "upstream returned status code: {}",
                        status
                    )),
                ));
            }
        }

        response.text().await.map_err(|e| {
            TranscriptUnavailable::new(video_id, UnavailabilityReason::RequestFailed(e.to_string()))
        })
    }
}

fn is_consent_page(html: &str) -> bool {
    html.contains("action=\"https://consent.youtube.com/s\"")
}

fn extract_consent_value(html: &str) -> Option<String> {
    let re = Regex::new(r#"name="v" value="(.*?)""#).ok()?;
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}
