//! Comment downloader adapter.
//!
//! Walks the watch page's innertube continuation chain for top-level
//! comments: extract `ytInitialData` and the API key from the page, find
//! the comment section's continuation token, then page the `next` endpoint
//! until the limit is reached. Both the classic `commentRenderer` shape and
//! the newer `commentEntityPayload` shape are understood.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::CommentError;
use crate::js_var_parser::JsVarParser;
use crate::strategy::CommentStrategy;

const DEFAULT_CLIENT_VERSION: &str = "2.20240701.00.00";

/// Pages fetched per request are bounded independently of the comment
/// count, so a malformed continuation chain cannot loop.
const MAX_PAGES: usize = 10;

pub struct CommentDownloader {
    direct_client: Client,
    gateway_client: Option<Client>,
    watch_url: String,
    api_base: String,
    limit: usize,
    max_fetch: usize,
}

impl CommentDownloader {
    pub fn new(
        direct_client: Client,
        gateway_client: Option<Client>,
        limit: usize,
        max_fetch: usize,
    ) -> Self {
        Self {
            direct_client,
            gateway_client,
            watch_url: "https://www.youtube.com/watch?v={video_id}".to_string(),
            api_base: "https://www.youtube.com".to_string(),
            limit,
            max_fetch,
        }
    }

    /// Test seam: redirect both the watch page and the API endpoint.
    pub fn with_endpoints(mut self, watch_url: String, api_base: String) -> Self {
        self.watch_url = watch_url;
        self.api_base = api_base;
        self
    }

    async fn fetch_page(&self, client: &Client, video_id: &str) -> Result<String, CommentError> {
        let url = self.watch_url.replace("{video_id}", video_id);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| CommentError::Failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CommentError::Failed(format!(
                "watch page returned status code: {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| CommentError::Failed(e.to_string()))
    }

    async fn run(&self, client: &Client, video_id: &str) -> Result<Vec<String>, CommentError> {
        let html = self.fetch_page(client, video_id).await?;

        let api_key = extract_string(&html, r#""INNERTUBE_API_KEY":"([^"]+)""#)
            .ok_or_else(|| CommentError::Failed("no API key on watch page".to_string()))?;
        let client_version = extract_string(&html, r#""INNERTUBE_CONTEXT_CLIENT_VERSION":"([^"]+)""#)
            .unwrap_or_else(|| DEFAULT_CLIENT_VERSION.to_string());

        let initial_data = JsVarParser::new("ytInitialData")
            .parse(&html, video_id)
            .map_err(|e| CommentError::Failed(e.to_string()))?;

        let mut token = comment_section_token(&initial_data)
            .ok_or_else(|| CommentError::Failed("no comment continuation on watch page".to_string()))?;

        let mut comments: Vec<String> = Vec::new();
        let mut pulled = 0usize;

        for _page in 0..MAX_PAGES {
            let url = format!("{}/youtubei/v1/next?key={}", self.api_base, api_key);
            let body = json!({
                "context": {"client": {"clientName": "WEB", "clientVersion": client_version}},
                "continuation": token,
            });

            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| CommentError::Failed(e.to_string()))?;
            if !response.status().is_success() {
                return Err(CommentError::Failed(format!(
                    "continuation endpoint returned status code: {}",
                    response.status()
                )));
            }
            let page: Value = response
                .json()
                .await
                .map_err(|e| CommentError::Failed(e.to_string()))?;

            let page_comments = collect_comment_texts(&page);
            if page_comments.is_empty() {
                break;
            }
            for text in page_comments {
                pulled += 1;
                if !text.is_empty() {
                    comments.push(text);
                }
                if comments.len() >= self.limit || pulled >= self.max_fetch {
                    return Ok(comments);
                }
            }

            match next_page_token(&page) {
                Some(next) => token = next,
                None => break,
            }
        }

        Ok(comments)
    }
}

#[async_trait]
impl CommentStrategy for CommentDownloader {
    async fn fetch(&self, video_id: &str, use_proxy: bool) -> Result<Vec<String>, CommentError> {
        let client = if use_proxy {
            match &self.gateway_client {
                Some(client) => client,
                // Nothing to rotate through; skip rather than repeat the
                // direct attempt.
                None => return Ok(Vec::new()),
            }
        } else {
            &self.direct_client
        };

        let result = self.run(client, video_id).await;
        if let Ok(comments) = &result {
            debug!(video_id, count = comments.len(), use_proxy, "comment downloader finished");
        }
        result
    }

    fn name(&self) -> &'static str {
        "comment-downloader"
    }
}

fn extract_string(html: &str, pattern: &str) -> Option<String> {
    let re = regex::Regex::new(pattern).ok()?;
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// The comment section's initial continuation token: look for the
/// dedicated item section first, then fall back to any continuation under
/// the engagement panels.
fn comment_section_token(initial_data: &Value) -> Option<String> {
    if let Some(section) = find_object(initial_data, &|obj| {
        obj.get("sectionIdentifier")
            .and_then(|s| s.as_str())
            .map(|s| s == "comment-item-section")
            .unwrap_or(false)
    }) {
        if let Some(token) = first_continuation_token(section) {
            return Some(token);
        }
    }

    initial_data
        .get("engagementPanels")
        .and_then(first_continuation_token)
}

/// Depth-first search for the first object matching `predicate`.
fn find_object<'a>(value: &'a Value, predicate: &dyn Fn(&Value) -> bool) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if predicate(value) {
                return Some(value);
            }
            map.values().find_map(|v| find_object(v, predicate))
        }
        Value::Array(items) => items.iter().find_map(|v| find_object(v, predicate)),
        _ => None,
    }
}

fn first_continuation_token(value: &Value) -> Option<String> {
    let command = find_object(value, &|obj| obj.get("continuationCommand").is_some())?;
    command
        .get("continuationCommand")
        .and_then(|c| c.get("token"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
}

/// Gather comment bodies from one continuation response, covering both the
/// renderer and the entity-payload response shapes.
fn collect_comment_texts(page: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_into(page, &mut out);
    out
}

fn collect_into(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(renderer) = map.get("commentRenderer") {
                if let Some(runs) = renderer
                    .get("contentText")
                    .and_then(|c| c.get("runs"))
                    .and_then(|r| r.as_array())
                {
                    let text: String = runs
                        .iter()
                        .filter_map(|r| r.get("text").and_then(|t| t.as_str()))
                        .collect();
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
            }
            if let Some(payload) = map.get("commentEntityPayload") {
                if let Some(text) = payload
                    .get("properties")
                    .and_then(|p| p.get("content"))
                    .and_then(|c| c.get("content"))
                    .and_then(|t| t.as_str())
                {
                    if !text.is_empty() {
                        out.push(text.to_string());
                    }
                }
            }
            for v in map.values() {
                collect_into(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_into(v, out);
            }
        }
        _ => {}
    }
}

/// Page-level continuation for the next batch, if any. Reply-thread
/// continuations live under `commentRepliesRenderer` and are skipped.
fn next_page_token(page: &Value) -> Option<String> {
    let item = find_object(page, &|obj| {
        obj.get("continuationItemRenderer")
            .map(|r| r.get("continuationEndpoint").is_some())
            .unwrap_or(false)
    })?;
    first_continuation_token(item.get("continuationItemRenderer")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comment_section_token_via_item_section() {
        let data = json!({"contents": {"results": [{"itemSectionRenderer": true,
            "sectionIdentifier": "comment-item-section",
            "contents": [{"continuationItemRenderer": {"continuationEndpoint":
                {"continuationCommand": {"token": "tok123"}}}}]}]}});
        assert_eq!(comment_section_token(&data).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_comment_section_token_missing() {
        let data = json!({"contents": {}});
        assert_eq!(comment_section_token(&data), None);
    }

    #[test]
    fn test_collect_comment_texts_renderer_shape() {
        let page = json!({"onResponseReceivedEndpoints": [{"appendContinuationItemsAction":
            {"continuationItems": [
                {"commentThreadRenderer": {"comment": {"commentRenderer":
                    {"contentText": {"runs": [{"text": "first "}, {"text": "comment"}]}}}}},
                {"commentThreadRenderer": {"comment": {"commentRenderer":
                    {"contentText": {"runs": [{"text": "second"}]}}}}}
            ]}}]});
        assert_eq!(collect_comment_texts(&page), vec!["first comment", "second"]);
    }

    #[test]
    fn test_collect_comment_texts_entity_payload_shape() {
        let page = json!({"frameworkUpdates": {"entityBatchUpdate": {"mutations": [
            {"payload": {"commentEntityPayload": {"properties": {"content": {"content": "hello"}}}}}
        ]}}});
        assert_eq!(collect_comment_texts(&page), vec!["hello"]);
    }

    #[test]
    fn test_next_page_token() {
        let page = json!({"onResponseReceivedEndpoints": [{"appendContinuationItemsAction":
            {"continuationItems": [
                {"continuationItemRenderer": {"continuationEndpoint":
                    {"continuationCommand": {"token": "next456"}}}}
            ]}}]});
        assert_eq!(next_page_token(&page).as_deref(), Some("next456"));
    }

    #[test]
    fn test_extract_api_key() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY":"AIzaKey123"});</script>"#;
        assert_eq!(
            extract_string(html, r#""INNERTUBE_API_KEY":"([^"]+)""#).as_deref(),
            Some("AIzaKey123")
        );
    }
}
