//! Subprocess extractor adapters.
//!
//! Wraps a `yt-dlp` binary for the two jobs the in-process adapters can't
//! do: robust subtitle retrieval across container formats, and comment
//! extraction with bot-challenge detection. Runs with realistic headers, a
//! consent cookie file, and a per-invocation wall-clock bound; stderr is
//! captured and scanned for known permanent-block messages.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::caption_parser;
use crate::errors::{CommentError, TranscriptUnavailable};
use crate::http_client::{self, CONSENT_COOKIE_HEADER};
use crate::models::TranscriptPayload;
use crate::strategy::{CommentStrategy, FetchFlags, TranscriptStrategy};

/// Subtitle container preference, best first.
const SUBTITLE_FORMATS: [&str; 3] = ["srv3", "vtt", "srt"];

/// Log fragments that identify a permanent comment block.
const BLOCK_NEEDLES: [&str; 2] = [
    "sign in to confirm you're not a bot",
    "sign in to confirm you\u{2019}re not a bot",
];

/// Scan captured extractor output for known bot-challenge messages.
pub fn detect_permanent_block(output: &str) -> Option<&'static str> {
    let lowered = output.to_lowercase();
    if BLOCK_NEEDLES.iter().any(|needle| lowered.contains(needle)) {
        Some("signin_required")
    } else {
        None
    }
}

/// Shared subprocess invocation plumbing.
#[derive(Clone)]
pub struct YtDlpRunner {
    bin: String,
    cookie_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpRunner {
    pub fn new(bin: String, cookie_file: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin,
            cookie_file,
            timeout,
        }
    }

    fn base_args(&self, proxy_url: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--quiet".into(),
            "--no-warnings".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--no-check-certificates".into(),
            "--retries".into(),
            "1".into(),
            "--socket-timeout".into(),
            "10".into(),
            // The iOS client avoids some web-side challenges
            "--extractor-args".into(),
            "youtube:player_client=ios".into(),
            "--user-agent".into(),
            http_client::random_user_agent().to_string(),
            "--add-headers".into(),
            "Accept-Language:en-US,en;q=0.8".into(),
            "--add-headers".into(),
            format!("Cookie:{}", CONSENT_COOKIE_HEADER),
        ];
        if let Some(cookie_file) = &self.cookie_file {
            args.push("--cookies".into());
            args.push(cookie_file.display().to_string());
        }
        if let Some(proxy_url) = proxy_url {
            args.push("--proxy".into());
            args.push(proxy_url.to_string());
        }
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<std::process::Output, String> {
        let child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {}", self.bin, e))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("extractor I/O error: {}", e)),
            Err(_) => Err(format!(
                "extractor exceeded {}s wall-clock bound",
                self.timeout.as_secs()
            )),
        }
    }

    /// Download subtitles for `video_id` into a temp dir and parse the best
    /// available container. `None` when no usable subtitle was produced.
    pub async fn fetch_subtitles(
        &self,
        video_id: &str,
        languages: &[String],
        strict_languages: bool,
        proxy_url: Option<&str>,
    ) -> Option<TranscriptPayload> {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "could not create subtitle temp dir");
                return None;
            }
        };

        // English stays a last-resort subtitle unless the caller asked for
        // a strict language set.
        let mut langs: Vec<String> = languages.to_vec();
        if !strict_languages && !langs.iter().any(|c| c == "en" || c.starts_with("en-")) {
            langs.push("en".to_string());
        }
        let mut sub_langs: Vec<String> = Vec::new();
        for code in &langs {
            sub_langs.push(format!("{}.*", code));
            sub_langs.push(code.clone());
        }

        let mut args = self.base_args(proxy_url);
        args.extend([
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            sub_langs.join(","),
            "--sub-format".to_string(),
            "srv3/vtt/srt".to_string(),
            "--paths".to_string(),
            dir.path().display().to_string(),
            "--output".to_string(),
            "%(id)s.%(ext)s".to_string(),
            format!("https://www.youtube.com/watch?v={}", video_id),
        ]);

        match self.run(args).await {
            Ok(output) => {
                if !output.status.success() {
                    debug!(
                        video_id,
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "subtitle extractor exited non-zero"
                    );
                }
            }
            Err(e) => {
                warn!(video_id, error = %e, "subtitle extractor failed");
                return None;
            }
        }

        let path = Self::best_subtitle_file(dir.path(), video_id)?;
        let raw = std::fs::read_to_string(&path).ok()?;

        let text = match path.extension().and_then(|e| e.to_str()) {
            Some("srv3") => caption_parser::parse_timed_xml(&raw)
                .map(|snippets| caption_parser::join_snippets(&snippets))
                .unwrap_or_default(),
            Some("vtt") => caption_parser::parse_vtt(&raw),
            Some("srt") => caption_parser::parse_srt(&raw),
            _ => String::new(),
        };

        if text.is_empty() {
            return None;
        }
        Some(TranscriptPayload::fallback(text, Some(languages), true))
    }

    /// First subtitle file for `video_id` in container preference order.
    fn best_subtitle_file(dir: &std::path::Path, video_id: &str) -> Option<PathBuf> {
        let entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(video_id))
                    .unwrap_or(false)
            })
            .collect();

        for format in SUBTITLE_FORMATS {
            if let Some(path) = entries
                .iter()
                .find(|p| p.extension().and_then(|e| e.to_str()) == Some(format))
            {
                return Some(path.clone());
            }
        }
        None
    }

    /// Extract up to `max_fetch` top comments via the extractor's info JSON.
    pub async fn fetch_comments(
        &self,
        video_id: &str,
        proxy_url: Option<&str>,
        max_fetch: usize,
        limit: usize,
    ) -> Result<Vec<String>, CommentError> {
        let mut args = self.base_args(proxy_url);
        args.extend([
            "--dump-single-json".to_string(),
            "--write-comments".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:comment_sort=top;max_comments={}", max_fetch),
            format!("https://www.youtube.com/watch?v={}", video_id),
        ]);

        let output = self
            .run(args)
            .await
            .map_err(CommentError::Failed)?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if let Some(reason) = detect_permanent_block(&stderr) {
            return Err(CommentError::PermanentBlock(reason.to_string()));
        }
        if !output.status.success() {
            return Err(CommentError::Failed(format!(
                "extractor exited with {}: {}",
                output.status,
                stderr.chars().take(300).collect::<String>()
            )));
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| CommentError::Failed(format!("info JSON unparsable: {}", e)))?;

        let comments: Vec<String> = info
            .get("comments")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| {
                        c.get("text")
                            .or_else(|| c.get("comment"))
                            .and_then(|t| t.as_str())
                    })
                    .filter(|t| !t.is_empty())
                    .take(limit)
                    .map(|t| t.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(comments)
    }
}

/// Transcript strategy: subtitle retrieval, direct-only in the fallback
/// stage.
pub struct YtDlpSubtitleAdapter {
    runner: YtDlpRunner,
}

impl YtDlpSubtitleAdapter {
    pub fn new(runner: YtDlpRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl TranscriptStrategy for YtDlpSubtitleAdapter {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Result<Option<TranscriptPayload>, TranscriptUnavailable> {
        Ok(self
            .runner
            .fetch_subtitles(video_id, languages, flags.strict_languages, None)
            .await)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn supports_proxy(&self) -> bool {
        true
    }
}

/// Comment strategy backed by the extractor's comment dump.
pub struct YtDlpCommentAdapter {
    runner: YtDlpRunner,
    gateway_url: Option<String>,
    max_fetch: usize,
    limit: usize,
}

impl YtDlpCommentAdapter {
    pub fn new(
        runner: YtDlpRunner,
        gateway_url: Option<String>,
        max_fetch: usize,
        limit: usize,
    ) -> Self {
        Self {
            runner,
            gateway_url,
            max_fetch,
            limit,
        }
    }
}

#[async_trait]
impl CommentStrategy for YtDlpCommentAdapter {
    async fn fetch(&self, video_id: &str, use_proxy: bool) -> Result<Vec<String>, CommentError> {
        let proxy_url = if use_proxy {
            match &self.gateway_url {
                Some(url) => Some(url.as_str()),
                // No proxy configured: a proxied attempt would only repeat
                // the direct one.
                None => return Ok(Vec::new()),
            }
        } else {
            None
        };

        self.runner
            .fetch_comments(video_id, proxy_url, self.max_fetch, self.limit)
            .await
    }

    fn name(&self) -> &'static str {
        "yt-dlp-comments"
    }
}
