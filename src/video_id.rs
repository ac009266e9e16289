//! Video identifier extraction and validation.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// A validated 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static pattern"))
}

fn url_patterns() -> &'static [Regex; 2] {
    static RES: OnceLock<[Regex; 2]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // Standard watch, embed, shorts, live paths
            Regex::new(r"(?:v=|/|embed/|shorts/|live/)([A-Za-z0-9_-]{11})")
                .expect("static pattern"),
            // Short links
            Regex::new(r"youtu\.be/([A-Za-z0-9_-]{11})").expect("static pattern"),
        ]
    })
}

/// Validate a bare candidate id.
pub fn is_valid_video_id(candidate: &str) -> bool {
    id_regex().is_match(candidate)
}

/// Extract a video id from a bare id or any recognized URL shape.
///
/// Returns the first valid 11-character capture, or `None` when nothing in
/// the input looks like a video id.
pub fn extract_video_id(url_or_id: &str) -> Option<VideoId> {
    let trimmed = url_or_id.trim();
    if is_valid_video_id(trimmed) {
        return Some(VideoId(trimmed.to_string()));
    }

    for pattern in url_patterns() {
        if let Some(cap) = pattern.captures(trimmed) {
            if let Some(m) = cap.get(1) {
                if is_valid_video_id(m.as_str()) {
                    return Some(VideoId(m.as_str().to_string()));
                }
            }
        }
    }

    None
}
