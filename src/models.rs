use serde::{Deserialize, Serialize};

/// The language a transcript was delivered in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptLanguage {
    /// BCP-47-like code, lower-cased base with optional region (`"es-419"`)
    pub code: String,

    /// Human-readable label as reported by the source; falls back to the code
    pub label: String,

    /// True when the caption track was machine-produced (ASR)
    pub is_generated: bool,
}

/// One caption track observed on the video at fetch time.
///
/// Advisory only; the manifest reflects whatever the source listed, not what
/// was ultimately fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptionTrack {
    pub code: String,
    pub label: String,
    pub is_generated: bool,
    pub is_translatable: bool,
    pub base_url: String,
}

/// A snippet of transcript text with timing information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSnippet {
    /// The text content of this snippet
    pub text: String,

    /// The timestamp at which this snippet appears on screen in seconds
    pub start: f64,

    /// The duration of how long the snippet stays on screen in seconds
    /// Note that there can be overlaps between snippets
    pub duration: f64,
}

/// The value the transcript engine returns and caches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptPayload {
    /// Non-empty concatenated caption text
    pub text: String,

    pub language: TranscriptLanguage,

    /// Advisory manifest of all caption tracks known at fetch time; may be empty
    pub tracks: Vec<CaptionTrack>,

    /// Per-segment timings, present only when the source provided them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippets: Option<Vec<TranscriptSnippet>>,
}

impl TranscriptPayload {
    pub fn new(
        text: String,
        code: String,
        label: String,
        is_generated: bool,
        tracks: Vec<CaptionTrack>,
        snippets: Option<Vec<TranscriptSnippet>>,
    ) -> Self {
        let code = if code.is_empty() {
            "unknown".to_string()
        } else {
            code
        };
        let label = if label.is_empty() { code.clone() } else { label };
        Self {
            text,
            language: TranscriptLanguage {
                code,
                label,
                is_generated,
            },
            tracks,
            snippets,
        }
    }

    /// Payload for sources that report no language of their own: label the
    /// text with the base of the first requested code, or `"unknown"`.
    pub fn fallback(text: String, languages: Option<&[String]>, is_generated: bool) -> Self {
        let (code, label) = languages
            .and_then(|langs| langs.first())
            .map(|first| {
                let base = first.split('-').next().unwrap_or(first).to_string();
                (base, first.clone())
            })
            .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
        Self::new(text, code, label, is_generated, vec![], None)
    }
}

/// Outcome of a comment acquisition, as returned to the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CommentOutcome {
    /// First-N top-level comments, non-empty strings, ordered as received
    pub comments: Vec<String>,

    /// Advisory warning set when the chain ended on a permanent block or
    /// an internal failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_payload_uses_first_language_base() {
        let langs = vec!["es-419".to_string(), "en".to_string()];
        let payload = TranscriptPayload::fallback("hola".to_string(), Some(&langs), true);
        assert_eq!(payload.language.code, "es");
        assert_eq!(payload.language.label, "es-419");
        assert!(payload.language.is_generated);
        assert!(payload.tracks.is_empty());
        assert!(payload.snippets.is_none());
    }

    #[test]
    fn test_fallback_payload_without_languages() {
        let payload = TranscriptPayload::fallback("text".to_string(), None, false);
        assert_eq!(payload.language.code, "unknown");
        assert_eq!(payload.language.label, "unknown");
    }

    #[test]
    fn test_payload_serialization_omits_empty_snippets() {
        let payload = TranscriptPayload::new(
            "hello".to_string(),
            "en".to_string(),
            "English".to_string(),
            false,
            vec![],
            None,
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("snippets").is_none());
        assert_eq!(json["language"]["code"], "en");
    }

    #[test]
    fn test_payload_round_trips_through_serde() {
        let payload = TranscriptPayload::new(
            "hello world".to_string(),
            "en".to_string(),
            "English".to_string(),
            false,
            vec![CaptionTrack {
                code: "en".to_string(),
                label: "English".to_string(),
                is_generated: false,
                is_translatable: true,
                base_url: "https://example.com/t".to_string(),
            }],
            Some(vec![TranscriptSnippet {
                text: "hello world".to_string(),
                start: 0.0,
                duration: 1.5,
            }]),
        );
        let bytes = serde_json::to_vec(&payload).unwrap();
        let back: TranscriptPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, payload);
    }
}
