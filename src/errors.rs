use thiserror::Error;

/// # TranscriptUnavailable
///
/// The primary error type when transcript acquisition fails.
///
/// Carries the video id alongside a specific reason, so both the HTTP layer
/// and the telemetry events can report what actually went wrong without
/// string matching.
#[derive(Debug, Error)]
#[error("{}", self.build_error_message())]
pub struct TranscriptUnavailable {
    /// The YouTube video ID that was being accessed
    pub video_id: String,

    /// The specific reason why the transcript couldn't be retrieved
    pub reason: UnavailabilityReason,
}

/// Detailed reasons why a transcript couldn't be retrieved.
#[derive(Debug)]
pub enum UnavailabilityReason {
    /// Subtitles/transcripts are disabled for this video
    TranscriptsDisabled,

    /// No transcript was found in any of the requested languages
    NoTranscriptFound {
        /// The language codes that were requested but not found
        requested_language_codes: Vec<String>,
    },

    /// The video is no longer available (removed, private, etc.)
    VideoUnavailable,

    /// The video cannot be played for some reason
    VideoUnplayable {
        reason: Option<String>,
        sub_reasons: Vec<String>,
    },

    /// The video is age-restricted and requires authentication
    AgeRestricted,

    /// The upstream recognized and refused the request (bot challenge,
    /// rate limiting, IP block)
    RequestBlocked,

    /// A network-level failure talking to the upstream; retryable
    RequestFailed(String),

    /// The upstream response couldn't be parsed
    DataUnparsable(String),

    /// Every configured strategy was attempted and none produced content
    ExhaustedStrategies,
}

impl TranscriptUnavailable {
    pub fn new(video_id: impl Into<String>, reason: UnavailabilityReason) -> Self {
        Self {
            video_id: video_id.into(),
            reason,
        }
    }

    /// Whether retrying the same acquisition might succeed without any
    /// upstream state changing (network flakes, timeouts).
    pub fn is_transient(&self) -> bool {
        matches!(self.reason, UnavailabilityReason::RequestFailed(_))
    }

    fn build_error_message(&self) -> String {
        let base = format!(
            "Could not retrieve a transcript for the video {}!",
            self.video_id
        );

        let cause = match &self.reason {
            UnavailabilityReason::TranscriptsDisabled => {
                "Subtitles are disabled for this video".to_string()
            }
            UnavailabilityReason::NoTranscriptFound {
                requested_language_codes,
            } => format!(
                "No transcripts were found for any of the requested language codes: {:?}",
                requested_language_codes
            ),
            UnavailabilityReason::VideoUnavailable => {
                "The video is no longer available".to_string()
            }
            UnavailabilityReason::VideoUnplayable {
                reason,
                sub_reasons,
            } => {
                let reason_str = reason
                    .clone()
                    .unwrap_or_else(|| "No reason specified!".to_string());
                let mut message =
                    format!("The video is unplayable for the following reason: {}", reason_str);
                if !sub_reasons.is_empty() {
                    message.push_str("\n\nAdditional Details:\n");
                    for sub_reason in sub_reasons {
                        message.push_str(&format!(" - {}\n", sub_reason));
                    }
                }
                message
            }
            UnavailabilityReason::AgeRestricted => {
                "This video is age-restricted and requires authentication to access its transcripts"
                    .to_string()
            }
            UnavailabilityReason::RequestBlocked => {
                "YouTube is blocking requests from this address (too many requests, or a \
                 cloud-provider IP range)"
                    .to_string()
            }
            UnavailabilityReason::RequestFailed(error) => {
                format!("Failed to make a request to YouTube. Error: {}", error)
            }
            UnavailabilityReason::DataUnparsable(details) => format!(
                "The data required to fetch the transcript is not parsable: {}",
                details
            ),
            UnavailabilityReason::ExhaustedStrategies => {
                "Every acquisition strategy was attempted and none produced a transcript"
                    .to_string()
            }
        };

        format!("{} This is most likely caused by:\n\n{}", base, cause)
    }

    /// Short machine-friendly tag for telemetry events.
    pub fn kind(&self) -> &'static str {
        match self.reason {
            UnavailabilityReason::TranscriptsDisabled => "transcripts_disabled",
            UnavailabilityReason::NoTranscriptFound { .. } => "no_transcript_found",
            UnavailabilityReason::VideoUnavailable => "video_unavailable",
            UnavailabilityReason::VideoUnplayable { .. } => "video_unplayable",
            UnavailabilityReason::AgeRestricted => "age_restricted",
            UnavailabilityReason::RequestBlocked => "request_blocked",
            UnavailabilityReason::RequestFailed(_) => "request_failed",
            UnavailabilityReason::DataUnparsable(_) => "data_unparsable",
            UnavailabilityReason::ExhaustedStrategies => "exhausted",
        }
    }
}

/// Failures surfaced by comment strategy adapters.
#[derive(Debug, Error)]
pub enum CommentError {
    /// YouTube explicitly refused comment retrieval for this video
    /// (bot challenge). Short-circuits the fallback chain.
    #[error("comment retrieval permanently blocked: {0}")]
    PermanentBlock(String),

    /// Anything else; the chain moves on to the next strategy.
    #[error("comment fetch failed: {0}")]
    Failed(String),
}
