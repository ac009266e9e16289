//! Playability status checking.
//!
//! Many conditions that make a video unviewable (removed, private,
//! age-restricted) also make its transcripts unreachable, so the primary
//! adapter asserts playability before looking at caption data.

use crate::errors::{TranscriptUnavailable, UnavailabilityReason};

pub struct PlayabilityAsserter;

impl PlayabilityAsserter {
    /// Returns `Ok(())` for playable videos, or a classified error for
    /// age-restricted, unavailable, and otherwise unplayable videos.
    pub fn assert_playability(
        player_data: &serde_json::Value,
        video_id: &str,
    ) -> Result<(), TranscriptUnavailable> {
        let status = player_data
            .get("playabilityStatus")
            .and_then(|s| s.get("status"))
            .and_then(|s| s.as_str())
            .unwrap_or("ERROR");

        if status == "OK" {
            return Ok(());
        }

        let reason = player_data
            .get("playabilityStatus")
            .and_then(|s| s.get("reason"))
            .and_then(|s| s.as_str())
            .unwrap_or("");

        if status == "LOGIN_REQUIRED" && reason.contains("age") {
            return Err(TranscriptUnavailable::new(
                video_id,
                UnavailabilityReason::AgeRestricted,
            ));
        }

        if reason.contains("Video unavailable") {
            return Err(TranscriptUnavailable::new(
                video_id,
                UnavailabilityReason::VideoUnavailable,
            ));
        }

        Err(TranscriptUnavailable::new(
            video_id,
            UnavailabilityReason::VideoUnplayable {
                reason: Some(reason.to_string()),
                sub_reasons: Self::sub_reasons(player_data),
            },
        ))
    }

    fn sub_reasons(player_data: &serde_json::Value) -> Vec<String> {
        let mut sub_reasons = Vec::new();
        if let Some(messages) = player_data
            .get("playabilityStatus")
            .and_then(|s| s.get("errorScreen"))
            .and_then(|s| s.get("playerErrorMessageRenderer"))
            .and_then(|s| s.get("subreason"))
            .and_then(|s| s.get("runs"))
            .and_then(|s| s.as_array())
        {
            for msg in messages {
                if let Some(text) = msg.get("text").and_then(|t| t.as_str()) {
                    sub_reasons.push(text.to_string());
                }
            }
        }
        sub_reasons
    }
}
