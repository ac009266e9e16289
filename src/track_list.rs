//! Caption track manifest and track selection.
//!
//! Builds the list of caption tracks from the player response and applies
//! the deterministic selection ladder the engine uses to decide which track
//! to fetch. For a given track set, flag set, and language list the chosen
//! candidate order is a pure function.

use serde_json::Value;

use crate::errors::{TranscriptUnavailable, UnavailabilityReason};
use crate::models::CaptionTrack;
use crate::strategy::FetchFlags;

/// One caption track as listed by the source, with enough information to
/// fetch and optionally translate it.
#[derive(Debug, Clone)]
pub struct ListedTrack {
    pub url: String,
    pub language: String,
    pub language_code: String,
    pub is_generated: bool,
    /// Language codes this track can be translated into; empty when the
    /// track is not translatable
    pub translation_codes: Vec<String>,
}

impl ListedTrack {
    pub fn is_translatable(&self) -> bool {
        !self.translation_codes.is_empty()
    }

    /// Fetch URL for a translated rendition of this track.
    pub fn translated_url(&self, language_code: &str) -> String {
        format!("{}&tlang={}", self.url, language_code)
    }
}

/// A concrete fetch target produced by the selection ladder.
#[derive(Debug, Clone)]
pub struct TrackCandidate {
    pub url: String,
    pub language_code: String,
    pub language_label: String,
    pub is_generated: bool,
    /// Which ladder rung produced this candidate; telemetry only
    pub rung: &'static str,
}

/// All caption tracks for one video, manual and generated kept in listing
/// order so "first track" is well-defined.
#[derive(Debug, Clone, Default)]
pub struct TrackList {
    pub video_id: String,
    pub manual: Vec<ListedTrack>,
    pub generated: Vec<ListedTrack>,
    /// (code, label) pairs the source offers as translation targets
    pub translation_languages: Vec<(String, String)>,
}

impl TrackList {
    /// Pull the captions renderer out of a player response. A missing
    /// renderer means subtitles are disabled for the video.
    pub fn extract_captions_data(
        player_response: &Value,
        video_id: &str,
    ) -> Result<Value, TranscriptUnavailable> {
        player_response
            .get("captions")
            .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
            .cloned()
            .ok_or_else(|| {
                TranscriptUnavailable::new(video_id, UnavailabilityReason::TranscriptsDisabled)
            })
    }

    /// Build the track list from the captions renderer JSON.
    pub fn build(video_id: String, captions_json: &Value) -> Self {
        let empty = vec![];
        let translation_languages: Vec<(String, String)> = captions_json
            .get("translationLanguages")
            .and_then(|v| v.as_array())
            .unwrap_or(&empty)
            .iter()
            .filter_map(|lang| {
                let code = lang.get("languageCode")?.as_str()?;
                let label = lang
                    .get("languageName")
                    .and_then(|n| n.get("simpleText"))
                    .and_then(|s| s.as_str())
                    .unwrap_or(code);
                Some((code.to_string(), label.to_string()))
            })
            .collect();

        let translation_codes: Vec<String> = translation_languages
            .iter()
            .map(|(code, _)| code.clone())
            .collect();

        let mut manual = Vec::new();
        let mut generated = Vec::new();

        for caption in captions_json
            .get("captionTracks")
            .and_then(|v| v.as_array())
            .unwrap_or(&empty)
        {
            let Some(language_code) = caption.get("languageCode").and_then(|c| c.as_str()) else {
                continue;
            };
            let Some(url) = caption.get("baseUrl").and_then(|u| u.as_str()) else {
                continue;
            };

            let is_asr = caption
                .get("kind")
                .and_then(|k| k.as_str())
                .map(|k| k == "asr")
                .unwrap_or(false);

            let language = caption
                .get("name")
                .and_then(|n| n.get("simpleText"))
                .and_then(|s| s.as_str())
                .unwrap_or(language_code)
                .to_string();

            let is_translatable = caption
                .get("isTranslatable")
                .and_then(|t| t.as_bool())
                .unwrap_or(false);

            let track = ListedTrack {
                url: url.to_string(),
                language,
                language_code: language_code.to_string(),
                is_generated: is_asr,
                translation_codes: if is_translatable {
                    translation_codes.clone()
                } else {
                    vec![]
                },
            };

            if is_asr {
                generated.push(track);
            } else {
                manual.push(track);
            }
        }

        Self {
            video_id,
            manual,
            generated,
            translation_languages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.manual.is_empty() && self.generated.is_empty()
    }

    /// Advisory manifest attached to every payload from this adapter.
    pub fn manifest(&self) -> Vec<CaptionTrack> {
        self.manual
            .iter()
            .chain(self.generated.iter())
            .map(|t| CaptionTrack {
                code: t.language_code.clone(),
                label: t.language.clone(),
                is_generated: t.is_generated,
                is_translatable: t.is_translatable(),
                base_url: t.url.clone(),
            })
            .collect()
    }

    /// First track whose code matches the requested list, scanning
    /// languages in the requested order.
    fn find_in<'a>(tracks: &'a [ListedTrack], languages: &[String]) -> Option<&'a ListedTrack> {
        for lang in languages {
            if let Some(track) = tracks.iter().find(|t| &t.language_code == lang) {
                return Some(track);
            }
        }
        None
    }

    fn direct_candidate(track: &ListedTrack, rung: &'static str) -> TrackCandidate {
        TrackCandidate {
            url: track.url.clone(),
            language_code: track.language_code.clone(),
            language_label: track.language.clone(),
            is_generated: track.is_generated,
            rung,
        }
    }

    /// The selection ladder, in order:
    ///
    /// (a) when `prefer_original` and not `strict_languages`: first manual
    ///     track, else first generated;
    /// (b) manual track matching the requested list in requested order;
    /// (c) generated track matching the requested list in requested order;
    /// (d) when not `strict_languages`: any manual, else any generated;
    /// (e) when `allow_translate`: the first translatable track rendered in
    ///     the first requested language it supports.
    ///
    /// Candidates are returned in ladder order, de-duplicated by URL; the
    /// caller fetches them until one yields non-empty text.
    pub fn select_candidates(
        &self,
        languages: &[String],
        flags: &FetchFlags,
    ) -> Vec<TrackCandidate> {
        let mut candidates: Vec<TrackCandidate> = Vec::new();
        let push = |candidate: TrackCandidate, candidates: &mut Vec<TrackCandidate>| {
            if !candidates.iter().any(|c| c.url == candidate.url) {
                candidates.push(candidate);
            }
        };

        let first_listed = self.manual.first().or_else(|| self.generated.first());

        if flags.prefer_original && !flags.strict_languages {
            if let Some(track) = first_listed {
                push(Self::direct_candidate(track, "prefer_original"), &mut candidates);
            }
        }

        if let Some(track) = Self::find_in(&self.manual, languages) {
            push(Self::direct_candidate(track, "manual_match"), &mut candidates);
        }

        if let Some(track) = Self::find_in(&self.generated, languages) {
            push(Self::direct_candidate(track, "generated_match"), &mut candidates);
        }

        if !flags.strict_languages {
            if let Some(track) = first_listed {
                push(Self::direct_candidate(track, "any_track"), &mut candidates);
            }
        }

        if flags.allow_translate {
            if let Some(track) = self
                .manual
                .iter()
                .chain(self.generated.iter())
                .find(|t| t.is_translatable())
            {
                if let Some(target) = languages
                    .iter()
                    .find(|lang| track.translation_codes.iter().any(|c| &c == lang))
                {
                    let label = self
                        .translation_languages
                        .iter()
                        .find(|(code, _)| code == target)
                        .map(|(_, label)| label.clone())
                        .unwrap_or_else(|| target.clone());
                    push(
                        TrackCandidate {
                            url: track.translated_url(target),
                            language_code: target.clone(),
                            language_label: label,
                            // Translated renditions are machine output
                            is_generated: true,
                            rung: "translate",
                        },
                        &mut candidates,
                    );
                }
            }
        }

        candidates
    }
}
