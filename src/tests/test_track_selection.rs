use serde_json::json;

use crate::strategy::FetchFlags;
use crate::track_list::TrackList;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A video with a manual English track, an ASR English track, and one
/// translatable manual track.
fn sample_captions() -> serde_json::Value {
    json!({
        "captionTracks": [
            {
                "baseUrl": "https://captions.example/en-manual",
                "name": {"simpleText": "English"},
                "languageCode": "en",
                "isTranslatable": true
            },
            {
                "baseUrl": "https://captions.example/fr-manual",
                "name": {"simpleText": "French"},
                "languageCode": "fr",
                "isTranslatable": true
            },
            {
                "baseUrl": "https://captions.example/en-asr",
                "name": {"simpleText": "English (auto-generated)"},
                "languageCode": "en",
                "kind": "asr",
                "isTranslatable": false
            }
        ],
        "translationLanguages": [
            {"languageCode": "es", "languageName": {"simpleText": "Spanish"}},
            {"languageCode": "pt", "languageName": {"simpleText": "Portuguese"}}
        ]
    })
}

fn sample_list() -> TrackList {
    TrackList::build("dQw4w9WgXcQ".to_string(), &sample_captions())
}

#[test]
fn test_build_splits_manual_and_generated() {
    let list = sample_list();
    assert_eq!(list.manual.len(), 2);
    assert_eq!(list.generated.len(), 1);
    assert!(list.manual[0].is_translatable());
    assert!(!list.generated[0].is_translatable());
    assert_eq!(list.translation_languages.len(), 2);
}

#[test]
fn test_manifest_lists_every_track() {
    let list = sample_list();
    let manifest = list.manifest();
    assert_eq!(manifest.len(), 3);
    assert!(manifest.iter().any(|t| t.is_generated));
    assert!(manifest.iter().any(|t| t.is_translatable));
}

#[test]
fn test_default_flags_prefer_original_first() {
    let list = sample_list();
    let candidates = list.select_candidates(&strings(&["en"]), &FetchFlags::default());

    assert_eq!(candidates[0].rung, "prefer_original");
    assert_eq!(candidates[0].language_code, "en");
    assert!(!candidates[0].is_generated);
}

#[test]
fn test_requested_order_drives_manual_match() {
    let list = sample_list();
    let flags = FetchFlags {
        prefer_original: false,
        strict_languages: false,
        allow_translate: false,
    };

    let candidates = list.select_candidates(&strings(&["fr", "en"]), &flags);
    assert_eq!(candidates[0].rung, "manual_match");
    assert_eq!(candidates[0].language_code, "fr");
}

#[test]
fn test_generated_match_when_no_manual_in_language() {
    let captions = json!({
        "captionTracks": [
            {"baseUrl": "u1", "name": {"simpleText": "Spanish (auto)"},
             "languageCode": "es", "kind": "asr"}
        ]
    });
    let list = TrackList::build("dQw4w9WgXcQ".to_string(), &captions);
    let flags = FetchFlags {
        prefer_original: false,
        strict_languages: true,
        allow_translate: false,
    };

    let candidates = list.select_candidates(&strings(&["es"]), &flags);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].rung, "generated_match");
    assert!(candidates[0].is_generated);
}

#[test]
fn test_strict_languages_suppresses_unrequested_tracks() {
    let list = sample_list();
    let flags = FetchFlags {
        prefer_original: true,
        strict_languages: true,
        allow_translate: false,
    };

    // Only en and en(asr) exist among requested es/pt: nothing to fetch.
    let candidates = list.select_candidates(&strings(&["es", "pt"]), &flags);
    assert!(candidates.is_empty());
}

#[test]
fn test_translate_rung_targets_first_requested_language() {
    let list = sample_list();
    let flags = FetchFlags {
        prefer_original: false,
        strict_languages: true,
        allow_translate: true,
    };

    let candidates = list.select_candidates(&strings(&["es"]), &flags);
    assert_eq!(candidates.len(), 1);
    let translated = &candidates[0];
    assert_eq!(translated.rung, "translate");
    assert_eq!(translated.language_code, "es");
    assert_eq!(translated.language_label, "Spanish");
    assert!(translated.is_generated);
    assert!(translated.url.ends_with("&tlang=es"));
}

#[test]
fn test_candidates_deduplicate_by_url() {
    let list = sample_list();
    // prefer_original and any_track both resolve to the first manual track;
    // it must appear once.
    let candidates = list.select_candidates(&strings(&["en"]), &FetchFlags::default());
    let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
    let mut unique = urls.clone();
    unique.dedup();
    let mut sorted = urls.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), urls.len());
}

#[test]
fn test_selection_is_deterministic() {
    let list = sample_list();
    let flags = FetchFlags::default();
    let languages = strings(&["fr", "en"]);

    let first: Vec<String> = list
        .select_candidates(&languages, &flags)
        .into_iter()
        .map(|c| c.url)
        .collect();
    let second: Vec<String> = list
        .select_candidates(&languages, &flags)
        .into_iter()
        .map(|c| c.url)
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_missing_captions_renderer_means_disabled() {
    let player_response = json!({"playabilityStatus": {"status": "OK"}});
    let err = TrackList::extract_captions_data(&player_response, "dQw4w9WgXcQ").unwrap_err();
    assert_eq!(err.kind(), "transcripts_disabled");
}
