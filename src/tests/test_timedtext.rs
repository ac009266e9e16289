use mockito::Matcher;
use reqwest::Client;

use crate::timedtext::TimedtextAdapter;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const LIST_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<transcript_list docid="1">
  <track id="0" name="" lang_code="en" lang_original="English"/>
  <track id="1" name="" lang_code="es" kind="asr" lang_original="Spanish"/>
</transcript_list>"#;

const VTT_BODY: &str = "WEBVTT\nKind: captions\n\n00:00:00.000 --> 00:00:01.000\nhello from timedtext\n";

fn adapter_for(server: &mockito::Server) -> TimedtextAdapter {
    TimedtextAdapter::new(Client::new(), None, 3)
        .with_base_url(format!("{}/api/timedtext", server.url()))
}

#[tokio::test]
async fn test_manual_track_fetched_in_requested_language() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("v".into(), "AAAAAAAAAAA".into()),
            Matcher::UrlEncoded("type".into(), "list".into()),
        ]))
        .with_status(200)
        .with_body(LIST_XML)
        .create_async()
        .await;
    let _vtt = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fmt".into(), "vtt".into()),
            Matcher::UrlEncoded("lang".into(), "en".into()),
        ]))
        .with_status(200)
        .with_body(VTT_BODY)
        .create_async()
        .await;

    let adapter = adapter_for(&server);
    let payload = adapter
        .try_languages("AAAAAAAAAAA", &strings(&["en"]), false)
        .await
        .unwrap();

    assert_eq!(payload.text, "hello from timedtext");
    assert_eq!(payload.language.code, "en");
    assert!(!payload.language.is_generated);
    assert_eq!(payload.tracks.len(), 2);
}

#[tokio::test]
async fn test_manual_tier_beats_asr_even_when_asr_language_ranks_higher() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "list".into()),
        ]))
        .with_status(200)
        .with_body(LIST_XML)
        .create_async()
        .await;
    // Only the manual English track is mocked; a request for the Spanish
    // ASR track would 501.
    let _vtt = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fmt".into(), "vtt".into()),
            Matcher::UrlEncoded("lang".into(), "en".into()),
        ]))
        .with_status(200)
        .with_body(VTT_BODY)
        .create_async()
        .await;

    let adapter = adapter_for(&server);
    let payload = adapter
        .try_languages("AAAAAAAAAAA", &strings(&["es", "en"]), false)
        .await
        .unwrap();

    // es only exists as ASR; the manual tier runs first across all bases.
    assert_eq!(payload.language.code, "en");
    assert!(!payload.language.is_generated);
}

#[tokio::test]
async fn test_brute_force_when_list_fails() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "list".into()),
        ]))
        .with_status(500)
        .create_async()
        .await;
    let _vtt = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fmt".into(), "vtt".into()),
            Matcher::UrlEncoded("lang".into(), "es".into()),
        ]))
        .with_status(200)
        .with_body(VTT_BODY)
        .create_async()
        .await;

    let adapter = adapter_for(&server);
    let payload = adapter
        .try_languages("AAAAAAAAAAA", &strings(&["es-419", "es"]), false)
        .await
        .unwrap();

    assert_eq!(payload.language.code, "es");
    assert!(payload.tracks.is_empty());
}

#[tokio::test]
async fn test_language_cap_limits_probed_bases() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "list".into()),
        ]))
        .with_status(200)
        .with_body("<transcript_list/>")
        .create_async()
        .await;
    // Fourth base would be "th"; the cap of 3 means it is never requested.
    let th_mock = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("lang".into(), "th".into()),
        ]))
        .expect(0)
        .with_status(200)
        .with_body(VTT_BODY)
        .create_async()
        .await;

    let adapter = adapter_for(&server);
    let result = adapter
        .try_languages("AAAAAAAAAAA", &strings(&["de", "fr", "it", "th"]), false)
        .await;

    assert!(result.is_none());
    th_mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_transcript_body_is_ignored() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "list".into()),
        ]))
        .with_status(200)
        .with_body("<transcript_list/>")
        .create_async()
        .await;
    let _vtt = server
        .mock("GET", "/api/timedtext")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fmt".into(), "vtt".into()),
        ]))
        .with_status(200)
        .with_body(r#"<?xml version="1.0"?><transcript/>"#)
        .create_async()
        .await;

    let adapter = adapter_for(&server);
    assert!(adapter
        .try_languages("AAAAAAAAAAA", &strings(&["en"]), false)
        .await
        .is_none());
}
