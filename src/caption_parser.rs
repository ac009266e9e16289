//! Caption container parsing.
//!
//! Handles the three container shapes the adapters encounter: timed XML
//! (`<text start dur>` from the caption endpoint, `<p t d>` from srv3
//! subtitle files), WebVTT, and SRT. All of them reduce to either timed
//! snippets or a line-joined text.

use anyhow::Result;
use html_escape::decode_html_entities;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::TranscriptSnippet;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

/// Decode entities and strip markup from one cue body.
fn clean_text(raw: &str) -> String {
    let decoded = decode_html_entities(raw).to_string();
    tag_regex().replace_all(&decoded, "").trim().to_string()
}

/// Parse timed caption XML into snippets.
///
/// Accepts both the caption endpoint's `<text start="s" dur="s">` elements
/// and srv3's `<p t="ms" d="ms">` elements.
pub fn parse_timed_xml(raw: &str) -> Result<Vec<TranscriptSnippet>> {
    let mut reader = Reader::from_str(raw);
    let mut snippets = Vec::new();

    let mut current: Option<(f64, f64)> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let name = name.as_ref();
                if name == b"text" || name == b"p" {
                    let mut start = 0.0f64;
                    let mut duration = 0.0f64;
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        match attr.key.as_ref() {
                            b"start" => start = value.parse().unwrap_or(0.0),
                            b"dur" => duration = value.parse().unwrap_or(0.0),
                            // srv3 carries milliseconds
                            b"t" => start = value.parse::<f64>().unwrap_or(0.0) / 1000.0,
                            b"d" => duration = value.parse::<f64>().unwrap_or(0.0) / 1000.0,
                            _ => {}
                        }
                    }
                    current = Some((start, duration));
                    buffer.clear();
                }
            }
            Event::Text(t) => {
                if current.is_some() {
                    let piece = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()).into_owned());
                    buffer.push_str(&piece);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let name = name.as_ref();
                if name == b"text" || name == b"p" {
                    if let Some((start, duration)) = current.take() {
                        let text = clean_text(&buffer);
                        if !text.is_empty() {
                            snippets.push(TranscriptSnippet {
                                text,
                                start,
                                duration,
                            });
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(snippets)
}

/// Join snippets into the payload text.
pub fn join_snippets(snippets: &[TranscriptSnippet]) -> String {
    snippets
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Reduce a WebVTT document to its cue text.
pub fn parse_vtt(raw: &str) -> String {
    let lines: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| {
            !l.is_empty()
                && !l.contains("-->")
                && !l.starts_with("WEBVTT")
                && !l.starts_with("Kind:")
                && !l.starts_with("Language:")
                && !l.starts_with("NOTE")
                && !l.starts_with("STYLE")
        })
        .map(clean_text)
        .filter(|l| !l.is_empty())
        .collect();
    lines.join(" ").trim().to_string()
}

/// Reduce an SRT document to its cue text.
pub fn parse_srt(raw: &str) -> String {
    let lines: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains("-->") && !l.chars().all(|c| c.is_ascii_digit()))
        .map(clean_text)
        .filter(|l| !l.is_empty())
        .collect();
    lines.join(" ").trim().to_string()
}

/// Parse the timedtext list response (`?type=list`) into
/// `(lang_code, kind)` pairs; `kind` is `"asr"` or `"manual"`.
pub fn parse_track_list(raw: &str) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(raw);
    let mut out = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            Event::Empty(e) | Event::Start(e) => {
                if e.name().as_ref() != b"track" {
                    continue;
                }
                let mut code: Option<String> = None;
                // kind may be missing; treat as manual unless explicitly 'asr'
                let mut kind = "manual".to_string();
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"lang_code" => code = Some(value),
                        b"kind" => {
                            if value == "asr" {
                                kind = "asr".to_string();
                            }
                        }
                        _ => {}
                    }
                }
                if let Some(code) = code {
                    out.push((code, kind));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    out
}
