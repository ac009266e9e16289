//! Language preference resolution.
//!
//! Turns caller hints, the `Accept-Language` header, and the configured
//! defaults into an ordered, variant-expanded list of language codes, and
//! derives the language-aware cache key for the request.

/// How the final preference list was derived; decides cache-key shape and
/// whether the legacy persistent key may be consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceSource {
    /// Caller provided an explicit `languages` list
    Caller,
    /// Inferred from a non-English `Accept-Language` header
    Header,
    /// Configured default list, English forced first
    Default,
}

/// Resolved language preferences for one request.
#[derive(Debug, Clone)]
pub struct LanguagePreferences {
    /// Base codes before variant expansion, in priority order
    pub base_codes: Vec<String>,

    /// Variant-expanded codes, order-preserving and de-duplicated
    pub expanded: Vec<String>,

    pub source: PreferenceSource,
}

impl LanguagePreferences {
    /// Cache-key suffix carrying caller intent. The default path keeps the
    /// bare video-id key for compatibility with entries written before
    /// language-aware keys existed.
    pub fn cache_key(&self, video_id: &str) -> String {
        match self.source {
            PreferenceSource::Default => video_id.to_string(),
            _ => format!("{}::langs={}", video_id, self.base_codes.join(",")),
        }
    }

    /// The legacy bare key may only be read on the default-English path.
    pub fn legacy_key_allowed(&self) -> bool {
        self.source == PreferenceSource::Default
    }
}

/// Regional variants the upstream source is known to publish for each base
/// language, tried in this order after the base tag itself.
fn variants_for(base: &str) -> &'static [&'static str] {
    match base {
        "es" => &["es", "es-419", "es-ES", "es-MX", "es-AR", "es-CL", "es-CO", "es-PE", "es-VE"],
        "pt" => &["pt", "pt-BR", "pt-PT"],
        "en" => &["en", "en-US", "en-GB", "en-IN"],
        "hi" => &["hi", "hi-IN"],
        "ar" => &["ar", "ar-SA", "ar-EG", "ar-AE"],
        "fr" => &["fr", "fr-FR", "fr-CA"],
        "de" => &["de", "de-DE"],
        "it" => &["it", "it-IT"],
        "ru" => &["ru", "ru-RU"],
        "tr" => &["tr", "tr-TR"],
        "id" => &["id", "id-ID"],
        "ja" => &["ja", "ja-JP"],
        "ko" => &["ko", "ko-KR"],
        "zh" => &["zh", "zh-Hans", "zh-Hant", "zh-CN", "zh-TW"],
        "vi" => &["vi", "vi-VN"],
        "pl" => &["pl", "pl-PL"],
        "nl" => &["nl", "nl-NL"],
        "fa" => &["fa", "fa-IR"],
        "ur" => &["ur", "ur-PK", "ur-IN"],
        "bn" => &["bn", "bn-BD", "bn-IN"],
        "ta" => &["ta", "ta-IN"],
        "te" => &["te", "te-IN"],
        "th" => &["th", "th-TH"],
        _ => &[],
    }
}

fn dedup_preserving_order(codes: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for code in codes {
        let code = code.trim().to_string();
        if code.is_empty() || !seen.insert(code.clone()) {
            continue;
        }
        out.push(code);
    }
    out
}

/// Expand base codes into their regional variants, preserving order and
/// de-duplicating. Unknown bases pass through unchanged.
pub fn expand_language_variants(codes: &[String], force_en_first: bool) -> Vec<String> {
    let mut ordered = dedup_preserving_order(codes.iter().cloned());

    if force_en_first {
        if let Some(pos) = ordered.iter().position(|c| c == "en") {
            let en = ordered.remove(pos);
            ordered.insert(0, en);
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for code in &ordered {
        let variants = variants_for(code);
        if variants.is_empty() {
            if seen.insert(code.clone()) {
                out.push(code.clone());
            }
        } else {
            for v in variants {
                if seen.insert((*v).to_string()) {
                    out.push((*v).to_string());
                }
            }
        }
    }
    out
}

/// Parse an `Accept-Language` header into unique base codes in priority
/// order. `"es-419,es;q=0.9,en-US;q=0.8"` becomes `["es", "en"]`; a missing
/// or wildcard-only header yields an empty list.
pub fn parse_accept_language(header: Option<&str>) -> Vec<String> {
    let Some(header) = header else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for part in header.split(',') {
        let tag = part.split(';').next().unwrap_or("").trim().to_lowercase();
        if tag.is_empty() || tag == "*" {
            continue;
        }
        let base = tag.split('-').next().unwrap_or(&tag).to_string();
        if !base.is_empty() && seen.insert(base.clone()) {
            out.push(base);
        }
    }
    out
}

/// Resolve the preference list for one request.
///
/// Rules, applied in order:
/// 1. Caller codes are used verbatim as the base list; English is NOT
///    injected.
/// 2. Otherwise a non-English-first `Accept-Language` header supplies the
///    bases, with English appended as a safety fallback.
/// 3. Otherwise the configured default list, English forced first.
pub fn resolve_preferences(
    caller_codes: Option<&[String]>,
    accept_language: Option<&str>,
    default_langs: &[String],
) -> LanguagePreferences {
    if let Some(codes) = caller_codes {
        let base: Vec<String> =
            dedup_preserving_order(codes.iter().map(|c| c.trim().to_lowercase()));
        if !base.is_empty() {
            let expanded = expand_language_variants(&base, false);
            return LanguagePreferences {
                base_codes: base,
                expanded,
                source: PreferenceSource::Caller,
            };
        }
    }

    let inferred = parse_accept_language(accept_language);
    if let Some(first) = inferred.first() {
        if first != "en" {
            let mut base = inferred;
            if !base.iter().any(|c| c == "en") {
                base.push("en".to_string());
            }
            let expanded = expand_language_variants(&base, false);
            return LanguagePreferences {
                base_codes: base,
                expanded,
                source: PreferenceSource::Header,
            };
        }
    }

    let base = dedup_preserving_order(default_langs.iter().cloned());
    let expanded = expand_language_variants(&base, true);
    LanguagePreferences {
        base_codes: base,
        expanded,
        source: PreferenceSource::Default,
    }
}

/// Reduce an expanded list back to unique base codes, preserving order.
/// The timedtext adapter probes per base, not per variant.
pub fn base_codes(languages: &[String]) -> Vec<String> {
    dedup_preserving_order(
        languages
            .iter()
            .map(|c| c.split('-').next().unwrap_or(c).to_lowercase()),
    )
}
