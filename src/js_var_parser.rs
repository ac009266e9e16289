//! JavaScript variable extraction from watch-page HTML.
//!
//! The upstream page embeds the data this service needs (player response,
//! initial data) in JavaScript object literals. The parser extracts a named
//! variable with a character-by-character brace matcher and falls back to
//! regex patterns when that fails.

use regex::Regex;

use crate::errors::{TranscriptUnavailable, UnavailabilityReason};

/// Parser for one named JavaScript variable assigned an object literal.
pub struct JsVarParser {
    var_name: String,
}

impl JsVarParser {
    pub fn new(var_name: &str) -> Self {
        Self {
            var_name: var_name.to_string(),
        }
    }

    pub fn parse(
        &self,
        html: &str,
        video_id: &str,
    ) -> Result<serde_json::Value, TranscriptUnavailable> {
        if let Ok(json_value) = self.parse_char_by_char(html, video_id) {
            return Ok(json_value);
        }

        self.parse_with_regex(html, video_id)
    }

    fn unparsable(&self, video_id: &str, detail: String) -> TranscriptUnavailable {
        TranscriptUnavailable::new(video_id, UnavailabilityReason::DataUnparsable(detail))
    }

    /// Brace-matching extraction: find the variable, then track nesting,
    /// string literals, and escapes until the object closes.
    fn parse_char_by_char(
        &self,
        html: &str,
        video_id: &str,
    ) -> Result<serde_json::Value, TranscriptUnavailable> {
        let var_marker = format!("var {}", self.var_name);
        let after_var = match html.split_once(&var_marker) {
            Some((_, rest)) => rest,
            None => html
                .split_once(self.var_name.as_str())
                .map(|(_, rest)| rest)
                .ok_or_else(|| {
                    self.unparsable(
                        video_id,
                        format!("JavaScript variable '{}' not found in HTML", self.var_name),
                    )
                })?,
        };

        let mut chars = after_var.chars();
        loop {
            match chars.next() {
                Some('{') => break,
                Some(_) => continue,
                None => {
                    return Err(self.unparsable(
                        video_id,
                        format!(
                            "Opening brace not found after JavaScript variable '{}'",
                            self.var_name
                        ),
                    ));
                }
            }
        }

        let mut json_chars = vec!['{'];
        let mut depth = 1;
        let mut escaped = false;
        let mut in_quotes = false;

        while depth > 0 {
            match chars.next() {
                Some(c) => {
                    json_chars.push(c);

                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        in_quotes = !in_quotes;
                    } else if !in_quotes {
                        if c == '{' {
                            depth += 1;
                        } else if c == '}' {
                            depth -= 1;
                        }
                    }
                }
                None => {
                    return Err(self.unparsable(
                        video_id,
                        "Unexpected end of HTML while parsing JavaScript variable".to_string(),
                    ));
                }
            }
        }

        let json_str: String = json_chars.into_iter().collect();
        serde_json::from_str(&json_str).map_err(|_| {
            self.unparsable(
                video_id,
                "Extracted JavaScript variable is not valid JSON".to_string(),
            )
        })
    }

    fn parse_with_regex(
        &self,
        html: &str,
        video_id: &str,
    ) -> Result<serde_json::Value, TranscriptUnavailable> {
        let escaped = regex::escape(&self.var_name);
        let patterns = [
            format!(r"{} = (.*?);</script>", escaped),
            format!(r"{}=(.*?);</script>", escaped),
            format!(r"{} = (.*?);", escaped),
            format!(r"{}=(.*?);", escaped),
        ];

        for pattern in &patterns {
            let re = match Regex::new(pattern) {
                Ok(re) => re,
                Err(_) => continue,
            };

            if let Some(cap) = re.captures(html) {
                if let Some(json_str) = cap.get(1) {
                    match serde_json::from_str(json_str.as_str()) {
                        Ok(json) => return Ok(json),
                        Err(_) => continue,
                    }
                }
            }
        }

        Err(self.unparsable(
            video_id,
            format!(
                "Could not find or parse JavaScript variable '{}'",
                self.var_name
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_var_declaration() {
        let parser = JsVarParser::new("ytInitialPlayerResponse");
        let html = r#"<script>var ytInitialPlayerResponse = {"captions": {"available": true}};</script>"#;
        let json = parser.parse(html, "dQw4w9WgXcQ").unwrap();
        assert_eq!(json["captions"]["available"], true);
    }

    #[test]
    fn test_parses_nested_braces_and_escaped_quotes() {
        let parser = JsVarParser::new("ytInitialData");
        let html = r#"window["x"]; ytInitialData = {"a": {"b": "braces } inside \" string"}, "c": 2};</script>"#;
        let json = parser.parse(html, "dQw4w9WgXcQ").unwrap();
        assert_eq!(json["c"], 2);
        assert_eq!(json["a"]["b"], "braces } inside \" string");
    }

    #[test]
    fn test_missing_variable_is_unparsable() {
        let parser = JsVarParser::new("ytInitialPlayerResponse");
        let err = parser.parse("<html></html>", "dQw4w9WgXcQ").unwrap_err();
        assert_eq!(err.kind(), "data_unparsable");
    }
}
