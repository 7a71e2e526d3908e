//! Typed parsing of structured model output.
//!
//! Models asked for "JSON only" still wrap it in ```` ```json ```` fences or
//! precede it with a sentence of prose often enough to matter. Candidate
//! payloads are collected first (the reply itself, the fenced block, then
//! the outermost `{…}` and `[…]` spans of each) and handed to serde in
//! order; the first one that deserialises wins. Anything serde rejects
//! (wrong type, unknown enum variant, missing required field) for every
//! candidate is an error; nothing is silently defaulted here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").unwrap());

/// Parse a JSON value of type `T` out of raw model output.
///
/// Returns a human-readable reason on failure, suitable for an error detail.
/// When no candidate parses, the reason is serde's error for the first one.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let mut first_err = None;
    for payload in json_candidates(raw) {
        match serde_json::from_str(payload) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_err.get_or_insert(e.to_string());
            }
        }
    }
    Err(first_err.unwrap_or_else(|| {
        format!(
            "no JSON found in model output: {}",
            preview(raw.trim(), 120)
        )
    }))
}

/// Candidate JSON payloads in `raw`, most specific first, without repeats.
///
/// Sources are tried in this order: the trimmed reply when it already
/// starts as JSON, the first fenced block, then the whole reply. The
/// fenced block is not authoritative: a transcript that quotes its own
/// code fence cuts the non-greedy capture short, and the whole-reply spans
/// still recover the object. Within a source, the bracket kind that opens
/// first is tried first, then the other.
pub fn json_candidates(raw: &str) -> Vec<&str> {
    let trimmed = raw.trim();
    let mut sources = Vec::with_capacity(3);
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        sources.push(trimmed);
    }
    if let Some(m) = RE_FENCED.captures(raw).and_then(|c| c.get(1)) {
        sources.push(m.as_str());
    }
    sources.push(raw);

    let mut out: Vec<&str> = Vec::new();
    for text in sources {
        let mut spans = [span(text, '{', '}'), span(text, '[', ']')];
        if let [Some((obj, _)), Some((arr, _))] = spans {
            if arr < obj {
                spans.swap(0, 1);
            }
        }
        for (_, candidate) in spans.into_iter().flatten() {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    out
}

/// Outermost `open … close` span of `text` with its start offset.
fn span(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Decision {
        url: Option<String>,
    }

    #[test]
    fn bare_object() {
        let d: Decision = parse_structured(r#"{"url":"https://x.com/a"}"#).unwrap();
        assert_eq!(d.url.as_deref(), Some("https://x.com/a"));
    }

    #[test]
    fn fenced_object_with_prose() {
        let raw = "Here is the answer:\n```json\n{\"url\": null}\n```\nHope that helps!";
        let d: Decision = parse_structured(raw).unwrap();
        assert_eq!(d, Decision { url: None });
    }

    #[test]
    fn prose_around_unfenced_object() {
        let raw = r#"The best match is {"url": "https://youtube.com/watch?v=1"} based on the title."#;
        let d: Decision = parse_structured(raw).unwrap();
        assert_eq!(d.url.as_deref(), Some("https://youtube.com/watch?v=1"));
    }

    #[test]
    fn array_before_object_is_an_array() {
        let raw = r#"["a", {"b": 1}]"#;
        assert_eq!(json_candidates(raw).first(), Some(&raw));
        let v: Vec<serde_json::Value> = parse_structured(raw).unwrap();
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn fences_inside_string_values_survive() {
        let raw = "{\"url\": \"```not a fence```\"}";
        let d: Decision = parse_structured(raw).unwrap();
        assert_eq!(d.url.as_deref(), Some("```not a fence```"));
    }

    #[test]
    fn no_json_is_an_error() {
        let err = parse_structured::<Decision>("I could not find anything.").unwrap_err();
        assert!(err.contains("no JSON"), "got: {err}");
    }

    #[test]
    fn type_violation_is_an_error() {
        let err = parse_structured::<Decision>(r#"{"url": 42}"#).unwrap_err();
        assert!(err.contains("invalid type"), "got: {err}");
    }

    #[derive(Debug, Deserialize)]
    struct Transcribed {
        markdown: String,
    }

    #[test]
    fn fenced_reply_quoting_its_own_code_fence() {
        let raw = "```json\n{\"markdown\": \"Look:\\n```rust\\nfn main() {}\\n```\", \"postmark\": {}}\n```";
        let t: Transcribed = parse_structured(raw).unwrap();
        assert_eq!(t.markdown, "Look:\n```rust\nfn main() {}\n```");
    }

    #[test]
    fn bracketed_citation_before_object() {
        let raw = r#"Result [2] matches best: {"url": "https://x.com/jack/status/20"}"#;
        let d: Decision = parse_structured(raw).unwrap();
        assert_eq!(d.url.as_deref(), Some("https://x.com/jack/status/20"));
    }

    #[test]
    fn braced_aside_before_array() {
        let raw = r#"Queries (see {notes}): ["a", "b"]"#;
        let v: Vec<String> = parse_structured(raw).unwrap();
        assert_eq!(v, vec!["a", "b"]);
    }

    #[test]
    fn candidates_are_unique_and_ordered() {
        let raw = "{\"a\": [1]}";
        assert_eq!(json_candidates(raw), vec![raw, "[1]"]);
    }
}
