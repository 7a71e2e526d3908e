//! Prompts and output schemas for every model call in the pipeline.
//!
//! Centralising prompts here serves two purposes:
//!
//! 1. **Single source of truth** — changing how the model is asked for a
//!    postmark, queries, or a URL decision means editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the rendered prompts without
//!    a model, so regressions in what gets sent are easy to catch.
//!
//! Callers can override the extraction prompt via
//! [`crate::config::VerificationConfig::system_prompt`].

use crate::capability::SearchHit;
use crate::output::Postmark;

/// Role prompt for the extractor (vision call).
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a forensic document examiner. You are given a screenshot ("postcard") of content from the web, usually a social-media post.

Do two things:

1. TRANSCRIPT
   - Transcribe ALL legible text as Markdown, in the order a human would read it
   - Interleave structure: use **bold** for display names, > for quoted posts,
     - for lists, and keep line breaks that carry meaning
   - Do NOT summarise, translate, or correct the text

2. POSTMARK
   - platform: the site the screenshot comes from; exactly one of
     "X", "YouTube", "Reddit", "Instagram", "Other"
   - username: the handle as displayed (e.g. "@jack"), if visible
   - timestampText: the timestamp exactly as displayed ("2h ago", "Oct 12, 2025"),
     do NOT normalise it
   - engagement: counters exactly as displayed ("1.2K"), keyed by name
     (likes, retweets, views, replies, …); values are strings
   - mainText: the dominant content of the post
   - uiAnchors: key UI elements (buttons, logos, badges) with their position
     and your confidence between 0 and 1

Omit any field you cannot read. Never invent values."#;

/// User prompt accompanying the screenshot.
pub const EXTRACTION_USER_PROMPT: &str =
    "Analyze this postcard. Return the transcript and postmark as a single JSON object.";

/// Output shape of the extraction call.
pub const EXTRACTION_SCHEMA: &str = r#"{
  "markdown": string,                      // transcript
  "postmark": {
    "platform": "X" | "YouTube" | "Reddit" | "Instagram" | "Other",
    "username"?: string,
    "timestampText"?: string,
    "engagement"?: { [counter: string]: string },
    "mainText": string,
    "uiAnchors"?: [{ "element": string, "position": string, "confidence": number }]
  }
}"#;

/// Role prompt for the navigator's two text calls.
pub const NAVIGATOR_SYSTEM_PROMPT: &str = "You are the navigator of Postcard, a digital forensics \
system. Your goal is to triangulate the exact live source URL of a screenshot.";

/// Output shape of the query-generation call.
pub const QUERIES_SCHEMA: &str = r#"["query 1", "query 2", ...]   // a JSON array of strings"#;

/// Output shape of the URL-resolution call.
pub const RESOLUTION_SCHEMA: &str = r#"{ "url": string | null }"#;

/// Schema suffix appended to every system prompt.
pub fn schema_instruction(schema: &str) -> String {
    format!(
        "Respond with JSON only — no prose, no code fences — matching this shape:\n{}",
        schema
    )
}

/// Prompt for navigator state 1.
pub fn query_generation_prompt(postmark: &Postmark, excerpt: &str, count: usize) -> String {
    let engagement = postmark
        .engagement
        .as_ref()
        .and_then(|e| serde_json::to_string(e).ok())
        .unwrap_or_else(|| "unknown".to_string());

    let hint = match postmark.platform.site_hint() {
        Some(site) => format!(
            "The platform is {}: restrict at least one query with '{}'.",
            postmark.platform, site
        ),
        None => "The platform is unknown: do not restrict queries to a site.".to_string(),
    };

    format!(
        "Postmark metadata:\n\
         - Platform: {}\n\
         - Username: {}\n\
         - Timestamp: {}\n\
         - Engagement: {}\n\n\
         Content preview:\n{}\n\n\
         Generate {} high-precision web search queries to find the original post or page.\n\
         {}\n\
         Focus on unique phrases, usernames, and timestamp alignment.",
        postmark.platform,
        postmark.username.as_deref().unwrap_or("unknown"),
        postmark.timestamp_text.as_deref().unwrap_or("unknown"),
        engagement,
        excerpt,
        count,
        hint,
    )
}

/// Prompt for navigator state 3.
///
/// `results` pairs each issued query with its hits, in query order.
pub fn resolution_prompt(
    postmark: &Postmark,
    excerpt: &str,
    results: &[(String, Vec<SearchHit>)],
) -> String {
    let rendered = serde_json::to_string_pretty(
        &results
            .iter()
            .map(|(query, hits)| serde_json::json!({ "query": query, "results": hits }))
            .collect::<Vec<_>>(),
    )
    .unwrap_or_else(|_| "[]".to_string());

    format!(
        "Analyze these search results and identify the most likely original URL for the screenshot.\n\n\
         Target metadata:\n\
         - Platform: {}\n\
         - Username: {}\n\
         - Content snippet: {}\n\n\
         Search results:\n{}\n\n\
         If a high-confidence match is found, return its URL. If not, return null.",
        postmark.platform,
        postmark.username.as_deref().unwrap_or("unknown"),
        excerpt,
        rendered,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Platform;
    use std::collections::BTreeMap;

    fn x_postmark() -> Postmark {
        let mut pm = Postmark::new("just setting up my twttr");
        pm.platform = Platform::X;
        pm.username = Some("@jack".into());
        pm.timestamp_text = Some("Mar 21, 2006".into());
        pm.engagement = Some(BTreeMap::from([("likes".to_string(), "1.2K".to_string())]));
        pm
    }

    #[test]
    fn query_prompt_carries_site_hint_and_count() {
        let p = query_generation_prompt(&x_postmark(), "preview", 3);
        assert!(p.contains("site:x.com"));
        assert!(p.contains("Generate 3 "));
        assert!(p.contains("@jack"));
        assert!(p.contains(r#""likes":"1.2K""#));
    }

    #[test]
    fn query_prompt_without_platform_has_no_site() {
        let p = query_generation_prompt(&Postmark::new("hello"), "preview", 3);
        assert!(!p.contains("site:"));
        assert!(p.contains("Username: unknown"));
    }

    #[test]
    fn youtube_hint() {
        let mut pm = Postmark::new("video");
        pm.platform = Platform::YouTube;
        assert!(query_generation_prompt(&pm, "", 3).contains("site:youtube.com"));
    }

    #[test]
    fn resolution_prompt_lists_queries_in_order() {
        let results = vec![
            ("first query".to_string(), vec![]),
            (
                "second query".to_string(),
                vec![SearchHit {
                    url: "https://x.com/jack/status/20".into(),
                    title: None,
                    snippet: None,
                }],
            ),
        ];
        let p = resolution_prompt(&x_postmark(), "snippet", &results);
        let a = p.find("first query").unwrap();
        let b = p.find("second query").unwrap();
        assert!(a < b);
        assert!(p.contains("https://x.com/jack/status/20"));
        assert!(p.contains("return null"));
    }

    #[test]
    fn extraction_prompt_names_every_platform() {
        for name in ["X", "YouTube", "Reddit", "Instagram", "Other"] {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(&format!("\"{name}\"")));
        }
    }
}
