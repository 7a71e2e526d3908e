//! [`PageLoader`] that fetches the candidate page over plain HTTP.
//!
//! No JavaScript runs, so client-rendered posts come back mostly empty;
//! the title and server-rendered text still carry the platform name and,
//! for many sites, the post body. Used when Chromium is unavailable.

use super::{CapabilityError, LoadedPage, PageLoader};
use crate::error::PostcardError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Elements whose text never reaches the reader.
const INVISIBLE: [&str; 4] = ["script", "style", "noscript", "template"];

const USER_AGENT: &str = concat!("edgequake-postcard/", env!("CARGO_PKG_VERSION"));

/// Static HTTP page loader.
pub struct HttpPageLoader {
    client: Client,
    timeout: Duration,
}

impl HttpPageLoader {
    pub fn new(timeout: Duration) -> Result<Self, PostcardError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PostcardError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn load(&self, url: &str) -> Result<LoadedPage, CapabilityError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::Timeout {
                    secs: self.timeout.as_secs(),
                }
            } else {
                CapabilityError::Navigation(e.to_string())
            }
        })?;

        let status = response.status();
        let final_url = Some(response.url().to_string());
        if !status.is_success() {
            return Err(CapabilityError::Http {
                status: status.as_u16(),
                detail: format!("GET {url}"),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| CapabilityError::Navigation(format!("reading body: {e}")))?;
        debug!(len = html.len(), "Fetched page HTML");

        let (title, visible_text) = extract_text(&html);
        Ok(LoadedPage {
            title,
            visible_text,
            final_url,
        })
    }
}

/// Extract `(title, visible body text)` from an HTML document.
pub fn extract_text(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut chunks: Vec<&str> = Vec::new();
    if let Some(body) = document.select(&BODY).next() {
        for node in body.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| INVISIBLE.contains(&el.name()))
            });
            if hidden {
                continue;
            }
            let t = text.trim();
            if !t.is_empty() {
                chunks.push(t);
            }
        }
    }

    (title, chunks.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_visible_text() {
        let html = r#"<html><head><title> jack on X </title>
            <style>.a { color: red }</style></head>
            <body><div>just setting up my twttr</div>
            <script>var secret = "hidden";</script>
            <span>8:50 PM · Mar 21, 2006</span></body></html>"#;
        let (title, text) = extract_text(html);
        assert_eq!(title, "jack on X");
        assert!(text.contains("just setting up my twttr"));
        assert!(text.contains("Mar 21, 2006"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn empty_document_yields_empty_strings() {
        let (title, text) = extract_text("");
        assert!(title.is_empty());
        assert!(text.is_empty());
    }

    #[test]
    fn nested_noscript_is_skipped() {
        let html = "<body><noscript><p>enable JS</p></noscript><p>post</p></body>";
        let (_, text) = extract_text(html);
        assert_eq!(text, "post");
    }
}
