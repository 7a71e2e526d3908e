//! Auditor: live page vs. screenshot postmark → three-factor trust score.
//!
//! | Check | Passes | Score |
//! |-------|--------|-------|
//! | Origin | page loads | 1, else 0 and stop |
//! | Temporal | postmark timestamp found verbatim in page text | 1; 0.5 if not found; 0 if no timestamp |
//! | Visual | platform name found in page text (case-insensitive) | 0.9, else 0.4 |
//!
//! Every check appends one line to the audit log whatever its outcome; the
//! log is what makes the score reviewable.

use crate::capability::PageLoader;
use crate::error::StageError;
use crate::output::{AuditResult, Postmark};
use std::sync::Arc;
use tracing::{debug, warn};

/// Temporal score when the timestamp is present on the live page.
pub const TEMPORAL_MATCH: f64 = 1.0;
/// Temporal score when the timestamp is absent from the live page.
/// Live pages often render relative times differently ("2h" vs "2h ago").
pub const TEMPORAL_UNCONFIRMED: f64 = 0.5;
/// Visual score when the page names the expected platform.
pub const VISUAL_MATCH: f64 = 0.9;
/// Visual score when the platform name is missing from the page text.
pub const VISUAL_MISMATCH: f64 = 0.4;

pub struct Auditor {
    loader: Arc<dyn PageLoader>,
}

impl Auditor {
    pub fn new(loader: Arc<dyn PageLoader>) -> Self {
        Self { loader }
    }

    /// Load `url` and score it against `postmark`. Never fails: an
    /// unreachable page is an all-zero result with the reason logged.
    pub async fn audit(&self, url: &str, postmark: &Postmark) -> AuditResult {
        let mut log = vec![format!("Starting audit for URL: {url}")];

        let page = match self.loader.load(url).await {
            Ok(page) => page,
            Err(e) => {
                let err = StageError::AuditNavigation {
                    url: url.to_string(),
                    detail: e.to_string(),
                };
                warn!("{}", err);
                log.push(format!("Audit failed: {e}"));
                return AuditResult::new(false, 0.0, 0.0, log);
            }
        };

        log.push("URL verified: Direct match found.".to_string());
        log.push(format!("Page title: {}", page.title));
        debug!(
            "Loaded {} ({} chars of visible text)",
            page.final_url.as_deref().unwrap_or(url),
            page.visible_text.len()
        );

        let temporal = match postmark.timestamp() {
            Some(ts) if page.visible_text.contains(ts) => {
                log.push(format!(
                    "Temporal match: timestamp \"{ts}\" consistent with live page content."
                ));
                TEMPORAL_MATCH
            }
            Some(ts) => {
                log.push(format!(
                    "Temporal warning: exact timestamp text \"{ts}\" not found in live page."
                ));
                TEMPORAL_UNCONFIRMED
            }
            None => {
                log.push("Temporal check skipped: no timestamp in postmark.".to_string());
                0.0
            }
        };

        let platform = postmark.platform.name();
        let visual = if page
            .visible_text
            .to_lowercase()
            .contains(&platform.to_lowercase())
        {
            log.push(format!(
                "Visual consistency: live page matches the {platform} platform template."
            ));
            VISUAL_MATCH
        } else {
            log.push(format!(
                "Visual anomaly: live page does not identify as {platform}."
            ));
            VISUAL_MISMATCH
        };

        AuditResult::new(true, temporal, visual, log)
    }
}
