//! Error types for the edgequake-postcard library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PostcardError`] — **Fatal**: the verification cannot produce a
//!   report at all (undecodable image, extraction failed, provider not
//!   configured). Returned as `Err(PostcardError)` from
//!   [`crate::verify::Verifier::process`] and the `verify*` functions.
//!
//! * [`StageError`] — **Non-fatal**: a stage after extraction failed
//!   (query generation, one search query, URL resolution, page navigation).
//!   These never escape `process`; they degrade the affected report fields
//!   and are written into the audit trail or the tracing log.
//!
//! The boundary sits at the extractor: everything up to and including
//! extraction is required to say anything about the screenshot, everything
//! after it only adds corroborating evidence.

use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-postcard library.
#[derive(Debug, Error)]
pub enum PostcardError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Preprocessing ─────────────────────────────────────────────────────
    /// The input bytes are not a decodable raster image.
    #[error("Preprocessing failed: input is not a decodable image: {detail}")]
    ImageDecode { detail: String },

    // ── Extraction ────────────────────────────────────────────────────────
    /// The vision model answered, but not with a valid postmark object.
    #[error("Extraction failed: model output is not a valid postmark: {detail}")]
    ExtractionParse { detail: String },

    /// The vision capability errored, timed out, or was unreachable.
    #[error("Extraction failed: vision service error: {detail}")]
    ExtractionService { detail: String },

    // ── Capability wiring ─────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A non-LLM capability (web search, page loader) could not be built.
    #[error("{capability} is not configured.\n{hint}")]
    CapabilityNotConfigured { capability: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PostcardError {
    /// The pipeline stage that failed, if the error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PostcardError::ImageDecode { .. } => Some(Stage::Preprocess),
            PostcardError::ExtractionParse { .. } | PostcardError::ExtractionService { .. } => {
                Some(Stage::Extract)
            }
            _ => None,
        }
    }
}

/// A non-fatal error from a stage after extraction.
///
/// Logged and folded into the report; the caller still receives a complete
/// [`crate::output::PostcardReport`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The model could not produce a usable list of search queries.
    #[error("query generation failed: {detail}")]
    QueryGeneration { detail: String },

    /// A single search query failed; its result slot is left empty.
    #[error("search failed for query '{query}': {detail}")]
    SearchQuery { query: String, detail: String },

    /// The model could not produce a usable URL decision.
    #[error("URL resolution failed: {detail}")]
    Resolution { detail: String },

    /// The candidate page could not be loaded.
    #[error("navigation to '{url}' failed: {detail}")]
    AuditNavigation { url: String, detail: String },
}

impl StageError {
    /// The stage this error degraded.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::QueryGeneration { .. } => Stage::GenerateQueries,
            StageError::SearchQuery { .. } => Stage::ExecuteSearch,
            StageError::Resolution { .. } => Stage::ResolveUrl,
            StageError::AuditNavigation { .. } => Stage::Audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_decode_display_names_stage() {
        let e = PostcardError::ImageDecode {
            detail: "unsupported format".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Preprocessing"), "got: {msg}");
        assert!(msg.contains("unsupported format"));
        assert_eq!(e.stage(), Some(Stage::Preprocess));
    }

    #[test]
    fn extraction_errors_map_to_extract_stage() {
        let parse = PostcardError::ExtractionParse {
            detail: "missing field `mainText`".into(),
        };
        let service = PostcardError::ExtractionService {
            detail: "connection refused".into(),
        };
        assert_eq!(parse.stage(), Some(Stage::Extract));
        assert_eq!(service.stage(), Some(Stage::Extract));
        assert!(parse.to_string().contains("mainText"));
    }

    #[test]
    fn config_error_has_no_stage() {
        let e = PostcardError::InvalidConfig("query_count must be 1–10".into());
        assert_eq!(e.stage(), None);
    }

    #[test]
    fn search_query_display() {
        let e = StageError::SearchQuery {
            query: "site:x.com hello".into(),
            detail: "HTTP 502".into(),
        };
        assert!(e.to_string().contains("site:x.com hello"));
        assert_eq!(e.stage(), Stage::ExecuteSearch);
    }

    #[test]
    fn navigation_display() {
        let e = StageError::AuditNavigation {
            url: "https://x.com/a/status/1".into(),
            detail: "net::ERR_NAME_NOT_RESOLVED".into(),
        };
        assert!(e.to_string().contains("ERR_NAME_NOT_RESOLVED"));
        assert_eq!(e.stage(), Stage::Audit);
    }
}
