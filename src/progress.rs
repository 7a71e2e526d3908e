//! Progress-callback trait for per-stage verification events.
//!
//! Inject an [`Arc<dyn VerificationProgressCallback>`] via
//! [`crate::config::VerificationConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use edgequake_postcard::{Stage, VerificationConfig, VerificationProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl VerificationProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = VerificationConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn VerificationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of the verification pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Contrast / brightness / sharpening of the raw screenshot.
    Preprocess,
    /// Transcript and postmark extraction by the vision model.
    Extract,
    /// Navigator state 1: search query generation.
    GenerateQueries,
    /// Navigator state 2: concurrent web searches.
    ExecuteSearch,
    /// Navigator state 3: pick the live source URL.
    ResolveUrl,
    /// Live page audit and scoring.
    Audit,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Preprocess,
        Stage::Extract,
        Stage::GenerateQueries,
        Stage::ExecuteSearch,
        Stage::ResolveUrl,
        Stage::Audit,
    ];

    /// Short human label used in logs and the CLI.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Extract => "extract",
            Stage::GenerateQueries => "generate queries",
            Stage::ExecuteSearch => "search",
            Stage::ResolveUrl => "resolve url",
            Stage::Audit => "audit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the verifier as it moves through each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because the
/// verifier can be shared across tasks.
pub trait VerificationProgressCallback: Send + Sync {
    /// Called once before preprocessing starts.
    fn on_run_start(&self) {}

    /// Called just before a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes normally.
    ///
    /// `detail` is a short summary, e.g. `"3 queries"` or `"platform X"`.
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// Called when a non-fatal stage failure degrades the report.
    fn on_stage_degraded(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after the report is assembled.
    fn on_run_complete(&self, total_score: f64) {
        let _ = total_score;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl VerificationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::VerificationConfig`].
pub type ProgressCallback = Arc<dyn VerificationProgressCallback>;
