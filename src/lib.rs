//! # edgequake-postcard
//!
//! Forensic verification of social-media screenshots ("postcards").
//!
//! ## Why this crate?
//!
//! A screenshot is trivially easy to fake and hard to check by eye. This
//! crate reads the screenshot with a vision model, tries to find the live
//! original on the web, and scores how well the live page corroborates what
//! the screenshot claims, with an evidence log for every point awarded.
//!
//! ## Pipeline Overview
//!
//! ```text
//! screenshot bytes
//!  │
//!  ├─ 1. Preprocess  contrast / brightness / sharpen → PNG (spawn_blocking)
//!  ├─ 2. Extract     vision model → transcript + postmark        (fatal on error)
//!  ├─ 3. Navigate    queries → concurrent web search → candidate URL
//!  ├─ 4. Audit       load live page → origin / temporal / visual scores
//!  └─ 5. Report      PostcardReport { transcript, postmark, triangulation, audit }
//! ```
//!
//! `totalScore = 0.4·origin + 0.3·temporal + 0.3·visual`, always derived,
//! never set. Steps 3 and 4 degrade instead of failing: an unreachable page
//! or a failed search lowers the score and says why in the audit log.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_postcard::{verify_file, VerificationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Model from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY,
//!     // search from TAVILY_API_KEY.
//!     let config = VerificationConfig::default();
//!     let report = verify_file("screenshot.png", &config).await?;
//!     println!("{} ({:.2})", report.audit.verdict(), report.audit.total_score());
//!     for line in report.audit.audit_log() {
//!         println!("  - {line}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Capabilities
//!
//! The model, the search engine and the page loader sit behind the
//! [`Inference`], [`WebSearch`] and [`PageLoader`] traits. Inject your own
//! through [`VerificationConfigBuilder`] to swap backends or to run the
//! pipeline offline against deterministic doubles.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`     | on | Enables the `postcard` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `browser` | on | Headless Chromium page loader (chromiumoxide) |
//!
//! Without `browser`, use [`PageLoaderKind::Http`], which fetches pages
//! without running JavaScript:
//! ```toml
//! edgequake-postcard = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod verify;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::{
    CapabilityError, Inference, InferenceRequest, InferenceResponse, LoadedPage, PageLoader,
    SearchHit, WebSearch,
};
pub use config::{PageLoaderKind, PreprocessOptions, VerificationConfig, VerificationConfigBuilder};
pub use error::{PostcardError, StageError};
pub use output::{
    AuditResult, Extraction, PipelineStats, Platform, PostcardReport, Postmark,
    TriangulationResult, UiAnchor, Verdict,
};
pub use progress::{NoopProgressCallback, ProgressCallback, Stage, VerificationProgressCallback};
pub use verify::{verify, verify_file, verify_sync, Verifier};
