//! Verification entry points.
//!
//! [`Verifier`] owns one instance of each pipeline component, built once
//! from a [`VerificationConfig`], and runs them in order for every
//! screenshot passed to [`Verifier::process`]. The free functions are
//! conveniences that build a verifier per call.
//!
//! ## Failure boundary
//!
//! Preprocessing and extraction errors abort the run: without a postmark
//! there is nothing to verify. Everything after extraction degrades the
//! report instead, so a caller always gets either a complete
//! [`PostcardReport`] or one [`PostcardError`].

use crate::capability::http::HttpPageLoader;
use crate::capability::llm::LlmInference;
use crate::capability::search::TavilySearch;
use crate::capability::{Inference, PageLoader, WebSearch};
use crate::config::{PageLoaderKind, PreprocessOptions, VerificationConfig};
use crate::error::PostcardError;
use crate::output::{AuditResult, PipelineStats, PostcardReport};
use crate::pipeline::audit::Auditor;
use crate::pipeline::extract::{Extractor, ExtractorSettings};
use crate::pipeline::input;
use crate::pipeline::navigate::{Navigator, NavigatorSettings};
use crate::pipeline::preprocess::{preprocess_image, OUTPUT_MIME};
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Audit-log entry of a run whose navigator found no candidate URL.
pub const SKIP_AUDIT_REASON: &str = "Skipping audit: no target URL identified.";

/// The pipeline orchestrator.
///
/// # Example
/// ```rust,no_run
/// use edgequake_postcard::{Verifier, VerificationConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = Verifier::new(&VerificationConfig::default())?;
/// let bytes = std::fs::read("screenshot.png")?;
/// let report = verifier.process(&bytes).await?;
/// println!("{}", report.to_markdown());
/// # Ok(())
/// # }
/// ```
pub struct Verifier {
    preprocess: PreprocessOptions,
    extractor: Extractor,
    navigator: Navigator,
    auditor: Auditor,
    progress: ProgressCallback,
}

impl Verifier {
    /// Build every component, resolving capabilities from `config`.
    ///
    /// Injected capabilities (`config.inference`, `config.search`,
    /// `config.page_loader`) win; otherwise the production adapters are
    /// constructed, which fails if their credentials are missing.
    pub fn new(config: &VerificationConfig) -> Result<Self, PostcardError> {
        let inference: Arc<dyn Inference> = match config.inference {
            Some(ref inference) => Arc::clone(inference),
            None => Arc::new(LlmInference::from_config(config)?),
        };
        let search: Arc<dyn WebSearch> = match config.search {
            Some(ref search) => Arc::clone(search),
            None => Arc::new(TavilySearch::from_config(config)?),
        };
        let loader = resolve_page_loader(config)?;
        let progress: ProgressCallback = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));

        let extractor = Extractor::new(
            Arc::clone(&inference),
            ExtractorSettings {
                system_prompt: config.system_prompt.clone(),
                timeout: Duration::from_secs(config.api_timeout_secs),
            },
        );
        let navigator = Navigator::new(
            inference,
            search,
            NavigatorSettings {
                query_count: config.query_count,
                query_excerpt_chars: config.query_excerpt_chars,
                resolve_excerpt_chars: config.resolve_excerpt_chars,
                inference_timeout: Duration::from_secs(config.api_timeout_secs),
                search_timeout: Duration::from_secs(config.search_timeout_secs),
            },
        )
        .with_progress(Arc::clone(&progress));

        Ok(Self {
            preprocess: config.preprocess,
            extractor,
            navigator,
            auditor: Auditor::new(loader),
            progress,
        })
    }

    /// Verify one screenshot.
    ///
    /// # Errors
    /// * [`PostcardError::ImageDecode`] if `image` is not a decodable image.
    /// * [`PostcardError::ExtractionParse`] / [`PostcardError::ExtractionService`]
    ///   if the postmark could not be extracted.
    pub async fn process(&self, image: &[u8]) -> Result<PostcardReport, PostcardError> {
        let run_start = Instant::now();
        let mut stats = PipelineStats::default();
        self.progress.on_run_start();
        info!("Verifying screenshot ({} bytes)", image.len());

        // ── Preprocess ───────────────────────────────────────────────────
        self.progress.on_stage_start(Stage::Preprocess);
        let t = Instant::now();
        let normalized = preprocess_image(image.to_vec(), self.preprocess).await?;
        stats.preprocess_ms = elapsed_ms(t);
        self.progress.on_stage_complete(
            Stage::Preprocess,
            &format!("{} bytes PNG", normalized.len()),
        );

        // ── Extract ──────────────────────────────────────────────────────
        self.progress.on_stage_start(Stage::Extract);
        let t = Instant::now();
        let extraction = self
            .extractor
            .extract(&normalized, Some(OUTPUT_MIME))
            .await?;
        stats.extract_ms = elapsed_ms(t);
        self.progress.on_stage_complete(
            Stage::Extract,
            &format!("platform {}", extraction.postmark.platform),
        );

        // ── Triangulate ──────────────────────────────────────────────────
        let t = Instant::now();
        let triangulation = self
            .navigator
            .triangulate(&extraction.postmark, &extraction.transcript)
            .await;
        stats.triangulate_ms = elapsed_ms(t);

        // ── Audit ────────────────────────────────────────────────────────
        self.progress.on_stage_start(Stage::Audit);
        let t = Instant::now();
        let audit = match triangulation.candidate_url {
            Some(ref url) => {
                let audit = self.auditor.audit(url, &extraction.postmark).await;
                if audit.origin_score() == 0 {
                    let reason = audit.audit_log().last().map(String::as_str).unwrap_or("");
                    self.progress.on_stage_degraded(Stage::Audit, reason);
                } else {
                    self.progress.on_stage_complete(
                        Stage::Audit,
                        &format!("score {:.2}", audit.total_score()),
                    );
                }
                audit
            }
            None => {
                debug!("No candidate URL; auditor not invoked");
                self.progress
                    .on_stage_complete(Stage::Audit, "skipped: no target URL");
                AuditResult::skipped(SKIP_AUDIT_REASON)
            }
        };
        stats.audit_ms = elapsed_ms(t);
        stats.total_ms = elapsed_ms(run_start);

        info!(
            "Verdict: {} (score {:.2}) in {}ms",
            audit.verdict(),
            audit.total_score(),
            stats.total_ms
        );
        self.progress.on_run_complete(audit.total_score());

        Ok(PostcardReport {
            transcript: extraction.transcript,
            postmark: extraction.postmark,
            triangulation,
            audit,
            timestamp: Utc::now(),
            stats,
        })
    }
}

/// Verify screenshot bytes held in memory.
pub async fn verify(
    image: &[u8],
    config: &VerificationConfig,
) -> Result<PostcardReport, PostcardError> {
    Verifier::new(config)?.process(image).await
}

/// Verify a screenshot given as a local path or an http(s) URL.
///
/// # Errors
/// Input errors ([`PostcardError::FileNotFound`], [`PostcardError::DownloadFailed`],
/// …) in addition to those of [`Verifier::process`].
pub async fn verify_file(
    input_str: impl AsRef<str>,
    config: &VerificationConfig,
) -> Result<PostcardReport, PostcardError> {
    let input_str = input_str.as_ref();
    // Build first: a missing API key should fail before any download.
    let verifier = Verifier::new(config)?;
    let input = input::resolve_input(input_str, config.download_timeout_secs).await?;
    info!(
        "Loaded {} ({} bytes, {})",
        input.source,
        input.bytes.len(),
        input.mime_hint.as_deref().unwrap_or("unknown type")
    );
    verifier.process(&input.bytes).await
}

/// Synchronous wrapper around [`verify_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn verify_sync(
    input_str: impl AsRef<str>,
    config: &VerificationConfig,
) -> Result<PostcardReport, PostcardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PostcardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(verify_file(input_str, config))
}

fn resolve_page_loader(config: &VerificationConfig) -> Result<Arc<dyn PageLoader>, PostcardError> {
    if let Some(ref loader) = config.page_loader {
        return Ok(Arc::clone(loader));
    }
    let timeout = Duration::from_secs(config.page_timeout_secs);
    match config.page_loader_kind {
        #[cfg(feature = "browser")]
        PageLoaderKind::Browser => Ok(Arc::new(
            crate::capability::browser::BrowserPageLoader::new(timeout),
        )),
        #[cfg(not(feature = "browser"))]
        PageLoaderKind::Browser => Err(PostcardError::CapabilityNotConfigured {
            capability: "Headless browser page loader".to_string(),
            hint: "Rebuild with `--features browser` or use the HTTP page loader.".to_string(),
        }),
        PageLoaderKind::Http => Ok(Arc::new(HttpPageLoader::new(timeout)?)),
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
