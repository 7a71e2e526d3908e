//! External capabilities the pipeline depends on.
//!
//! The verifier never talks to a model, a search engine, or a browser
//! directly. Each component receives a handle to one of these traits at
//! construction, so production adapters and deterministic test doubles are
//! interchangeable:
//!
//! | Trait | Used by | Production adapter |
//! |-------|---------|--------------------|
//! | [`Inference`] | extractor, navigator | [`llm::LlmInference`] (edgequake-llm) |
//! | [`WebSearch`] | navigator | [`search::TavilySearch`] (reqwest) |
//! | [`PageLoader`] | auditor | [`browser::BrowserPageLoader`] (chromiumoxide), [`http::HttpPageLoader`] (reqwest + scraper) |
//!
//! Implementations are responsible for their own resources: a page loader
//! must release any rendering session before `load` returns, on success and
//! on failure alike.

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;
pub mod llm;
pub mod search;

use async_trait::async_trait;
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure reported by a capability implementation.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The call did not finish within its time budget.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backing service could not be reached or started.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// A page could not be navigated to.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Anything else.
    #[error("{0}")]
    Failed(String),
}

// ── Inference ────────────────────────────────────────────────────────────

/// A single prompt to a (possibly vision-capable) model that must answer
/// with JSON matching `schema`.
#[derive(Clone)]
pub struct InferenceRequest {
    /// Role / instructions.
    pub system: String,
    /// The task itself.
    pub prompt: String,
    /// Image attachment for vision calls.
    pub image: Option<ImageData>,
    /// Human-readable description of the required output shape.
    pub schema: &'static str,
}

impl fmt::Debug for InferenceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceRequest")
            .field("system", &self.system)
            .field("prompt", &self.prompt)
            .field(
                "image",
                &self
                    .image
                    .as_ref()
                    .map(|img| format!("<{} bytes base64>", img.data.len())),
            )
            .field("schema", &self.schema)
            .finish()
    }
}

impl InferenceRequest {
    /// Text-only request.
    pub fn text(system: impl Into<String>, prompt: impl Into<String>, schema: &'static str) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            image: None,
            schema,
        }
    }

    /// Attach an image.
    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }
}

/// Raw model answer. Parsing into typed output is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct InferenceResponse {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Structured-output inference.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, CapabilityError>;
}

// ── Web search ───────────────────────────────────────────────────────────

/// One search hit. Passed to the URL resolver as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Ordered hits for `query`, best first.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CapabilityError>;
}

// ── Page loading ─────────────────────────────────────────────────────────

/// A live page after rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedPage {
    pub title: String,
    /// The text a reader would see (`innerText` of the body).
    pub visible_text: String,
    /// URL after redirects, when the loader knows it.
    pub final_url: Option<String>,
}

/// Page fetch / render.
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Load `url` and return its visible text. Unreachable pages, HTTP
    /// errors and timeouts are errors.
    async fn load(&self, url: &str) -> Result<LoadedPage, CapabilityError>;
}
