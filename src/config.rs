//! Configuration types for screenshot verification.
//!
//! All verification behaviour is controlled through [`VerificationConfig`],
//! built via its [`VerificationConfigBuilder`]. The config is the only place
//! external capabilities are wired in: the verifier reads it once at
//! construction and owns the resulting clients for its lifetime.

use crate::capability::{Inference, PageLoader, WebSearch};
use crate::error::PostcardError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Tavily search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";

/// Image normalisation applied before extraction.
///
/// Operations compose in a fixed order: contrast, brightness, sharpen.
/// `PreprocessOptions::default()` requests nothing and is an identity
/// transform on pixel content.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreprocessOptions {
    /// Multiplicative contrast around the mid-grey point (`1.0` = unchanged).
    pub contrast: Option<f32>,
    /// Multiplicative brightness (`1.0` = unchanged).
    pub brightness: Option<f32>,
    /// Apply an unsharp mask.
    pub sharpen: bool,
}

impl PreprocessOptions {
    /// The normalisation used by the pipeline unless overridden: a mild
    /// contrast boost and sharpening, which helps small UI text survive.
    pub fn screenshot_default() -> Self {
        Self {
            contrast: Some(1.2),
            brightness: None,
            sharpen: true,
        }
    }

    /// True when no transform is requested.
    pub fn is_identity(&self) -> bool {
        self.contrast.is_none() && self.brightness.is_none() && !self.sharpen
    }
}

/// How the auditor loads a candidate page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageLoaderKind {
    /// Headless Chromium; executes JavaScript. Needs the `browser` feature.
    Browser,
    /// Plain HTTP GET + HTML text extraction. No JavaScript.
    Http,
}

impl Default for PageLoaderKind {
    fn default() -> Self {
        if cfg!(feature = "browser") {
            PageLoaderKind::Browser
        } else {
            PageLoaderKind::Http
        }
    }
}

/// Configuration for a verification run.
///
/// # Example
/// ```rust
/// use edgequake_postcard::{PreprocessOptions, VerificationConfig};
///
/// let config = VerificationConfig::builder()
///     .model("gpt-4.1-mini")
///     .query_count(3)
///     .preprocess(PreprocessOptions { contrast: Some(1.3), brightness: None, sharpen: true })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct VerificationConfig {
    /// Normalisation applied to the screenshot. Default: contrast 1.2 + sharpen.
    pub preprocess: PreprocessOptions,

    /// LLM model identifier. If None, uses `gpt-4.1-nano` for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Injected inference capability. Takes precedence over every provider setting.
    pub inference: Option<Arc<dyn Inference>>,

    /// Injected web-search capability. Takes precedence over the Tavily settings.
    pub search: Option<Arc<dyn WebSearch>>,

    /// Injected page loader. Takes precedence over `page_loader_kind`.
    pub page_loader: Option<Arc<dyn PageLoader>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Extraction and URL resolution are judgement calls over fixed input;
    /// a deterministic model keeps repeated runs comparable.
    pub temperature: f32,

    /// Maximum tokens per model response. Default: 4096.
    pub max_tokens: usize,

    /// Per-inference-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Per-search-call timeout in seconds. Default: 30.
    pub search_timeout_secs: u64,

    /// Per-page-render timeout in seconds. Default: 45.
    pub page_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Number of search queries to generate. Range 1–10. Default: 3.
    pub query_count: usize,

    /// Transcript characters shown to the query generator. Default: 1000.
    ///
    /// Headers, handles and timestamps sit at the top of a screenshot and
    /// dominate search recall; the tail of a long transcript adds cost only.
    pub query_excerpt_chars: usize,

    /// Transcript characters shown to the URL resolver. Default: 500.
    pub resolve_excerpt_chars: usize,

    /// Results requested per search query. Default: 5.
    pub max_results_per_query: usize,

    /// Retries inside the search adapter on transient HTTP failure. Default: 2.
    pub search_retries: u32,

    /// Initial search retry delay in milliseconds (doubles per attempt). Default: 500.
    pub search_backoff_ms: u64,

    /// Search API key. If None, read from `TAVILY_API_KEY`.
    pub search_api_key: Option<String>,

    /// Search API endpoint. Default: [`DEFAULT_SEARCH_ENDPOINT`].
    pub search_endpoint: String,

    /// Page loader used by the auditor.
    pub page_loader_kind: PageLoaderKind,

    /// Custom extraction prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessOptions::screenshot_default(),
            model: None,
            provider_name: None,
            provider: None,
            inference: None,
            search: None,
            page_loader: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 60,
            search_timeout_secs: 30,
            page_timeout_secs: 45,
            download_timeout_secs: 120,
            query_count: 3,
            query_excerpt_chars: 1000,
            resolve_excerpt_chars: 500,
            max_results_per_query: 5,
            search_retries: 2,
            search_backoff_ms: 500,
            search_api_key: None,
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            page_loader_kind: PageLoaderKind::default(),
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationConfig")
            .field("preprocess", &self.preprocess)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("inference", &self.inference.as_ref().map(|_| "<dyn Inference>"))
            .field("search", &self.search.as_ref().map(|_| "<dyn WebSearch>"))
            .field("page_loader", &self.page_loader.as_ref().map(|_| "<dyn PageLoader>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("query_count", &self.query_count)
            .field("query_excerpt_chars", &self.query_excerpt_chars)
            .field("resolve_excerpt_chars", &self.resolve_excerpt_chars)
            .field("max_results_per_query", &self.max_results_per_query)
            .field("search_api_key", &self.search_api_key.as_ref().map(|_| "<redacted>"))
            .field("search_endpoint", &self.search_endpoint)
            .field("page_loader_kind", &self.page_loader_kind)
            .finish()
    }
}

impl VerificationConfig {
    /// Create a new builder for `VerificationConfig`.
    pub fn builder() -> VerificationConfigBuilder {
        VerificationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`VerificationConfig`].
pub struct VerificationConfigBuilder {
    config: VerificationConfig,
}

impl fmt::Debug for VerificationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl VerificationConfigBuilder {
    pub fn preprocess(mut self, options: PreprocessOptions) -> Self {
        self.config.preprocess = options;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn inference(mut self, inference: Arc<dyn Inference>) -> Self {
        self.config.inference = Some(inference);
        self
    }

    pub fn search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.config.search = Some(search);
        self
    }

    pub fn page_loader(mut self, loader: Arc<dyn PageLoader>) -> Self {
        self.config.page_loader = Some(loader);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn search_timeout_secs(mut self, secs: u64) -> Self {
        self.config.search_timeout_secs = secs;
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn query_count(mut self, n: usize) -> Self {
        self.config.query_count = n;
        self
    }

    pub fn query_excerpt_chars(mut self, n: usize) -> Self {
        self.config.query_excerpt_chars = n;
        self
    }

    pub fn resolve_excerpt_chars(mut self, n: usize) -> Self {
        self.config.resolve_excerpt_chars = n;
        self
    }

    pub fn max_results_per_query(mut self, n: usize) -> Self {
        self.config.max_results_per_query = n.max(1);
        self
    }

    pub fn search_retries(mut self, n: u32) -> Self {
        self.config.search_retries = n;
        self
    }

    pub fn search_backoff_ms(mut self, ms: u64) -> Self {
        self.config.search_backoff_ms = ms;
        self
    }

    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.search_api_key = Some(key.into());
        self
    }

    pub fn search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.search_endpoint = endpoint.into();
        self
    }

    pub fn page_loader_kind(mut self, kind: PageLoaderKind) -> Self {
        self.config.page_loader_kind = kind;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<VerificationConfig, PostcardError> {
        let c = &self.config;
        if c.query_count == 0 || c.query_count > 10 {
            return Err(PostcardError::InvalidConfig(format!(
                "query_count must be 1–10, got {}",
                c.query_count
            )));
        }
        for (name, factor) in [
            ("contrast", c.preprocess.contrast),
            ("brightness", c.preprocess.brightness),
        ] {
            if let Some(f) = factor {
                if !f.is_finite() || f <= 0.0 {
                    return Err(PostcardError::InvalidConfig(format!(
                        "{name} must be a positive factor, got {f}"
                    )));
                }
            }
        }
        for (name, secs) in [
            ("api_timeout_secs", c.api_timeout_secs),
            ("search_timeout_secs", c.search_timeout_secs),
            ("page_timeout_secs", c.page_timeout_secs),
            ("download_timeout_secs", c.download_timeout_secs),
        ] {
            if secs == 0 {
                return Err(PostcardError::InvalidConfig(format!(
                    "{name} must be ≥ 1"
                )));
            }
        }
        if c.query_excerpt_chars == 0 || c.resolve_excerpt_chars == 0 {
            return Err(PostcardError::InvalidConfig(
                "Transcript excerpt lengths must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
