//! [`Inference`] backed by an edgequake-llm provider.
//!
//! Deliberately thin: prompt text lives in [`crate::prompts`], JSON parsing
//! in [`crate::pipeline::structured`], timeouts in the calling component.
//! This adapter only lays out the chat messages and maps errors.
//!
//! ## Message Layout
//!
//! 1. **System message** — the caller's instructions followed by the
//!    required output schema
//! 2. **User message** — the task prompt, with the screenshot attached for
//!    vision calls

use super::{CapabilityError, Inference, InferenceRequest, InferenceResponse};
use crate::config::VerificationConfig;
use crate::error::PostcardError;
use crate::prompts::schema_instruction;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Structured inference over any edgequake-llm chat provider.
pub struct LlmInference {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmInference {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }

    /// Resolve a provider from the config and wrap it.
    pub fn from_config(config: &VerificationConfig) -> Result<Self, PostcardError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }
}

#[async_trait]
impl Inference for LlmInference {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, CapabilityError> {
        let start = Instant::now();
        let system = format!("{}\n\n{}", request.system, schema_instruction(request.schema));

        let user = match request.image {
            Some(image) => ChatMessage::user_with_images(request.prompt.as_str(), vec![image]),
            None => ChatMessage::user(request.prompt.as_str()),
        };
        let messages = vec![ChatMessage::system(system.as_str()), user];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| CapabilityError::Failed(format!("{e}")))?;

        debug!(
            "Inference: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(InferenceResponse {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PostcardError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PostcardError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — built by
///    [`ProviderFactory::create_llm_provider`], which reads the matching
///    API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key present** — OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &VerificationConfig) -> Result<Arc<dyn LLMProvider>, PostcardError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PostcardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision-capable LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
