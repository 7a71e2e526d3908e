//! Extractor: screenshot → transcript + postmark.
//!
//! One vision call per screenshot. The model is asked for a single JSON
//! object `{ markdown, postmark }`; the reply is isolated, parsed into typed
//! structs and validated before anything downstream sees it. There is no
//! retry here: a failed extraction aborts the run, so the caller decides
//! whether to try again.

use crate::capability::{Inference, InferenceRequest};
use crate::error::PostcardError;
use crate::output::{Extraction, Postmark};
use crate::pipeline::encode::encode_image;
use crate::pipeline::postprocess::clean_transcript;
use crate::pipeline::preprocess::sniff_mime;
use crate::pipeline::structured::parse_structured;
use crate::prompts::{EXTRACTION_SCHEMA, EXTRACTION_SYSTEM_PROMPT, EXTRACTION_USER_PROMPT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Extraction knobs taken from the verification config.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Replaces [`EXTRACTION_SYSTEM_PROMPT`] when set.
    pub system_prompt: Option<String>,
    /// Bound on the vision call.
    pub timeout: Duration,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            system_prompt: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Wire shape of the extraction reply.
#[derive(Debug, Deserialize)]
struct ExtractionReply {
    markdown: String,
    postmark: Postmark,
}

pub struct Extractor {
    inference: Arc<dyn Inference>,
    settings: ExtractorSettings,
}

impl Extractor {
    pub fn new(inference: Arc<dyn Inference>, settings: ExtractorSettings) -> Self {
        Self {
            inference,
            settings,
        }
    }

    /// Transcribe `image` and extract its postmark.
    ///
    /// `mime_hint` describes the encoding of `image`; when absent it is
    /// sniffed from the bytes.
    ///
    /// # Errors
    /// * [`PostcardError::ExtractionService`] if the model call fails or times out.
    /// * [`PostcardError::ExtractionParse`] if the reply is not a valid
    ///   `{ markdown, postmark }` object.
    pub async fn extract(
        &self,
        image: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<Extraction, PostcardError> {
        let mime = mime_hint
            .or_else(|| sniff_mime(image))
            .unwrap_or("image/png");

        let system = self
            .settings
            .system_prompt
            .as_deref()
            .unwrap_or(EXTRACTION_SYSTEM_PROMPT);
        let request = InferenceRequest::text(system, EXTRACTION_USER_PROMPT, EXTRACTION_SCHEMA)
            .with_image(encode_image(image, mime));

        let response = tokio::time::timeout(self.settings.timeout, self.inference.infer(request))
            .await
            .map_err(|_| PostcardError::ExtractionService {
                detail: format!("timed out after {}s", self.settings.timeout.as_secs()),
            })?
            .map_err(|e| PostcardError::ExtractionService {
                detail: e.to_string(),
            })?;

        debug!(
            "Extraction reply: {} chars ({} in / {} out tokens)",
            response.content.len(),
            response.input_tokens,
            response.output_tokens
        );

        let reply: ExtractionReply = parse_structured(&response.content)
            .map_err(|detail| PostcardError::ExtractionParse { detail })?;
        reply
            .postmark
            .validate()
            .map_err(|detail| PostcardError::ExtractionParse { detail })?;

        info!(
            "Extracted postmark: platform={}, username={}, timestamp={}",
            reply.postmark.platform,
            reply.postmark.username.as_deref().unwrap_or("-"),
            reply.postmark.timestamp_text.as_deref().unwrap_or("-")
        );

        Ok(Extraction {
            transcript: clean_transcript(&reply.markdown),
            postmark: reply.postmark,
        })
    }
}
