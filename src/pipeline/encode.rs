//! Image encoding: screenshot bytes → base64 `ImageData` for the vision call.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body. The preprocessor already produced a
//! lossless PNG, so this stage only wraps it.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap encoded image bytes for the multimodal API.
///
/// ## Why `detail: "high"`?
/// OpenAI's tiling algorithm divides images into 512 px tiles. `detail: "high"`
/// allows up to 10 tiles, which is what makes handles, timestamps and
/// engagement counters legible. `detail: "low"` forces a single 512 px
/// overview tile and loses all of them.
pub fn encode_image(bytes: &[u8], mime: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime, b64.len());
    ImageData::new(b64, mime).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bytes_with_mime() {
        let data = encode_image(b"\x89PNG\r\n\x1a\nrest", "image/png");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"\x89PNG\r\n\x1a\nrest");
    }
}
