//! Input resolution: load a user-supplied path or URL into memory.
//!
//! Screenshots are small, so both local files and downloads are read whole
//! into a buffer; nothing touches the file system beyond the initial read.
//! The bytes are NOT validated as an image here. That is the preprocessor's
//! job, so undecodable input fails with the same error whatever its origin.

use crate::error::PostcardError;
use crate::pipeline::preprocess::sniff_mime;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A screenshot loaded into memory.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    /// Best guess at the encoding, from magic bytes, then headers or extension.
    pub mime_hint: Option<String>,
    /// Where the bytes came from (path or URL), for logs and reports.
    pub source: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to image bytes.
///
/// http(s) URLs are downloaded with `timeout_secs` as the overall bound;
/// anything else is treated as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ImageInput, PostcardError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || (trimmed.contains("://") && !is_url(trimmed)) {
        return Err(PostcardError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(trimmed) {
        download_url(trimmed, timeout_secs).await
    } else {
        read_local(Path::new(trimmed)).await
    }
}

async fn read_local(path: &Path) -> Result<ImageInput, PostcardError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PostcardError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => PostcardError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => PostcardError::Internal(format!("Reading '{}': {}", path.display(), e)),
    })?;

    let mime_hint = sniff_mime(&bytes)
        .map(str::to_string)
        .or_else(|| mime_from_extension(path).map(str::to_string));
    debug!(
        "Read {} bytes from {} ({})",
        bytes.len(),
        path.display(),
        mime_hint.as_deref().unwrap_or("unknown type")
    );

    Ok(ImageInput {
        bytes,
        mime_hint,
        source: path.display().to_string(),
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ImageInput, PostcardError> {
    info!("Downloading screenshot from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PostcardError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            PostcardError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PostcardError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;
    if !response.status().is_success() {
        return Err(PostcardError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v.starts_with("image/"));

    let bytes = response.bytes().await.map_err(map_err)?.to_vec();

    let mime_hint = sniff_mime(&bytes)
        .map(str::to_string)
        .or(content_type)
        .or_else(|| mime_from_url(url).map(str::to_string));
    info!("Downloaded {} bytes", bytes.len());

    Ok(ImageInput {
        bytes,
        mime_hint,
        source: url.to_string(),
    })
}

fn mime_from_url(url: &str) -> Option<&'static str> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    mime_from_extension(&PathBuf::from(last))
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
