//! Image acquisition: resolve an upload reference to bytes and base64 them.
//!
//! Remote references (`http://`, `https://`) are fetched over HTTP; anything
//! else is read from the local filesystem, with an optional `file://` prefix.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use tracing::{debug, info};

use cropdoc_core::{DiagnosisError, EncodedImage, ImageRef, ImageSource};

/// Default [`ImageSource`] backed by `reqwest` and `tokio::fs`.
pub struct ImageLoader {
    client: Client,
}

impl ImageLoader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build image HTTP client")?;
        Ok(Self { client })
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

#[async_trait]
impl ImageSource for ImageLoader {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        if is_remote(reference) {
            info!(url = %reference, "Fetching remote image");
            let response = self
                .client
                .get(reference)
                .send()
                .await
                .context("Image HTTP request failed")?;

            let status = response.status();
            if !status.is_success() {
                bail!("image host returned {}", status);
            }

            let bytes = response
                .bytes()
                .await
                .context("Failed to read image body")?;
            Ok(bytes.to_vec())
        } else {
            let path = reference.strip_prefix("file://").unwrap_or(reference);
            debug!(path = %path, "Reading local image");
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image at {path}"))
        }
    }
}

/// Fetch the referenced image and base64 it, bounded by `timeout`.
///
/// The declared MIME type is passed through untouched.
pub async fn encode(
    source: &dyn ImageSource,
    image: &ImageRef,
    timeout: Duration,
) -> Result<EncodedImage, DiagnosisError> {
    let bytes = match tokio::time::timeout(timeout, source.fetch(image.reference())).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => return Err(DiagnosisError::Fetch(format!("{e:#}"))),
        Err(_) => {
            return Err(DiagnosisError::Fetch(format!(
                "timed out after {}ms",
                timeout.as_millis()
            )))
        }
    };

    debug!(bytes = bytes.len(), mime = %image.mime_type(), "Encoding image");
    Ok(EncodedImage {
        base64_payload: STANDARD.encode(&bytes),
        mime_type: image.mime_type().to_string(),
    })
}
