use anyhow::Result;
use async_trait::async_trait;

use crate::types::{GenerationRequest, RawResponse};

/// Resolves an image reference (URL or path) to its raw bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>>;
}

/// A multimodal model that answers a schema-constrained request with raw text.
///
/// Implementations are built once at startup and shared read-only.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Provider name (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Send the request and return the model's text untouched.
    async fn invoke(&self, request: &GenerationRequest) -> Result<RawResponse>;
}
