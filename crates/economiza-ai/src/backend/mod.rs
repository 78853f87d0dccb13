//! LLM backend implementations.

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "gemini")]
pub mod gemini;

use async_trait::async_trait;

use crate::{GenerateRequest, GenerateResponse, Result};

/// Trait for language-model backends.
///
/// This trait abstracts over different hosted model APIs, allowing the
/// extraction layer to rank several providers and fall through them in order.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short provider name used in logs and notes.
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Run one generation.
    ///
    /// # Arguments
    /// * `request` - System instruction and prompt
    ///
    /// # Returns
    /// The raw generated text; callers parse it.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;
}
