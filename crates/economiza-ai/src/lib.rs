//! LLM backend abstraction layer for economiza.
//!
//! This crate provides a unified interface for asking a hosted language model
//! for a JSON document:
//! - `ollama` for a self-hosted Ollama server
//! - `gemini` for the Google Gemini REST API

mod backend;
mod error;
mod request;

pub use backend::LlmBackend;
pub use error::AiError;
pub use request::{extract_json_block, GenerateRequest, GenerateResponse};

#[cfg(feature = "ollama")]
pub use backend::ollama::OllamaBackend;

#[cfg(feature = "gemini")]
pub use backend::gemini::GeminiBackend;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, AiError>;
