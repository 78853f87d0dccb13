//! Ollama backend (`POST /api/generate`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::LlmBackend;
use crate::{AiError, GenerateRequest, GenerateResponse, Result};

/// Backend talking to a self-hosted Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateReply {
    #[serde(default)]
    response: String,
}

impl OllamaBackend {
    /// Create a backend for `base_url` (e.g. `http://localhost:11434`).
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AiError::Config(format!("invalid Ollama URL: {}", base_url)));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn body<'a>(&'a self, request: &'a GenerateRequest) -> OllamaGenerateBody<'a> {
        OllamaGenerateBody {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            format: request.json_mode.then_some("json"),
            stream: false,
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let start = Instant::now();
        debug!("Calling Ollama model {} at {}", self.model, self.base_url);

        let response = self
            .client
            .post(self.endpoint())
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| AiError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let reply: OllamaGenerateReply = response
            .json()
            .await
            .map_err(|e| AiError::from_reqwest(e, self.timeout_secs))?;

        trace!("Ollama replied with {} characters", reply.response.len());

        Ok(GenerateResponse {
            text: reply.response,
            model: self.model.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}
