//! Google Gemini backend (`models/{model}:generateContent`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LlmBackend;
use crate::{AiError, GenerateRequest, GenerateResponse, Result};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Backend for the Gemini REST API.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBody<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiReply {
    fn into_text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiBackend {
    /// Create a backend. Fails when `api_key` is empty.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AiError::Config("Gemini API key is not set".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model)
    }

    fn body<'a>(&self, request: &'a GenerateRequest) -> GeminiBody<'a> {
        GeminiBody {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: &request.system }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: &request.prompt }],
            }],
            generation_config: request.json_mode.then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        }
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let start = Instant::now();
        debug!("Calling Gemini model {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| AiError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let reply: GeminiReply = response
            .json()
            .await
            .map_err(|e| AiError::from_reqwest(e, self.timeout_secs))?;

        let text = reply
            .into_text()
            .ok_or_else(|| AiError::InvalidResponse("Gemini returned no candidates".to_string()))?;

        Ok(GenerateResponse {
            text,
            model: self.model.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            GeminiBackend::new("  ", "gemini-2.0-flash", 10),
            Err(AiError::Config(_))
        ));
    }

    #[test]
    fn test_body_shape() {
        let backend = GeminiBackend::new("key", "gemini-2.0-flash", 10).unwrap();
        let request = GenerateRequest::new("extract fields", "OCR text");

        let body = serde_json::to_value(backend.body(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "systemInstruction": {"parts": [{"text": "extract fields"}]},
                "contents": [{"role": "user", "parts": [{"text": "OCR text"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })
        );
        assert!(backend.endpoint().ends_with("/models/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let reply: GeminiReply = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(reply.into_text(), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_reply_without_candidates() {
        let reply: GeminiReply = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(reply.into_text(), None);
    }
}
