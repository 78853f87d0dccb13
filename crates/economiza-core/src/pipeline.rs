//! Upload processing: extraction cascade plus the initial status decision.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
#[cfg(any(feature = "ollama", feature = "gemini"))]
use tracing::warn;

use crate::extraction::{AiExtractor, AiRequest, BillParser, ExtractionCascade};
use crate::lifecycle::StatusPolicy;
use crate::models::{AiConfig, BillStatus, EconomizaConfig, ExtractedFields};

/// Fields extracted from an upload and the status the bill should get.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedUpload {
    pub fields: ExtractedFields,
    pub bill_status: BillStatus,
}

/// Composes the extraction cascade with the status policy.
pub struct UploadProcessor {
    cascade: ExtractionCascade,
    policy: StatusPolicy,
}

impl UploadProcessor {
    pub fn new(cascade: ExtractionCascade, policy: StatusPolicy) -> Self {
        Self { cascade, policy }
    }

    /// Build the processor described by `config`, with its AI providers.
    pub fn from_config(config: &EconomizaConfig) -> Self {
        let providers = if config.ai.enabled {
            build_providers(&config.ai, config.extraction.max_prompt_chars)
        } else {
            Vec::new()
        };
        Self::from_config_with_providers(config, providers)
    }

    /// Build the processor described by `config` around the given providers.
    pub fn from_config_with_providers(
        config: &EconomizaConfig,
        providers: Vec<Arc<dyn AiExtractor>>,
    ) -> Self {
        let parser = BillParser::new().with_min_text_length(config.extraction.min_text_length);
        let cascade = ExtractionCascade::new(parser)
            .with_providers(providers)
            .with_ai_threshold(config.extraction.ai_fallback_threshold)
            .with_ai_timeout(Duration::from_secs(config.ai.timeout_secs));

        Self::new(
            cascade,
            StatusPolicy::new(config.extraction.auto_confirm_threshold),
        )
    }

    pub fn cascade(&self) -> &ExtractionCascade {
        &self.cascade
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Run the cascade over OCR text and decide the bill status.
    pub async fn process_upload(
        &self,
        ocr_text: &str,
        image_url: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> ProcessedUpload {
        let request = AiRequest {
            ocr_text: ocr_text.to_string(),
            image_url,
            metadata,
        };

        let fields = self.cascade.run(&request).await;
        let bill_status = self.policy.status_for(fields.confidence);

        info!(
            "Upload processed: confidence {:.2} -> {}",
            fields.confidence, bill_status
        );

        ProcessedUpload {
            fields,
            bill_status,
        }
    }
}

impl Default for UploadProcessor {
    fn default() -> Self {
        Self::new(ExtractionCascade::new(BillParser::new()), StatusPolicy::default())
    }
}

/// Instantiate the configured AI providers in rank order.
///
/// Providers that cannot be built (bad URL, missing key, feature disabled)
/// are skipped with a warning.
pub fn build_providers(config: &AiConfig, max_prompt_chars: usize) -> Vec<Arc<dyn AiExtractor>> {
    config
        .providers
        .iter()
        .filter_map(|provider| build_provider(provider, config.timeout_secs, max_prompt_chars))
        .collect()
}

#[cfg(any(feature = "ollama", feature = "gemini"))]
fn build_provider(
    provider: &crate::models::ProviderConfig,
    timeout_secs: u64,
    max_prompt_chars: usize,
) -> Option<Arc<dyn AiExtractor>> {
    use crate::extraction::LlmBillExtractor;
    use crate::models::ProviderConfig;

    match provider {
        #[cfg(feature = "ollama")]
        ProviderConfig::Ollama { base_url, model } => {
            match economiza_ai::OllamaBackend::new(base_url.as_str(), model.as_str(), timeout_secs) {
                Ok(backend) => Some(Arc::new(
                    LlmBillExtractor::new(backend).with_max_prompt_chars(max_prompt_chars),
                )),
                Err(e) => {
                    warn!("Skipping ollama provider: {}", e);
                    None
                }
            }
        }
        #[cfg(feature = "gemini")]
        ProviderConfig::Gemini { api_key, model } => {
            let key = if api_key.trim().is_empty() {
                std::env::var(crate::models::config::GEMINI_API_KEY_ENV).unwrap_or_default()
            } else {
                api_key.clone()
            };
            match economiza_ai::GeminiBackend::new(key, model.as_str(), timeout_secs) {
                Ok(backend) => Some(Arc::new(
                    LlmBillExtractor::new(backend).with_max_prompt_chars(max_prompt_chars),
                )),
                Err(e) => {
                    warn!("Skipping gemini provider: {}", e);
                    None
                }
            }
        }
        #[allow(unreachable_patterns)]
        other => {
            warn!("Skipping {} provider: support not compiled in", other.kind());
            None
        }
    }
}

#[cfg(not(any(feature = "ollama", feature = "gemini")))]
fn build_provider(
    provider: &crate::models::ProviderConfig,
    _timeout_secs: u64,
    _max_prompt_chars: usize,
) -> Option<Arc<dyn AiExtractor>> {
    tracing::warn!("Skipping {} provider: support not compiled in", provider.kind());
    None
}
