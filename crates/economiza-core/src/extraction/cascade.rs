//! Two-tier extraction: rules first, AI providers for the gaps.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::{ExtractedFields, CURRENCY_BRL};

use super::ai::{AiExtractor, AiRequest};
use super::parser::BillParser;

/// Regex confidence at or above which AI is not consulted.
pub const DEFAULT_AI_THRESHOLD: f32 = 0.80;

/// Default per-provider AI timeout.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(25);

/// Confidence of the AI result when every provider failed.
pub const FAILED_AI_CONFIDENCE: f32 = 0.3;

/// Confidence of the AI result when the last provider timed out.
pub const TIMED_OUT_AI_CONFIDENCE: f32 = 0.0;

/// Runs the rule-based parser and, when its confidence is too low, a ranked
/// list of AI extractors whose first successful answer fills the gaps.
pub struct ExtractionCascade {
    parser: BillParser,
    providers: Vec<Arc<dyn AiExtractor>>,
    ai_threshold: f32,
    ai_timeout: Duration,
}

impl ExtractionCascade {
    /// Create a cascade with no AI providers.
    pub fn new(parser: BillParser) -> Self {
        Self {
            parser,
            providers: Vec::new(),
            ai_threshold: DEFAULT_AI_THRESHOLD,
            ai_timeout: DEFAULT_AI_TIMEOUT,
        }
    }

    /// Append a provider; providers are tried in insertion order.
    pub fn with_provider(mut self, provider: Arc<dyn AiExtractor>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Replace the provider list.
    pub fn with_providers(mut self, providers: Vec<Arc<dyn AiExtractor>>) -> Self {
        self.providers = providers;
        self
    }

    /// Set the regex confidence needed to skip AI.
    pub fn with_ai_threshold(mut self, threshold: f32) -> Self {
        self.ai_threshold = threshold;
        self
    }

    /// Set the per-provider timeout.
    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = timeout;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Extract fields from the request's OCR text.
    ///
    /// Never fails: AI errors and timeouts become a low-confidence AI result
    /// that is merged like any other.
    pub async fn run(&self, request: &AiRequest) -> ExtractedFields {
        let regex = self.parser.extract_fields(&request.ocr_text);

        if regex.confidence >= self.ai_threshold {
            debug!("Regex confidence {:.2} is enough, skipping AI", regex.confidence);
            return regex;
        }

        info!(
            "Regex confidence {:.2} below {:.2}, asking AI",
            regex.confidence, self.ai_threshold
        );
        let ai = self.ask_providers(request).await;
        merge(regex, ai)
    }

    async fn ask_providers(&self, request: &AiRequest) -> ExtractedFields {
        if self.providers.is_empty() {
            warn!("No AI extractor configured");
            return ExtractedFields::degraded("no AI extractor configured", FAILED_AI_CONFIDENCE);
        }

        let mut failures = Vec::new();
        let mut last_timed_out = false;

        for provider in &self.providers {
            let call = provider.extract_bill_fields(request);
            match tokio::time::timeout(self.ai_timeout, call).await {
                Ok(Ok(fields)) => {
                    info!("{} extracted fields (confidence {:.2})", provider.name(), fields.confidence);
                    return fields;
                }
                Ok(Err(e)) => {
                    warn!("{} extraction failed: {}", provider.name(), e);
                    last_timed_out = e.is_timeout();
                    failures.push(format!("{}: {}", provider.name(), e));
                }
                Err(_) => {
                    warn!("{} timed out after {:?}", provider.name(), self.ai_timeout);
                    last_timed_out = true;
                    failures.push(format!("{}: timed out", provider.name()));
                }
            }
        }

        let confidence = if last_timed_out {
            TIMED_OUT_AI_CONFIDENCE
        } else {
            FAILED_AI_CONFIDENCE
        };
        ExtractedFields::degraded(
            format!("AI extraction failed ({})", failures.join("; ")),
            confidence,
        )
    }
}

/// Merge a regex result with an AI result.
///
/// Regex values win; AI only fills fields regex left empty. Confidence is
/// the higher of the two.
pub fn merge(regex: ExtractedFields, ai: ExtractedFields) -> ExtractedFields {
    let notes = [regex.notes.as_str(), ai.notes.as_str()]
        .into_iter()
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    ExtractedFields {
        issuer: regex.issuer.or(ai.issuer),
        amount: regex.amount.or(ai.amount),
        currency: CURRENCY_BRL.to_string(),
        due_date: regex.due_date.or(ai.due_date),
        barcode: regex.barcode.or(ai.barcode),
        confidence: regex.confidence.max(ai.confidence),
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_merge_prefers_regex() {
        let regex = ExtractedFields {
            issuer: Some("REGEX SA".to_string()),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            confidence: 0.6,
            notes: "not found: amount".to_string(),
            ..ExtractedFields::default()
        };
        let ai = ExtractedFields {
            issuer: Some("AI SA".to_string()),
            amount: Some(Decimal::new(10000, 2)),
            due_date: NaiveDate::from_ymd_opt(2099, 12, 31),
            confidence: 0.85,
            ..ExtractedFields::default()
        };

        let merged = merge(regex, ai);
        assert_eq!(merged.issuer.as_deref(), Some("REGEX SA"));
        assert_eq!(merged.amount, Some(Decimal::new(10000, 2)));
        assert_eq!(merged.due_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(merged.confidence, 0.85);
        assert_eq!(merged.notes, "not found: amount");
        assert_eq!(merged.currency, "BRL");
    }

    #[tokio::test]
    async fn test_no_providers_degrades() {
        let cascade = ExtractionCascade::new(BillParser::new());
        let fields = cascade
            .run(&AiRequest::new("algum texto aleatorio sem campos"))
            .await;

        assert!(fields.is_blank());
        assert_eq!(fields.confidence, FAILED_AI_CONFIDENCE);
        assert!(fields.notes.contains("no AI extractor configured"));
    }
}
