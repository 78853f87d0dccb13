//! AI field extraction on top of an LLM backend.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use economiza_ai::{AiError, GenerateRequest, LlmBackend};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{ExtractedFields, BARCODE_LEN, CURRENCY_BRL};

use super::rules::{clean_issuer, parse_brazilian_amount, parse_dmy_date};
use super::scorer;

const SYSTEM_PROMPT: &str = "You extract fields from Brazilian bills (boletos). \
You receive OCR lines and optionally an image URL. Answer with strict JSON only:\n\
{\"issuer\": string|null, \"amount\": number|null, \"currency\": \"BRL\", \
\"due_date\": \"YYYY-MM-DD\"|null, \"barcode\": string|null, \
\"confidence\": number between 0 and 1, \"notes\": string}\n\
Never invent values. Use null for anything not present. \
If a field was inferred, keep confidence below 0.9 and say so in notes.";

/// Input to an AI extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiRequest {
    /// OCR text of the document.
    pub ocr_text: String,
    /// Short-lived URL of the document image, when available.
    pub image_url: Option<String>,
    /// Free-form context (file name, content type, ...).
    pub metadata: BTreeMap<String, String>,
}

impl AiRequest {
    pub fn new(ocr_text: impl Into<String>) -> Self {
        Self {
            ocr_text: ocr_text.into(),
            ..Self::default()
        }
    }

    pub fn with_image_url(mut self, url: Option<String>) -> Self {
        self.image_url = url;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A capability that turns OCR text into bill fields.
///
/// Implementations may fail; the cascade converts failures into degraded
/// results.
#[async_trait]
pub trait AiExtractor: Send + Sync {
    /// Provider name used in logs and notes.
    fn name(&self) -> &str;

    /// Extract fields from the request.
    async fn extract_bill_fields(&self, request: &AiRequest) -> Result<ExtractedFields, AiError>;
}

/// AI extractor asking an LLM backend for the bill JSON contract.
pub struct LlmBillExtractor<B> {
    backend: B,
    max_prompt_chars: usize,
}

impl<B: LlmBackend> LlmBillExtractor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_prompt_chars: 2000,
        }
    }

    /// Limit the OCR characters sent to the model.
    pub fn with_max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = max;
        self
    }

    fn build_prompt(&self, request: &AiRequest) -> String {
        let text: String = request.ocr_text.chars().take(self.max_prompt_chars).collect();
        let mut prompt = format!("Extract the fields of the bill below.\n\nOCR text:\n{}\n", text);

        if let Some(url) = &request.image_url {
            prompt.push_str(&format!("\nImage URL: {}\n", url));
        }
        if !request.metadata.is_empty() {
            prompt.push_str("\nMetadata:\n");
            for (key, value) in &request.metadata {
                prompt.push_str(&format!("- {}: {}\n", key, value));
            }
        }

        prompt
    }
}

#[async_trait]
impl<B: LlmBackend> AiExtractor for LlmBillExtractor<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn extract_bill_fields(&self, request: &AiRequest) -> Result<ExtractedFields, AiError> {
        let generate = GenerateRequest::new(SYSTEM_PROMPT, self.build_prompt(request));
        let response = self.backend.generate(&generate).await?;

        debug!(
            "{} ({}) answered in {}ms",
            self.backend.name(),
            response.model,
            response.elapsed_ms
        );

        parse_fields_json(response.json_payload())
    }
}

/// Parse a model's JSON answer into normalized fields.
///
/// Values that do not fit the contract are dropped rather than rejected. A
/// missing or zero confidence is replaced by the scorer's value.
pub fn parse_fields_json(payload: &str) -> Result<ExtractedFields, AiError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| AiError::InvalidResponse(format!("model answer is not JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| AiError::InvalidResponse("model answer is not a JSON object".to_string()))?;

    let mut fields = ExtractedFields {
        issuer: string_field(object, "issuer").and_then(clean_issuer),
        amount: object.get("amount").and_then(amount_value),
        currency: CURRENCY_BRL.to_string(),
        due_date: string_field(object, "due_date").and_then(date_value),
        barcode: string_field(object, "barcode").and_then(barcode_value),
        confidence: 0.0,
        notes: string_field(object, "notes").unwrap_or_default().to_string(),
    };

    let reported = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.0);
    fields.confidence = if reported > 0.0 {
        reported
    } else {
        scorer::score(&fields)
    };

    Ok(fields)
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

fn amount_value(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()?
        }
        Value::String(s) => {
            let s = s.trim().trim_start_matches("R$").trim();
            if s.contains(',') {
                parse_brazilian_amount(s)?
            } else {
                Decimal::from_str(s).ok()?
            }
        }
        _ => return None,
    };

    let amount = amount.round_dp(2);
    (amount > Decimal::ZERO).then_some(amount)
}

fn date_value(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_dmy_date(s))
}

fn barcode_value(s: &str) -> Option<String> {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == BARCODE_LEN).then_some(digits)
}
