//! Rule-based boleto parser.

use tracing::debug;

use crate::models::{ExtractedFields, CURRENCY_BRL};

use super::rules::{
    collapse_whitespace, AmountExtractor, BarcodeExtractor, DueDateExtractor, FieldExtractor,
    IssuerExtractor,
};
use super::scorer::{score_presence, FieldPresence};

/// Notes of the result for empty or too-short OCR text.
pub const TOO_SHORT_NOTE: &str = "OCR text empty or too short";

/// Default minimum OCR text length (characters, after trimming).
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 10;

/// Deterministic extractor of the four essential boleto fields.
///
/// Pure over its input: no I/O, no clock, no randomness.
#[derive(Debug, Clone)]
pub struct BillParser {
    min_text_length: usize,
}

impl BillParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self {
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
        }
    }

    /// Set the minimum trimmed text length below which nothing is matched.
    pub fn with_min_text_length(mut self, min: usize) -> Self {
        self.min_text_length = min;
        self
    }

    /// Extract issuer, amount, due date and barcode from raw OCR text.
    ///
    /// Fields that cannot be found or parsed are left `None`; the
    /// confidence always follows from which fields were found.
    pub fn extract_fields(&self, ocr_text: &str) -> ExtractedFields {
        if ocr_text.trim().chars().count() < self.min_text_length {
            debug!("OCR text too short ({} chars)", ocr_text.trim().len());
            return ExtractedFields::empty(TOO_SHORT_NOTE);
        }

        let collapsed = collapse_whitespace(ocr_text);

        let barcode = BarcodeExtractor::new().extract(&collapsed);
        let amount = AmountExtractor::new().extract(&collapsed);
        let due_date = DueDateExtractor::new().extract(&collapsed);
        let issuer = IssuerExtractor::new().extract(ocr_text);

        debug!(
            "Regex extraction: barcode={:?} amount={:?} due_date={:?} issuer={:?}",
            barcode.as_ref().map(|m| m.pattern),
            amount.as_ref().map(|m| m.pattern),
            due_date.as_ref().map(|m| m.pattern),
            issuer.as_ref().map(|m| m.pattern),
        );

        let mut fields = ExtractedFields {
            issuer: issuer.map(|m| m.value),
            amount: amount.map(|m| m.value),
            currency: CURRENCY_BRL.to_string(),
            due_date: due_date.map(|m| m.value),
            barcode: barcode.map(|m| m.value),
            confidence: 0.0,
            notes: String::new(),
        };

        let presence = FieldPresence::of(&fields);
        fields.confidence = score_presence(presence);

        let missing = presence.missing();
        if !missing.is_empty() {
            fields.notes = format!("not found: {}", missing.join(", "));
        }

        fields
    }
}

impl Default for BillParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_multiline_boleto() {
        let text = "BANCO EXEMPLO\n\
                    Beneficiário: AGUA E SANEAMENTO LTDA\n\
                    Vencimento\n15/01/2025\n\
                    Valor do Documento\nR$ 1.234,56\n";

        let fields = BillParser::new().extract_fields(text);

        assert_eq!(fields.issuer.as_deref(), Some("AGUA E SANEAMENTO LTDA"));
        assert_eq!(fields.amount, Some(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(fields.due_date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(fields.barcode, None);
        assert_eq!(fields.confidence, 0.85);
        assert_eq!(fields.notes, "not found: barcode");
    }

    #[test]
    fn test_too_short() {
        let fields = BillParser::new().extract_fields("   R$ 9,90  ");
        assert_eq!(fields, ExtractedFields::empty(TOO_SHORT_NOTE));
    }

    #[test]
    fn test_custom_min_length() {
        let fields = BillParser::new()
            .with_min_text_length(3)
            .extract_fields("R$ 9,90");
        assert_eq!(fields.amount, Some(Decimal::from_str("9.90").unwrap()));
        assert_eq!(fields.confidence, 0.55);
    }
}
