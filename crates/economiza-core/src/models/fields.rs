//! Fields extracted from a bill document.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency of every boleto.
pub const CURRENCY_BRL: &str = "BRL";

/// Length of a boleto barcode.
pub const BARCODE_LEN: usize = 44;

/// Structured result of one extraction run.
///
/// The JSON shape (field names and types) is what API responses and the
/// stored `extracted_json` carry, so it must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// Beneficiary name, uppercase.
    pub issuer: Option<String>,

    /// Amount due, two decimal places.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,

    /// Always "BRL".
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Due date (ISO in JSON).
    pub due_date: Option<NaiveDate>,

    /// 44-digit barcode.
    pub barcode: Option<String>,

    /// Overall confidence (0.0 - 1.0).
    pub confidence: f32,

    /// Rationale, mostly for empty or degraded results.
    #[serde(default)]
    pub notes: String,
}

fn default_currency() -> String {
    CURRENCY_BRL.to_string()
}

impl ExtractedFields {
    /// A result with no fields and zero confidence.
    pub fn empty(notes: impl Into<String>) -> Self {
        Self::degraded(notes, 0.0)
    }

    /// A result with no fields and the given (low) confidence.
    pub fn degraded(notes: impl Into<String>, confidence: f32) -> Self {
        Self {
            issuer: None,
            amount: None,
            currency: default_currency(),
            due_date: None,
            barcode: None,
            confidence,
            notes: notes.into(),
        }
    }

    /// Whether none of the essential fields is set.
    pub fn is_blank(&self) -> bool {
        self.issuer.is_none()
            && self.amount.is_none()
            && self.due_date.is_none()
            && self.barcode.is_none()
    }
}

impl Default for ExtractedFields {
    fn default() -> Self {
        Self::empty("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_json_shape() {
        let fields = ExtractedFields {
            issuer: Some("ENERGIA ELETRICA SA".to_string()),
            amount: Some(Decimal::from_str("150.50").unwrap()),
            currency: "BRL".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 12, 15),
            barcode: None,
            confidence: 0.85,
            notes: String::new(),
        };

        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value["issuer"], "ENERGIA ELETRICA SA");
        assert_eq!(value["amount"], 150.5);
        assert_eq!(value["currency"], "BRL");
        assert_eq!(value["due_date"], "2024-12-15");
        assert!(value["barcode"].is_null());
        assert_eq!(value["notes"], "");
    }

    #[test]
    fn test_reads_stored_json_with_missing_keys() {
        let fields: ExtractedFields =
            serde_json::from_str(r#"{"issuer": null, "due_date": null, "barcode": null, "confidence": 0.3}"#)
                .unwrap();
        assert!(fields.is_blank());
        assert_eq!(fields.currency, "BRL");
        assert_eq!(fields.amount, None);
    }

    #[test]
    fn test_empty_has_zero_confidence() {
        let fields = ExtractedFields::empty("nothing");
        assert_eq!(fields.confidence, 0.0);
        assert_eq!(fields.notes, "nothing");
        assert!(fields.is_blank());
    }
}
