//! Boleto barcode extraction.

use super::patterns::{BARCODE, LINHA_DIGITAVEL};
use super::{ExtractionMatch, FieldExtractor};
use crate::models::BARCODE_LEN;

/// Finds the 44-digit barcode, falling back to the linha digitável.
pub struct BarcodeExtractor;

impl BarcodeExtractor {
    pub fn new() -> Self {
        Self
    }

    fn from_linha(text: &str) -> Option<ExtractionMatch<String>> {
        let m = LINHA_DIGITAVEL.find(text)?;
        let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
        if digits.len() < BARCODE_LEN {
            return None;
        }

        Some(
            ExtractionMatch::new(digits[..BARCODE_LEN].to_string(), "linha_digitavel", m.as_str())
                .with_position(m.start(), m.end()),
        )
    }
}

impl Default for BarcodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for BarcodeExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        if let Some(m) = BARCODE.find(text) {
            return Some(
                ExtractionMatch::new(m.as_str().to_string(), "barcode", m.as_str())
                    .with_position(m.start(), m.end()),
            );
        }
        Self::from_linha(text)
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<_> = BARCODE
            .find_iter(text)
            .map(|m| {
                ExtractionMatch::new(m.as_str().to_string(), "barcode", m.as_str())
                    .with_position(m.start(), m.end())
            })
            .collect();
        results.extend(Self::from_linha(text));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BARCODE_44: &str = "34191090080123456789012345678901234567890123";

    #[test]
    fn test_contiguous_barcode() {
        assert_eq!(BARCODE_44.len(), 44);
        let found = BarcodeExtractor::new()
            .extract(&format!("codigo {} fim", BARCODE_44))
            .unwrap();
        assert_eq!(found.value, BARCODE_44);
        assert_eq!(found.pattern, "barcode");
    }

    #[test]
    fn test_linha_digitavel_is_truncated_to_44_digits() {
        let text = "Linha: 34191.09008 01234.567890 12345.678901 2 34567890123456";
        let found = BarcodeExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "34191090080123456789012345678901234567890123");
        assert_eq!(found.value.len(), 44);
        assert_eq!(found.pattern, "linha_digitavel");
    }

    #[test]
    fn test_short_digit_runs_are_ignored() {
        assert!(BarcodeExtractor::new().extract("pedido 1234567890 CEP 01001-000").is_none());
    }
}
