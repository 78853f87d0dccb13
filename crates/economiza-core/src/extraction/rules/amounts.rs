//! Amount extraction for Brazilian boletos.

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{
    AMOUNT_CURRENCY_PREFIX, AMOUNT_CURRENCY_SUFFIX, AMOUNT_DOCUMENT, AMOUNT_LABEL,
};
use super::{ExtractionMatch, FieldExtractor};

/// Amount field extractor.
///
/// Patterns are tried in a fixed order: "valor do documento" label,
/// `R$` prefix, `reais`/`R$` suffix, bare `valor:` label. The first pattern
/// whose match parses to a positive amount wins.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }

    fn patterns() -> [(&'static str, &'static Regex); 4] {
        [
            ("valor_documento", &*AMOUNT_DOCUMENT),
            ("currency_prefix", &*AMOUNT_CURRENCY_PREFIX),
            ("currency_suffix", &*AMOUNT_CURRENCY_SUFFIX),
            ("valor_label", &*AMOUNT_LABEL),
        ]
    }

    fn candidate(name: &'static str, caps: &Captures<'_>) -> Option<ExtractionMatch<Decimal>> {
        // Right-most group that holds a number
        let group = caps
            .iter()
            .skip(1)
            .flatten()
            .filter(|m| m.as_str().starts_with(|c: char| c.is_ascii_digit()))
            .last()?;

        let amount = parse_brazilian_amount(group.as_str())?;
        if amount <= Decimal::ZERO {
            return None;
        }

        let whole = caps.get(0)?;
        Some(ExtractionMatch::new(amount, name, whole.as_str()).with_position(whole.start(), whole.end()))
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        Self::patterns().into_iter().find_map(|(name, pattern)| {
            pattern
                .captures(text)
                .and_then(|caps| Self::candidate(name, &caps))
        })
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        Self::patterns()
            .into_iter()
            .flat_map(|(name, pattern)| {
                pattern
                    .captures_iter(text)
                    .filter_map(move |caps| Self::candidate(name, &caps))
            })
            .collect()
    }
}

/// Parse a Brazilian-formatted amount ("1.234,56", "99,90", "150").
///
/// `.` is a thousands separator and `,` the decimal separator. The result is
/// rounded to two decimal places.
pub fn parse_brazilian_amount(s: &str) -> Option<Decimal> {
    let normalized = s.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized).ok().map(|d| d.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_brazilian_amount() {
        assert_eq!(parse_brazilian_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_brazilian_amount("1234,56"), Some(dec("1234.56")));
        assert_eq!(parse_brazilian_amount("0,02"), Some(dec("0.02")));
        assert_eq!(parse_brazilian_amount("12.345.678,90"), Some(dec("12345678.90")));
        assert_eq!(parse_brazilian_amount("abc"), None);
        assert_eq!(parse_brazilian_amount(""), None);
    }

    #[test]
    fn test_document_label_beats_currency_prefix() {
        let text = "Juros R$ 5,00 Valor do documento: R$ 1.530,00";
        let found = AmountExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, dec("1530.00"));
        assert_eq!(found.pattern, "valor_documento");
    }

    #[test]
    fn test_equals_valor_takes_number_group() {
        let found = AmountExtractor::new().extract("Total = Valor 250,00").unwrap();
        assert_eq!(found.value, dec("250.00"));
    }

    #[test]
    fn test_suffix_and_bare_label() {
        let extractor = AmountExtractor::new();
        assert_eq!(extractor.extract("total de 80,00 reais").unwrap().value, dec("80.00"));
        assert_eq!(extractor.extract("valor: 12,34").unwrap().value, dec("12.34"));
    }

    #[test]
    fn test_zero_amount_falls_through() {
        let found = AmountExtractor::new()
            .extract("Valor do documento: 0,00 cobrado R$ 45,00")
            .unwrap();
        assert_eq!(found.value, dec("45.00"));
        assert_eq!(found.pattern, "currency_prefix");
    }

    #[test]
    fn test_no_amount() {
        assert!(AmountExtractor::new().extract("sem valores aqui").is_none());
    }
}
