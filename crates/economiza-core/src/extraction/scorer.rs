//! Confidence scoring from essential-field presence.

use rust_decimal::Decimal;

use crate::models::{ExtractedFields, BARCODE_LEN};

/// Which essential fields are present and valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldPresence {
    pub amount: bool,
    pub due_date: bool,
    pub issuer: bool,
    pub barcode: bool,
}

impl FieldPresence {
    pub fn of(fields: &ExtractedFields) -> Self {
        Self {
            amount: fields.amount.is_some_and(|a| a > Decimal::ZERO),
            due_date: fields.due_date.is_some(),
            issuer: fields.issuer.as_ref().is_some_and(|i| i.chars().count() >= 3),
            barcode: fields.barcode.as_ref().is_some_and(|b| b.len() == BARCODE_LEN),
        }
    }

    /// Names of the essential fields that are missing.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("amount", self.amount),
            ("due_date", self.due_date),
            ("issuer", self.issuer),
            ("barcode", self.barcode),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Map field presence to a confidence score.
///
/// First matching row wins:
///
/// | present | score |
/// |---|---|
/// | amount, due date, barcode | 0.90 (0.95 with issuer) |
/// | amount, due date | 0.80 (0.85 with issuer) |
/// | barcode and amount or due date | 0.75 |
/// | amount or due date | 0.55 (0.60 with issuer) |
/// | barcode | 0.50 |
/// | issuer | 0.40 |
/// | nothing | 0.25 |
pub fn score_presence(p: FieldPresence) -> f32 {
    if p.amount && p.due_date && p.barcode {
        if p.issuer { 0.95 } else { 0.90 }
    } else if p.amount && p.due_date {
        if p.issuer { 0.85 } else { 0.80 }
    } else if p.barcode && (p.amount || p.due_date) {
        0.75
    } else if p.amount || p.due_date {
        if p.issuer { 0.60 } else { 0.55 }
    } else if p.barcode {
        0.50
    } else if p.issuer {
        0.40
    } else {
        0.25
    }
}

/// Confidence of an extraction result, from its fields alone.
pub fn score(fields: &ExtractedFields) -> f32 {
    score_presence(FieldPresence::of(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn presence(amount: bool, due_date: bool, issuer: bool, barcode: bool) -> FieldPresence {
        FieldPresence { amount, due_date, issuer, barcode }
    }

    #[test]
    fn test_table_rows() {
        assert_eq!(score_presence(presence(true, true, true, true)), 0.95);
        assert_eq!(score_presence(presence(true, true, false, true)), 0.90);
        assert_eq!(score_presence(presence(true, true, true, false)), 0.85);
        assert_eq!(score_presence(presence(true, true, false, false)), 0.80);
        assert_eq!(score_presence(presence(false, true, true, true)), 0.75);
        assert_eq!(score_presence(presence(true, false, true, false)), 0.60);
        assert_eq!(score_presence(presence(false, true, false, false)), 0.55);
        assert_eq!(score_presence(presence(false, false, true, true)), 0.50);
        assert_eq!(score_presence(presence(false, false, true, false)), 0.40);
        assert_eq!(score_presence(FieldPresence::default()), 0.25);
    }

    #[test]
    fn test_invalid_values_do_not_count() {
        let fields = ExtractedFields {
            amount: Some(Decimal::ZERO),
            issuer: Some("AB".to_string()),
            barcode: Some("123".to_string()),
            ..ExtractedFields::default()
        };
        assert_eq!(FieldPresence::of(&fields), FieldPresence::default());
        assert_eq!(score(&fields), 0.25);
    }

    #[test]
    fn test_missing_names() {
        assert_eq!(presence(true, false, true, false).missing(), vec!["due_date", "barcode"]);
    }
}
