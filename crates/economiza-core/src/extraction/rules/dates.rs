//! Due date extraction for Brazilian boletos.

use chrono::NaiveDate;

use super::patterns::{DATE_DMY, DUE_DATE_LABELED};
use super::{ExtractionMatch, FieldExtractor};

/// Due date field extractor.
///
/// A "vencimento"/"venc." labeled date is preferred over any bare
/// `DD/MM/YYYY` token. Candidates that are not real calendar dates are
/// skipped.
pub struct DueDateExtractor;

impl DueDateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DueDateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DueDateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let labeled = DUE_DATE_LABELED.captures_iter(text).map(|caps| ("vencimento", caps));
        let bare = DATE_DMY.captures_iter(text).map(|caps| ("date", caps));

        labeled
            .chain(bare)
            .filter_map(|(name, caps)| {
                let token = caps.get(1)?;
                let date = parse_dmy_date(token.as_str())?;
                Some(ExtractionMatch::new(date, name, token.as_str()).with_position(token.start(), token.end()))
            })
            .collect()
    }
}

/// Parse a `DD/MM/YYYY` date, rejecting impossible calendar dates.
pub fn parse_dmy_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%d/%m/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labeled_date_wins() {
        let text = "Emitido em 01/11/2024 Vencimento: 15/12/2024";
        let found = DueDateExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, NaiveDate::from_ymd_opt(2024, 12, 15).unwrap());
        assert_eq!(found.pattern, "vencimento");
    }

    #[test]
    fn test_invalid_candidate_is_skipped() {
        let text = "Venc. 31/02/2024 pagar ate 10/03/2024";
        let found = DueDateExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(found.pattern, "date");
    }

    #[test]
    fn test_parse_dmy_date() {
        assert_eq!(parse_dmy_date("29/02/2024"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_dmy_date("29/02/2023"), None);
        assert_eq!(parse_dmy_date("2024-02-01"), None);
    }
}
