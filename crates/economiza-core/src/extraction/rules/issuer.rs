//! Beneficiary (issuer) extraction.

use regex::Regex;

use super::patterns::{ISSUER_BEFORE_CNPJ, ISSUER_LABELED, TAX_ID_TAIL};
use super::{ExtractionMatch, FieldExtractor};

const MIN_ISSUER_CHARS: usize = 3;
const MAX_ISSUER_CHARS: usize = 100;

/// Beneficiary name extractor.
///
/// Runs on the original text (line breaks kept) since the labeled pattern
/// stops at the end of a line.
pub struct IssuerExtractor;

impl IssuerExtractor {
    pub fn new() -> Self {
        Self
    }

    fn patterns() -> [(&'static str, &'static Regex); 2] {
        [
            ("beneficiario", &*ISSUER_LABELED),
            ("name_cnpj", &*ISSUER_BEFORE_CNPJ),
        ]
    }

    fn first_match(name: &'static str, pattern: &Regex, text: &str) -> Option<ExtractionMatch<String>> {
        let caps = pattern.captures(text)?;
        let group = caps.get(1)?;
        let issuer = clean_issuer(group.as_str())?;
        Some(ExtractionMatch::new(issuer, name, group.as_str()).with_position(group.start(), group.end()))
    }
}

impl Default for IssuerExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for IssuerExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        Self::patterns()
            .into_iter()
            .find_map(|(name, pattern)| Self::first_match(name, pattern, text))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        Self::patterns()
            .into_iter()
            .filter_map(|(name, pattern)| Self::first_match(name, pattern, text))
            .collect()
    }
}

/// Strip a trailing CNPJ/CPF clause and its `-` separator, trim and
/// uppercase a captured name.
///
/// Returns `None` unless the cleaned name has 3 to 100 characters.
pub fn clean_issuer(raw: &str) -> Option<String> {
    let cleaned = TAX_ID_TAIL.replace(raw.trim(), "");
    let cleaned = cleaned
        .trim_end_matches(|c: char| c == '-' || c.is_whitespace())
        .trim();
    let len = cleaned.chars().count();
    if !(MIN_ISSUER_CHARS..=MAX_ISSUER_CHARS).contains(&len) {
        return None;
    }
    Some(cleaned.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labeled_beneficiary() {
        let text = "Beneficiário: ENERGIA ELETRICA SA CNPJ 12.345.678/0001-90\nValor";
        let found = IssuerExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "ENERGIA ELETRICA SA");
        assert_eq!(found.pattern, "beneficiario");
    }

    #[test]
    fn test_labeled_beneficiary_stops_at_line_end() {
        let text = "beneficiario: agua e esgoto\nVencimento 10/01/2025";
        let found = IssuerExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "AGUA E ESGOTO");
    }

    #[test]
    fn test_name_before_cnpj() {
        let text = "TELEFONIA BRASIL S.A. - CNPJ 02.558.157/0001-62";
        let found = IssuerExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "TELEFONIA BRASIL S.A.");
        assert_eq!(found.pattern, "name_cnpj");
    }

    #[test]
    fn test_labeled_beneficiary_drops_cnpj_separator() {
        let text = "Beneficiário: TELEFONIA BRASIL S.A. - CNPJ 02.558.157/0001-62";
        let found = IssuerExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "TELEFONIA BRASIL S.A.");
        assert_eq!(found.pattern, "beneficiario");
    }

    #[test]
    fn test_clean_issuer_bounds() {
        assert_eq!(clean_issuer("ab"), None);
        assert_eq!(clean_issuer(&"A".repeat(101)), None);
        assert_eq!(clean_issuer(" Loja Centro CPF 123"), Some("LOJA CENTRO".to_string()));
        assert_eq!(clean_issuer("Loja Centro -"), Some("LOJA CENTRO".to_string()));
        assert_eq!(clean_issuer("AB -"), None);
    }
}
