//! Common regex patterns for Brazilian boleto extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Runs of whitespace, collapsed before barcode/amount/date matching
    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    // Barcode: 44 contiguous digits
    pub static ref BARCODE: Regex = Regex::new(r"\d{44}").unwrap();

    // Linha digitável: 5.5 5.6 5.6 1 14
    pub static ref LINHA_DIGITAVEL: Regex = Regex::new(
        r"\d{5}\.\d{5}\s+\d{5}\.\d{6}\s+\d{5}\.\d{6}\s+\d\s+\d{14}"
    ).unwrap();

    // Amount patterns, most specific first. Thousands-grouped numbers are
    // tried before plain digit runs so "1234,56" is not cut at "123".
    pub static ref AMOUNT_DOCUMENT: Regex = Regex::new(
        r"(?i)(?:valor\s+(?:do\s+)?documento|(=)\s*valor)[:\s]*R?\$?\s*(\d{1,3}(?:\.\d{3})+(?:,\d{2})?|\d+(?:,\d{2})?)"
    ).unwrap();

    pub static ref AMOUNT_CURRENCY_PREFIX: Regex = Regex::new(
        r"(?i)R\$\s*(\d{1,3}(?:\.\d{3})+(?:,\d{2})?|\d+(?:,\d{2})?)"
    ).unwrap();

    pub static ref AMOUNT_CURRENCY_SUFFIX: Regex = Regex::new(
        r"(?i)(\d{1,3}(?:\.\d{3})+(?:,\d{2})?|\d+(?:,\d{2})?)\s*(?:reais|R\$)"
    ).unwrap();

    pub static ref AMOUNT_LABEL: Regex = Regex::new(
        r"(?i)valor[:\s]*(\d+,\d{2})"
    ).unwrap();

    // Due date patterns
    pub static ref DUE_DATE_LABELED: Regex = Regex::new(
        r"(?i)(?:vencimento|venc\.)[:\s]*(\d{2}/\d{2}/\d{4})"
    ).unwrap();

    pub static ref DATE_DMY: Regex = Regex::new(r"(\d{2}/\d{2}/\d{4})").unwrap();

    // Beneficiary patterns
    pub static ref ISSUER_LABELED: Regex = Regex::new(
        r"(?im)benefici[áa]rio[:\s]*([A-ZÀ-ÖØ-Ý][A-ZÀ-ÖØ-Ý\s.&\-]+?)(?:\s+CNPJ|CPF|$|\n|\d)"
    ).unwrap();

    pub static ref ISSUER_BEFORE_CNPJ: Regex = Regex::new(
        r"(?i)([A-ZÀ-ÖØ-Ý][A-ZÀ-ÖØ-Ý \t.&\-]{2,50}?)[ \t]*-[ \t]*CNPJ"
    ).unwrap();

    pub static ref TAX_ID_TAIL: Regex = Regex::new(r"(?is)\s+(?:CNPJ|CPF).*$").unwrap();

    // Masking of Brazilian tax ids
    pub static ref CPF: Regex = Regex::new(r"(\d{3})\.(\d{3})\.(\d{3})-(\d{2})").unwrap();

    pub static ref CNPJ: Regex = Regex::new(r"(\d{2})\.(\d{3})\.(\d{3})/(\d{4})-(\d{2})").unwrap();
}

/// Collapse every whitespace run into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("Valor\n\n  R$\t10,00"), "Valor R$ 10,00");
    }

    #[test]
    fn test_amount_groups_prefer_thousands() {
        let caps = AMOUNT_CURRENCY_PREFIX.captures("R$ 1.234,56").unwrap();
        assert_eq!(&caps[1], "1.234,56");

        let caps = AMOUNT_CURRENCY_PREFIX.captures("R$ 1234,56").unwrap();
        assert_eq!(&caps[1], "1234,56");
    }

    #[test]
    fn test_linha_digitavel_shape() {
        let linha = "34191.09008 01234.567890 12345.678901 2 34567890123456";
        assert!(LINHA_DIGITAVEL.is_match(linha));
    }
}
