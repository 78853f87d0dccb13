//! Rule-based field extractors for Brazilian boletos.

pub mod amounts;
pub mod barcode;
pub mod dates;
pub mod issuer;
pub mod patterns;

pub use amounts::{parse_brazilian_amount, AmountExtractor};
pub use barcode::BarcodeExtractor;
pub use dates::{parse_dmy_date, DueDateExtractor};
pub use issuer::{clean_issuer, IssuerExtractor};
pub use patterns::collapse_whitespace;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the best candidate for the field.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract every valid candidate, in priority order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A single extracted value with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Name of the pattern that produced the value.
    pub pattern: &'static str,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, pattern: &'static str, source: impl Into<String>) -> Self {
        Self {
            value,
            pattern,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
