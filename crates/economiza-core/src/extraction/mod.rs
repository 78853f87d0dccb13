//! Bill field extraction: rules, scoring, AI fallback and the cascade.

pub mod ai;
pub mod cascade;
mod parser;
pub mod rules;
pub mod scorer;

pub use ai::{parse_fields_json, AiExtractor, AiRequest, LlmBillExtractor};
pub use cascade::{merge, ExtractionCascade};
pub use parser::{BillParser, DEFAULT_MIN_TEXT_LENGTH, TOO_SHORT_NOTE};
pub use scorer::{score, FieldPresence};
