//! Error types for the economiza-core library.

use thiserror::Error;

use crate::models::{BillId, BillStatus, PaymentId};

/// Main error type for the economiza library.
#[derive(Error, Debug)]
pub enum CoreError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// A bill operation is not allowed in the bill's current state.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Image OCR error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Persistence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Rejected user input.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors raised by the image OCR engine.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Model files are missing or could not be loaded.
    #[error("failed to load OCR models: {0}")]
    ModelLoad(String),

    /// The engine failed on an image.
    #[error("recognition failed: {0}")]
    Recognition(String),
}

/// Errors raised by the bill state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No bill with this id belongs to the acting user.
    #[error("bill not found: {0}")]
    BillNotFound(BillId),

    /// No payment with this id belongs to the acting user.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// The requested transition is not allowed from the current status.
    #[error("cannot {action} a bill that is {from}")]
    InvalidTransition {
        from: BillStatus,
        action: &'static str,
    },
}

/// Errors raised by a bill repository.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A change references a record that does not exist.
    #[error("missing record: {0}")]
    MissingRecord(String),

    /// A precondition of the changeset no longer holds.
    #[error("conflicting update: {0}")]
    Conflict(String),

    /// The backing file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a valid ledger.
    #[error("corrupt ledger: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Another writer panicked while holding the ledger lock.
    #[error("ledger lock poisoned")]
    Poisoned,
}

/// Errors raised by object storage.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The object path escapes the storage root or is empty.
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    /// No object at this path.
    #[error("object not found: {0}")]
    NotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rejected field in user-supplied input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for the economiza library.
pub type Result<T> = std::result::Result<T, CoreError>;
