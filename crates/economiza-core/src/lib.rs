//! Core library for Brazilian bill processing.
//!
//! This crate provides:
//! - Boleto field extraction from OCR text (issuer, amount, due date, barcode)
//! - Confidence scoring and an AI fallback cascade
//! - The bill lifecycle state machine
//! - Bill, document and payment persistence with object storage
//! - PDF text-layer reading and image OCR (`ocr` feature)

pub mod error;
pub mod extraction;
pub mod lifecycle;
pub mod models;
pub mod ocr;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod pipeline;
pub mod privacy;
pub mod service;
pub mod storage;
pub mod store;

pub use error::{
    CoreError, LifecycleError, OcrError, Result, StorageError, StoreError, ValidationError,
};
pub use extraction::{AiExtractor, AiRequest, BillParser, ExtractionCascade, LlmBillExtractor};
pub use lifecycle::{BillEvent, Lifecycle, StatusPolicy};
pub use models::{
    Bill, BillDocument, BillId, BillStatus, BillType, EconomizaConfig, ExtractedFields, Payment,
    PaymentId, PaymentMethod, PaymentStatus, UserId,
};
pub use ocr::{DocumentTextExtractor, OcrOutput, OcrProvider};
#[cfg(feature = "ocr")]
pub use ocr::ImageOcrEngine;
#[cfg(feature = "pdf")]
pub use pdf::{PdfContent, PdfExtractor, PdfProcessor, PdfType};
pub use pipeline::{ProcessedUpload, UploadProcessor};
pub use service::{BillCorrections, BillDetails, BillFilter, BillService, UploadReceipt};
pub use storage::{LocalStorage, ObjectStorage};
pub use store::{BillRepository, Changeset, JsonFileStore, MemoryStore};

/// Re-export of the LLM backend crate.
pub use economiza_ai;
