//! Data models for bills, documents, payments and configuration.

pub mod bill;
pub mod config;
pub mod fields;
pub mod ids;

pub use bill::{
    Bill, BillDocument, BillStatus, BillType, ParseEnumError, Payment, PaymentMethod,
    PaymentStatus, Reminder,
};
pub use config::{
    AiConfig, EconomizaConfig, ExtractionConfig, OcrConfig, PdfConfig, ProviderConfig,
    ScheduleConfig, StorageConfig,
};
pub use fields::{ExtractedFields, BARCODE_LEN, CURRENCY_BRL};
pub use ids::{BillId, DocumentId, PaymentId, UserId};
