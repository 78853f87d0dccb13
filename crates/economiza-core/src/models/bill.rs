//! Bill, document and payment records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fields::{ExtractedFields, CURRENCY_BRL};
use super::ids::{BillId, DocumentId, PaymentId, UserId};

/// Error returned when parsing one of the closed enums from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Where a bill is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Waiting for extraction or manual review.
    Pending,
    /// Data is trusted.
    Confirmed,
    /// A payment has been scheduled.
    Scheduled,
    /// Paid.
    Paid,
    /// Past due date without payment.
    Overdue,
    /// Rejected by the owner.
    Cancelled,
}

impl BillStatus {
    pub const ALL: [BillStatus; 6] = [
        BillStatus::Pending,
        BillStatus::Confirmed,
        BillStatus::Scheduled,
        BillStatus::Paid,
        BillStatus::Overdue,
        BillStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Confirmed => "confirmed",
            BillStatus::Scheduled => "scheduled",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
            BillStatus::Cancelled => "cancelled",
        }
    }

    /// No further transitions leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BillStatus::Paid | BillStatus::Cancelled)
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        BillStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("bill status", &s))
    }
}

/// Money direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    /// Despesa.
    #[default]
    Expense,
    /// Receita.
    Income,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Expense => "expense",
            BillType::Income => "income",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(BillType::Expense),
            "income" => Ok(BillType::Income),
            other => Err(ParseEnumError::new("bill type", other)),
        }
    }
}

/// A bill or manual financial entry owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub owner: UserId,
    pub issuer: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub status: BillStatus,
    #[serde(rename = "type")]
    pub kind: BillType,
    /// True for document-derived bills, false for manual entries.
    pub is_bill: bool,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// A freshly uploaded bill: no fields yet, pending, zero confidence.
    pub fn uploaded(owner: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: BillId::new(),
            owner,
            issuer: None,
            amount: None,
            currency: CURRENCY_BRL.to_string(),
            due_date: None,
            barcode: None,
            category: None,
            status: BillStatus::Pending,
            kind: BillType::Expense,
            is_bill: true,
            confidence: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy every non-null extracted field onto the bill.
    ///
    /// Fields the extraction left null keep their current value.
    pub fn absorb(&mut self, fields: &ExtractedFields) {
        if let Some(issuer) = &fields.issuer {
            self.issuer = Some(issuer.clone());
        }
        if let Some(amount) = fields.amount {
            self.amount = Some(amount);
        }
        if let Some(due_date) = fields.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(barcode) = &fields.barcode {
            self.barcode = Some(barcode.clone());
        }
        self.currency = fields.currency.clone();
    }

    /// Stamp a new version; `updated_at` always moves forward.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + TimeDelta::nanoseconds(1)
        };
    }
}

/// The uploaded file behind a document-derived bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillDocument {
    pub id: DocumentId,
    pub bill_id: BillId,
    /// Object path in storage.
    pub storage_path: String,
    #[serde(default)]
    pub content_type: String,
    pub ocr_text: Option<String>,
    pub ocr_confidence: f32,
    pub extracted_json: Option<ExtractedFields>,
    pub created_at: DateTime<Utc>,
}

impl BillDocument {
    pub fn new(
        bill_id: BillId,
        storage_path: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            bill_id,
            storage_path: storage_path.into(),
            content_type: content_type.into(),
            ocr_text: None,
            ocr_confidence: 0.0,
            extracted_json: None,
            created_at: Utc::now(),
        }
    }
}

/// How a payment is made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[default]
    Pix,
    Boleto,
    Debit,
    Credit,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Boleto => "BOLETO",
            PaymentMethod::Debit => "DEBIT",
            PaymentMethod::Credit => "CREDIT",
            PaymentMethod::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PIX" => Ok(PaymentMethod::Pix),
            "BOLETO" => Ok(PaymentMethod::Boleto),
            "DEBIT" => Ok(PaymentMethod::Debit),
            "CREDIT" => Ok(PaymentMethod::Credit),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            other => Err(ParseEnumError::new("payment method", other)),
        }
    }
}

/// Payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Scheduled,
    Executed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Scheduled => "scheduled",
            PaymentStatus::Executed => "executed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reminder to send before the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub remind_on: NaiveDate,
    pub days_before: u32,
}

/// A scheduled or executed payment of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub owner: UserId,
    pub scheduled_date: Option<NaiveDate>,
    pub executed_date: Option<NaiveDate>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_path: Option<String>,
    pub notify_before_days: Vec<u32>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    pub created_at: DateTime<Utc>,
}
