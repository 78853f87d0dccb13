//! Bill operations on behalf of a user.
//!
//! [`BillService`] ties the extraction pipeline, the lifecycle state machine,
//! object storage and the repository together. Every state change is written
//! as a single [`Changeset`].

mod manual;
mod payments;

pub use manual::{split_installments, ChatEntry, NewBill};
pub use payments::{reminders_for, Reconciliation, ReceiptUpload, ScheduleRequest};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Result, StoreError, ValidationError};
use crate::lifecycle::{BillEvent, Lifecycle};
use crate::models::{
    Bill, BillDocument, BillId, BillStatus, DocumentId, EconomizaConfig, Payment, PaymentMethod,
    UserId,
};
use crate::ocr::OcrProvider;
use crate::pipeline::{ProcessedUpload, UploadProcessor};
use crate::privacy::mask_cpf_cnpj;
use crate::storage::ObjectStorage;
use crate::store::{BillRepository, Changeset};

/// Tracing target of user-visible state changes.
pub const AUDIT_TARGET: &str = "economiza::audit";

/// Result of storing an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub bill_id: BillId,
    pub document_id: DocumentId,
    /// Always true until extraction has run.
    pub requires_manual_review: bool,
}

/// Values the owner fixes when confirming a bill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillCorrections {
    pub issuer: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub barcode: Option<String>,
    pub category: Option<String>,
}

/// Criteria for [`BillService::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillFilter {
    /// Inclusive lower bound on the due date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the due date.
    pub to: Option<NaiveDate>,
    pub status: Option<BillStatus>,
    /// Case-insensitive substring of the issuer.
    pub issuer: Option<String>,
    pub is_bill: Option<bool>,
}

impl BillFilter {
    pub fn matches(&self, bill: &Bill) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(due) = bill.due_date else {
                return false;
            };
            if self.from.is_some_and(|from| due < from) || self.to.is_some_and(|to| due > to) {
                return false;
            }
        }
        if self.status.is_some_and(|status| bill.status != status) {
            return false;
        }
        if self.is_bill.is_some_and(|is_bill| bill.is_bill != is_bill) {
            return false;
        }
        if let Some(needle) = &self.issuer {
            let needle = needle.to_lowercase();
            let found = bill
                .issuer
                .as_deref()
                .is_some_and(|issuer| issuer.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

/// A bill with its document and payments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillDetails {
    pub bill: Bill,
    /// The uploaded document, with CPF/CNPJ masked in the OCR text.
    pub document: Option<BillDocument>,
    pub payments: Vec<Payment>,
}

/// Bill operations for any user.
pub struct BillService {
    repo: Arc<dyn BillRepository>,
    storage: Arc<dyn ObjectStorage>,
    ocr: Arc<dyn OcrProvider>,
    processor: UploadProcessor,
    lifecycle: Lifecycle,
    presigned_ttl: Duration,
    notify_before_days: Vec<u32>,
    default_method: PaymentMethod,
}

impl BillService {
    pub fn new(
        repo: Arc<dyn BillRepository>,
        storage: Arc<dyn ObjectStorage>,
        ocr: Arc<dyn OcrProvider>,
        processor: UploadProcessor,
    ) -> Self {
        let lifecycle = Lifecycle::new(processor.policy());
        Self {
            repo,
            storage,
            ocr,
            processor,
            lifecycle,
            presigned_ttl: Duration::from_secs(3600),
            notify_before_days: vec![7, 3, 1],
            default_method: PaymentMethod::default(),
        }
    }

    /// Apply the storage and scheduling settings from `config`.
    pub fn with_config(mut self, config: &EconomizaConfig) -> Self {
        self.presigned_ttl = Duration::from_secs(config.storage.presigned_ttl_secs);
        self.notify_before_days = config.schedule.notify_before_days.clone();
        self.default_method = config.schedule.default_method;
        self
    }

    pub fn with_presigned_ttl(mut self, ttl: Duration) -> Self {
        self.presigned_ttl = ttl;
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Store an uploaded bill document and create its pending bill.
    pub async fn upload(
        &self,
        owner: UserId,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt> {
        let mime = base_mime(content_type);
        if !(mime.starts_with("image/") || mime == "application/pdf") {
            return Err(ValidationError::new(
                "content_type",
                format!("{} is not an image or PDF", content_type),
            )
            .into());
        }
        let filename = plain_filename(filename)?;

        let bill = Bill::uploaded(owner);
        let path = format!("bills/{}/{}/{}", owner, bill.id, filename);
        let stored = self.storage.upload(bytes, &path, &mime).await?;

        let document = BillDocument::new(bill.id, stored, mime);
        let receipt = UploadReceipt {
            bill_id: bill.id,
            document_id: document.id,
            requires_manual_review: true,
        };

        let changes = Changeset::new().put_bill(bill).put_document(document);
        if let Err(e) = self.repo.commit(changes).await {
            self.discard_object(&path).await;
            return Err(e.into());
        }

        info!(target: AUDIT_TARGET, %owner, bill = %receipt.bill_id, "bill uploaded");
        Ok(receipt)
    }

    /// Run text extraction and the field cascade over a bill's document.
    pub async fn process_document(&self, owner: UserId, bill_id: BillId) -> Result<ProcessedUpload> {
        let bill = self.owned_bill(owner, bill_id).await?;
        let mut document = self.repo.document_of(bill.id).await?.ok_or_else(|| {
            ValidationError::new("bill", format!("bill {} has no uploaded document", bill.id))
        })?;

        let bytes = self.storage.download(&document.storage_path).await?;
        let ocr = self.ocr.extract_text(&bytes, &document.content_type).await;
        debug!("OCR read {} chars (confidence {:.2})", ocr.text.len(), ocr.confidence);

        let image_url = match self
            .storage
            .presigned_url(&document.storage_path, self.presigned_ttl)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("No presigned URL for {}: {}", document.storage_path, e);
                None
            }
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("bill_id".to_string(), bill.id.to_string());
        metadata.insert("content_type".to_string(), document.content_type.clone());
        if let Some(name) = document.storage_path.rsplit('/').next() {
            metadata.insert("filename".to_string(), name.to_string());
        }

        let processed = self
            .processor
            .process_upload(&ocr.text, image_url, metadata)
            .await;

        document.ocr_text = Some(ocr.text);
        document.ocr_confidence = ocr.confidence;
        document.extracted_json = Some(processed.fields.clone());

        // The bill may have been confirmed or rejected while we were extracting.
        let mut current = self.owned_bill(owner, bill_id).await?;
        let event = BillEvent::ExtractionCompleted {
            confidence: processed.fields.confidence,
        };
        let applied = match self.lifecycle.next(current.status, event) {
            Ok(status) => {
                let guard = Changeset::new().expect_bill(&current);
                current.absorb(&processed.fields);
                current.confidence = processed.fields.confidence;
                current.status = status;
                current.touch();

                let changes = guard.put_document(document.clone()).put_bill(current);
                match self.repo.commit(changes).await {
                    Ok(()) => true,
                    Err(StoreError::Conflict(reason)) => {
                        warn!("Bill {} changed during extraction: {}", bill_id, reason);
                        false
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(_) => {
                warn!("Bill {} is {} now", bill_id, current.status);
                false
            }
        };

        if !applied {
            debug!("Recording document of bill {} only", bill_id);
            self.repo.commit(Changeset::new().put_document(document)).await?;
        }

        info!(
            target: AUDIT_TARGET,
            %owner,
            bill = %bill_id,
            confidence = processed.fields.confidence,
            status = %processed.bill_status,
            applied,
            "bill processed"
        );
        Ok(processed)
    }

    /// Confirm a bill, applying the owner's corrections.
    pub async fn confirm(
        &self,
        owner: UserId,
        bill_id: BillId,
        corrections: Option<BillCorrections>,
    ) -> Result<Bill> {
        let mut bill = self.owned_bill(owner, bill_id).await?;
        let status = self.lifecycle.next(bill.status, BillEvent::Confirmed)?;
        let guard = Changeset::new().expect_bill(&bill);

        if let Some(c) = corrections {
            if let Some(amount) = c.amount {
                bill.amount = Some(positive_amount(amount)?);
            }
            if let Some(barcode) = c.barcode {
                bill.barcode = Some(valid_barcode(&barcode)?);
            }
            if let Some(issuer) = c.issuer {
                bill.issuer = Some(issuer.trim().to_string());
            }
            if c.due_date.is_some() {
                bill.due_date = c.due_date;
            }
            if c.category.is_some() {
                bill.category = c.category;
            }
        }

        bill.status = status;
        bill.confidence = 1.0;
        bill.touch();

        self.repo.commit(guard.put_bill(bill.clone())).await?;
        info!(target: AUDIT_TARGET, %owner, bill = %bill_id, "bill confirmed");
        Ok(bill)
    }

    /// Reject a bill.
    pub async fn reject(&self, owner: UserId, bill_id: BillId) -> Result<Bill> {
        let bill = self.transition(owner, bill_id, BillEvent::Rejected).await?;
        info!(target: AUDIT_TARGET, %owner, bill = %bill_id, "bill rejected");
        Ok(bill)
    }

    /// Mark every open bill due before `today` as overdue.
    pub async fn refresh_overdue(&self, owner: UserId, today: NaiveDate) -> Result<usize> {
        let mut changes = Changeset::new();
        for mut bill in self.repo.bills_of(owner).await? {
            if !bill.due_date.is_some_and(|due| due < today) {
                continue;
            }
            if let Ok(status) = self.lifecycle.next(bill.status, BillEvent::PastDue) {
                changes = changes.expect_bill(&bill);
                bill.status = status;
                bill.touch();
                changes = changes.put_bill(bill);
            }
        }

        let count = changes.len();
        if count > 0 {
            self.repo.commit(changes).await?;
            info!(target: AUDIT_TARGET, %owner, count, "bills marked overdue");
        }
        Ok(count)
    }

    /// The owner's bills matching `filter`, by due date with undated bills last.
    pub async fn list(&self, owner: UserId, filter: &BillFilter) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .repo
            .bills_of(owner)
            .await?
            .into_iter()
            .filter(|b| filter.matches(b))
            .collect();
        bills.sort_by_key(|b| (b.due_date.is_none(), b.due_date, b.created_at));
        Ok(bills)
    }

    /// A bill with its document and payments.
    pub async fn get(&self, owner: UserId, bill_id: BillId) -> Result<BillDetails> {
        let bill = self.owned_bill(owner, bill_id).await?;
        let document = self.repo.document_of(bill.id).await?.map(|mut d| {
            d.ocr_text = d.ocr_text.as_deref().map(mask_cpf_cnpj);
            d
        });
        let payments = self.repo.payments_of(bill.id).await?;

        Ok(BillDetails {
            bill,
            document,
            payments,
        })
    }

    /// Delete a bill with its document, payments and stored files.
    pub async fn delete(&self, owner: UserId, bill_id: BillId) -> Result<()> {
        let bill = self.owned_bill(owner, bill_id).await?;
        let document = self.repo.document_of(bill.id).await?;
        let payments = self.repo.payments_of(bill.id).await?;

        let mut objects = Vec::new();
        let mut changes = Changeset::new().expect_bill(&bill);
        if let Some(document) = document {
            objects.push(document.storage_path.clone());
            changes = changes.delete_document(document.id);
        }
        for payment in payments {
            objects.extend(payment.receipt_path.clone());
            changes = changes.delete_payment(payment.id);
        }
        changes = changes.delete_bill(bill.id);

        self.repo.commit(changes).await?;
        for path in &objects {
            self.discard_object(path).await;
        }

        info!(target: AUDIT_TARGET, %owner, bill = %bill_id, "bill deleted");
        Ok(())
    }

    /// Load a bill, hiding bills of other owners.
    async fn owned_bill(&self, owner: UserId, bill_id: BillId) -> Result<Bill> {
        match self.repo.bill(bill_id).await? {
            Some(bill) if bill.owner == owner => Ok(bill),
            _ => Err(LifecycleError::BillNotFound(bill_id).into()),
        }
    }

    /// Apply a status-only event and persist the bill.
    async fn transition(&self, owner: UserId, bill_id: BillId, event: BillEvent) -> Result<Bill> {
        let mut bill = self.owned_bill(owner, bill_id).await?;
        let guard = Changeset::new().expect_bill(&bill);
        bill.status = self.lifecycle.next(bill.status, event)?;
        bill.touch();
        self.repo.commit(guard.put_bill(bill.clone())).await?;
        Ok(bill)
    }

    async fn discard_object(&self, path: &str) {
        if let Err(e) = self.storage.delete(path).await {
            warn!("Could not delete stored object {}: {}", path, e);
        }
    }
}

fn base_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// The last path component of a client-supplied filename.
fn plain_filename(filename: &str) -> Result<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError::new("filename", "must name a file").into());
    }
    Ok(name.to_string())
}

fn positive_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount", "must be greater than zero").into());
    }
    Ok(amount.round_dp(2))
}

fn valid_barcode(barcode: &str) -> Result<String> {
    let digits: String = barcode.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != crate::models::BARCODE_LEN {
        return Err(ValidationError::new(
            "barcode",
            format!("must have {} digits", crate::models::BARCODE_LEN),
        )
        .into());
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bill_due(day: Option<u32>, issuer: Option<&str>, status: BillStatus) -> Bill {
        let mut bill = Bill::uploaded(UserId::new());
        bill.due_date = day.and_then(|d| NaiveDate::from_ymd_opt(2025, 3, d));
        bill.issuer = issuer.map(str::to_string);
        bill.status = status;
        bill
    }

    #[test]
    fn test_filter_by_issuer_substring() {
        let filter = BillFilter {
            issuer: Some("energia".to_string()),
            ..BillFilter::default()
        };
        assert!(filter.matches(&bill_due(Some(1), Some("ENERGIA ELETRICA SA"), BillStatus::Pending)));
        assert!(!filter.matches(&bill_due(Some(1), Some("AGUA SA"), BillStatus::Pending)));
        assert!(!filter.matches(&bill_due(Some(1), None, BillStatus::Pending)));
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        let filter = BillFilter {
            from: NaiveDate::from_ymd_opt(2025, 3, 10),
            to: NaiveDate::from_ymd_opt(2025, 3, 20),
            ..BillFilter::default()
        };
        assert!(filter.matches(&bill_due(Some(10), None, BillStatus::Pending)));
        assert!(filter.matches(&bill_due(Some(20), None, BillStatus::Pending)));
        assert!(!filter.matches(&bill_due(Some(21), None, BillStatus::Pending)));
        assert!(!filter.matches(&bill_due(None, None, BillStatus::Pending)));
    }

    #[test]
    fn test_filter_status() {
        let filter = BillFilter {
            status: Some(BillStatus::Paid),
            ..BillFilter::default()
        };
        assert!(filter.matches(&bill_due(None, None, BillStatus::Paid)));
        assert!(!filter.matches(&bill_due(None, None, BillStatus::Overdue)));
    }

    #[test]
    fn test_plain_filename() {
        assert_eq!(plain_filename("../../etc/boleto.pdf").unwrap(), "boleto.pdf");
        assert_eq!(plain_filename("C:\\scans\\conta.jpg").unwrap(), "conta.jpg");
        assert!(plain_filename("dir/").is_err());
        assert!(plain_filename("..").is_err());
    }

    #[test]
    fn test_amount_and_barcode_validation() {
        assert!(positive_amount(Decimal::ZERO).is_err());
        assert_eq!(positive_amount(Decimal::new(10005, 3)).unwrap(), Decimal::new(1000, 2));
        assert!(valid_barcode("123").is_err());
        assert_eq!(valid_barcode(&"1".repeat(44)).unwrap().len(), 44);
    }

    #[test]
    fn test_base_mime() {
        assert_eq!(base_mime("Application/PDF; name=x"), "application/pdf");
    }
}
