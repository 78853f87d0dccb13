//! Transactional persistence of bills, documents and payments.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{
    Bill, BillDocument, BillId, BillStatus, DocumentId, Payment, PaymentId, UserId,
};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// One write inside a [`Changeset`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Precondition: the bill still has this status and version.
    ExpectBill {
        id: BillId,
        status: BillStatus,
        updated_at: DateTime<Utc>,
    },
    PutBill(Bill),
    PutDocument(BillDocument),
    PutPayment(Payment),
    DeleteBill(BillId),
    DeleteDocument(DocumentId),
    DeletePayment(PaymentId),
}

/// Writes committed together: either all of them land or none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the commit unless the stored bill is still the version `read`.
    pub fn expect_bill(mut self, read: &Bill) -> Self {
        self.changes.push(Change::ExpectBill {
            id: read.id,
            status: read.status,
            updated_at: read.updated_at,
        });
        self
    }

    pub fn put_bill(mut self, bill: Bill) -> Self {
        self.changes.push(Change::PutBill(bill));
        self
    }

    pub fn put_document(mut self, document: BillDocument) -> Self {
        self.changes.push(Change::PutDocument(document));
        self
    }

    pub fn put_payment(mut self, payment: Payment) -> Self {
        self.changes.push(Change::PutPayment(payment));
        self
    }

    pub fn delete_bill(mut self, id: BillId) -> Self {
        self.changes.push(Change::DeleteBill(id));
        self
    }

    pub fn delete_document(mut self, id: DocumentId) -> Self {
        self.changes.push(Change::DeleteDocument(id));
        self
    }

    pub fn delete_payment(mut self, id: PaymentId) -> Self {
        self.changes.push(Change::DeletePayment(id));
        self
    }

    /// Number of writes, not counting preconditions.
    pub fn len(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| !matches!(c, Change::ExpectBill { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}

/// Complete persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub bills: BTreeMap<BillId, Bill>,
    pub documents: BTreeMap<DocumentId, BillDocument>,
    pub payments: BTreeMap<PaymentId, Payment>,
}

impl Ledger {
    /// Apply every change in order.
    ///
    /// On error the ledger may be partially modified; stores apply to a copy.
    pub fn apply(&mut self, changeset: Changeset) -> Result<()> {
        for change in changeset.changes {
            match change {
                Change::ExpectBill {
                    id,
                    status,
                    updated_at,
                } => {
                    let current = self.bills.get(&id);
                    let unchanged = current
                        .is_some_and(|b| b.status == status && b.updated_at == updated_at);
                    if !unchanged {
                        return Err(StoreError::Conflict(format!(
                            "bill {} changed since it was read",
                            id
                        )));
                    }
                }
                Change::PutBill(bill) => {
                    self.bills.insert(bill.id, bill);
                }
                Change::PutDocument(document) => {
                    if !self.bills.contains_key(&document.bill_id) {
                        return Err(StoreError::MissingRecord(format!("bill {}", document.bill_id)));
                    }
                    self.documents.insert(document.id, document);
                }
                Change::PutPayment(payment) => {
                    if !self.bills.contains_key(&payment.bill_id) {
                        return Err(StoreError::MissingRecord(format!("bill {}", payment.bill_id)));
                    }
                    self.payments.insert(payment.id, payment);
                }
                Change::DeleteBill(id) => {
                    self.bills
                        .remove(&id)
                        .ok_or_else(|| StoreError::MissingRecord(format!("bill {}", id)))?;
                }
                Change::DeleteDocument(id) => {
                    self.documents
                        .remove(&id)
                        .ok_or_else(|| StoreError::MissingRecord(format!("document {}", id)))?;
                }
                Change::DeletePayment(id) => {
                    self.payments
                        .remove(&id)
                        .ok_or_else(|| StoreError::MissingRecord(format!("payment {}", id)))?;
                }
            }
        }
        Ok(())
    }

    /// Copy of the ledger with `changeset` applied, leaving `self` untouched.
    pub fn with_applied(&self, changeset: Changeset) -> Result<Ledger> {
        let mut next = self.clone();
        next.apply(changeset)?;
        Ok(next)
    }

    pub fn bills_of(&self, owner: UserId) -> Vec<Bill> {
        self.bills
            .values()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect()
    }

    pub fn document_of(&self, bill: BillId) -> Option<BillDocument> {
        self.documents.values().find(|d| d.bill_id == bill).cloned()
    }

    pub fn payments_of(&self, bill: BillId) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.bill_id == bill)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        payments
    }
}

/// Read and atomically write bills with their documents and payments.
#[async_trait]
pub trait BillRepository: Send + Sync {
    async fn bill(&self, id: BillId) -> Result<Option<Bill>>;

    async fn bills_of(&self, owner: UserId) -> Result<Vec<Bill>>;

    async fn document_of(&self, bill: BillId) -> Result<Option<BillDocument>>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Payments of a bill, oldest first.
    async fn payments_of(&self, bill: BillId) -> Result<Vec<Payment>>;

    /// Apply all changes or none.
    async fn commit(&self, changeset: Changeset) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_requires_bill() {
        let bill = Bill::uploaded(UserId::new());
        let orphan = BillDocument::new(BillId::new(), "x", "application/pdf");

        let ledger = Ledger::default();
        let result = ledger.with_applied(Changeset::new().put_bill(bill.clone()).put_document(orphan));

        assert!(matches!(result, Err(StoreError::MissingRecord(_))));
        assert_eq!(ledger, Ledger::default());
    }

    #[test]
    fn test_delete_missing_record_fails() {
        let mut ledger = Ledger::default();
        assert!(ledger.apply(Changeset::new().delete_payment(PaymentId::new())).is_err());
    }

    #[test]
    fn test_expect_bill_rejects_stale_version() {
        let read = Bill::uploaded(UserId::new());
        let ledger = Ledger::default()
            .with_applied(Changeset::new().put_bill(read.clone()))
            .unwrap();

        let mut confirmed = read.clone();
        confirmed.status = BillStatus::Confirmed;
        confirmed.touch();
        let ledger = ledger
            .with_applied(Changeset::new().expect_bill(&read).put_bill(confirmed.clone()))
            .unwrap();

        let mut stale = read.clone();
        stale.confidence = 0.3;
        stale.touch();
        let result = ledger.with_applied(Changeset::new().expect_bill(&read).put_bill(stale));

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(ledger.bills.get(&read.id), Some(&confirmed));
    }

    #[test]
    fn test_expect_bill_on_deleted_bill() {
        let read = Bill::uploaded(UserId::new());
        let result = Ledger::default().with_applied(Changeset::new().expect_bill(&read));
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_preconditions_are_not_writes() {
        let bill = Bill::uploaded(UserId::new());
        let changes = Changeset::new().expect_bill(&bill);
        assert!(changes.is_empty());
        assert_eq!(changes.expect_bill(&bill).put_bill(bill.clone()).len(), 1);
    }

    #[test]
    fn test_ledger_json_roundtrip() {
        let bill = Bill::uploaded(UserId::new());
        let document = BillDocument::new(bill.id, "bills/a/b/c.pdf", "application/pdf");
        let ledger = Ledger::default()
            .with_applied(Changeset::new().put_bill(bill).put_document(document))
            .unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let parsed: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ledger);
    }
}
