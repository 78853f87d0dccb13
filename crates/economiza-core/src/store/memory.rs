//! In-memory bill repository.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BillRepository, Changeset, Ledger, Result};
use crate::error::StoreError;
use crate::models::{Bill, BillDocument, BillId, Payment, PaymentId, UserId};

/// Repository keeping everything behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Result<Ledger> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl BillRepository for MemoryStore {
    async fn bill(&self, id: BillId) -> Result<Option<Bill>> {
        Ok(self.lock()?.bills.get(&id).cloned())
    }

    async fn bills_of(&self, owner: UserId) -> Result<Vec<Bill>> {
        Ok(self.lock()?.bills_of(owner))
    }

    async fn document_of(&self, bill: BillId) -> Result<Option<BillDocument>> {
        Ok(self.lock()?.document_of(bill))
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.lock()?.payments.get(&id).cloned())
    }

    async fn payments_of(&self, bill: BillId) -> Result<Vec<Payment>> {
        Ok(self.lock()?.payments_of(bill))
    }

    async fn commit(&self, changeset: Changeset) -> Result<()> {
        let mut ledger = self.lock()?;
        let next = ledger.with_applied(changeset)?;
        *ledger = next;
        Ok(())
    }
}
