//! Bill repository persisted to a JSON file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use super::{BillRepository, Changeset, Ledger, Result};
use crate::error::StoreError;
use crate::models::{Bill, BillDocument, BillId, Payment, PaymentId, UserId};

/// Repository writing the whole ledger to one file on every commit.
///
/// Each commit writes a temporary file next to the target and renames it
/// over the target, so readers see either the old or the new ledger.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    ledger: Mutex<Ledger>,
}

impl JsonFileStore {
    /// Open the ledger at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Ledger::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Ledger::default()
        };

        debug!(
            "Opened ledger {} ({} bills)",
            path.display(),
            ledger.bills.len()
        );

        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger.lock().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self, ledger: &Ledger) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, ledger)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl BillRepository for JsonFileStore {
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

        if let Err(e) = self.write(&next) {
            error!("Failed to write ledger {}: {}", self.path.display(), e);
            return Err(e);
        }

        *ledger = next;
        Ok(())
    }
}
