//! Scheduling, paying and reconciling bills.

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{LifecycleError, Result};
use crate::lifecycle::BillEvent;
use crate::models::{
    BillId, Payment, PaymentId, PaymentMethod, PaymentStatus, Reminder, UserId,
};
use crate::store::Changeset;

use super::{base_mime, plain_filename, BillService, AUDIT_TARGET};

/// Days between execution and due date still counted as on time.
const RECONCILE_WINDOW_DAYS: i64 = 5;

/// Confidence at which a payment counts as reconciled.
const RECONCILE_MATCH_THRESHOLD: f32 = 0.6;

/// How a confirmed bill should be paid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub scheduled_date: NaiveDate,
    /// Defaults to the configured payment method.
    pub method: Option<PaymentMethod>,
    /// Defaults to the configured reminder offsets.
    pub notify_before_days: Option<Vec<u32>>,
}

impl ScheduleRequest {
    pub fn new(scheduled_date: NaiveDate) -> Self {
        Self {
            scheduled_date,
            method: None,
            notify_before_days: None,
        }
    }
}

/// A payment receipt to store with the payment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Outcome of matching a payment against its bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub payment_id: PaymentId,
    pub bill_id: BillId,
    pub matched: bool,
    pub match_confidence: f32,
}

/// Reminder dates `due - d` for each offset, keeping only those after `today`.
pub fn reminders_for(due: NaiveDate, offsets: &[u32], today: NaiveDate) -> Vec<Reminder> {
    let mut reminders: Vec<Reminder> = offsets
        .iter()
        .filter_map(|&days_before| {
            let remind_on = due.checked_sub_days(Days::new(u64::from(days_before)))?;
            (remind_on > today).then_some(Reminder {
                remind_on,
                days_before,
            })
        })
        .collect();
    reminders.sort_by_key(|r| r.remind_on);
    reminders.dedup();
    reminders
}

/// Match confidence of an executed payment against the bill's due date.
fn match_confidence(executed: Option<NaiveDate>, due: Option<NaiveDate>) -> f32 {
    match (executed, due) {
        (Some(executed), Some(due))
            if (executed - due).num_days().abs() <= RECONCILE_WINDOW_DAYS =>
        {
            1.0
        }
        (Some(_), _) => 0.7,
        (None, _) => 0.0,
    }
}

impl BillService {
    /// Schedule the payment of a confirmed bill.
    pub async fn schedule(
        &self,
        owner: UserId,
        bill_id: BillId,
        request: ScheduleRequest,
        today: NaiveDate,
    ) -> Result<Payment> {
        let mut bill = self.owned_bill(owner, bill_id).await?;
        let status = self.lifecycle.next(bill.status, BillEvent::Scheduled)?;
        let guard = Changeset::new().expect_bill(&bill);

        let offsets = request
            .notify_before_days
            .unwrap_or_else(|| self.notify_before_days.clone());
        let reference = bill.due_date.unwrap_or(request.scheduled_date);

        let payment = Payment {
            id: PaymentId::new(),
            bill_id: bill.id,
            owner,
            scheduled_date: Some(request.scheduled_date),
            executed_date: None,
            method: request.method.unwrap_or(self.default_method),
            status: PaymentStatus::Scheduled,
            receipt_path: None,
            reminders: reminders_for(reference, &offsets, today),
            notify_before_days: offsets,
            created_at: Utc::now(),
        };

        bill.status = status;
        bill.touch();

        self.repo
            .commit(guard.put_bill(bill).put_payment(payment.clone()))
            .await?;
        info!(
            target: AUDIT_TARGET,
            %owner,
            bill = %bill_id,
            payment = %payment.id,
            date = %request.scheduled_date,
            reminders = payment.reminders.len(),
            "payment scheduled"
        );
        Ok(payment)
    }

    /// Record that a bill was paid.
    pub async fn mark_paid(
        &self,
        owner: UserId,
        bill_id: BillId,
        executed_date: NaiveDate,
        receipt: Option<ReceiptUpload>,
    ) -> Result<Payment> {
        let mut bill = self.owned_bill(owner, bill_id).await?;
        let status = self.lifecycle.next(bill.status, BillEvent::Paid)?;
        let guard = Changeset::new().expect_bill(&bill);

        let existing = self
            .repo
            .payments_of(bill.id)
            .await?
            .into_iter()
            .find(|p| p.status != PaymentStatus::Cancelled);
        let mut payment = match existing {
            Some(payment) => payment,
            None => Payment {
                id: PaymentId::new(),
                bill_id: bill.id,
                owner,
                scheduled_date: bill.due_date,
                executed_date: None,
                method: self.default_method,
                status: PaymentStatus::Scheduled,
                receipt_path: None,
                notify_before_days: Vec::new(),
                reminders: Vec::new(),
                created_at: Utc::now(),
            },
        };

        let mut stored_receipt = None;
        if let Some(receipt) = receipt {
            let filename = plain_filename(&receipt.filename)?;
            let path = format!("receipts/{}/{}/{}", owner, payment.id, filename);
            let stored = self
                .storage
                .upload(&receipt.bytes, &path, &base_mime(&receipt.content_type))
                .await?;
            payment.receipt_path = Some(stored.clone());
            stored_receipt = Some(stored);
        }

        payment.executed_date = Some(executed_date);
        payment.status = PaymentStatus::Executed;
        payment.reminders.clear();
        bill.status = status;
        bill.touch();

        let changes = guard.put_bill(bill).put_payment(payment.clone());
        if let Err(e) = self.repo.commit(changes).await {
            if let Some(path) = &stored_receipt {
                self.discard_object(path).await;
            }
            return Err(e.into());
        }

        info!(
            target: AUDIT_TARGET,
            %owner,
            bill = %bill_id,
            payment = %payment.id,
            executed = %executed_date,
            receipt = stored_receipt.is_some(),
            "bill paid"
        );
        Ok(payment)
    }

    /// Check whether a payment matches its bill.
    pub async fn reconcile(&self, owner: UserId, payment_id: PaymentId) -> Result<Reconciliation> {
        let payment = match self.repo.payment(payment_id).await? {
            Some(payment) if payment.owner == owner => payment,
            _ => return Err(LifecycleError::PaymentNotFound(payment_id).into()),
        };
        let bill = self.owned_bill(owner, payment.bill_id).await?;

        let match_confidence = match_confidence(payment.executed_date, bill.due_date);
        let matched = match_confidence >= RECONCILE_MATCH_THRESHOLD;

        info!(
            target: AUDIT_TARGET,
            %owner,
            payment = %payment_id,
            matched,
            confidence = match_confidence,
            "payment reconciled"
        );
        Ok(Reconciliation {
            payment_id,
            bill_id: bill.id,
            matched,
            match_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_reminders_skip_past_dates() {
        let reminders = reminders_for(date(3, 10), &[7, 3, 1], date(3, 5));
        assert_eq!(
            reminders,
            vec![
                Reminder {
                    remind_on: date(3, 7),
                    days_before: 3,
                },
                Reminder {
                    remind_on: date(3, 9),
                    days_before: 1,
                },
            ]
        );
    }

    #[test]
    fn test_reminder_on_today_is_dropped() {
        assert!(reminders_for(date(3, 10), &[5], date(3, 5)).is_empty());
    }

    #[test]
    fn test_match_confidence() {
        assert_eq!(match_confidence(Some(date(3, 15)), Some(date(3, 10))), 1.0);
        assert_eq!(match_confidence(Some(date(3, 5)), Some(date(3, 10))), 1.0);
        assert_eq!(match_confidence(Some(date(3, 16)), Some(date(3, 10))), 0.7);
        assert_eq!(match_confidence(Some(date(3, 16)), None), 0.7);
        assert_eq!(match_confidence(None, Some(date(3, 10))), 0.0);
    }
}
