//! Entries created by hand or by the chat assistant.

use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Result, ValidationError};
use crate::models::{Bill, BillId, BillStatus, BillType, UserId, CURRENCY_BRL};
use crate::store::Changeset;

use super::{positive_amount, valid_barcode, BillService, AUDIT_TARGET};

/// Category of chat expenses that did not name one.
const DEFAULT_EXPENSE_CATEGORY: &str = "outras";

/// Confidence of entries parsed by the chat assistant.
const CHAT_CONFIDENCE: f32 = 0.9;

/// A bill or income typed in by the owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBill {
    pub kind: BillType,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    /// Defaults to "Despesa Manual" or "Receita Manual".
    pub issuer: Option<String>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    /// Pending, confirmed (default) or scheduled.
    pub status: Option<BillStatus>,
    /// Defaults to false.
    pub is_bill: Option<bool>,
}

/// A transaction already parsed out of a chat message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatEntry {
    pub kind: BillType,
    /// Total amount; split across installments when there are several.
    pub amount: Decimal,
    pub issuer: Option<String>,
    pub category: Option<String>,
    /// Due date of the first installment.
    pub due_date: Option<NaiveDate>,
    /// Number of monthly installments; 0 and 1 both mean a single entry.
    pub installments: u32,
}

fn default_issuer(kind: BillType) -> &'static str {
    match kind {
        BillType::Expense => "Despesa Manual",
        BillType::Income => "Receita Manual",
    }
}

fn issuer_or_default(issuer: Option<String>, kind: BillType) -> String {
    issuer
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| default_issuer(kind).to_string())
}

fn manual_bill(owner: UserId, kind: BillType) -> Bill {
    let now = Utc::now();
    Bill {
        id: BillId::new(),
        owner,
        issuer: None,
        amount: None,
        currency: CURRENCY_BRL.to_string(),
        due_date: None,
        barcode: None,
        category: None,
        status: BillStatus::Confirmed,
        kind,
        is_bill: false,
        confidence: 1.0,
        created_at: now,
        updated_at: now,
    }
}

/// Split `total` into `count` amounts rounded to cents.
///
/// Every installment gets `total / count`; the last one absorbs the
/// rounding difference so the parts add up to `total`.
pub fn split_installments(total: Decimal, count: u32) -> Vec<Decimal> {
    let count = count.max(1);
    let each = (total / Decimal::from(count)).round_dp(2);
    let last = (total - each * Decimal::from(count - 1)).round_dp(2);

    let mut parts = vec![each; (count - 1) as usize];
    parts.push(last);
    parts
}

impl BillService {
    /// Record a manual entry.
    pub async fn create_manual(&self, owner: UserId, new: NewBill) -> Result<Bill> {
        let amount = positive_amount(new.amount)?;
        let status = new.status.unwrap_or(BillStatus::Confirmed);
        if !matches!(
            status,
            BillStatus::Pending | BillStatus::Confirmed | BillStatus::Scheduled
        ) {
            return Err(ValidationError::new(
                "status",
                format!("a new bill cannot start as {}", status),
            )
            .into());
        }

        let mut bill = manual_bill(owner, new.kind);
        bill.amount = Some(amount);
        bill.issuer = Some(issuer_or_default(new.issuer, new.kind));
        bill.due_date = new.due_date;
        bill.category = new.category;
        bill.barcode = new.barcode.as_deref().map(valid_barcode).transpose()?;
        bill.status = status;
        bill.is_bill = new.is_bill.unwrap_or(false);

        self.repo.commit(Changeset::new().put_bill(bill.clone())).await?;
        info!(
            target: AUDIT_TARGET,
            %owner,
            bill = %bill.id,
            kind = %bill.kind,
            "manual bill created"
        );
        Ok(bill)
    }

    /// Record a chat entry, one bill per monthly installment.
    pub async fn create_from_chat(&self, owner: UserId, entry: ChatEntry) -> Result<Vec<Bill>> {
        let total = positive_amount(entry.amount)?;
        let category = match (entry.kind, entry.category) {
            (_, Some(category)) if !category.trim().is_empty() => category.trim().to_string(),
            (BillType::Income, _) => {
                return Err(ValidationError::new("category", "income needs a source").into());
            }
            (BillType::Expense, _) => DEFAULT_EXPENSE_CATEGORY.to_string(),
        };
        let installments = entry.installments.max(1);
        if installments > 1 && entry.due_date.is_none() {
            return Err(ValidationError::new(
                "due_date",
                "installments need the first due date",
            )
            .into());
        }

        let issuer = issuer_or_default(entry.issuer, entry.kind);
        let mut bills = Vec::with_capacity(installments as usize);
        for (i, amount) in split_installments(total, installments).into_iter().enumerate() {
            let due_date = match entry.due_date {
                Some(first) => Some(first.checked_add_months(Months::new(i as u32)).ok_or_else(
                    || ValidationError::new("due_date", "installment date out of range"),
                )?),
                None => None,
            };

            let mut bill = manual_bill(owner, entry.kind);
            bill.amount = Some(amount);
            bill.issuer = Some(issuer.clone());
            bill.category = Some(category.clone());
            bill.due_date = due_date;
            bill.confidence = CHAT_CONFIDENCE;
            bills.push(bill);
        }

        let changes = bills
            .iter()
            .cloned()
            .fold(Changeset::new(), Changeset::put_bill);
        self.repo.commit(changes).await?;

        info!(
            target: AUDIT_TARGET,
            %owner,
            count = bills.len(),
            total = %total,
            "chat entries created"
        );
        Ok(bills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_even() {
        assert_eq!(
            split_installments(Decimal::new(30000, 2), 3),
            vec![Decimal::new(10000, 2); 3]
        );
    }

    #[test]
    fn test_split_last_takes_remainder() {
        let parts = split_installments(Decimal::new(10000, 2), 3);
        assert_eq!(
            parts,
            vec![Decimal::new(3333, 2), Decimal::new(3333, 2), Decimal::new(3334, 2)]
        );
        assert_eq!(parts.iter().sum::<Decimal>(), Decimal::new(10000, 2));
    }

    #[test]
    fn test_split_single() {
        assert_eq!(split_installments(Decimal::new(995, 1), 0), vec![Decimal::new(995, 1)]);
    }

    #[test]
    fn test_default_issuer() {
        assert_eq!(issuer_or_default(None, BillType::Income), "Receita Manual");
        assert_eq!(issuer_or_default(Some("  ".into()), BillType::Expense), "Despesa Manual");
        assert_eq!(issuer_or_default(Some(" Loja X ".into()), BillType::Expense), "Loja X");
    }
}
