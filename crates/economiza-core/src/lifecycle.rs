//! Bill lifecycle state machine.
//!
//! ```text
//! pending ──extraction──▶ pending | confirmed
//! pending/confirmed/overdue ──confirm──▶ confirmed
//! pending/confirmed/overdue ──reject──▶ cancelled
//! confirmed ──schedule──▶ scheduled
//! confirmed/scheduled/overdue ──pay──▶ paid
//! pending/confirmed/scheduled ──past due──▶ overdue
//! ```

use crate::error::LifecycleError;
use crate::models::BillStatus;

/// Default confidence needed to confirm a bill without review.
pub const DEFAULT_AUTO_CONFIRM_THRESHOLD: f32 = 0.90;

/// Something that happens to a bill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BillEvent {
    /// The extraction cascade finished with this confidence.
    ExtractionCompleted { confidence: f32 },
    /// The owner confirmed (and possibly corrected) the data.
    Confirmed,
    /// The owner rejected the bill.
    Rejected,
    /// A payment was scheduled.
    Scheduled,
    /// The bill was paid.
    Paid,
    /// The due date passed without payment.
    PastDue,
}

impl BillEvent {
    fn action(&self) -> &'static str {
        match self {
            BillEvent::ExtractionCompleted { .. } => "complete extraction of",
            BillEvent::Confirmed => "confirm",
            BillEvent::Rejected => "reject",
            BillEvent::Scheduled => "schedule",
            BillEvent::Paid => "mark paid",
            BillEvent::PastDue => "mark overdue",
        }
    }
}

/// Decides the status of a freshly extracted bill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusPolicy {
    auto_confirm_threshold: f32,
}

impl StatusPolicy {
    pub fn new(auto_confirm_threshold: f32) -> Self {
        Self {
            auto_confirm_threshold,
        }
    }

    /// `Confirmed` at or above the threshold, `Pending` (manual review) below.
    pub fn status_for(&self, confidence: f32) -> BillStatus {
        if confidence >= self.auto_confirm_threshold {
            BillStatus::Confirmed
        } else {
            BillStatus::Pending
        }
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_CONFIRM_THRESHOLD)
    }
}

/// The bill state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Lifecycle {
    policy: StatusPolicy,
}

impl Lifecycle {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// The status after `event`, or an error if `event` is not allowed in
    /// `from`.
    pub fn next(&self, from: BillStatus, event: BillEvent) -> Result<BillStatus, LifecycleError> {
        use BillStatus::*;

        let to = match (from, event) {
            (Pending, BillEvent::ExtractionCompleted { confidence }) => {
                Some(self.policy.status_for(confidence))
            }
            (Pending | Confirmed | Overdue, BillEvent::Confirmed) => Some(Confirmed),
            (Pending | Confirmed | Overdue, BillEvent::Rejected) => Some(Cancelled),
            (Confirmed, BillEvent::Scheduled) => Some(Scheduled),
            (Confirmed | Scheduled | Overdue, BillEvent::Paid) => Some(Paid),
            (Pending | Confirmed | Scheduled, BillEvent::PastDue) => Some(Overdue),
            _ => None,
        };

        to.ok_or(LifecycleError::InvalidTransition {
            from,
            action: event.action(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_gate() {
        let policy = StatusPolicy::default();
        assert_eq!(policy.status_for(0.90), BillStatus::Confirmed);
        assert_eq!(policy.status_for(0.95), BillStatus::Confirmed);
        assert_eq!(policy.status_for(0.89), BillStatus::Pending);
        assert_eq!(policy.status_for(0.0), BillStatus::Pending);
    }

    #[test]
    fn test_extraction_only_from_pending() {
        let lifecycle = Lifecycle::default();
        assert_eq!(
            lifecycle.next(BillStatus::Pending, BillEvent::ExtractionCompleted { confidence: 0.9 }),
            Ok(BillStatus::Confirmed)
        );
        assert!(lifecycle
            .next(BillStatus::Cancelled, BillEvent::ExtractionCompleted { confidence: 0.9 })
            .is_err());
    }

    #[test]
    fn test_schedule_requires_confirmed() {
        let lifecycle = Lifecycle::default();
        assert_eq!(
            lifecycle.next(BillStatus::Confirmed, BillEvent::Scheduled),
            Ok(BillStatus::Scheduled)
        );
        assert_eq!(
            lifecycle.next(BillStatus::Pending, BillEvent::Scheduled),
            Err(LifecycleError::InvalidTransition {
                from: BillStatus::Pending,
                action: "schedule",
            })
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let lifecycle = Lifecycle::default();
        let events = [
            BillEvent::ExtractionCompleted { confidence: 1.0 },
            BillEvent::Confirmed,
            BillEvent::Rejected,
            BillEvent::Scheduled,
            BillEvent::Paid,
            BillEvent::PastDue,
        ];
        for from in BillStatus::ALL.into_iter().filter(BillStatus::is_terminal) {
            for event in events {
                assert!(lifecycle.next(from, event).is_err(), "{from} accepted {event:?}");
            }
        }
    }

    #[test]
    fn test_error_message() {
        let err = Lifecycle::default()
            .next(BillStatus::Paid, BillEvent::Rejected)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot reject a bill that is paid");
    }
}
