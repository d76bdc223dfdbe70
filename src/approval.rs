//! Order approval state machine.
//!
//! ```text
//! pending --submit proof--> pending_approval --approve--> completed
//!    ^                             |
//!    +----------reject-------------+
//! pending --cancel--> cancelled
//! pending | pending_approval --complete direct--> completed
//! ```
//!
//! `completed` and `cancelled` are terminal. The table only decides which
//! status an event leads to; data guards (proof token, rejection reason)
//! are checked separately and never mutate anything.
use crate::error::OrderError;
use crate::order::{Order, OrderStatus, REJECTION_NOTE_PREFIX};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEvent {
    SubmitProof,
    Approve,
    Reject,
    Cancel,
    CompleteDirect,
}

impl OrderEvent {
    pub const ALL: [OrderEvent; 5] = [
        OrderEvent::SubmitProof,
        OrderEvent::Approve,
        OrderEvent::Reject,
        OrderEvent::Cancel,
        OrderEvent::CompleteDirect,
    ];

    /// The status this event produces when it is legal.
    pub fn target(self) -> OrderStatus {
        match self {
            OrderEvent::SubmitProof => OrderStatus::PendingApproval,
            OrderEvent::Approve | OrderEvent::CompleteDirect => OrderStatus::Completed,
            OrderEvent::Reject => OrderStatus::Pending,
            OrderEvent::Cancel => OrderStatus::Cancelled,
        }
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderEvent::SubmitProof => "submit for approval",
            OrderEvent::Approve => "approve",
            OrderEvent::Reject => "reject",
            OrderEvent::Cancel => "cancel",
            OrderEvent::CompleteDirect => "complete",
        };
        f.write_str(name)
    }
}

pub fn transition(from: OrderStatus, event: OrderEvent) -> Option<OrderStatus> {
    use crate::approval::OrderEvent::*;
    use crate::order::OrderStatus::*;

    match (from, event) {
        (Pending, SubmitProof) => Some(PendingApproval),
        (PendingApproval, Approve) => Some(Completed),
        (PendingApproval, Reject) => Some(Pending),
        (Pending, Cancel) => Some(Cancelled),
        (Pending | PendingApproval, CompleteDirect) => Some(Completed),
        _ => None,
    }
}

/// Resolves the next status for `order`, or the error the caller must see.
///
/// Direct completion of a terminal order reports `AlreadyProcessed` so that
/// repeated redemption of the same code is recognisable; every other illegal
/// move is `InvalidState`.
pub fn advance(order: &Order, event: OrderEvent) -> Result<OrderStatus, OrderError> {
    if let Some(next) = transition(order.status, event) {
        return Ok(next);
    }
    if event == OrderEvent::CompleteDirect && order.status.is_terminal() {
        return Err(OrderError::AlreadyProcessed {
            order_id: order.id.clone(),
            status: order.status,
        });
    }
    Err(OrderError::InvalidState {
        order_id: order.id.clone(),
        status: order.status,
        event,
    })
}

pub fn requires_approval(order: &Order) -> bool {
    order.status == OrderStatus::PendingApproval
}

/// The delivery proof must be the order id, byte for byte.
pub fn verify_proof(order: &Order, proof_token: &str) -> Result<(), OrderError> {
    if proof_token != order.id {
        return Err(OrderError::ProofMismatch {
            order_id: order.id.clone(),
        });
    }
    Ok(())
}

pub fn rejection_reason(reason: &str) -> Result<String, OrderError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(OrderError::ValidationError("rejection reason is blank".into()));
    }
    Ok(reason.to_string())
}

pub fn rejection_note(reason: &str) -> String {
    format!("{REJECTION_NOTE_PREFIX}{reason}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeStamp;

    fn order_in(status: OrderStatus) -> Order {
        Order {
            id: "order_1test".into(),
            user_id: "user_1".into(),
            items: vec![],
            total_price: 0,
            address: String::new(),
            note: None,
            status,
            created_at: TimeStamp::new(),
            submitted_at: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn happy_path_table() {
        use crate::order::OrderStatus::*;
        assert_eq!(transition(Pending, OrderEvent::SubmitProof), Some(PendingApproval));
        assert_eq!(transition(PendingApproval, OrderEvent::Approve), Some(Completed));
        assert_eq!(transition(PendingApproval, OrderEvent::Reject), Some(Pending));
        assert_eq!(transition(Pending, OrderEvent::Cancel), Some(Cancelled));
        assert_eq!(transition(Pending, OrderEvent::CompleteDirect), Some(Completed));
        assert_eq!(transition(PendingApproval, OrderEvent::CompleteDirect), Some(Completed));
    }

    #[test]
    fn cancel_only_from_pending() {
        for status in [
            OrderStatus::PendingApproval,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            let err = advance(&order_in(status), OrderEvent::Cancel).unwrap_err();
            assert!(matches!(err, OrderError::InvalidState { .. }), "{status}");
        }
    }

    #[test]
    fn approve_before_submission_is_invalid() {
        let err = advance(&order_in(OrderStatus::Pending), OrderEvent::Approve).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidState {
                status: OrderStatus::Pending,
                event: OrderEvent::Approve,
                ..
            }
        ));
    }

    #[test]
    fn direct_completion_of_terminal_order_is_already_processed() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            let err = advance(&order_in(status), OrderEvent::CompleteDirect).unwrap_err();
            assert!(matches!(err, OrderError::AlreadyProcessed { .. }));
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for event in OrderEvent::ALL {
                assert_eq!(transition(status, event), None);
            }
        }
    }

    #[test]
    fn resubmission_reports_target_state() {
        let order = order_in(OrderStatus::PendingApproval);
        let err = advance(&order, OrderEvent::SubmitProof).unwrap_err();
        assert!(err.is_already_in_target_state());
    }

    #[test]
    fn proof_must_match_exactly() {
        let order = order_in(OrderStatus::Pending);
        assert!(verify_proof(&order, "order_1test").is_ok());
        assert!(verify_proof(&order, "order_1tes").is_err());
        assert!(verify_proof(&order, " order_1test").is_err());
        assert!(verify_proof(&order, "ORDER_1TEST").is_err());
    }

    #[test]
    fn blank_reason_is_rejected() {
        assert!(rejection_reason("   ").is_err());
        assert_eq!(rejection_reason(" eksik iş ").unwrap(), "eksik iş");
        assert_eq!(rejection_note("incomplete"), "RED NEDENİ: incomplete");
    }

    #[test]
    fn approval_needed_only_after_submission() {
        assert!(requires_approval(&order_in(OrderStatus::PendingApproval)));
        assert!(!requires_approval(&order_in(OrderStatus::Pending)));
    }
}
