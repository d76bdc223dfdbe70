use crate::approval::OrderEvent;
use crate::order::OrderStatus;
use sled::transaction::TransactionError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Service,
    Order,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Service => f.write_str("service"),
            Entity::Order => f.write_str("order"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OrderError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },
    #[error("Insufficient stock for {service_id}: requested {requested}, available {available}")]
    InsufficientStock {
        service_id: String,
        requested: u32,
        available: u32,
    },
    #[error("Cannot {event} order {order_id} while it is {status}")]
    InvalidState {
        order_id: String,
        status: OrderStatus,
        event: OrderEvent,
    },
    #[error("Proof token does not match order {order_id}")]
    ProofMismatch { order_id: String },
    #[error("Order {order_id} has already been processed ({status})")]
    AlreadyProcessed {
        order_id: String,
        status: OrderStatus,
    },
    #[error("Transaction for {operation} did not commit after {attempts} attempts, retry")]
    Conflict {
        operation: &'static str,
        attempts: u32,
    },
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Record encoding failed: {0}")]
    Codec(String),
    #[error("Identifier generation failed: {0}")]
    Identifier(String),
}

impl OrderError {
    pub(crate) fn service_not_found(id: &str) -> Self {
        OrderError::NotFound {
            entity: Entity::Service,
            id: id.to_string(),
        }
    }

    pub(crate) fn order_not_found(id: &str) -> Self {
        OrderError::NotFound {
            entity: Entity::Order,
            id: id.to_string(),
        }
    }

    /// Only `Conflict` may be retried by the caller; everything else is final for that call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Conflict { .. })
    }

    /// True when an `InvalidState` was raised because the order already sits
    /// in the status the event would have produced.
    pub fn is_already_in_target_state(&self) -> bool {
        match self {
            OrderError::InvalidState { status, event, .. } => *status == event.target(),
            _ => false,
        }
    }
}

impl From<TransactionError<OrderError>> for OrderError {
    fn from(value: TransactionError<OrderError>) -> Self {
        match value {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => OrderError::Storage(e),
        }
    }
}
