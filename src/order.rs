//! Order records as persisted by the ledger
use crate::catalog::ServiceDetails;
use crate::error::OrderError;
use crate::types::TimeStamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix written into `note` when an admin rejects a delivery claim.
pub const REJECTION_NOTE_PREFIX: &str = "RED NEDENİ: ";

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    PendingApproval,
    #[n(2)]
    Completed,
    #[n(3)]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A frozen snapshot of the catalog line at order time
#[derive(minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[n(0)]
    pub service_id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub price: u64, // minor currency units
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub city: String,
}

impl OrderLine {
    pub fn snapshot(service_id: &str, details: &ServiceDetails, quantity: u32) -> Self {
        Self {
            service_id: service_id.to_string(),
            title: details.title.clone(),
            price: details.price,
            quantity,
            city: details.city.clone(),
        }
    }

    pub fn subtotal(&self) -> Result<u64, OrderError> {
        self.price
            .checked_mul(u64::from(self.quantity))
            .ok_or_else(|| {
                OrderError::ValidationError(format!(
                    "line total overflows for service {}",
                    self.service_id
                ))
            })
    }
}

/// Sums `price * quantity` over the lines; computed once when the order is created.
pub fn total_price(items: &[OrderLine]) -> Result<u64, OrderError> {
    items.iter().try_fold(0u64, |acc, line| {
        acc.checked_add(line.subtotal()?)
            .ok_or_else(|| OrderError::ValidationError("order total overflows".into()))
    })
}

#[derive(minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub items: Vec<OrderLine>,
    #[n(3)]
    pub total_price: u64,
    #[n(4)]
    pub address: String,
    #[n(5)]
    pub note: Option<String>,
    #[n(6)]
    pub status: OrderStatus,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
    #[n(8)]
    pub submitted_at: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub rejection_reason: Option<String>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reference JSON document shape.
    pub fn to_json(&self) -> Result<String, OrderError> {
        serde_json::to_string(self).map_err(|e| OrderError::Codec(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, OrderError> {
        serde_json::from_str(json).map_err(|e| OrderError::Codec(e.to_string()))
    }
}
