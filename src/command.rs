use crate::cart::{Cart, DeliveryInfo};

/// Everything a presentation layer can ask the order engine to do.
#[derive(Debug, Clone)]
pub enum Command {
    CreateOrder {
        buyer_id: String,
        cart: Cart,
        delivery: DeliveryInfo,
        note: Option<String>,
    },
    CancelOrder {
        order_id: String,
    },
    SubmitForApproval {
        order_id: String,
        proof_token: String,
    },
    ApproveOrder {
        order_id: String,
    },
    RejectOrder {
        order_id: String,
        reason: String,
    },
    CompleteOrderDirect {
        code: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateOrder { .. } => "create_order",
            Command::CancelOrder { .. } => "cancel_order",
            Command::SubmitForApproval { .. } => "submit_for_approval",
            Command::ApproveOrder { .. } => "approve_order",
            Command::RejectOrder { .. } => "reject_order",
            Command::CompleteOrderDirect { .. } => "complete_order_direct",
        }
    }
}
