//! Checkout inputs: the cart snapshot and the buyer's delivery details
use crate::error::OrderError;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub service_id: String,
    pub quantity: u32,
}

/// Immutable snapshot of the buyer's cart, handed to the engine by value.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lines exactly as given; duplicates are kept.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// Adds a line, folding it into an existing line for the same service.
    /// A fold that would overflow is kept as its own line for `demand` to refuse.
    pub fn add(mut self, service_id: &str, quantity: u32) -> Self {
        let merged = self
            .lines
            .iter_mut()
            .find(|line| line.service_id == service_id)
            .and_then(|line| {
                let total = line.quantity.checked_add(quantity)?;
                line.quantity = total;
                Some(())
            });
        if merged.is_none() {
            self.lines.push(CartLine {
                service_id: service_id.to_string(),
                quantity,
            });
        }
        self
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::ValidationError("cart is empty".into()));
        }
        for line in &self.lines {
            if line.service_id.trim().is_empty() {
                return Err(OrderError::ValidationError("cart line has no service".into()));
            }
            if line.quantity == 0 {
                return Err(OrderError::ValidationError(format!(
                    "quantity for service {} must be at least 1",
                    line.service_id
                )));
            }
        }
        Ok(())
    }

    /// Total requested units per service, in the order each service first
    /// appears in the cart, so duplicate lines are checked against stock together.
    pub fn demand(&self) -> Result<Vec<(&str, u32)>, OrderError> {
        let mut demand: Vec<(&str, u32)> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let service_id = line.service_id.as_str();
            match demand.iter_mut().find(|(seen, _)| *seen == service_id) {
                Some((_, total)) => {
                    *total = total.checked_add(line.quantity).ok_or_else(|| {
                        OrderError::ValidationError(format!(
                            "requested quantity for service {service_id} overflows"
                        ))
                    })?;
                }
                None => demand.push((service_id, line.quantity)),
            }
        }
        Ok(demand)
    }
}

// Contact and payout details captured at checkout. Carried on the order as
// the `address` text; nothing here moves money.
#[derive(Debug, Clone, Default)]
pub struct DeliveryInfo {
    phone: Option<String>,
    iban: Option<String>,
    account_holder: Option<String>,
}

impl DeliveryInfo {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.trim().to_string());
        self
    }
    pub fn set_iban(mut self, iban: &str) -> Self {
        self.iban = Some(iban.trim().to_string());
        self
    }
    pub fn set_account_holder(mut self, holder: &str) -> Self {
        self.account_holder = Some(holder.trim().to_string());
        self
    }

    // Checks fields and renders the address text stored on the order
    pub fn validate_and_finalise(&self) -> Result<String, OrderError> {
        let phone = match self.phone.as_deref() {
            Some(phone) if phone.chars().count() >= 10 => phone,
            _ => return Err(OrderError::ValidationError("a valid phone number is required".into())),
        };
        let iban = match self.iban.as_deref() {
            Some(iban) if iban.starts_with("TR") && iban.chars().count() >= 15 => iban,
            _ => return Err(OrderError::ValidationError("a valid TR IBAN is required".into())),
        };
        let holder = match self.account_holder.as_deref() {
            Some(holder) if !holder.is_empty() => holder,
            _ => return Err(OrderError::ValidationError("account holder is required".into())),
        };

        Ok(format!("Tel: {phone}\nIBAN: {iban}\nSahibi: {holder}"))
    }
}
