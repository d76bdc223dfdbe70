//! Service catalog: descriptive records plus the stock joined from the inventory
use crate::error::OrderError;
use crate::inventory::{Inventory, InventoryTx};
use crate::utils::{self, SERVICE_HRP};
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};
use tracing::{debug, info};

// Everything about a service except its stock, which lives in the inventory tree
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetails {
    #[n(0)]
    pub title: String,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub category: String,
    #[n(3)]
    pub price: u64, // minor currency units
    #[n(4)]
    pub city: String,
    #[n(5)]
    pub owner_id: String,
    #[n(6)]
    pub image_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(flatten)]
    pub details: ServiceDetails,
    pub stock: u32,
}

impl ServiceDetails {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
    pub fn set_price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }
    pub fn set_city(mut self, city: &str) -> Self {
        self.city = city.to_string();
        self
    }
    pub fn set_owner(mut self, owner_id: &str) -> Self {
        self.owner_id = owner_id.to_string();
        self
    }
    pub fn set_image_url(mut self, url: &str) -> Self {
        self.image_url = url.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.title.trim().is_empty() {
            return Err(OrderError::ValidationError("service title is blank".into()));
        }
        if self.city.trim().is_empty() {
            return Err(OrderError::ValidationError("service city is blank".into()));
        }
        Ok(())
    }
}

/// Read side of the catalog that the order engine depends on.
pub trait CatalogReader {
    fn get_service(&self, id: &str) -> Result<Service, OrderError>;
    fn get_services(&self) -> Result<Vec<Service>, OrderError>;
}

/// Browse filter. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub category: Option<String>,
    pub text: Option<String>,
}

impl ServiceFilter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn matches(&self, service: &Service) -> bool {
        let category_match = match &self.category {
            Some(category) => service.details.category.to_lowercase() == category.to_lowercase(),
            None => true,
        };
        let text_match = match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let needle = text.to_lowercase();
                service.details.title.to_lowercase().contains(&needle)
                    || service.details.city.to_lowercase().contains(&needle)
            }
            _ => true,
        };
        category_match && text_match
    }
}

#[derive(Clone)]
pub struct Catalog {
    services: Tree,
    inventory: Inventory,
}

impl Catalog {
    pub fn new(services: Tree, inventory: Inventory) -> Self {
        Self { services, inventory }
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.services
    }

    /// Registers a service and its opening stock in one transaction.
    pub fn add_service(
        &self,
        details: ServiceDetails,
        initial_stock: u32,
    ) -> Result<Service, OrderError> {
        details.validate()?;
        let id = utils::new_id(SERVICE_HRP)?;
        let encoded = utils::to_cbor(&details)?;

        (&self.services, self.inventory.tree()).transaction(
            |(services, inventory)| -> ConflictableTransactionResult<(), OrderError> {
                services.insert(id.as_bytes(), encoded.clone())?;
                InventoryTx::new(inventory).write_stock(&id, initial_stock)?;
                Ok(())
            },
        )?;

        info!(service_id = %id, stock = initial_stock, "service added to catalog");
        Ok(Service {
            id,
            details,
            stock: initial_stock,
        })
    }

    /// Replaces the descriptive fields and price. Stock is left alone.
    pub fn update_service(&self, id: &str, details: ServiceDetails) -> Result<Service, OrderError> {
        details.validate()?;
        let encoded = utils::to_cbor(&details)?;

        self.services.transaction(|services| -> ConflictableTransactionResult<(), OrderError> {
            if services.get(id.as_bytes())?.is_none() {
                return Err(ConflictableTransactionError::Abort(OrderError::service_not_found(id)));
            }
            services.insert(id.as_bytes(), encoded.clone())?;
            Ok(())
        })?;

        debug!(service_id = %id, "service details updated");
        self.get_service(id)
    }

    pub fn delete_service(&self, id: &str) -> Result<(), OrderError> {
        (&self.services, self.inventory.tree()).transaction(
            |(services, inventory)| -> ConflictableTransactionResult<(), OrderError> {
                if services.remove(id.as_bytes())?.is_none() {
                    return Err(ConflictableTransactionError::Abort(
                        OrderError::service_not_found(id),
                    ));
                }
                inventory.remove(id.as_bytes())?;
                Ok(())
            },
        )?;

        info!(service_id = %id, "service removed from catalog");
        Ok(())
    }

    pub fn search(&self, filter: &ServiceFilter) -> Result<Vec<Service>, OrderError> {
        let mut found: Vec<Service> = self
            .get_services()?
            .into_iter()
            .filter(|service| filter.matches(service))
            .collect();
        found.sort_by(|a, b| a.details.title.cmp(&b.details.title));
        Ok(found)
    }
}

impl CatalogReader for Catalog {
    fn get_service(&self, id: &str) -> Result<Service, OrderError> {
        let bytes = self
            .services
            .get(id.as_bytes())?
            .ok_or_else(|| OrderError::service_not_found(id))?;
        let details: ServiceDetails = utils::from_cbor(&bytes)?;
        let stock = self.inventory.stock(id)?.unwrap_or(0);

        Ok(Service {
            id: id.to_string(),
            details,
            stock,
        })
    }

    fn get_services(&self) -> Result<Vec<Service>, OrderError> {
        let mut services = Vec::new();
        for entry in self.services.iter() {
            let (key, bytes) = entry?;
            let id = String::from_utf8_lossy(&key).into_owned();
            let details: ServiceDetails = utils::from_cbor(&bytes)?;
            let stock = self.inventory.stock(&id)?.unwrap_or(0);
            services.push(Service { id, details, stock });
        }
        Ok(services)
    }
}

/// Reads a service's details inside an engine transaction.
pub(crate) fn read_details(
    services: &TransactionalTree,
    id: &str,
) -> ConflictableTransactionResult<Option<ServiceDetails>, OrderError> {
    match services.get(id.as_bytes())? {
        Some(bytes) => utils::from_cbor(&bytes)
            .map(Some)
            .map_err(ConflictableTransactionError::Abort),
        None => Ok(None),
    }
}
