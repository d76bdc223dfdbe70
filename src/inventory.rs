//! Inventory store: one stock counter per service.
//!
//! Counters are `u32` values stored big-endian under the service id. Reads and
//! writes that must line up with an order write go through [`InventoryTx`],
//! which borrows the enclosing sled transaction. [`Inventory::increment_stock`]
//! is the standalone additive primitive and never loses a concurrent update.
use crate::error::OrderError;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{IVec, Tree};
use tracing::{debug, trace};

fn decode_stock(service_id: &str, bytes: &[u8]) -> Result<u32, OrderError> {
    let raw: [u8; 4] = bytes.try_into().map_err(|_| {
        OrderError::Codec(format!(
            "stock counter for {service_id} has {} bytes, expected 4",
            bytes.len()
        ))
    })?;
    Ok(u32::from_be_bytes(raw))
}

fn encode_stock(value: u32) -> IVec {
    IVec::from(&value.to_be_bytes()[..])
}

fn overflow(service_id: &str, delta: u32) -> OrderError {
    OrderError::ValidationError(format!(
        "adding {delta} to the stock of {service_id} overflows"
    ))
}

#[derive(Clone)]
pub struct Inventory {
    tree: Tree,
}

impl Inventory {
    pub fn new(tree: Tree) -> Self {
        Self { tree }
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Current stock, or `None` when the service has no counter.
    pub fn stock(&self, service_id: &str) -> Result<Option<u32>, OrderError> {
        match self.tree.get(service_id.as_bytes())? {
            Some(bytes) => decode_stock(service_id, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Atomically adds `delta` to an existing counter and returns the new value.
    pub fn increment_stock(&self, service_id: &str, delta: u32) -> Result<u32, OrderError> {
        let key = service_id.as_bytes();
        loop {
            let current = self
                .tree
                .get(key)?
                .ok_or_else(|| OrderError::service_not_found(service_id))?;
            let next = decode_stock(service_id, &current)?
                .checked_add(delta)
                .ok_or_else(|| overflow(service_id, delta))?;

            match self
                .tree
                .compare_and_swap(key, Some(&current), Some(encode_stock(next)))?
            {
                Ok(()) => {
                    debug!(service_id, delta, stock = next, "stock incremented");
                    return Ok(next);
                }
                Err(_) => trace!(service_id, "stock counter moved underneath us, retrying"),
            }
        }
    }
}

/// Inventory operations scoped to a running transaction.
pub struct InventoryTx<'a> {
    tree: &'a TransactionalTree,
}

impl<'a> InventoryTx<'a> {
    pub fn new(tree: &'a TransactionalTree) -> Self {
        Self { tree }
    }

    pub fn read_stock(
        &self,
        service_id: &str,
    ) -> ConflictableTransactionResult<Option<u32>, OrderError> {
        match self.tree.get(service_id.as_bytes())? {
            Some(bytes) => decode_stock(service_id, &bytes)
                .map(Some)
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    pub fn write_stock(
        &self,
        service_id: &str,
        value: u32,
    ) -> ConflictableTransactionResult<(), OrderError> {
        self.tree.insert(service_id.as_bytes(), encode_stock(value))?;
        Ok(())
    }

    /// Adds `delta` inside the transaction. Returns `None` when the service has
    /// no counter, leaving the tree untouched.
    pub fn increment_stock(
        &self,
        service_id: &str,
        delta: u32,
    ) -> ConflictableTransactionResult<Option<u32>, OrderError> {
        let Some(current) = self.read_stock(service_id)? else {
            return Ok(None);
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| ConflictableTransactionError::Abort(overflow(service_id, delta)))?;
        self.write_stock(service_id, next)?;
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Inventory {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Inventory::new(db.open_tree("inventory").unwrap())
    }

    fn seed(inventory: &Inventory, id: &str, stock: u32) {
        inventory.tree().insert(id, encode_stock(stock)).unwrap();
    }

    #[test]
    fn missing_counter_reads_as_none() {
        assert_eq!(inventory().stock("svc_missing").unwrap(), None);
    }

    #[test]
    fn standalone_increment_adds_delta() {
        let inventory = inventory();
        seed(&inventory, "svc_a", 3);

        assert_eq!(inventory.increment_stock("svc_a", 2).unwrap(), 5);
        assert_eq!(inventory.stock("svc_a").unwrap(), Some(5));
    }

    #[test]
    fn standalone_increment_of_missing_counter_is_not_found() {
        let result = inventory().increment_stock("svc_missing", 1);
        assert!(matches!(result, Err(OrderError::NotFound { .. })));
    }

    #[test]
    fn standalone_increment_refuses_overflow() {
        let inventory = inventory();
        seed(&inventory, "svc_a", u32::MAX);

        assert!(matches!(
            inventory.increment_stock("svc_a", 1),
            Err(OrderError::ValidationError(_))
        ));
        assert_eq!(inventory.stock("svc_a").unwrap(), Some(u32::MAX));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let inventory = inventory();
        seed(&inventory, "svc_a", 0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        inventory.increment_stock("svc_a", 1).unwrap();
                    }
                });
            }
        });

        assert_eq!(inventory.stock("svc_a").unwrap(), Some(400));
    }

    #[test]
    fn transactional_ops_see_their_own_writes() {
        let inventory = inventory();
        seed(&inventory, "svc_a", 4);

        let seen = inventory
            .tree()
            .transaction(|tree| -> ConflictableTransactionResult<_, OrderError> {
                let tx = InventoryTx::new(tree);
                tx.write_stock("svc_a", 1)?;
                let after_write = tx.read_stock("svc_a")?;
                let after_increment = tx.increment_stock("svc_a", 2)?;
                let missing = tx.increment_stock("svc_missing", 2)?;
                Ok((after_write, after_increment, missing))
            })
            .unwrap();

        assert_eq!(seen, (Some(1), Some(3), None));
        assert_eq!(inventory.stock("svc_a").unwrap(), Some(3));
        assert_eq!(inventory.stock("svc_missing").unwrap(), None);
    }

    #[test]
    fn aborted_transaction_leaves_counters_alone() {
        let inventory = inventory();
        seed(&inventory, "svc_a", 4);

        let result = inventory
            .tree()
            .transaction(|tree| -> ConflictableTransactionResult<(), OrderError> {
                InventoryTx::new(tree).write_stock("svc_a", 0)?;
                Err(ConflictableTransactionError::Abort(OrderError::ValidationError(
                    "rolled back".into(),
                )))
            });

        assert!(result.is_err());
        assert_eq!(inventory.stock("svc_a").unwrap(), Some(4));
    }
}
