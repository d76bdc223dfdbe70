//! Order ledger: orders keyed by id, CBOR encoded
use crate::error::OrderError;
use crate::order::{Order, OrderStatus};
use crate::utils;
use sled::Tree;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};

#[derive(Clone)]
pub struct Ledger {
    orders: Tree,
}

impl Ledger {
    pub fn new(orders: Tree) -> Self {
        Self { orders }
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.orders
    }

    pub fn get(&self, order_id: &str) -> Result<Order, OrderError> {
        let bytes = self
            .orders
            .get(order_id.as_bytes())?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        utils::from_cbor(&bytes)
    }

    /// All orders, newest first.
    pub fn orders(&self) -> Result<Vec<Order>, OrderError> {
        self.collect(|_| true)
    }

    pub fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        self.collect(|order| order.user_id == user_id)
    }

    pub fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderError> {
        self.collect(|order| order.status == status)
    }

    fn collect(&self, keep: impl Fn(&Order) -> bool) -> Result<Vec<Order>, OrderError> {
        let mut orders = Vec::new();
        for entry in self.orders.iter() {
            let (_, bytes) = entry?;
            let order: Order = utils::from_cbor(&bytes)?;
            if keep(&order) {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

/// Ledger reads and writes scoped to a running transaction.
pub struct LedgerTx<'a> {
    tree: &'a TransactionalTree,
}

impl<'a> LedgerTx<'a> {
    pub fn new(tree: &'a TransactionalTree) -> Self {
        Self { tree }
    }

    /// Loads an order, aborting with `NotFound` if it does not exist.
    pub fn load(&self, order_id: &str) -> ConflictableTransactionResult<Order, OrderError> {
        let bytes = self.tree.get(order_id.as_bytes())?.ok_or_else(|| {
            ConflictableTransactionError::Abort(OrderError::order_not_found(order_id))
        })?;
        utils::from_cbor(&bytes).map_err(ConflictableTransactionError::Abort)
    }

    pub fn store(&self, order: &Order) -> ConflictableTransactionResult<(), OrderError> {
        let encoded = utils::to_cbor(order).map_err(ConflictableTransactionError::Abort)?;
        self.tree.insert(order.id.as_bytes(), encoded)?;
        Ok(())
    }
}
