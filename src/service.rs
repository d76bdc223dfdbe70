//! Order transaction engine.
//!
//! Every operation here is one sled transaction: the order record and any
//! stock counters it touches commit together or not at all. sled re-runs a
//! transaction closure on conflict with fresh reads, so a retried
//! `create_order` re-validates stock from scratch.
use crate::approval::{self, OrderEvent};
use crate::cart::{Cart, DeliveryInfo};
use crate::catalog::{self, Catalog};
use crate::command::Command;
use crate::config::EngineConfig;
use crate::error::OrderError;
use crate::inventory::{Inventory, InventoryTx};
use crate::ledger::{Ledger, LedgerTx};
use crate::order::{self, Order, OrderLine, OrderStatus};
use crate::types::{MonotonicClock, TimeStamp};
use crate::utils::{self, ORDER_HRP};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError::Abort, ConflictableTransactionResult};
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SERVICES_TREE: &str = "services";
const INVENTORY_TREE: &str = "inventory";
const ORDERS_TREE: &str = "orders";

type TxResult<T> = ConflictableTransactionResult<T, OrderError>;

pub struct OrderService {
    instance: Arc<sled::Db>,
    catalog: Catalog,
    inventory: Inventory,
    ledger: Ledger,
    clock: MonotonicClock,
    max_attempts: u32,
}

impl OrderService {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, OrderError> {
        Self::with_config(instance, &EngineConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: &EngineConfig) -> Result<Self, OrderError> {
        config.validate()?;
        let inventory = Inventory::new(instance.open_tree(INVENTORY_TREE)?);
        let catalog = Catalog::new(instance.open_tree(SERVICES_TREE)?, inventory.clone());
        let ledger = Ledger::new(instance.open_tree(ORDERS_TREE)?);

        Ok(Self {
            instance,
            catalog,
            inventory,
            ledger,
            clock: MonotonicClock::new(),
            max_attempts: config.max_transaction_attempts,
        })
    }

    /// Opens the database described by `config` and wires the engine onto it.
    pub fn open(config: &EngineConfig) -> Result<Self, OrderError> {
        let db = config.open_db()?;
        info!(
            temporary = config.temporary,
            path = %config.db_path.display(),
            "order store opened"
        );
        Self::with_config(Arc::new(db), config)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn flush(&self) -> Result<(), OrderError> {
        self.instance.flush()?;
        Ok(())
    }

    // Counts closure runs; sled only re-runs a transaction after a conflict.
    fn begin_attempt(
        &self,
        operation: &'static str,
        attempts: &Cell<u32>,
    ) -> TxResult<()> {
        let attempt = attempts.get() + 1;
        attempts.set(attempt);
        if attempt > self.max_attempts {
            warn!(
                operation,
                attempts = self.max_attempts,
                "transaction kept conflicting, giving up"
            );
            return Err(Abort(OrderError::Conflict {
                operation,
                attempts: self.max_attempts,
            }));
        }
        if attempt > 1 {
            debug!(operation, attempt, "re-running transaction after conflict");
        }
        Ok(())
    }

    /// Places an order for `cart`, reserving stock for every line.
    #[instrument(skip(self, cart, delivery, note))]
    pub fn create_order(
        &self,
        buyer_id: &str,
        cart: Cart,
        delivery: DeliveryInfo,
        note: Option<String>,
    ) -> Result<Order, OrderError> {
        self.place_order(&Cell::new(0), buyer_id, cart, delivery, note)
    }

    // `attempts` counts transaction runs across sled's conflict retries.
    fn place_order(
        &self,
        attempts: &Cell<u32>,
        buyer_id: &str,
        cart: Cart,
        delivery: DeliveryInfo,
        note: Option<String>,
    ) -> Result<Order, OrderError> {
        if buyer_id.trim().is_empty() {
            return Err(OrderError::ValidationError("buyer id is blank".into()));
        }
        cart.validate()?;
        let demand = cart.demand()?;
        let address = delivery.validate_and_finalise()?;
        let note = note.filter(|note| !note.trim().is_empty());
        let order_id = utils::new_id(ORDER_HRP)?;

        let trees = (self.catalog.tree(), self.inventory.tree(), self.ledger.tree());
        let order = trees
            .transaction(|(services, inventory, orders)| -> TxResult<Order> {
                self.begin_attempt("create_order", attempts)?;
                let inventory = InventoryTx::new(inventory);

                let mut items = Vec::with_capacity(cart.lines().len());
                for line in cart.lines() {
                    let details = catalog::read_details(services, &line.service_id)?
                        .ok_or_else(|| Abort(OrderError::service_not_found(&line.service_id)))?;
                    items.push(OrderLine::snapshot(&line.service_id, &details, line.quantity));
                }

                let mut remaining = Vec::with_capacity(demand.len());
                // cart order, so the first short line the buyer sees is the one reported
                for &(service_id, requested) in &demand {
                    let available = inventory
                        .read_stock(service_id)?
                        .ok_or_else(|| Abort(OrderError::service_not_found(service_id)))?;
                    if requested > available {
                        return Err(Abort(OrderError::InsufficientStock {
                            service_id: service_id.to_string(),
                            requested,
                            available,
                        }));
                    }
                    remaining.push((service_id, available - requested));
                }

                let total_price = order::total_price(&items).map_err(Abort)?;
                let order = Order {
                    id: order_id.clone(),
                    user_id: buyer_id.to_string(),
                    items,
                    total_price,
                    address: address.clone(),
                    note: note.clone(),
                    status: OrderStatus::Pending,
                    created_at: self.clock.now(),
                    submitted_at: None,
                    rejection_reason: None,
                };

                LedgerTx::new(orders).store(&order)?;
                for (service_id, stock) in &remaining {
                    inventory.write_stock(service_id, *stock)?;
                }
                Ok(order)
            })
            .map_err(OrderError::from)
            .inspect_err(|e| warn!(error = %e, "order not created"))?;

        info!(order_id = %order.id, total_price = order.total_price, "order created");
        Ok(order)
    }

    /// Cancels a pending order and puts its stock back.
    #[instrument(skip(self))]
    pub fn cancel_order(&self, order_id: &str) -> Result<Order, OrderError> {
        let attempts = Cell::new(0);

        let order = (self.ledger.tree(), self.inventory.tree())
            .transaction(|(orders, inventory)| -> TxResult<Order> {
                self.begin_attempt("cancel_order", &attempts)?;
                let ledger = LedgerTx::new(orders);
                let inventory = InventoryTx::new(inventory);

                let mut order = ledger.load(order_id)?;
                order.status = approval::advance(&order, OrderEvent::Cancel).map_err(Abort)?;

                for line in &order.items {
                    if line.service_id.trim().is_empty() {
                        warn!(order_id, "order line without service, nothing to restore");
                        continue;
                    }
                    if inventory.increment_stock(&line.service_id, line.quantity)?.is_none() {
                        warn!(
                            order_id,
                            service_id = %line.service_id,
                            quantity = line.quantity,
                            "service no longer exists, stock not restored"
                        );
                    }
                }

                ledger.store(&order)?;
                Ok(order)
            })
            .map_err(OrderError::from)
            .inspect_err(|e| warn!(error = %e, "order not cancelled"))?;

        info!(order_id, lines = order.items.len(), "order cancelled, stock restored");
        Ok(order)
    }

    // Loads, mutates and stores one order inside a transaction on the ledger.
    fn update_order<F>(
        &self,
        operation: &'static str,
        order_id: &str,
        apply: F,
    ) -> Result<Order, OrderError>
    where
        F: Fn(&mut Order) -> Result<(), OrderError>,
    {
        let attempts = Cell::new(0);

        self.ledger
            .tree()
            .transaction(|orders| -> TxResult<Order> {
                self.begin_attempt(operation, &attempts)?;
                let ledger = LedgerTx::new(orders);

                let mut order = ledger.load(order_id)?;
                apply(&mut order).map_err(Abort)?;
                ledger.store(&order)?;
                Ok(order)
            })
            .map_err(OrderError::from)
            .inspect_err(|e| warn!(operation, order_id, error = %e, "order left unchanged"))
    }

    /// Buyer asserts delivery by presenting the order's id as proof.
    #[instrument(skip(self))]
    pub fn submit_for_approval(
        &self,
        order_id: &str,
        proof_token: &str,
    ) -> Result<Order, OrderError> {
        let order = self.update_order("submit_for_approval", order_id, |order| {
            let next = approval::advance(order, OrderEvent::SubmitProof)?;
            approval::verify_proof(order, proof_token)?;
            order.status = next;
            order.submitted_at = Some(TimeStamp::new());
            Ok(())
        })?;

        info!(order_id, "order submitted for approval");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub fn approve_order(&self, order_id: &str) -> Result<Order, OrderError> {
        let order = self.update_order("approve_order", order_id, |order| {
            order.status = approval::advance(order, OrderEvent::Approve)?;
            Ok(())
        })?;

        info!(order_id, "order approved");
        Ok(order)
    }

    /// Sends a delivery claim back to the buyer with a reason.
    #[instrument(skip(self))]
    pub fn reject_order(&self, order_id: &str, reason: &str) -> Result<Order, OrderError> {
        let reason = approval::rejection_reason(reason)?;

        let order = self.update_order("reject_order", order_id, |order| {
            order.status = approval::advance(order, OrderEvent::Reject)?;
            order.note = Some(approval::rejection_note(&reason));
            order.rejection_reason = Some(reason.clone());
            Ok(())
        })?;

        info!(order_id, reason = %reason, "order rejected, back to pending");
        Ok(order)
    }

    /// Administrative fast path, e.g. a scanned redemption code. The code is the order id.
    #[instrument(skip(self))]
    pub fn complete_order_direct(&self, code: &str) -> Result<Order, OrderError> {
        let order_id = code.trim();
        if order_id.is_empty() {
            return Err(OrderError::ValidationError("completion code is blank".into()));
        }

        let order = self.update_order("complete_order_direct", order_id, |order| {
            order.status = approval::advance(order, OrderEvent::CompleteDirect)?;
            Ok(())
        })?;

        info!(order_id, "order completed directly");
        Ok(order)
    }

    pub fn execute(&self, command: Command) -> Result<Order, OrderError> {
        debug!(command = command.name(), "dispatching command");
        match command {
            Command::CreateOrder {
                buyer_id,
                cart,
                delivery,
                note,
            } => self.create_order(&buyer_id, cart, delivery, note),
            Command::CancelOrder { order_id } => self.cancel_order(&order_id),
            Command::SubmitForApproval {
                order_id,
                proof_token,
            } => self.submit_for_approval(&order_id, &proof_token),
            Command::ApproveOrder { order_id } => self.approve_order(&order_id),
            Command::RejectOrder { order_id, reason } => self.reject_order(&order_id, &reason),
            Command::CompleteOrderDirect { code } => self.complete_order_direct(&code),
        }
    }

    pub fn order(&self, order_id: &str) -> Result<Order, OrderError> {
        self.ledger.get(order_id)
    }

    pub fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        self.ledger.orders_for_user(user_id)
    }

    /// Orders waiting on an admin decision, newest first.
    pub fn approval_queue(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self
            .ledger
            .orders()?
            .into_iter()
            .filter(approval::requires_approval)
            .collect())
    }
}
