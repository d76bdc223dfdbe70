//! Order and stock transaction engine for a service marketplace.
//!
//! Buyers place orders against catalog services; stock is reserved in the
//! same transaction that records the order and handed back if the order is
//! cancelled. Orders then move through a buyer/admin approval workflow.

pub mod approval;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod order;
pub mod service;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use error::OrderError;
pub use service::OrderService;
