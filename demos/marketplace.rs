//! Walks one order through the whole workflow against a throwaway database.
//!
//! Run with `RUST_LOG=service_orders=debug` to see every transaction.

use service_orders::{
    OrderService,
    cart::{Cart, DeliveryInfo},
    catalog::{CatalogReader, ServiceDetails},
    config::EngineConfig,
    telemetry,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let service = OrderService::open(&EngineConfig::temporary())?;

    let details = ServiceDetails::new()
        .set_title("Boya Badana")
        .set_category("Tadilat")
        .set_city("İstanbul")
        .set_price(100);
    let painting = service.catalog().add_service(details, 3)?;

    let delivery = DeliveryInfo::new()
        .set_phone("5551234567")
        .set_iban("TR330006100519786457841326")
        .set_account_holder("Deniz Aydın");

    let cart = Cart::new().add(&painting.id, 2);
    let order = service.create_order("user_demo", cart, delivery, None)?;
    info!(stock = service.catalog().get_service(&painting.id)?.stock, "after create");

    let order = service.submit_for_approval(&order.id, &order.id)?;
    let order = service.reject_order(&order.id, "incomplete")?;
    info!(note = ?order.note, "after reject");

    let order = service.cancel_order(&order.id)?;
    info!(stock = service.catalog().get_service(&painting.id)?.stock, "after cancel");

    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}
