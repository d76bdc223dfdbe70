//! Property-based tests for stock accounting
//!
//! Random interleavings of order creation, cancellation and completion are
//! applied to a small catalog. After every step the stock on hand plus the
//! units held by live (non-cancelled) orders must equal the opening stock,
//! and a failed create must not leave anything behind.

use proptest::prelude::*;
use service_orders::{
    OrderError, OrderService,
    cart::{Cart, DeliveryInfo},
    catalog::{CatalogReader, ServiceDetails},
    config::EngineConfig,
    order::OrderStatus,
};

#[derive(Debug, Clone)]
enum Step {
    Create { a: u32, b: u32 },
    Cancel(usize),
    Complete(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0u32..=3, 0u32..=3).prop_map(|(a, b)| Step::Create { a, b }),
        2 => any::<prop::sample::Index>().prop_map(|i| Step::Cancel(i.index(usize::MAX))),
        1 => any::<prop::sample::Index>().prop_map(|i| Step::Complete(i.index(usize::MAX))),
    ]
}

fn delivery() -> DeliveryInfo {
    DeliveryInfo::new()
        .set_phone("5551234567")
        .set_iban("TR330006100519786457841326")
        .set_account_holder("Ali Veli")
}

fn held_units(service: &OrderService, service_id: &str) -> u32 {
    service
        .ledger()
        .orders()
        .unwrap()
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .flat_map(|o| o.items.iter())
        .filter(|l| l.service_id == service_id)
        .map(|l| l.quantity)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_stock_is_conserved(
        opening in (1u32..=6, 1u32..=6),
        steps in prop::collection::vec(step_strategy(), 1..20),
    ) {
        let service = OrderService::open(&EngineConfig::temporary()).unwrap();
        let catalog = service.catalog();
        let details_a = ServiceDetails::new().set_title("A").set_city("Bursa").set_price(100);
        let details_b = ServiceDetails::new().set_title("B").set_city("Bursa").set_price(40);
        let svc_a = catalog.add_service(details_a, opening.0).unwrap().id;
        let svc_b = catalog.add_service(details_b, opening.1).unwrap().id;
        let mut order_ids: Vec<String> = Vec::new();

        for step in steps {
            match step {
                Step::Create { a, b } => {
                    let mut cart = Cart::new();
                    if a > 0 {
                        cart = cart.add(&svc_a, a);
                    }
                    if b > 0 {
                        cart = cart.add(&svc_b, b);
                    }
                    let orders_before = service.ledger().orders().unwrap().len();
                    let stock_before = (
                        catalog.get_service(&svc_a).unwrap().stock,
                        catalog.get_service(&svc_b).unwrap().stock,
                    );

                    match service.create_order("user_1", cart, delivery(), None) {
                        Ok(order) => {
                            let expected_total = u64::from(a) * 100 + u64::from(b) * 40;
                            prop_assert_eq!(order.total_price, expected_total);
                            order_ids.push(order.id);
                        }
                        Err(OrderError::InsufficientStock { .. }) => {
                            prop_assert!(a > stock_before.0 || b > stock_before.1);
                            let orders_after = service.ledger().orders().unwrap().len();
                            prop_assert_eq!(orders_after, orders_before);
                        }
                        Err(OrderError::ValidationError(_)) => prop_assert!(a == 0 && b == 0),
                        Err(other) => prop_assert!(false, "unexpected error: {}", other),
                    }
                }
                Step::Cancel(i) if !order_ids.is_empty() => {
                    let id = &order_ids[i % order_ids.len()];
                    let status = service.order(id).unwrap().status;
                    let result = service.cancel_order(id);
                    prop_assert_eq!(result.is_ok(), status == OrderStatus::Pending);
                }
                Step::Complete(i) if !order_ids.is_empty() => {
                    let id = &order_ids[i % order_ids.len()];
                    let status = service.order(id).unwrap().status;
                    let result = service.complete_order_direct(id);
                    if status.is_terminal() {
                        let is_already_processed =
                            matches!(result, Err(OrderError::AlreadyProcessed { .. }));
                        prop_assert!(is_already_processed);
                    } else {
                        prop_assert!(result.is_ok());
                    }
                }
                _ => {}
            }

            let stock_a = catalog.get_service(&svc_a).unwrap().stock;
            let stock_b = catalog.get_service(&svc_b).unwrap().stock;
            prop_assert_eq!(stock_a + held_units(&service, &svc_a), opening.0);
            prop_assert_eq!(stock_b + held_units(&service, &svc_b), opening.1);
        }
    }
}
