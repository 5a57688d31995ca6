//! Turning a customer's cart into a `PlaceOrder` command.
//!
//! Checks run in the order a customer would want to hear about them: the
//! store must be open, the cart must hold something for it, then every line
//! must be orderable. Pricing uses the product's current price, which the
//! order then freezes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_auth::{Actor, Role};
use courier_core::{DomainError, DomainResult, Money, OrderId, ProductId, StoreId};
use courier_pricing::DeliveryFeeEngine;
use courier_stores::{Store, StoreAvailabilityEvaluator};

use crate::order::{OrderLine, PlaceOrder};

/// Catalog row as read at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub price: Money,
    pub is_available: bool,
    /// `None` means stock is not tracked for this product.
    pub stock_quantity: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct PlacementRequest<'a> {
    pub actor: &'a Actor,
    pub store: &'a Store,
    /// The customer's cart lines for `store`.
    pub cart: &'a [CartLine],
    /// Current catalog rows for the products in `cart`.
    pub products: &'a [CatalogProduct],
    pub delivery_address: &'a str,
    pub special_notes: Option<&'a str>,
    pub now: DateTime<Utc>,
}

pub fn plan_placement(
    request: PlacementRequest<'_>,
    availability: &StoreAvailabilityEvaluator,
    fees: &DeliveryFeeEngine,
) -> DomainResult<PlaceOrder> {
    if !request.actor.has_role(Role::Customer) {
        return Err(DomainError::Unauthorized);
    }
    if request.delivery_address.trim().is_empty() {
        return Err(DomainError::validation("delivery_address is required"));
    }

    let decision = availability.evaluate(request.store, request.now);
    if !decision.accepting_orders {
        return Err(DomainError::validation(format!(
            "store '{}' is not accepting orders right now",
            request.store.name
        )));
    }

    if request.cart.is_empty() {
        return Err(DomainError::validation(
            "the cart has no items from this store",
        ));
    }

    let catalog: HashMap<ProductId, &CatalogProduct> =
        request.products.iter().map(|p| (p.id, p)).collect();

    let mut lines = Vec::with_capacity(request.cart.len());
    for item in request.cart {
        let product = catalog
            .get(&item.product_id)
            .filter(|p| p.store_id == request.store.id)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "product {} is not sold by this store",
                    item.product_id
                ))
            })?;
        if !product.is_available {
            return Err(DomainError::validation(format!(
                "product '{}' is no longer available",
                product.name
            )));
        }
        if let Some(stock) = product.stock_quantity {
            if item.quantity > stock {
                return Err(DomainError::validation(format!(
                    "only {stock} of '{}' left in stock, {} requested",
                    product.name, item.quantity
                )));
            }
        }
        lines.push(OrderLine::new(
            product.id,
            product.name.clone(),
            item.quantity,
            product.price,
        )?);
    }

    let items_subtotal = Money::sum(lines.iter().map(|l| l.line_subtotal))?;
    let delivery_fee = fees.fee_for(items_subtotal)?;

    Ok(PlaceOrder {
        order_id: OrderId::new(),
        customer_id: request.actor.user_id,
        store_id: request.store.id,
        lines,
        delivery_fee,
        delivery_address: request.delivery_address.to_string(),
        special_notes: request.special_notes.map(str::to_string),
        occurred_at: request.now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use courier_core::{Aggregate, UserId};
    use courier_pricing::PlatformDeliveryConfig;
    use courier_stores::AdminOverride;

    use crate::order::{Order, OrderCommand};

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 10, 0, 0).unwrap()
    }

    fn test_store() -> Store {
        let mut store = Store::new(StoreId::new(), UserId::new(), "Green Grocer");
        store.is_active = true;
        store.default_opening_time = NaiveTime::from_hms_opt(8, 0, 0);
        store.default_closing_time = NaiveTime::from_hms_opt(20, 0, 0);
        store
    }

    fn test_product(store: &Store, price_major: i64, stock: Option<u32>) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(),
            store_id: store.id,
            name: "Olive oil".into(),
            price: Money::from_major(price_major),
            is_available: true,
            stock_quantity: stock,
        }
    }

    fn threshold_fees() -> DeliveryFeeEngine {
        DeliveryFeeEngine::new(Some(&PlatformDeliveryConfig::fixed_threshold(
            Money::from_major(3000),
            Money::from_major(50000),
        )))
        .unwrap()
    }

    fn request<'a>(
        actor: &'a Actor,
        store: &'a Store,
        cart: &'a [CartLine],
        products: &'a [CatalogProduct],
    ) -> PlacementRequest<'a> {
        PlacementRequest {
            actor,
            store,
            cart,
            products,
            delivery_address: "4 Mill Lane",
            special_notes: Some("ring twice"),
            now: test_now(),
        }
    }

    #[test]
    fn prices_lines_and_adds_the_fee() {
        let store = test_store();
        let customer = Actor::unscoped(UserId::new(), Role::Customer);
        let a = test_product(&store, 5000, Some(10));
        let b = test_product(&store, 2500, None);
        let cart = [
            CartLine { product_id: a.id, quantity: 3 },
            CartLine { product_id: b.id, quantity: 2 },
        ];
        let products = [a, b];

        let cmd = plan_placement(
            request(&customer, &store, &cart, &products),
            &StoreAvailabilityEvaluator::utc(),
            &threshold_fees(),
        )
        .unwrap();
        assert_eq!(cmd.delivery_fee, Money::from_major(3000));

        let mut order = Order::empty(cmd.order_id);
        order.execute(&OrderCommand::Place(cmd)).unwrap();
        assert_eq!(order.header().items_subtotal, Money::from_major(20000));
        assert_eq!(order.grand_total(), Money::from_major(23000));
    }

    #[test]
    fn closed_store_refuses_orders() {
        let mut store = test_store();
        store.admin_forced_status = AdminOverride::ForceClosed;
        let customer = Actor::unscoped(UserId::new(), Role::Customer);
        let p = test_product(&store, 10, None);
        let cart = [CartLine { product_id: p.id, quantity: 1 }];
        let products = [p];

        match plan_placement(
            request(&customer, &store, &cart, &products),
            &StoreAvailabilityEvaluator::utc(),
            &threshold_fees(),
        ) {
            Err(DomainError::Validation(msg)) if msg.contains("not accepting") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn over_stock_request_is_rejected() {
        let store = test_store();
        let customer = Actor::unscoped(UserId::new(), Role::Customer);
        let p = test_product(&store, 10, Some(2));
        let cart = [CartLine { product_id: p.id, quantity: 3 }];
        let products = [p];

        match plan_placement(
            request(&customer, &store, &cart, &products),
            &StoreAvailabilityEvaluator::utc(),
            &threshold_fees(),
        ) {
            Err(DomainError::Validation(msg)) if msg.contains("left in stock") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unavailable_or_foreign_products_are_rejected() {
        let store = test_store();
        let other_store = test_store();
        let customer = Actor::unscoped(UserId::new(), Role::Customer);
        let mut hidden = test_product(&store, 10, None);
        hidden.is_available = false;
        let foreign = test_product(&other_store, 10, None);

        for product in [hidden, foreign] {
            let cart = [CartLine { product_id: product.id, quantity: 1 }];
            let products = [product];
            assert!(matches!(
                plan_placement(
                    request(&customer, &store, &cart, &products),
                    &StoreAvailabilityEvaluator::utc(),
                    &threshold_fees(),
                ),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn empty_cart_and_wrong_role() {
        let store = test_store();
        let customer = Actor::unscoped(UserId::new(), Role::Customer);
        assert!(matches!(
            plan_placement(
                request(&customer, &store, &[], &[]),
                &StoreAvailabilityEvaluator::utc(),
                &threshold_fees(),
            ),
            Err(DomainError::Validation(_))
        ));

        let worker = Actor::unscoped(UserId::new(), Role::DeliveryWorker);
        assert_eq!(
            plan_placement(
                request(&worker, &store, &[], &[]),
                &StoreAvailabilityEvaluator::utc(),
                &threshold_fees(),
            )
            .unwrap_err(),
            DomainError::Unauthorized
        );
    }
}
