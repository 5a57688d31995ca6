//! Service-level tests against the in-memory repository.
//!
//! Covers the full order lifecycle, stock bookkeeping, commission reports,
//! lock timeouts and push failures.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as Minutes, TimeZone, Utc};

use courier_auth::{Actor, Role, StoreScope};
use courier_commission::ReportPeriod;
use courier_core::{DomainError, Money, ProductId, Rate, StoreId, UserId};
use courier_orders::{CatalogProduct, OrderStatus};
use courier_pricing::PlatformDeliveryConfig;
use courier_stores::{AdminOverride, Store, StoreAvailabilityEvaluator};

use crate::error::{ServiceError, StoreError};
use crate::notify::{InMemoryNotifier, NotificationDispatcher};
use crate::repository::{InMemoryMarketRepository, MarketRepository};
use crate::services::{CommissionService, InboxService, NewOrder, OrderQuery, OrderWorkflow};

struct World {
    repo: Arc<InMemoryMarketRepository>,
    notifier: Arc<InMemoryNotifier>,
    orders: OrderWorkflow,
    commission: CommissionService,
    inbox: InboxService,
    customer: Actor,
    owner: Actor,
    worker: Actor,
    admin: Actor,
    store_id: StoreId,
    product_id: ProductId,
}

fn test_t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 10, 9, 0, 0).unwrap()
}

async fn test_world(lock_timeout: Duration) -> World {
    let repo = Arc::new(InMemoryMarketRepository::new(lock_timeout));
    let notifier = Arc::new(InMemoryNotifier::new());

    let customer = UserId::new();
    let owner = UserId::new();
    let worker = UserId::new();
    let admin = UserId::new();
    repo.seed_user(customer, Role::Customer, "Dana Customer").await;
    repo.seed_user(owner, Role::StoreOwner, "Sam Owner").await;
    repo.seed_user(worker, Role::DeliveryWorker, "Lee Rider").await;
    repo.seed_user(admin, Role::Admin, "Ops Admin").await;

    let mut store = Store::new(StoreId::new(), owner, "Corner Bakery");
    store.is_active = true;
    store.admin_forced_status = AdminOverride::ForceOpen;
    store.commission_rate = Some(Rate::from_ten_thousandths(1_000).unwrap());
    let store_id = store.id;
    repo.seed_store(store).await;

    let product = CatalogProduct {
        id: ProductId::new(),
        store_id,
        name: "Celebration cake".to_string(),
        price: Money::from_major(10_000),
        is_available: true,
        stock_quantity: Some(5),
    };
    let product_id = product.id;
    repo.seed_product(product).await;
    repo.seed_cart_item(customer, product_id, 2).await;
    repo.seed_delivery_config(PlatformDeliveryConfig::fixed_threshold(
        Money::from_major(3_000),
        Money::from_major(50_000),
    ))
    .await;

    let shared: Arc<dyn MarketRepository> = repo.clone();
    let dispatcher = NotificationDispatcher::new(notifier.clone());
    World {
        orders: OrderWorkflow::new(shared.clone(), dispatcher, StoreAvailabilityEvaluator::utc()),
        commission: CommissionService::new(shared.clone()),
        inbox: InboxService::new(shared),
        repo,
        notifier,
        customer: Actor::unscoped(customer, Role::Customer),
        owner: Actor::new(owner, Role::StoreOwner, StoreScope::Stores(BTreeSet::from([store_id]))),
        worker: Actor::unscoped(worker, Role::DeliveryWorker),
        admin: Actor::admin(admin),
        store_id,
        product_id,
    }
}

impl World {
    fn new_order(&self) -> NewOrder {
        NewOrder {
            store_id: self.store_id,
            delivery_address: "12 Harbour Street".to_string(),
            special_notes: Some("ring twice".to_string()),
        }
    }

    async fn stock(&self) -> Option<u32> {
        self.repo.product(self.product_id).await.and_then(|p| p.stock_quantity)
    }

    async fn inbox_count(&self, actor: &Actor) -> usize {
        self.inbox.list(actor).await.unwrap().len()
    }

    /// Wait until the background pushes have caught up with `expected`.
    async fn settle_pushes(&self, expected: usize) {
        for _ in 0..200 {
            if self.notifier.sent().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

fn assert_precondition(err: ServiceError, expected_current: OrderStatus) {
    match err {
        ServiceError::Domain(DomainError::Precondition { current, .. }) => {
            assert_eq!(current, expected_current.as_str());
        }
        other => panic!("expected a precondition failure, got {other:?}"),
    }
}

#[tokio::test]
async fn order_runs_from_placement_to_delivery() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();

    let order = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap();
    let id = order.header().id;
    assert_eq!(order.status(), OrderStatus::Waiting);
    assert_eq!(order.header().items_subtotal, Money::from_major(20_000));
    assert_eq!(order.header().delivery_fee, Money::from_major(3_000));
    assert_eq!(order.grand_total(), Money::from_major(23_000));
    assert_eq!(w.stock().await, Some(3));
    assert!(w.repo.cart(w.customer.user_id).await.is_empty());

    w.orders.accept(&w.owner, id, 30, t0 + Minutes::minutes(1)).await.unwrap();
    let ready_at = t0 + Minutes::minutes(20);
    let ready = w.orders.mark_ready(&w.owner, id, ready_at).await.unwrap();
    assert_eq!(ready.made_ready_at(), Some(ready_at));

    w.orders
        .assign_worker(&w.admin, id, w.worker.user_id, t0 + Minutes::minutes(25))
        .await
        .unwrap();
    let eta = t0 + Minutes::minutes(60);
    let out = w
        .orders
        .start_delivery(&w.worker, id, eta, t0 + Minutes::minutes(30))
        .await
        .unwrap();
    assert_eq!(out.header().delivery_estimated_at, Some(eta));
    let delivered = w
        .orders
        .mark_delivered(&w.worker, id, t0 + Minutes::minutes(55))
        .await
        .unwrap();

    assert_eq!(delivered.status(), OrderStatus::Delivered);
    assert_eq!(delivered.made_ready_at(), Some(ready_at));
    assert_eq!(delivered.grand_total(), Money::from_major(23_000));

    // accepted, ready, assigned, started, delivered
    assert_eq!(w.inbox_count(&w.customer).await, 5);
    // placed, assigned, delivered
    assert_eq!(w.inbox_count(&w.owner).await, 3);
    assert_eq!(w.inbox_count(&w.worker).await, 1);
    assert_eq!(w.inbox_count(&w.admin).await, 1);

    w.settle_pushes(10).await;
    assert_eq!(w.notifier.sent().len(), 10);
    assert_eq!(w.notifier.sent_to(w.worker.user_id).len(), 1);
}

#[tokio::test]
async fn worker_rejection_round_trip_keeps_made_ready_at() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;
    w.orders.accept(&w.owner, id, 15, t0).await.unwrap();
    let ready_at = t0 + Minutes::minutes(10);
    w.orders.mark_ready(&w.owner, id, ready_at).await.unwrap();
    w.orders.assign_worker(&w.admin, id, w.worker.user_id, t0 + Minutes::minutes(12)).await.unwrap();

    let back = w
        .orders
        .reject_assignment(&w.worker, id, "flat tyre".to_string(), t0 + Minutes::minutes(14))
        .await
        .unwrap();
    assert_eq!(back.status(), OrderStatus::ReadyForDelivery);
    assert_eq!(back.delivery_worker_id(), None);
    assert_eq!(back.made_ready_at(), Some(ready_at));

    let err = w.orders.mark_ready(&w.owner, id, t0 + Minutes::minutes(16)).await.unwrap_err();
    assert_precondition(err, OrderStatus::ReadyForDelivery);

    let reassigned = w
        .orders
        .assign_worker(&w.admin, id, w.worker.user_id, t0 + Minutes::minutes(18))
        .await
        .unwrap();
    assert_eq!(reassigned.made_ready_at(), Some(ready_at));
}

#[tokio::test]
async fn rejection_restocks_exactly_once() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;
    assert_eq!(w.stock().await, Some(3));

    let rejected = w
        .orders
        .reject(&w.owner, id, "out of flour".to_string(), t0 + Minutes::minutes(2))
        .await
        .unwrap();
    assert_eq!(rejected.status(), OrderStatus::Rejected);
    assert_eq!(w.stock().await, Some(5));

    let retry = w
        .orders
        .reject(&w.owner, id, "out of flour".to_string(), t0 + Minutes::minutes(3))
        .await
        .unwrap_err();
    assert_precondition(retry, OrderStatus::Rejected);
    let cancel = w.orders.cancel(&w.admin, id, t0 + Minutes::minutes(4)).await.unwrap_err();
    assert_precondition(cancel, OrderStatus::Rejected);
    assert_eq!(w.stock().await, Some(5));
}

#[tokio::test]
async fn admin_cancel_while_waiting_restocks_and_notifies_both_sides() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;

    let cancelled = w.orders.cancel(&w.admin, id, t0 + Minutes::minutes(1)).await.unwrap();
    assert_eq!(cancelled.status(), OrderStatus::CancelledByAdmin);
    assert_eq!(w.stock().await, Some(5));
    assert_eq!(w.inbox_count(&w.customer).await, 1);
    // placed + cancelled
    assert_eq!(w.inbox_count(&w.owner).await, 2);
}

#[tokio::test]
async fn owner_of_another_store_sees_not_found() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;

    let stranger = Actor::new(
        UserId::new(),
        Role::StoreOwner,
        StoreScope::Stores(BTreeSet::from([StoreId::new()])),
    );
    let err = w.orders.accept(&stranger, id, 10, t0).await.unwrap_err();
    assert_eq!(err, ServiceError::Domain(DomainError::Unauthorized));
    assert_eq!(
        w.orders.get_order(&stranger, id).await.unwrap_err(),
        ServiceError::Domain(DomainError::Unauthorized)
    );
    assert!(w.orders.list_orders(&stranger, &OrderQuery::default()).await.unwrap().is_empty());
    assert_eq!(w.orders.get_order(&w.customer, id).await.unwrap().status(), OrderStatus::Waiting);
}

#[tokio::test]
async fn racing_force_cancel_and_delivery_only_one_wins() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;
    w.orders.accept(&w.owner, id, 15, t0).await.unwrap();
    w.orders.mark_ready(&w.owner, id, t0).await.unwrap();
    w.orders.assign_worker(&w.admin, id, w.worker.user_id, t0).await.unwrap();
    w.orders.start_delivery(&w.worker, id, t0 + Minutes::minutes(30), t0).await.unwrap();

    let later = t0 + Minutes::minutes(20);
    let (cancel, deliver) = tokio::join!(
        w.orders.force_cancel(&w.admin, id, Some("customer unreachable".to_string()), later),
        w.orders.mark_delivered(&w.worker, id, later),
    );
    assert!(cancel.is_ok() != deliver.is_ok(), "exactly one transition must win");

    let final_status = w.orders.get_order(&w.admin, id).await.unwrap().status();
    assert!(matches!(
        final_status,
        OrderStatus::CancelledByAdmin | OrderStatus::Delivered
    ));
}

#[tokio::test]
async fn commission_report_is_generated_once_per_period() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;
    w.orders.accept(&w.owner, id, 15, t0).await.unwrap();
    w.orders.mark_ready(&w.owner, id, t0 + Minutes::minutes(5)).await.unwrap();

    let day = t0.date_naive();
    let period = ReportPeriod::new(day, day).unwrap();
    let generated = w
        .commission
        .generate(&w.admin, w.store_id, period, t0 + Minutes::minutes(60))
        .await
        .unwrap();
    assert_eq!(generated.lines.len(), 1);
    // 10% of 20 000.00
    assert_eq!(generated.report.commission_amount_calculated, Money::from_major(2_000));

    let again = w
        .commission
        .generate(&w.admin, w.store_id, period, t0 + Minutes::minutes(61))
        .await
        .unwrap_err();
    assert!(matches!(again, ServiceError::Store(StoreError::Conflict(_))));

    let finalized = w
        .commission
        .finalize(&w.admin, generated.report.id, Some("paid".to_string()), t0 + Minutes::minutes(90))
        .await
        .unwrap();
    assert!(finalized.report.is_finalized);
    assert_eq!(finalized.lines, generated.lines);

    let twice = w
        .commission
        .finalize(&w.admin, generated.report.id, None, t0 + Minutes::minutes(91))
        .await
        .unwrap_err();
    assert!(matches!(
        twice,
        ServiceError::Domain(DomainError::Precondition { .. })
    ));
}

#[tokio::test]
async fn empty_period_is_nothing_to_bill() {
    let w = test_world(Duration::from_secs(1)).await;
    let day = test_t0().date_naive();
    let err = w
        .commission
        .generate(&w.admin, w.store_id, ReportPeriod::new(day, day).unwrap(), test_t0())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NothingToBill(_)));
}

#[tokio::test]
async fn lock_timeout_is_retryable_and_changes_nothing() {
    let w = test_world(Duration::from_millis(30)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;

    let held = w.repo.begin().await.unwrap();
    let err = w.orders.accept(&w.owner, id, 20, t0).await.unwrap_err();
    assert!(err.is_retryable());
    drop(held);

    assert_eq!(w.orders.get_order(&w.owner, id).await.unwrap().status(), OrderStatus::Waiting);
    w.orders.accept(&w.owner, id, 20, t0).await.unwrap();
}

#[tokio::test]
async fn failing_pushes_do_not_roll_back_the_transition() {
    let w = test_world(Duration::from_secs(1)).await;
    let t0 = test_t0();
    let id = w.orders.place_order(&w.customer, w.new_order(), t0).await.unwrap().header().id;

    w.notifier.fail_all(true);
    let accepted = w.orders.accept(&w.owner, id, 25, t0).await.unwrap();
    assert_eq!(accepted.status(), OrderStatus::Preparing);
    assert_eq!(accepted.header().preparation_time_estimate, Some(25));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(w.notifier.sent_to(w.customer.user_id).is_empty());
    assert_eq!(w.inbox_count(&w.customer).await, 1);
    assert_eq!(
        w.orders.get_order(&w.customer, id).await.unwrap().status(),
        OrderStatus::Preparing
    );
}

#[tokio::test]
async fn missing_delivery_config_is_a_configuration_fault() {
    let repo = Arc::new(InMemoryMarketRepository::default());
    let orders = OrderWorkflow::new(
        repo.clone(),
        NotificationDispatcher::new(Arc::new(InMemoryNotifier::new())),
        StoreAvailabilityEvaluator::utc(),
    );
    let customer = Actor::unscoped(UserId::new(), Role::Customer);
    let err = orders
        .estimate_fee(&customer, Money::from_major(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Configuration(_))));
}
