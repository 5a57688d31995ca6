//! Persistence ports.
//!
//! [`MarketRepository`] serves plain reads and opens [`MarketTx`] units of
//! work. Everything a transition changes (order row, stock, cart, inbox)
//! goes through one `MarketTx` so it commits or rolls back as a whole.
//! Dropping a `MarketTx` without committing discards its writes.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use courier_auth::{Role, StoreOwnership};
use courier_commission::{CommissionCandidate, CommissionReport, GeneratedReport, ReportPeriod};
use courier_core::{NotificationId, OrderId, ProductId, ReportId, StoreId, UserId};
use courier_orders::{CartLine, CatalogProduct, Order, OrderStatus};
use courier_pricing::PlatformDeliveryConfig;
use courier_stores::Store;

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryMarketRepository;
pub use postgres::PostgresMarketRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub role: Role,
    pub full_name: String,
}

/// A row of the per-user notification inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub id: NotificationId,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Order listing criteria. Empty/`None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub statuses: Vec<OrderStatus>,
    /// Restrict to these stores. `Some(empty)` matches nothing.
    pub store_ids: Option<BTreeSet<StoreId>>,
    pub customer_id: Option<UserId>,
    pub delivery_worker_id: Option<UserId>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        let h = order.header();
        (self.statuses.is_empty() || self.statuses.contains(&h.status))
            && self.store_ids.as_ref().is_none_or(|ids| ids.contains(&h.store_id))
            && self.customer_id.is_none_or(|c| c == h.customer_id)
            && self.delivery_worker_id.is_none_or(|w| h.delivery_worker_id == Some(w))
    }
}

#[async_trait]
pub trait MarketRepository: Send + Sync {
    /// Open a unit of work. Fails with `StoreError::Timeout` when the backend
    /// cannot hand out a transaction within its configured bound.
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
    /// Newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, StoreError>;
    async fn store_ownerships(&self) -> Result<Vec<StoreOwnership>, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;
    async fn admin_ids(&self) -> Result<Vec<UserId>, StoreError>;

    async fn delivery_config(&self) -> Result<Option<PlatformDeliveryConfig>, StoreError>;

    async fn find_report(&self, id: ReportId) -> Result<Option<GeneratedReport>, StoreError>;

    /// Newest first.
    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<InboxEntry>, StoreError>;
    /// False when the notification does not exist or belongs to someone else.
    async fn mark_notification_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, StoreError>;
    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, StoreError>;
}

#[async_trait]
impl<R> MarketRepository for Arc<R>
where
    R: MarketRepository + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError> {
        (**self).begin().await
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).find_order(id).await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        (**self).list_orders(filter).await
    }

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, StoreError> {
        (**self).find_store(id).await
    }

    async fn store_ownerships(&self) -> Result<Vec<StoreOwnership>, StoreError> {
        (**self).store_ownerships().await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        (**self).find_user(id).await
    }

    async fn admin_ids(&self) -> Result<Vec<UserId>, StoreError> {
        (**self).admin_ids().await
    }

    async fn delivery_config(&self) -> Result<Option<PlatformDeliveryConfig>, StoreError> {
        (**self).delivery_config().await
    }

    async fn find_report(&self, id: ReportId) -> Result<Option<GeneratedReport>, StoreError> {
        (**self).find_report(id).await
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<InboxEntry>, StoreError> {
        (**self).list_notifications(user_id).await
    }

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, StoreError> {
        (**self).mark_notification_read(user_id, id).await
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, StoreError> {
        (**self).mark_all_notifications_read(user_id).await
    }
}

/// One transaction against the marketplace store.
#[async_trait]
pub trait MarketTx: Send {
    /// Load an order holding an exclusive lock on it until commit/rollback.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;
    /// Persist the order header. `made_ready_at` is never overwritten once set.
    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn load_store(&mut self, id: StoreId) -> Result<Option<Store>, StoreError>;
    async fn lock_store(&mut self, id: StoreId) -> Result<Option<Store>, StoreError>;
    async fn update_store(&mut self, store: &Store) -> Result<(), StoreError>;

    /// The customer's cart lines for products of `store_id`.
    async fn cart_lines(
        &mut self,
        customer_id: UserId,
        store_id: StoreId,
    ) -> Result<Vec<CartLine>, StoreError>;
    async fn remove_cart_items(
        &mut self,
        customer_id: UserId,
        product_ids: &[ProductId],
    ) -> Result<(), StoreError>;

    /// Lock product rows in id order.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, StoreError>;
    /// Apply signed stock changes. Untracked (`NULL`) stock is left alone.
    async fn adjust_stock(&mut self, deltas: &[(ProductId, i64)]) -> Result<(), StoreError>;

    async fn insert_inbox(&mut self, entries: &[InboxEntry]) -> Result<(), StoreError>;

    async fn save_delivery_config(&mut self, config: &PlatformDeliveryConfig) -> Result<(), StoreError>;

    async fn commission_candidates(
        &mut self,
        store_id: StoreId,
        period: &ReportPeriod,
    ) -> Result<Vec<CommissionCandidate>, StoreError>;
    /// Fails with `StoreError::Conflict` when the store already has a report for the period.
    async fn insert_report(&mut self, report: &GeneratedReport) -> Result<(), StoreError>;
    async fn lock_report(&mut self, id: ReportId) -> Result<Option<CommissionReport>, StoreError>;
    async fn update_report(&mut self, report: &CommissionReport) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
