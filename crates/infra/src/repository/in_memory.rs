//! In-memory marketplace store for tests and local runs.
//!
//! The whole dataset sits behind one async mutex. A transaction owns the
//! guard for its lifetime and works on a copy; commit swaps the copy in, so a
//! dropped or rolled-back transaction leaves no trace. Waiting for the guard is
//! bounded by `lock_timeout`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use courier_auth::{Role, StoreOwnership};
use courier_commission::{CommissionCandidate, CommissionReport, GeneratedReport, ReportPeriod};
use courier_core::{NotificationId, OrderId, ProductId, ReportId, StoreId, UserId};
use courier_orders::{CartLine, CatalogProduct, Order};
use courier_pricing::PlatformDeliveryConfig;
use courier_stores::Store;

use super::{InboxEntry, MarketRepository, MarketTx, OrderFilter, UserRecord};
use crate::error::StoreError;

#[derive(Debug, Clone, Default)]
struct Dataset {
    users: BTreeMap<UserId, UserRecord>,
    stores: BTreeMap<StoreId, Store>,
    products: BTreeMap<ProductId, CatalogProduct>,
    /// customer -> product -> quantity
    carts: BTreeMap<UserId, BTreeMap<ProductId, u32>>,
    orders: BTreeMap<OrderId, Order>,
    delivery_config: Option<PlatformDeliveryConfig>,
    reports: BTreeMap<ReportId, GeneratedReport>,
    notifications: Vec<InboxEntry>,
}

#[derive(Debug, Clone)]
pub struct InMemoryMarketRepository {
    data: Arc<Mutex<Dataset>>,
    lock_timeout: Duration,
}

impl Default for InMemoryMarketRepository {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl InMemoryMarketRepository {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            data: Arc::new(Mutex::new(Dataset::default())),
            lock_timeout,
        }
    }

    async fn acquire(&self) -> Result<OwnedMutexGuard<Dataset>, StoreError> {
        tokio::time::timeout(self.lock_timeout, Arc::clone(&self.data).lock_owned())
            .await
            .map_err(|_| {
                StoreError::Timeout(format!(
                    "could not acquire the dataset lock within {:?}",
                    self.lock_timeout
                ))
            })
    }

    // Seeding helpers. These bypass transactions and are meant for fixtures.

    pub async fn seed_user(&self, id: UserId, role: Role, full_name: impl Into<String>) {
        let user = UserRecord {
            id,
            role,
            full_name: full_name.into(),
        };
        self.data.lock().await.users.insert(id, user);
    }

    pub async fn seed_store(&self, store: Store) {
        self.data.lock().await.stores.insert(store.id, store);
    }

    pub async fn seed_product(&self, product: CatalogProduct) {
        self.data.lock().await.products.insert(product.id, product);
    }

    /// Put `quantity` of a product in a customer's cart, replacing any previous quantity.
    pub async fn seed_cart_item(&self, customer_id: UserId, product_id: ProductId, quantity: u32) {
        self.data
            .lock()
            .await
            .carts
            .entry(customer_id)
            .or_default()
            .insert(product_id, quantity);
    }

    pub async fn seed_delivery_config(&self, config: PlatformDeliveryConfig) {
        self.data.lock().await.delivery_config = Some(config);
    }

    pub async fn product(&self, id: ProductId) -> Option<CatalogProduct> {
        self.data.lock().await.products.get(&id).cloned()
    }

    pub async fn cart(&self, customer_id: UserId) -> Vec<CartLine> {
        self.data
            .lock()
            .await
            .carts
            .get(&customer_id)
            .map(|items| {
                items
                    .iter()
                    .map(|(product_id, quantity)| CartLine {
                        product_id: *product_id,
                        quantity: *quantity,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl MarketRepository for InMemoryMarketRepository {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError> {
        let guard = self.acquire().await?;
        let work = guard.clone();
        Ok(Box::new(InMemoryTx { guard, work }))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.acquire().await?.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let data = self.acquire().await?;
        let mut orders: Vec<Order> = data
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.header()
                .placed_at
                .cmp(&a.header().placed_at)
                .then_with(|| b.header().id.cmp(&a.header().id))
        });
        Ok(orders)
    }

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, StoreError> {
        Ok(self.acquire().await?.stores.get(&id).cloned())
    }

    async fn store_ownerships(&self) -> Result<Vec<StoreOwnership>, StoreError> {
        Ok(self.acquire().await?.stores.values().map(Store::ownership).collect())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.acquire().await?.users.get(&id).cloned())
    }

    async fn admin_ids(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .acquire()
            .await?
            .users
            .values()
            .filter(|u| u.role == Role::Admin)
            .map(|u| u.id)
            .collect())
    }

    async fn delivery_config(&self) -> Result<Option<PlatformDeliveryConfig>, StoreError> {
        Ok(self.acquire().await?.delivery_config.clone())
    }

    async fn find_report(&self, id: ReportId) -> Result<Option<GeneratedReport>, StoreError> {
        Ok(self.acquire().await?.reports.get(&id).cloned())
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<InboxEntry>, StoreError> {
        let data = self.acquire().await?;
        let mut entries: Vec<InboxEntry> = data
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, StoreError> {
        let mut data = self.acquire().await?;
        match data
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(entry) => {
                entry.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut data = self.acquire().await?;
        let mut count = 0;
        for entry in data
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            entry.is_read = true;
            count += 1;
        }
        Ok(count)
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Dataset>,
    work: Dataset,
}

#[async_trait]
impl MarketTx for InMemoryTx {
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let id = order.header().id;
        if self.work.orders.contains_key(&id) {
            return Err(StoreError::Conflict(format!("order {id} already exists")));
        }
        self.work.orders.insert(id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let id = order.header().id;
        let Some(stored) = self.work.orders.get(&id) else {
            return Err(StoreError::Database(format!("order {id} does not exist")));
        };
        let mut header = order.header().clone();
        if let Some(first) = stored.made_ready_at() {
            header.made_ready_at = Some(first);
        }
        let updated = Order::from_parts(header, order.lines().to_vec())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.work.orders.insert(id, updated);
        Ok(())
    }

    async fn load_store(&mut self, id: StoreId) -> Result<Option<Store>, StoreError> {
        Ok(self.work.stores.get(&id).cloned())
    }

    async fn lock_store(&mut self, id: StoreId) -> Result<Option<Store>, StoreError> {
        Ok(self.work.stores.get(&id).cloned())
    }

    async fn update_store(&mut self, store: &Store) -> Result<(), StoreError> {
        if !self.work.stores.contains_key(&store.id) {
            return Err(StoreError::Database(format!("store {} does not exist", store.id)));
        }
        self.work.stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn cart_lines(
        &mut self,
        customer_id: UserId,
        store_id: StoreId,
    ) -> Result<Vec<CartLine>, StoreError> {
        let Some(items) = self.work.carts.get(&customer_id) else {
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .filter(|(product_id, _)| {
                self.work
                    .products
                    .get(product_id)
                    .is_some_and(|p| p.store_id == store_id)
            })
            .map(|(product_id, quantity)| CartLine {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect())
    }

    async fn remove_cart_items(
        &mut self,
        customer_id: UserId,
        product_ids: &[ProductId],
    ) -> Result<(), StoreError> {
        if let Some(items) = self.work.carts.get_mut(&customer_id) {
            items.retain(|product_id, _| !product_ids.contains(product_id));
        }
        Ok(())
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.work.products.get(id).cloned())
            .collect())
    }

    async fn adjust_stock(&mut self, deltas: &[(ProductId, i64)]) -> Result<(), StoreError> {
        for (product_id, delta) in deltas {
            let Some(product) = self.work.products.get_mut(product_id) else {
                continue;
            };
            let Some(stock) = product.stock_quantity else {
                continue;
            };
            let next = i64::from(stock) + delta;
            product.stock_quantity = Some(u32::try_from(next).map_err(|_| {
                StoreError::Conflict(format!("stock of product {product_id} would become {next}"))
            })?);
        }
        Ok(())
    }

    async fn insert_inbox(&mut self, entries: &[InboxEntry]) -> Result<(), StoreError> {
        self.work.notifications.extend_from_slice(entries);
        Ok(())
    }

    async fn save_delivery_config(&mut self, config: &PlatformDeliveryConfig) -> Result<(), StoreError> {
        self.work.delivery_config = Some(config.clone());
        Ok(())
    }

    async fn commission_candidates(
        &mut self,
        store_id: StoreId,
        period: &ReportPeriod,
    ) -> Result<Vec<CommissionCandidate>, StoreError> {
        Ok(self
            .work
            .orders
            .values()
            .filter(|o| o.store_id() == store_id)
            .filter(|o| o.made_ready_at().is_some_and(|at| period.contains(at)))
            .map(|o| CommissionCandidate::from(o.header()))
            .collect())
    }

    async fn insert_report(&mut self, report: &GeneratedReport) -> Result<(), StoreError> {
        let r = &report.report;
        let duplicate = self
            .work
            .reports
            .values()
            .any(|existing| existing.report.store_id == r.store_id && existing.report.period == r.period);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "store {} already has a commission report for {} to {}",
                r.store_id, r.period.start_date, r.period.end_date
            )));
        }
        self.work.reports.insert(r.id, report.clone());
        Ok(())
    }

    async fn lock_report(&mut self, id: ReportId) -> Result<Option<CommissionReport>, StoreError> {
        Ok(self.work.reports.get(&id).map(|g| g.report.clone()))
    }

    async fn update_report(&mut self, report: &CommissionReport) -> Result<(), StoreError> {
        match self.work.reports.get_mut(&report.id) {
            Some(stored) => {
                stored.report = report.clone();
                Ok(())
            }
            None => Err(StoreError::Database(format!("report {} does not exist", report.id))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::Money;

    fn test_product(store_id: StoreId, stock: Option<u32>) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(),
            store_id,
            name: "Flat white".to_string(),
            price: Money::from_minor(450),
            is_available: true,
            stock_quantity: stock,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let repo = InMemoryMarketRepository::default();
        let product = test_product(StoreId::new(), Some(5));
        repo.seed_product(product.clone()).await;

        {
            let mut tx = repo.begin().await.unwrap();
            tx.adjust_stock(&[(product.id, -3)]).await.unwrap();
        }
        assert_eq!(repo.product(product.id).await.unwrap().stock_quantity, Some(5));

        let mut tx = repo.begin().await.unwrap();
        tx.adjust_stock(&[(product.id, -3)]).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(repo.product(product.id).await.unwrap().stock_quantity, Some(2));
    }

    #[tokio::test]
    async fn untracked_stock_is_left_alone_and_negative_stock_is_refused() {
        let repo = InMemoryMarketRepository::default();
        let store_id = StoreId::new();
        let untracked = test_product(store_id, None);
        let tracked = test_product(store_id, Some(1));
        repo.seed_product(untracked.clone()).await;
        repo.seed_product(tracked.clone()).await;

        let mut tx = repo.begin().await.unwrap();
        tx.adjust_stock(&[(untracked.id, -10)]).await.unwrap();
        let err = tx.adjust_stock(&[(tracked.id, -2)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn begin_times_out_while_another_transaction_is_open() {
        let repo = InMemoryMarketRepository::new(Duration::from_millis(20));
        let _held = repo.begin().await.unwrap();
        let err = match repo.begin().await {
            Ok(_) => panic!("second transaction should not start"),
            Err(e) => e,
        };
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn cart_lines_only_cover_the_requested_store() {
        let repo = InMemoryMarketRepository::default();
        let customer = UserId::new();
        let here = test_product(StoreId::new(), None);
        let elsewhere = test_product(StoreId::new(), None);
        repo.seed_product(here.clone()).await;
        repo.seed_product(elsewhere.clone()).await;
        repo.seed_cart_item(customer, here.id, 2).await;
        repo.seed_cart_item(customer, elsewhere.id, 1).await;

        let mut tx = repo.begin().await.unwrap();
        let lines = tx.cart_lines(customer, here.store_id).await.unwrap();
        assert_eq!(lines, vec![CartLine { product_id: here.id, quantity: 2 }]);
    }

    #[tokio::test]
    async fn marking_someone_elses_notification_is_a_miss() {
        let repo = InMemoryMarketRepository::default();
        let owner = UserId::new();
        let entry = InboxEntry {
            id: NotificationId::new(),
            user_id: owner,
            order_id: None,
            title: "hello".to_string(),
            message: "world".to_string(),
            link: None,
            is_read: false,
            created_at: Utc::now(),
        };
        let mut tx = repo.begin().await.unwrap();
        tx.insert_inbox(std::slice::from_ref(&entry)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!repo.mark_notification_read(UserId::new(), entry.id).await.unwrap());
        assert!(repo.mark_notification_read(owner, entry.id).await.unwrap());
        assert_eq!(repo.mark_all_notifications_read(owner).await.unwrap(), 0);
    }
}
