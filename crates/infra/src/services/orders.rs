//! Order workflow: placement plus every role-gated transition.
//!
//! A transition locks the order row, lets the aggregate decide, then writes
//! the new header, stock movements and inbox rows in the same transaction.
//! Pushes go out only after commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use courier_auth::{Actor, Role, StoreOwnership};
use courier_core::{Aggregate, DomainError, Money, OrderId, RegionId, StoreId, UserId};
use courier_orders::transition::permits;
use courier_orders::{
    AcceptOrder, AssignWorker, CancelOrder, ForceCancelOrder, MarkDelivered, MarkReady, Notice,
    Order, OrderCommand, OrderEvent, OrderStatus, PlacementRequest, RejectAssignment, RejectOrder,
    StartDelivery, Transition, audience_for, plan_placement,
};
use courier_pricing::{DeliveryFeeEngine, FeeQuote};
use courier_stores::StoreAvailabilityEvaluator;

use super::abort;
use crate::error::{ServiceResult, StoreError};
use crate::notify::NotificationDispatcher;
use crate::repository::{InboxEntry, MarketRepository, MarketTx, OrderFilter};

/// Customer input for placing an order from their cart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewOrder {
    pub store_id: StoreId,
    pub delivery_address: String,
    #[serde(default)]
    pub special_notes: Option<String>,
}

/// Listing criteria as requested by the caller. The actor's role decides
/// which of them are honoured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub statuses: Vec<OrderStatus>,
    pub store_id: Option<StoreId>,
    pub customer_id: Option<UserId>,
    pub region_id: Option<RegionId>,
}

impl OrderQuery {
    pub fn with_status(status: Option<OrderStatus>) -> Self {
        Self {
            statuses: status.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Restrict the query to what `actor` may see.
    ///
    /// Customers see their own orders, workers the ones in their hands, owners
    /// and branch managers their scoped stores. Only admins may filter by
    /// customer or region.
    pub fn filter_for(&self, actor: &Actor, ownerships: &[StoreOwnership]) -> OrderFilter {
        let mut filter = OrderFilter {
            statuses: self.statuses.clone(),
            ..OrderFilter::default()
        };

        match actor.role {
            Role::Customer => {
                filter.customer_id = Some(actor.user_id);
            }
            Role::DeliveryWorker => {
                const IN_HAND: [OrderStatus; 2] =
                    [OrderStatus::AssignedForDelivery, OrderStatus::OutForDelivery];
                filter.delivery_worker_id = Some(actor.user_id);
                if self.statuses.is_empty() {
                    filter.statuses = IN_HAND.to_vec();
                } else {
                    filter.statuses.retain(|s| IN_HAND.contains(s));
                    if filter.statuses.is_empty() {
                        filter.store_ids = Some(BTreeSet::new());
                    }
                }
            }
            Role::StoreOwner | Role::BranchManager => {
                filter.store_ids = narrow(actor.scope.store_ids().cloned(), self.store_id);
            }
            Role::Admin => {
                filter.customer_id = self.customer_id;
                let in_region = self.region_id.map(|region| {
                    ownerships
                        .iter()
                        .filter(|o| o.regions.contains(&region))
                        .map(|o| o.store_id)
                        .collect::<BTreeSet<_>>()
                });
                filter.store_ids = narrow(in_region, self.store_id);
            }
        }
        filter
    }
}

fn narrow(ids: Option<BTreeSet<StoreId>>, store_id: Option<StoreId>) -> Option<BTreeSet<StoreId>> {
    match (ids, store_id) {
        (ids, None) => ids,
        (None, Some(store_id)) => Some(BTreeSet::from([store_id])),
        (Some(mut ids), Some(store_id)) => {
            ids.retain(|id| *id == store_id);
            Some(ids)
        }
    }
}

#[derive(Clone)]
pub struct OrderWorkflow {
    repo: Arc<dyn MarketRepository>,
    dispatcher: NotificationDispatcher,
    availability: StoreAvailabilityEvaluator,
}

impl OrderWorkflow {
    pub fn new(
        repo: Arc<dyn MarketRepository>,
        dispatcher: NotificationDispatcher,
        availability: StoreAvailabilityEvaluator,
    ) -> Self {
        Self {
            repo,
            dispatcher,
            availability,
        }
    }

    async fn fee_engine(&self) -> ServiceResult<DeliveryFeeEngine> {
        let config = self.repo.delivery_config().await?;
        let engine = DeliveryFeeEngine::new(config.as_ref())?;
        if engine.charges_nothing_by_misconfiguration() {
            tracing::warn!("percentage delivery policy has no rate; every fee is zero");
        }
        Ok(engine)
    }

    /// Fee quote for a subtotal, computed exactly as placement computes it.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn estimate_fee(&self, actor: &Actor, items_subtotal: Money) -> ServiceResult<FeeQuote> {
        if !actor.has_role(Role::Customer) {
            return Err(DomainError::Unauthorized.into());
        }
        Ok(self.fee_engine().await?.quote(items_subtotal)?)
    }

    #[instrument(
        skip(self, actor, input),
        fields(customer_id = %actor.user_id, store_id = %input.store_id),
        err
    )]
    pub async fn place_order(&self, actor: &Actor, input: NewOrder, now: DateTime<Utc>) -> ServiceResult<Order> {
        if !actor.has_role(Role::Customer) {
            return Err(DomainError::Unauthorized.into());
        }
        let fees = self.fee_engine().await?;

        let mut tx = self.repo.begin().await?;
        match self.place_in(tx.as_mut(), actor, &input, &fees, now).await {
            Ok((order, entries)) => {
                tx.commit().await?;
                tracing::info!(
                    order_id = %order.header().id,
                    grand_total = %order.grand_total(),
                    "order placed"
                );
                self.dispatcher.dispatch(entries);
                Ok(order)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    async fn place_in(
        &self,
        tx: &mut dyn MarketTx,
        actor: &Actor,
        input: &NewOrder,
        fees: &DeliveryFeeEngine,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Order, Vec<InboxEntry>)> {
        let store = tx
            .load_store(input.store_id)
            .await?
            .ok_or_else(DomainError::not_found)?;

        let cart = tx.cart_lines(actor.user_id, store.id).await?;
        let mut product_ids: Vec<_> = cart.iter().map(|l| l.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let products = tx.lock_products(&product_ids).await?;

        let command = plan_placement(
            PlacementRequest {
                actor,
                store: &store,
                cart: &cart,
                products: &products,
                delivery_address: &input.delivery_address,
                special_notes: input.special_notes.as_deref(),
                now,
            },
            &self.availability,
            fees,
        )?;

        let mut order = Order::empty(command.order_id);
        let events = order.execute(&OrderCommand::Place(command))?;
        tx.insert_order(&order).await?;
        apply_stock(tx, &events).await?;
        tx.remove_cart_items(actor.user_id, &product_ids).await?;

        let notices: Vec<Notice> = events
            .iter()
            .flat_map(|e| audience_for(&order, store.owner_id, e))
            .collect();
        // Placement only ever notifies the store owner.
        let entries = NotificationDispatcher::inbox_entries(&notices, &[], now);
        tx.insert_inbox(&entries).await?;
        Ok((order, entries))
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn accept(
        &self,
        actor: &Actor,
        order_id: OrderId,
        preparation_minutes: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        let command = OrderCommand::Accept(AcceptOrder {
            actor: actor.clone(),
            preparation_minutes,
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor, reason), fields(user_id = %actor.user_id), err)]
    pub async fn reject(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: String,
        now: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        let command = OrderCommand::Reject(RejectOrder {
            actor: actor.clone(),
            reason,
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn mark_ready(&self, actor: &Actor, order_id: OrderId, now: DateTime<Utc>) -> ServiceResult<Order> {
        let command = OrderCommand::MarkReady(MarkReady {
            actor: actor.clone(),
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn assign_worker(
        &self,
        actor: &Actor,
        order_id: OrderId,
        worker_id: UserId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        if !permits(actor.role, Transition::AssignWorker) {
            return Err(DomainError::Unauthorized.into());
        }
        let worker = self.repo.find_user(worker_id).await?.ok_or_else(|| {
            DomainError::validation(format!("user {worker_id} does not exist"))
        })?;
        let command = OrderCommand::AssignWorker(AssignWorker {
            actor: actor.clone(),
            worker_id,
            worker_role: worker.role,
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn start_delivery(
        &self,
        actor: &Actor,
        order_id: OrderId,
        estimated_arrival: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        let command = OrderCommand::StartDelivery(StartDelivery {
            actor: actor.clone(),
            estimated_arrival,
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor, reason), fields(user_id = %actor.user_id), err)]
    pub async fn reject_assignment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: String,
        now: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        let command = OrderCommand::RejectAssignment(RejectAssignment {
            actor: actor.clone(),
            reason,
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn mark_delivered(&self, actor: &Actor, order_id: OrderId, now: DateTime<Utc>) -> ServiceResult<Order> {
        let command = OrderCommand::MarkDelivered(MarkDelivered {
            actor: actor.clone(),
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn cancel(&self, actor: &Actor, order_id: OrderId, now: DateTime<Utc>) -> ServiceResult<Order> {
        let command = OrderCommand::Cancel(CancelOrder {
            actor: actor.clone(),
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    #[instrument(skip(self, actor, reason), fields(user_id = %actor.user_id), err)]
    pub async fn force_cancel(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        let command = OrderCommand::ForceCancel(ForceCancelOrder {
            actor: actor.clone(),
            reason,
            occurred_at: now,
        });
        self.run_transition(order_id, command).await
    }

    async fn run_transition(&self, order_id: OrderId, command: OrderCommand) -> ServiceResult<Order> {
        // Read before locking: the in-memory store serializes whole transactions.
        let admins = self.repo.admin_ids().await?;

        let mut tx = self.repo.begin().await?;
        match self.transition_in(tx.as_mut(), order_id, &command, &admins).await {
            Ok((order, entries)) => {
                tx.commit().await?;
                self.dispatcher.dispatch(entries);
                Ok(order)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    async fn transition_in(
        &self,
        tx: &mut dyn MarketTx,
        order_id: OrderId,
        command: &OrderCommand,
        admins: &[UserId],
    ) -> ServiceResult<(Order, Vec<InboxEntry>)> {
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let from = order.status();

        let events = order.execute(command)?;
        tx.update_order(&order).await?;
        apply_stock(tx, &events).await?;

        let store = tx.load_store(order.store_id()).await?.ok_or_else(|| {
            StoreError::Database(format!("store {} of order {order_id} is missing", order.store_id()))
        })?;
        let notices: Vec<Notice> = events
            .iter()
            .flat_map(|e| audience_for(&order, store.owner_id, e))
            .collect();
        let entries = NotificationDispatcher::inbox_entries(&notices, admins, command.occurred_at());
        tx.insert_inbox(&entries).await?;

        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %order.status(),
            events = ?events.iter().map(OrderEvent::event_type).collect::<Vec<_>>(),
            "order transition"
        );
        Ok((order, entries))
    }

    /// A single order, if `actor` may see it.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> ServiceResult<Order> {
        let order = self
            .repo
            .find_order(order_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        if !order.is_visible_to(actor) {
            return Err(DomainError::Unauthorized.into());
        }
        Ok(order)
    }

    /// Orders visible to `actor`, newest first.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, role = %actor.role), err)]
    pub async fn list_orders(&self, actor: &Actor, query: &OrderQuery) -> ServiceResult<Vec<Order>> {
        let ownerships = if actor.has_role(Role::Admin) && query.region_id.is_some() {
            self.repo.store_ownerships().await?
        } else {
            Vec::new()
        };
        let filter = query.filter_for(actor, &ownerships);
        Ok(self.repo.list_orders(&filter).await?)
    }
}

async fn apply_stock(tx: &mut dyn MarketTx, events: &[OrderEvent]) -> ServiceResult<()> {
    let deltas: Vec<_> = events.iter().flat_map(OrderEvent::stock_delta).collect();
    if !deltas.is_empty() {
        tx.adjust_stock(&deltas).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_auth::StoreScope;

    fn test_ownership(regions: Vec<RegionId>) -> StoreOwnership {
        StoreOwnership {
            store_id: StoreId::new(),
            owner_id: UserId::new(),
            regions,
        }
    }

    #[test]
    fn customers_only_see_their_own_orders() {
        let customer = Actor::unscoped(UserId::new(), Role::Customer);
        let query = OrderQuery {
            customer_id: Some(UserId::new()),
            ..OrderQuery::default()
        };
        let filter = query.filter_for(&customer, &[]);
        assert_eq!(filter.customer_id, Some(customer.user_id));
        assert_eq!(filter.store_ids, None);
    }

    #[test]
    fn workers_are_limited_to_orders_in_hand() {
        let worker = Actor::unscoped(UserId::new(), Role::DeliveryWorker);
        let filter = OrderQuery::default().filter_for(&worker, &[]);
        assert_eq!(
            filter.statuses,
            vec![OrderStatus::AssignedForDelivery, OrderStatus::OutForDelivery]
        );

        let delivered = OrderQuery::with_status(Some(OrderStatus::Delivered)).filter_for(&worker, &[]);
        assert_eq!(delivered.store_ids, Some(BTreeSet::new()));
    }

    #[test]
    fn owners_cannot_widen_their_scope_with_a_store_filter() {
        let own = StoreId::new();
        let owner = Actor::new(
            UserId::new(),
            Role::StoreOwner,
            StoreScope::Stores(BTreeSet::from([own])),
        );
        let foreign = OrderQuery {
            store_id: Some(StoreId::new()),
            ..OrderQuery::default()
        };
        assert_eq!(foreign.filter_for(&owner, &[]).store_ids, Some(BTreeSet::new()));
        assert_eq!(
            OrderQuery::default().filter_for(&owner, &[]).store_ids,
            Some(BTreeSet::from([own]))
        );
    }

    #[test]
    fn admins_filter_by_region_through_store_ownership() {
        let region = RegionId::new();
        let inside = test_ownership(vec![region]);
        let outside = test_ownership(vec![RegionId::new()]);
        let admin = Actor::admin(UserId::new());
        let query = OrderQuery {
            region_id: Some(region),
            ..OrderQuery::default()
        };
        let filter = query.filter_for(&admin, &[inside.clone(), outside]);
        assert_eq!(filter.store_ids, Some(BTreeSet::from([inside.store_id])));
        assert_eq!(OrderQuery::default().filter_for(&admin, &[]).store_ids, None);
    }
}
