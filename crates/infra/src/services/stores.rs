//! Store administration and the platform delivery config.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use courier_auth::{Actor, Role};
use courier_core::{DomainError, DomainResult, Entity, Rate, StoreId};
use courier_pricing::PlatformDeliveryConfig;
use courier_stores::{AdminOverride, AvailabilityDecision, OwnerOverride, Store, StoreAvailabilityEvaluator};

use super::abort;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::MarketRepository;

#[derive(Clone)]
pub struct StoreAdminService {
    repo: Arc<dyn MarketRepository>,
    availability: StoreAvailabilityEvaluator,
}

impl StoreAdminService {
    pub fn new(repo: Arc<dyn MarketRepository>, availability: StoreAvailabilityEvaluator) -> Self {
        Self { repo, availability }
    }

    /// Lock the store, let `change` validate and mutate it, persist.
    async fn update_store<F>(&self, store_id: StoreId, change: F) -> ServiceResult<Store>
    where
        F: FnOnce(&mut Store) -> DomainResult<()> + Send,
    {
        let mut tx = self.repo.begin().await?;
        let outcome = async {
            let mut store = tx
                .lock_store(store_id)
                .await?
                .ok_or_else(DomainError::not_found)?;
            change(&mut store)?;
            tx.update_store(&store).await?;
            tracing::debug!(entity = %store.label(), "settings written");
            Ok::<_, ServiceError>(store)
        }
        .await;

        match outcome {
            Ok(store) => {
                tx.commit().await?;
                Ok(store)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    #[instrument(skip(self, actor), fields(admin_id = %actor.user_id), err)]
    pub async fn set_admin_override(
        &self,
        actor: &Actor,
        store_id: StoreId,
        status: AdminOverride,
    ) -> ServiceResult<Store> {
        let store = self
            .update_store(store_id, |s| s.set_admin_override(actor, status))
            .await?;
        tracing::info!(store_id = %store_id, status = status.as_str(), "admin override changed");
        Ok(store)
    }

    #[instrument(skip(self, actor), fields(owner_id = %actor.user_id), err)]
    pub async fn set_owner_override(
        &self,
        actor: &Actor,
        store_id: StoreId,
        status: OwnerOverride,
    ) -> ServiceResult<Store> {
        let store = self
            .update_store(store_id, |s| s.set_owner_override(actor, status))
            .await?;
        tracing::info!(store_id = %store_id, status = status.as_str(), "owner override changed");
        Ok(store)
    }

    #[instrument(skip(self, actor), fields(admin_id = %actor.user_id), err)]
    pub async fn set_schedule(
        &self,
        actor: &Actor,
        store_id: StoreId,
        opening: Option<String>,
        closing: Option<String>,
    ) -> ServiceResult<Store> {
        self.update_store(store_id, |s| {
            s.set_schedule(actor, opening.as_deref(), closing.as_deref())
        })
        .await
    }

    /// `percent` is a percentage between 0 and 100, e.g. `"12.5"`.
    #[instrument(skip(self, actor), fields(admin_id = %actor.user_id), err)]
    pub async fn set_commission_rate(
        &self,
        actor: &Actor,
        store_id: StoreId,
        percent: &str,
    ) -> ServiceResult<Store> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized.into());
        }
        let rate = Rate::parse_percent(percent)?;
        self.update_store(store_id, |s| s.set_commission_rate(actor, rate))
            .await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn set_active(&self, actor: &Actor, store_id: StoreId, active: bool) -> ServiceResult<Store> {
        let store = self
            .update_store(store_id, |s| s.set_active(actor, active))
            .await?;
        tracing::info!(store_id = %store_id, active, "store activation changed");
        Ok(store)
    }

    /// Whether the store takes orders right now, and why.
    pub async fn availability(&self, store_id: StoreId, now: DateTime<Utc>) -> ServiceResult<AvailabilityDecision> {
        let store = self
            .repo
            .find_store(store_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        Ok(self.availability.evaluate(&store, now))
    }

    pub async fn delivery_config(&self, actor: &Actor) -> ServiceResult<PlatformDeliveryConfig> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized.into());
        }
        Ok(self
            .repo
            .delivery_config()
            .await?
            .ok_or_else(|| DomainError::configuration("platform delivery config row is missing"))?)
    }

    /// Replace the singleton config. Validated the way the fee engine reads it.
    #[instrument(skip(self, actor, config), fields(admin_id = %actor.user_id), err)]
    pub async fn replace_delivery_config(
        &self,
        actor: &Actor,
        config: PlatformDeliveryConfig,
    ) -> ServiceResult<PlatformDeliveryConfig> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized.into());
        }
        config.policy().map_err(DomainError::validation)?;

        let mut tx = self.repo.begin().await?;
        if let Err(err) = tx.save_delivery_config(&config).await {
            return Err(abort(tx, err.into()).await);
        }
        tx.commit().await?;
        tracing::info!(rule = config.active_rule_type.as_str(), "delivery config replaced");
        self.delivery_config(actor).await
    }
}
