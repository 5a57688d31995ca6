use std::collections::BTreeSet;

use serde::Serialize;

use courier_core::{RegionId, StoreId, UserId};

use crate::Role;

/// The ownership/region facts about one store needed to resolve scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOwnership {
    pub store_id: StoreId,
    pub owner_id: UserId,
    pub regions: Vec<RegionId>,
}

/// "Does this actor have scope over store S", answered without IO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "stores", rename_all = "snake_case")]
pub enum StoreScope {
    /// Platform-wide authority.
    All,
    /// Authority over an explicit set of stores.
    Stores(BTreeSet<StoreId>),
}

impl StoreScope {
    pub fn none() -> Self {
        StoreScope::Stores(BTreeSet::new())
    }

    pub fn covers(&self, store_id: StoreId) -> bool {
        match self {
            StoreScope::All => true,
            StoreScope::Stores(set) => set.contains(&store_id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, StoreScope::All)
    }

    /// Store ids in scope, or `None` for platform-wide scope.
    pub fn store_ids(&self) -> Option<&BTreeSet<StoreId>> {
        match self {
            StoreScope::All => None,
            StoreScope::Stores(set) => Some(set),
        }
    }

    /// Resolve the scope for an actor.
    ///
    /// - admin: every store
    /// - store owner: stores they own
    /// - branch manager: stores linked to any of their managed regions
    /// - everyone else: nothing
    pub fn resolve<'a, I>(
        role: Role,
        user_id: UserId,
        managed_regions: &[RegionId],
        stores: I,
    ) -> StoreScope
    where
        I: IntoIterator<Item = &'a StoreOwnership>,
    {
        match role {
            Role::Admin => StoreScope::All,
            Role::StoreOwner => StoreScope::Stores(
                stores
                    .into_iter()
                    .filter(|s| s.owner_id == user_id)
                    .map(|s| s.store_id)
                    .collect(),
            ),
            Role::BranchManager => StoreScope::Stores(
                stores
                    .into_iter()
                    .filter(|s| s.regions.iter().any(|r| managed_regions.contains(r)))
                    .map(|s| s.store_id)
                    .collect(),
            ),
            Role::Customer | Role::DeliveryWorker => StoreScope::none(),
        }
    }
}
