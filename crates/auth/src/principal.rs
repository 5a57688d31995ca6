use serde::Serialize;

use courier_core::{StoreId, UserId};

use crate::{Role, StoreScope};

/// A fully resolved actor for authorization decisions.
///
/// The scope is computed once per request (from the token and the store
/// directory) and passed down; domain code never traverses ownership or region
/// joins on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub scope: StoreScope,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, scope: StoreScope) -> Self {
        Self { user_id, role, scope }
    }

    /// Actor without any store scope (customers, delivery workers).
    pub fn unscoped(user_id: UserId, role: Role) -> Self {
        Self::new(user_id, role, StoreScope::none())
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin, StoreScope::All)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_scope_over(&self, store_id: StoreId) -> bool {
        self.scope.covers(store_id)
    }
}
