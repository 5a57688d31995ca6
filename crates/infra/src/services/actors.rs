use std::sync::Arc;

use courier_auth::{Actor, JwtClaims, Role, StoreScope};

use crate::error::ServiceResult;
use crate::repository::MarketRepository;

/// Turns verified token claims into an [`Actor`] with its store scope.
///
/// Scope is resolved once per request so domain code can answer "may this
/// actor touch store S" without further lookups.
#[derive(Clone)]
pub struct ActorResolver {
    repo: Arc<dyn MarketRepository>,
}

impl ActorResolver {
    pub fn new(repo: Arc<dyn MarketRepository>) -> Self {
        Self { repo }
    }

    pub async fn resolve(&self, claims: &JwtClaims) -> ServiceResult<Actor> {
        let scope = match claims.role {
            Role::StoreOwner | Role::BranchManager => {
                let ownerships = self.repo.store_ownerships().await?;
                StoreScope::resolve(claims.role, claims.sub, &claims.managed_regions, &ownerships)
            }
            Role::Admin => StoreScope::All,
            Role::Customer | Role::DeliveryWorker => StoreScope::none(),
        };
        Ok(Actor::new(claims.sub, claims.role, scope))
    }
}
