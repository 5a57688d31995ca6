use std::sync::Arc;

use courier_infra::{
    ActorResolver, AppConfig, CommissionService, InMemoryMarketRepository, InboxService,
    MarketRepository, NotificationDispatcher, Notifier, OrderWorkflow, PostgresMarketRepository,
    StoreAdminService, StoreError, TracingNotifier,
};
use courier_stores::StoreAvailabilityEvaluator;

/// Application services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderWorkflow,
    pub stores: StoreAdminService,
    pub commission: CommissionService,
    pub inbox: InboxService,
    pub actors: ActorResolver,
}

impl AppServices {
    /// Wire every service over one repository and one push channel.
    pub fn new(
        repo: Arc<dyn MarketRepository>,
        notifier: Arc<dyn Notifier>,
        availability: StoreAvailabilityEvaluator,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(notifier);
        Self {
            orders: OrderWorkflow::new(repo.clone(), dispatcher, availability),
            stores: StoreAdminService::new(repo.clone(), availability),
            commission: CommissionService::new(repo.clone()),
            inbox: InboxService::new(repo.clone()),
            actors: ActorResolver::new(repo),
        }
    }

    /// PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let availability = StoreAvailabilityEvaluator::new(config.store_utc_offset);
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

        let repo: Arc<dyn MarketRepository> = match &config.database {
            Some(db) => {
                let repo = PostgresMarketRepository::connect(db).await?;
                repo.ensure_schema().await?;
                tracing::info!("using postgres repository");
                Arc::new(repo)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using the in-memory repository");
                Arc::new(InMemoryMarketRepository::new(config.lock_timeout))
            }
        };

        Ok(Self::new(repo, notifier, availability))
    }
}
