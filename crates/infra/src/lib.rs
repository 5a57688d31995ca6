//! Infrastructure layer: persistence, notification delivery, configuration
//! and the application services that tie them to the domain crates.

pub mod config;
pub mod error;
pub mod notify;
pub mod repository;
pub mod services;

pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use error::{ServiceError, ServiceResult, StoreError};
pub use notify::{InMemoryNotifier, NotificationDispatcher, Notifier, NotifyError, TracingNotifier};
pub use repository::{
    InMemoryMarketRepository, InboxEntry, MarketRepository, MarketTx, OrderFilter,
    PostgresMarketRepository, UserRecord,
};
pub use services::{
    ActorResolver, CommissionService, InboxService, NewOrder, OrderQuery, OrderWorkflow,
    StoreAdminService,
};

#[cfg(test)]
mod integration_tests;
