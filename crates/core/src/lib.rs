//! `courier-core`: domain foundation building blocks for the delivery marketplace.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{NotificationId, OrderId, ProductId, RegionId, ReportId, StoreId, UserId};
pub use money::{Money, Rate};
pub use value_object::ValueObject;
