//! Stores domain module.
//!
//! Holds the subset of a store that the order lifecycle depends on (operational
//! overrides, schedule, commission rate, regions) and the pure availability
//! decision. No IO.

pub mod availability;
pub mod schedule;
pub mod store;

pub use availability::{AvailabilityDecision, AvailabilityReason, StoreAvailabilityEvaluator, evaluate_at};
pub use schedule::{parse_optional_time_of_day, parse_time_of_day};
pub use store::{AdminOverride, OwnerOverride, Store};
