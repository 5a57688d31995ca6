//! Delivery pricing.
//!
//! One platform-wide policy row decides the delivery fee for every order. The
//! policy is loaded by the caller and handed to [`DeliveryFeeEngine::new`];
//! nothing here caches it.

pub mod config;
pub mod engine;

pub use config::{DeliveryPolicy, DeliveryRuleType, PlatformDeliveryConfig};
pub use engine::{DeliveryFeeEngine, FeeQuote};
