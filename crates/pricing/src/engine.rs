use serde::Serialize;

use courier_core::{DomainError, DomainResult, Money};

use crate::config::{DeliveryPolicy, PlatformDeliveryConfig};

/// Computes delivery fees from the platform policy.
///
/// The same engine instance (and so the same arithmetic) backs both the
/// pre-checkout estimate and the fee frozen into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFeeEngine {
    policy: DeliveryPolicy,
}

/// Pre-checkout fee estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub items_subtotal: Money,
    pub delivery_fee: Money,
    pub estimated_grand_total: Money,
}

impl DeliveryFeeEngine {
    /// Build the engine from the loaded policy row.
    ///
    /// A missing or incomplete row is a server-side configuration fault.
    pub fn new(config: Option<&PlatformDeliveryConfig>) -> DomainResult<Self> {
        let config = config.ok_or_else(|| {
            DomainError::configuration("platform delivery configuration row is missing")
        })?;
        let policy = config.policy().map_err(DomainError::configuration)?;
        Ok(Self { policy })
    }

    pub fn from_policy(policy: DeliveryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// True when a PERCENTAGE policy has no rate and every fee comes out zero.
    pub fn charges_nothing_by_misconfiguration(&self) -> bool {
        matches!(self.policy, DeliveryPolicy::Percentage { rate: None })
    }

    pub fn fee_for(&self, items_subtotal: Money) -> DomainResult<Money> {
        if items_subtotal.is_negative() {
            return Err(DomainError::validation("items_subtotal must not be negative"));
        }

        let fee = match self.policy {
            DeliveryPolicy::Percentage { rate: Some(rate) } => items_subtotal.apply_rate(rate),
            DeliveryPolicy::Percentage { rate: None } => Money::ZERO,
            DeliveryPolicy::FixedThreshold { fixed_fee, free_from } => {
                if items_subtotal >= free_from {
                    Money::ZERO
                } else {
                    fixed_fee
                }
            }
        };
        Ok(fee)
    }

    pub fn quote(&self, items_subtotal: Money) -> DomainResult<FeeQuote> {
        let delivery_fee = self.fee_for(items_subtotal)?;
        Ok(FeeQuote {
            items_subtotal,
            delivery_fee,
            estimated_grand_total: items_subtotal.checked_add(delivery_fee)?,
        })
    }
}
