use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::{Money, Rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryRuleType {
    Percentage,
    FixedThreshold,
}

impl DeliveryRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryRuleType::Percentage => "PERCENTAGE",
            DeliveryRuleType::FixedThreshold => "FIXED_THRESHOLD",
        }
    }
}

impl core::str::FromStr for DeliveryRuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(DeliveryRuleType::Percentage),
            "FIXED_THRESHOLD" => Ok(DeliveryRuleType::FixedThreshold),
            other => Err(format!("unknown delivery rule type '{other}'")),
        }
    }
}

/// The singleton delivery pricing row, as stored.
///
/// Only the fields belonging to `active_rule_type` are meaningful; the others
/// are kept so an admin can flip the rule without re-entering values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDeliveryConfig {
    pub active_rule_type: DeliveryRuleType,
    #[serde(default)]
    pub percentage_rate: Option<Rate>,
    #[serde(default)]
    pub fixed_fee_amount: Option<Money>,
    #[serde(default)]
    pub threshold_for_free_delivery: Option<Money>,
    #[serde(default, skip_deserializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PlatformDeliveryConfig {
    /// The default seeded row: fixed fee of zero, everything free.
    pub fn free_delivery() -> Self {
        Self {
            active_rule_type: DeliveryRuleType::FixedThreshold,
            percentage_rate: None,
            fixed_fee_amount: Some(Money::ZERO),
            threshold_for_free_delivery: Some(Money::ZERO),
            updated_at: None,
        }
    }

    pub fn percentage(rate: Rate) -> Self {
        Self {
            active_rule_type: DeliveryRuleType::Percentage,
            percentage_rate: Some(rate),
            fixed_fee_amount: None,
            threshold_for_free_delivery: None,
            updated_at: None,
        }
    }

    pub fn fixed_threshold(fixed_fee: Money, free_from: Money) -> Self {
        Self {
            active_rule_type: DeliveryRuleType::FixedThreshold,
            percentage_rate: None,
            fixed_fee_amount: Some(fixed_fee),
            threshold_for_free_delivery: Some(free_from),
            updated_at: None,
        }
    }

    /// Reduce the row to the policy it describes.
    pub fn policy(&self) -> Result<DeliveryPolicy, String> {
        match self.active_rule_type {
            DeliveryRuleType::Percentage => Ok(DeliveryPolicy::Percentage {
                rate: self.percentage_rate,
            }),
            DeliveryRuleType::FixedThreshold => {
                let fixed_fee = self
                    .fixed_fee_amount
                    .ok_or("FIXED_THRESHOLD requires fixed_fee_amount")?;
                let free_from = self
                    .threshold_for_free_delivery
                    .ok_or("FIXED_THRESHOLD requires threshold_for_free_delivery")?;
                if fixed_fee.is_negative() || free_from.is_negative() {
                    return Err("fixed_fee_amount and threshold_for_free_delivery must not be negative".into());
                }
                Ok(DeliveryPolicy::FixedThreshold { fixed_fee, free_from })
            }
        }
    }
}

/// A validated pricing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// `fee = subtotal * rate`; an unset rate charges nothing.
    Percentage { rate: Option<Rate> },
    /// `fee = 0` once `subtotal >= free_from`, otherwise `fixed_fee`.
    FixedThreshold { fixed_fee: Money, free_from: Money },
}
