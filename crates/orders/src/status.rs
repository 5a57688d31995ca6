use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use courier_core::DomainError;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Waiting,
    Preparing,
    ReadyForDelivery,
    AssignedForDelivery,
    OutForDelivery,
    Delivered,
    Rejected,
    CancelledByAdmin,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Waiting,
        OrderStatus::Preparing,
        OrderStatus::ReadyForDelivery,
        OrderStatus::AssignedForDelivery,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Rejected,
        OrderStatus::CancelledByAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Waiting => "waiting",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::AssignedForDelivery => "assigned_for_delivery",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
            OrderStatus::CancelledByAdmin => "cancelled_by_admin",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::CancelledByAdmin
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn exactly_three_terminal_states() {
        let terminal: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![OrderStatus::Delivered, OrderStatus::Rejected, OrderStatus::CancelledByAdmin]
        );
    }
}
