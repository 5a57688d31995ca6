use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_auth::{Actor, Role};
use courier_core::{DomainError, DomainResult, Entity, Money, OrderId, Rate, ReportId, StoreId, UserId};

use crate::period::ReportPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Generated,
    Finalized,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Generated => "GENERATED",
            ReportStatus::Finalized => "FINALIZED",
        }
    }
}

impl core::str::FromStr for ReportStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERATED" => Ok(ReportStatus::Generated),
            "FINALIZED" => Ok(ReportStatus::Finalized),
            other => Err(DomainError::validation(format!("unknown report status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReport {
    pub id: ReportId,
    pub store_id: StoreId,
    #[serde(flatten)]
    pub period: ReportPeriod,
    pub total_sales_subject_to_commission: Money,
    /// The store's rate at generation time.
    pub commission_rate_applied: Rate,
    pub commission_amount_calculated: Money,
    pub calculated_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub is_finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalized_by_admin_id: Option<UserId>,
    pub notes: Option<String>,
}

/// One order's contribution to a report. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReportLine {
    pub report_id: ReportId,
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub order_placed_at: DateTime<Utc>,
    pub order_grand_total: Money,
    pub items_subtotal: Money,
    pub commission_on_order: Money,
}

impl Entity for CommissionReport {
    type Id = ReportId;
    const KIND: &'static str = "commission report";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl CommissionReport {
    /// One-way GENERATED -> FINALIZED.
    pub fn finalize(
        &mut self,
        actor: &Actor,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized);
        }
        if self.is_finalized || self.status == ReportStatus::Finalized {
            return Err(DomainError::precondition(
                ReportStatus::Finalized.as_str(),
                format!("commission report {} is already finalized", self.id),
            ));
        }

        self.status = ReportStatus::Finalized;
        self.is_finalized = true;
        self.finalized_at = Some(now);
        self.finalized_by_admin_id = Some(actor.user_id);
        if let Some(notes) = notes {
            self.notes = Some(notes);
        }
        Ok(())
    }
}
