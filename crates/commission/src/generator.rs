use chrono::{DateTime, Utc};
use serde::Serialize;

use courier_auth::{Actor, Role};
use courier_core::{DomainError, DomainResult, Money, OrderId, ReportId, UserId};
use courier_orders::OrderHeader;
use courier_stores::Store;

use crate::period::ReportPeriod;
use crate::report::{CommissionReport, CommissionReportLine, ReportStatus};

/// An order row as the generator needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionCandidate {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub placed_at: DateTime<Utc>,
    pub made_ready_at: Option<DateTime<Utc>>,
    pub items_subtotal: Money,
    pub grand_total: Money,
}

impl From<&OrderHeader> for CommissionCandidate {
    fn from(h: &OrderHeader) -> Self {
        Self {
            order_id: h.id,
            customer_id: h.customer_id,
            placed_at: h.placed_at,
            made_ready_at: h.made_ready_at,
            items_subtotal: h.items_subtotal,
            grand_total: h.grand_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedReport {
    #[serde(flatten)]
    pub report: CommissionReport,
    pub lines: Vec<CommissionReportLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Report(GeneratedReport),
    /// No order of the store became ready inside the period.
    NothingToBill,
}

pub struct CommissionReportGenerator;

impl CommissionReportGenerator {
    /// Build a report for `store` over `period`.
    ///
    /// `orders` may be a superset; only orders whose `made_ready_at` falls in
    /// the period count. Each line's commission is rounded to the cent and the
    /// report total is the sum of those rounded lines.
    pub fn generate(
        actor: &Actor,
        store: &Store,
        period: ReportPeriod,
        orders: &[CommissionCandidate],
        now: DateTime<Utc>,
    ) -> DomainResult<GenerationOutcome> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized);
        }
        let rate = store.commission_rate.ok_or_else(|| {
            DomainError::configuration(format!(
                "store '{}' ({}) has no commission rate set",
                store.name, store.id
            ))
        })?;

        let mut selected: Vec<&CommissionCandidate> = orders
            .iter()
            .filter(|o| o.made_ready_at.is_some_and(|at| period.contains(at)))
            .collect();
        if selected.is_empty() {
            return Ok(GenerationOutcome::NothingToBill);
        }
        selected.sort_by_key(|o| (o.placed_at, o.order_id));

        let report_id = ReportId::new();
        let lines: Vec<CommissionReportLine> = selected
            .iter()
            .map(|o| CommissionReportLine {
                report_id,
                order_id: o.order_id,
                customer_id: o.customer_id,
                order_placed_at: o.placed_at,
                order_grand_total: o.grand_total,
                items_subtotal: o.items_subtotal,
                commission_on_order: o.items_subtotal.apply_rate(rate),
            })
            .collect();

        let report = CommissionReport {
            id: report_id,
            store_id: store.id,
            period,
            total_sales_subject_to_commission: Money::sum(lines.iter().map(|l| l.items_subtotal))?,
            commission_rate_applied: rate,
            commission_amount_calculated: Money::sum(lines.iter().map(|l| l.commission_on_order))?,
            calculated_at: now,
            status: ReportStatus::Generated,
            is_finalized: false,
            finalized_at: None,
            finalized_by_admin_id: None,
            notes: None,
        };

        Ok(GenerationOutcome::Report(GeneratedReport { report, lines }))
    }
}
