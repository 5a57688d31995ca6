use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use courier_auth::{Actor, Role};
use courier_commission::{CommissionReportGenerator, GeneratedReport, GenerationOutcome, ReportPeriod};
use courier_core::{DomainError, Entity, ReportId, StoreId};

use super::abort;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{MarketRepository, MarketTx};

/// Generates, finalizes and reads commission reports. Admin only.
#[derive(Clone)]
pub struct CommissionService {
    repo: Arc<dyn MarketRepository>,
}

impl CommissionService {
    pub fn new(repo: Arc<dyn MarketRepository>) -> Self {
        Self { repo }
    }

    /// Snapshot the store's rate and bill every order it made ready in `period`.
    ///
    /// A second run for the same store and period fails with a storage
    /// conflict. An empty selection is `ServiceError::NothingToBill`.
    #[instrument(skip(self, actor), fields(store_id = %store_id, admin_id = %actor.user_id), err)]
    pub async fn generate(
        &self,
        actor: &Actor,
        store_id: StoreId,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> ServiceResult<GeneratedReport> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized.into());
        }

        let mut tx = self.repo.begin().await?;
        match generate_in(tx.as_mut(), actor, store_id, period, now).await {
            Ok(generated) => {
                tx.commit().await?;
                tracing::info!(
                    report_id = %generated.report.id,
                    orders = generated.lines.len(),
                    commission = %generated.report.commission_amount_calculated,
                    "commission report generated"
                );
                Ok(generated)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    #[instrument(skip(self, actor, notes), fields(report_id = %report_id, admin_id = %actor.user_id), err)]
    pub async fn finalize(
        &self,
        actor: &Actor,
        report_id: ReportId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<GeneratedReport> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized.into());
        }

        let mut tx = self.repo.begin().await?;
        let outcome = async {
            let mut report = tx
                .lock_report(report_id)
                .await?
                .ok_or_else(DomainError::not_found)?;
            report.finalize(actor, notes, now)?;
            tx.update_report(&report).await?;
            tracing::debug!(entity = %report.label(), "status written");
            Ok::<_, ServiceError>(())
        }
        .await;

        match outcome {
            Ok(()) => tx.commit().await?,
            Err(err) => return Err(abort(tx, err).await),
        }
        tracing::info!(report_id = %report_id, "commission report finalized");
        self.get_report(actor, report_id).await
    }

    #[instrument(skip(self, actor), fields(report_id = %report_id), err)]
    pub async fn get_report(&self, actor: &Actor, report_id: ReportId) -> ServiceResult<GeneratedReport> {
        if !actor.has_role(Role::Admin) {
            return Err(DomainError::Unauthorized.into());
        }
        Ok(self
            .repo
            .find_report(report_id)
            .await?
            .ok_or_else(DomainError::not_found)?)
    }
}

async fn generate_in(
    tx: &mut dyn MarketTx,
    actor: &Actor,
    store_id: StoreId,
    period: ReportPeriod,
    now: DateTime<Utc>,
) -> ServiceResult<GeneratedReport> {
    let store = tx
        .load_store(store_id)
        .await?
        .ok_or_else(DomainError::not_found)?;
    let candidates = tx.commission_candidates(store_id, &period).await?;

    match CommissionReportGenerator::generate(actor, &store, period, &candidates, now)? {
        GenerationOutcome::Report(generated) => {
            tx.insert_report(&generated).await?;
            Ok(generated)
        }
        GenerationOutcome::NothingToBill => Err(ServiceError::NothingToBill(format!(
            "store {store_id} made no orders ready between {} and {}",
            period.start_date, period.end_date
        ))),
    }
}
