use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, FinancingRecord, FinancingStatus, Installment, InstallmentStatus, ResultEngine,
    installments, records,
    schedule::{DEFAULT_ANNUAL_RATE_PERCENT, build_schedule},
};

use super::{Engine, load_schedule, with_tx};

impl Engine {
    /// Generate and persist the repayment plan without disbursing.
    ///
    /// Disbursement builds the schedule automatically when none exists;
    /// this is the explicit path for generating it early (after approval)
    /// or replacing it with `overwrite`. A plan with recorded payments is
    /// never replaced. The rate used is persisted on the record so a later
    /// disbursement stays consistent.
    pub async fn generate_schedule(
        &self,
        financing_id: Uuid,
        annual_rate_percent: Option<f64>,
        overwrite: bool,
        at: DateTime<Utc>,
    ) -> ResultEngine<Vec<Installment>> {
        if let Some(rate) = annual_rate_percent
            && (!rate.is_finite() || rate < 0.0)
        {
            return Err(EngineError::Validation(
                "annual rate must be a non-negative percentage".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let model = self.require_financing(&db_tx, financing_id).await?;
            let record = FinancingRecord::try_from(model)?;
            if !matches!(
                record.status,
                FinancingStatus::Approved | FinancingStatus::Signed | FinancingStatus::Disbursed
            ) {
                return Err(EngineError::Validation(
                    "schedule requires an approved financing".to_string(),
                ));
            }

            let existing = load_schedule(&db_tx, financing_id).await?;
            if !existing.is_empty() {
                if !overwrite {
                    return Err(EngineError::Validation(
                        "schedule already exists; pass overwrite to replace it".to_string(),
                    ));
                }
                if existing
                    .iter()
                    .any(|installment| installment.status == InstallmentStatus::Paid)
                {
                    return Err(EngineError::Validation(
                        "cannot replace a schedule with recorded payments".to_string(),
                    ));
                }
                installments::Entity::delete_many()
                    .filter(installments::Column::FinancingId.eq(financing_id.to_string()))
                    .exec(&db_tx)
                    .await?;
            }

            let rate = annual_rate_percent
                .or(record.annual_rate_percent)
                .unwrap_or(DEFAULT_ANNUAL_RATE_PERCENT);
            let anchor = record.disbursed_at.unwrap_or(at);
            let rows = build_schedule(record.amount_minor, record.term_months, rate, anchor)?;
            let schedule: Vec<Installment> = rows
                .iter()
                .map(|row| Installment::from_row(financing_id, row))
                .collect();
            installments::Entity::insert_many(
                schedule.iter().map(installments::ActiveModel::from),
            )
            .exec(&db_tx)
            .await?;

            let guarded = records::Entity::update_many()
                .set(records::ActiveModel {
                    annual_rate_percent: ActiveValue::Set(Some(rate)),
                    updated_at: ActiveValue::Set(at),
                    version: ActiveValue::Set(record.version + 1),
                    ..Default::default()
                })
                .filter(records::Column::Id.eq(financing_id.to_string()))
                .filter(records::Column::Version.eq(record.version))
                .exec(&db_tx)
                .await?;
            if guarded.rows_affected == 0 {
                return Err(EngineError::Conflict(format!(
                    "financing {financing_id} was modified concurrently"
                )));
            }

            Ok(schedule)
        })
    }
}
