use sea_orm::{ActiveModelTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ApplyCmd, DomainEvent, FinancingDetail, FinancingRecord, FinancingStatus, ResultEngine,
    records, util::normalize_optional_text,
};

use super::{Engine, load_schedule, load_timeline, with_tx};

impl Engine {
    /// Submit a new financing application.
    ///
    /// The record starts in `applied` with an empty schedule and timeline;
    /// the first timeline entry is written by the first transition.
    pub async fn apply(&self, cmd: ApplyCmd) -> ResultEngine<FinancingRecord> {
        let purpose = normalize_optional_text(cmd.purpose.as_deref());
        let record = FinancingRecord::new(
            &cmd.farmer_id,
            cmd.amount_minor,
            cmd.term_months,
            purpose,
            cmd.submitted_at,
        )?;

        let record = with_tx!(self, |db_tx| {
            records::ActiveModel::from(&record).insert(&db_tx).await?;
            Ok(record)
        })?;

        self.events().publish(DomainEvent::FinancingApplied {
            financing_id: record.id,
            farmer_id: record.farmer_id.clone(),
        });
        Ok(record)
    }

    /// Fetch one record together with its schedule and timeline.
    pub async fn financing(&self, financing_id: Uuid) -> ResultEngine<FinancingDetail> {
        with_tx!(self, |db_tx| {
            let model = self.require_financing(&db_tx, financing_id).await?;
            let record = FinancingRecord::try_from(model)?;
            let schedule = load_schedule(&db_tx, financing_id).await?;
            let timeline = load_timeline(&db_tx, financing_id).await?;

            Ok(FinancingDetail {
                record,
                schedule,
                timeline,
            })
        })
    }

    /// All records in one status, oldest application first.
    pub async fn financings_by_status(
        &self,
        status: FinancingStatus,
    ) -> ResultEngine<Vec<FinancingRecord>> {
        let models = records::Entity::find()
            .filter(records::Column::Status.eq(status.as_str()))
            .order_by_asc(records::Column::CreatedAt)
            .all(&self.database)
            .await?;

        models.into_iter().map(FinancingRecord::try_from).collect()
    }

    /// The bank's work queue: everything awaiting triage or review, oldest
    /// first. A projection over the record store, not a separate state.
    pub async fn approval_queue(&self) -> ResultEngine<Vec<FinancingRecord>> {
        let models = records::Entity::find()
            .filter(records::Column::Status.is_in([
                FinancingStatus::Applied.as_str(),
                FinancingStatus::Reviewing.as_str(),
            ]))
            .order_by_asc(records::Column::CreatedAt)
            .all(&self.database)
            .await?;

        models.into_iter().map(FinancingRecord::try_from).collect()
    }
}
