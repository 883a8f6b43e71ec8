use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Actor, DomainEvent, EarlySettlementQuote, EngineError, FinancingRecord, FinancingStatus,
    Installment, InstallmentStatus, PaymentCmd, RepaymentSummary, ResultEngine, installments,
    records, util::parse_uuid,
};

use super::{Engine, lifecycle::check_expected_version, load_schedule, with_tx};

impl Engine {
    /// Record a payment on one installment.
    ///
    /// Paying an installment that is already `paid` is a no-op, not an
    /// error. The first payment moves a disbursed record into `repaying`;
    /// paying the last open installment settles it.
    pub async fn mark_installment_paid(&self, cmd: PaymentCmd) -> ResultEngine<FinancingRecord> {
        let (record, events) = with_tx!(self, |db_tx| {
            let model = self.require_financing(&db_tx, cmd.financing_id).await?;
            let record = FinancingRecord::try_from(model)?;

            let installment_model =
                installments::Entity::find_by_id(cmd.installment_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(cmd.installment_id.to_string()))?;
            if installment_model.financing_id != record.id.to_string() {
                return Err(EngineError::NotFound(cmd.installment_id.to_string()));
            }
            let installment = Installment::try_from(installment_model)?;

            if installment.status == InstallmentStatus::Paid {
                // Nothing written yet; leave the record and its paid_at alone.
                return Ok(record);
            }
            if !matches!(
                record.status,
                FinancingStatus::Disbursed | FinancingStatus::Repaying
            ) {
                return Err(EngineError::Validation(
                    "installments can only be paid after disbursement".to_string(),
                ));
            }
            check_expected_version(&record, cmd.expected_version)?;

            installments::ActiveModel {
                id: ActiveValue::Set(installment.id.to_string()),
                status: ActiveValue::Set(InstallmentStatus::Paid.as_str().to_string()),
                paid_at: ActiveValue::Set(Some(cmd.paid_at)),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            let mut events = vec![DomainEvent::InstallmentPaid {
                financing_id: record.id,
                installment_id: installment.id,
                seq: installment.seq,
            }];

            let unpaid = installments::Entity::find()
                .filter(installments::Column::FinancingId.eq(record.id.to_string()))
                .filter(installments::Column::Status.ne(InstallmentStatus::Paid.as_str()))
                .count(&db_tx)
                .await?;

            let initial_version = record.version;
            let mut current = record;
            if current.status == FinancingStatus::Disbursed {
                let (updated, mut edge_events) = self
                    .apply_edge(
                        &db_tx,
                        &current,
                        FinancingStatus::Repaying,
                        cmd.actor,
                        None,
                        cmd.paid_at,
                        records::ActiveModel::default(),
                    )
                    .await?;
                current = updated;
                events.append(&mut edge_events);
            }
            if unpaid == 0 && current.status == FinancingStatus::Repaying {
                let (updated, mut edge_events) = self
                    .apply_edge(
                        &db_tx,
                        &current,
                        FinancingStatus::Settled,
                        cmd.actor,
                        None,
                        cmd.paid_at,
                        records::ActiveModel::default(),
                    )
                    .await?;
                current = updated;
                events.append(&mut edge_events);
            }
            if current.version == initial_version {
                // No status change, but the aggregate did change.
                current = self.bump_version(&db_tx, &current, cmd.paid_at).await?;
            }

            Ok((current, events))
        })?;

        for event in events {
            self.events().publish(event);
        }
        Ok(record)
    }

    /// Which installments are delinquent as of `as_of`. Pure read: reports
    /// every unpaid installment whose due date has passed, without touching
    /// the stored status.
    pub async fn evaluate_overdue(
        &self,
        financing_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<Vec<Installment>> {
        with_tx!(self, |db_tx| {
            self.require_financing(&db_tx, financing_id).await?;
            let schedule = load_schedule(&db_tx, financing_id).await?;

            Ok(schedule
                .into_iter()
                .filter(|installment| installment.is_delinquent(as_of))
                .collect())
        })
    }

    /// Materialize `overdue` across all active records and flip records
    /// whose first due date has passed into `repaying`.
    ///
    /// Idempotent, and safe to run next to foreground writes: every record
    /// is swept in its own transaction through the version guard, and a
    /// record that moves under the sweep is skipped until the next run.
    /// Returns how many installments were flipped.
    pub async fn reconcile_overdue(&self, as_of: DateTime<Utc>) -> ResultEngine<u64> {
        let candidates = records::Entity::find()
            .filter(records::Column::Status.is_in([
                FinancingStatus::Disbursed.as_str(),
                FinancingStatus::Repaying.as_str(),
            ]))
            .order_by_asc(records::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut flipped_total = 0;
        for candidate in candidates {
            let outcome = with_tx!(self, |db_tx| {
                self.sweep_record(&db_tx, &candidate, as_of).await
            });
            match outcome {
                Ok((flipped, events)) => {
                    flipped_total += flipped;
                    for event in events {
                        self.events().publish(event);
                    }
                }
                Err(EngineError::Conflict(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        if flipped_total > 0 {
            self.events().publish(DomainEvent::InstallmentsOverdue {
                count: flipped_total,
            });
        }
        Ok(flipped_total)
    }

    async fn sweep_record(
        &self,
        db_tx: &DatabaseTransaction,
        candidate: &records::Model,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<(u64, Vec<DomainEvent>)> {
        // The candidate list is read outside this transaction; re-read.
        let financing_id = parse_uuid(&candidate.id, "financing")?;
        let model = self.require_financing(db_tx, financing_id).await?;
        let record = FinancingRecord::try_from(model)?;
        if !matches!(
            record.status,
            FinancingStatus::Disbursed | FinancingStatus::Repaying
        ) {
            return Ok((0, Vec::new()));
        }

        let flipped = installments::Entity::update_many()
            .set(installments::ActiveModel {
                status: ActiveValue::Set(InstallmentStatus::Overdue.as_str().to_string()),
                ..Default::default()
            })
            .filter(installments::Column::FinancingId.eq(record.id.to_string()))
            .filter(installments::Column::Status.eq(InstallmentStatus::Pending.as_str()))
            .filter(installments::Column::DueDate.lt(as_of))
            .exec(db_tx)
            .await?
            .rows_affected;

        let mut events = Vec::new();
        let mut current = record;
        if current.status == FinancingStatus::Disbursed {
            let due_started = installments::Entity::find()
                .filter(installments::Column::FinancingId.eq(current.id.to_string()))
                .filter(installments::Column::DueDate.lt(as_of))
                .count(db_tx)
                .await?
                > 0;
            if due_started {
                let (updated, mut edge_events) = self
                    .apply_edge(
                        db_tx,
                        &current,
                        FinancingStatus::Repaying,
                        Actor::Bank,
                        None,
                        as_of,
                        records::ActiveModel::default(),
                    )
                    .await?;
                current = updated;
                events.append(&mut edge_events);
            }
        }
        if flipped > 0 && events.is_empty() {
            // Overdue flips go through the record's version counter too.
            self.bump_version(db_tx, &current, as_of).await?;
        }

        Ok((flipped, events))
    }

    /// Totals over the schedule, for display.
    pub async fn repayment_summary(&self, financing_id: Uuid) -> ResultEngine<RepaymentSummary> {
        with_tx!(self, |db_tx| {
            self.require_financing(&db_tx, financing_id).await?;
            let schedule = load_schedule(&db_tx, financing_id).await?;

            Ok(RepaymentSummary::from_installments(financing_id, &schedule))
        })
    }

    /// What settling the loan right now would cost.
    pub async fn early_settlement_quote(
        &self,
        financing_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<EarlySettlementQuote> {
        with_tx!(self, |db_tx| {
            self.require_financing(&db_tx, financing_id).await?;
            let schedule = load_schedule(&db_tx, financing_id).await?;

            EarlySettlementQuote::from_installments(financing_id, &schedule, as_of)
        })
    }
}
