use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*,
};

use crate::{
    Actor, DecisionCmd, DecisionOutcome, DomainEvent, EngineError, FinancingRecord,
    FinancingStatus, Installment, ResultEngine, TimelineEvent, TransitionCmd, installments,
    records,
    schedule::{DEFAULT_ANNUAL_RATE_PERCENT, build_schedule},
    status,
    util::normalize_optional_text,
};

use super::{Engine, append_event, with_tx};

impl Engine {
    /// Move a record along one lifecycle edge.
    ///
    /// The target must be a direct successor of the current status and the
    /// actor must be allowed on that edge (admins may force any edge, which
    /// is marked on the timeline). On failure the record is untouched.
    pub async fn transition(&self, cmd: TransitionCmd) -> ResultEngine<FinancingRecord> {
        let note = normalize_optional_text(cmd.note.as_deref());

        let (record, events) = with_tx!(self, |db_tx| {
            let model = self.require_financing(&db_tx, cmd.financing_id).await?;
            let record = FinancingRecord::try_from(model)?;
            check_expected_version(&record, cmd.expected_version)?;

            let edge = require_edge(&record, cmd.target)?;
            if !edge.allows(cmd.actor) {
                return Err(EngineError::UnauthorizedActor(format!(
                    "{} may not move a financing from {} to {}",
                    cmd.actor.as_str(),
                    record.status.as_str(),
                    cmd.target.as_str()
                )));
            }

            self.apply_edge(
                &db_tx,
                &record,
                cmd.target,
                cmd.actor,
                note,
                cmd.at,
                records::ActiveModel::default(),
            )
            .await
        })?;

        for event in events {
            self.events().publish(event);
        }
        Ok(record)
    }

    /// Record the bank's decision on an application under review.
    ///
    /// Stores the review metadata alongside the status change. Approval
    /// fixes the annual rate; the default applies when the reviewer leaves
    /// it unset.
    pub async fn decide(&self, cmd: DecisionCmd) -> ResultEngine<FinancingRecord> {
        let reviewer = cmd.reviewer_id.trim().to_string();
        if reviewer.is_empty() {
            return Err(EngineError::Validation(
                "reviewer id must not be empty".to_string(),
            ));
        }
        if let Some(rate) = cmd.annual_rate_percent
            && (!rate.is_finite() || rate < 0.0)
        {
            return Err(EngineError::Validation(
                "annual rate must be a non-negative percentage".to_string(),
            ));
        }
        let note = normalize_optional_text(cmd.note.as_deref());
        let target = cmd.outcome.target();

        let (record, events) = with_tx!(self, |db_tx| {
            let model = self.require_financing(&db_tx, cmd.financing_id).await?;
            let record = FinancingRecord::try_from(model)?;
            check_expected_version(&record, cmd.expected_version)?;

            let patch = records::ActiveModel {
                reviewer_id: ActiveValue::Set(Some(reviewer.clone())),
                reviewed_at: ActiveValue::Set(Some(cmd.decided_at)),
                review_note: ActiveValue::Set(note.clone()),
                credit_score: ActiveValue::Set(cmd.credit_score),
                annual_rate_percent: match cmd.outcome {
                    DecisionOutcome::Approve => ActiveValue::Set(Some(
                        cmd.annual_rate_percent
                            .unwrap_or(DEFAULT_ANNUAL_RATE_PERCENT),
                    )),
                    _ => ActiveValue::NotSet,
                },
                ..Default::default()
            };

            self.apply_edge(
                &db_tx,
                &record,
                target,
                Actor::Bank,
                note.clone(),
                cmd.decided_at,
                patch,
            )
            .await
        })?;

        for event in events {
            self.events().publish(event);
        }
        Ok(record)
    }

    /// Write one edge of the lifecycle graph: guarded status update, side
    /// effects, one timeline entry. Callers have already authorized the
    /// actor; the edge itself must still exist.
    pub(super) async fn apply_edge(
        &self,
        db_tx: &DatabaseTransaction,
        record: &FinancingRecord,
        target: FinancingStatus,
        actor: Actor,
        note: Option<String>,
        at: DateTime<Utc>,
        patch: records::ActiveModel,
    ) -> ResultEngine<(FinancingRecord, Vec<DomainEvent>)> {
        let edge = require_edge(record, target)?;

        let mut patch = patch;
        patch.status = ActiveValue::Set(target.as_str().to_string());
        patch.updated_at = ActiveValue::Set(at);
        patch.version = ActiveValue::Set(record.version + 1);

        let mut events = vec![DomainEvent::StatusChanged {
            financing_id: record.id,
            from: record.status,
            to: target,
            actor,
        }];

        if target == FinancingStatus::Disbursed {
            patch.disbursed_at = ActiveValue::Set(Some(at));
            let installment_count = self.ensure_schedule(db_tx, record, at).await?;
            events.push(DomainEvent::FinancingDisbursed {
                financing_id: record.id,
                amount_minor: record.amount_minor,
                installments: installment_count,
            });
        }
        if target == FinancingStatus::Settled {
            events.push(DomainEvent::FinancingSettled {
                financing_id: record.id,
            });
        }

        let guarded = records::Entity::update_many()
            .set(patch)
            .filter(records::Column::Id.eq(record.id.to_string()))
            .filter(records::Column::Version.eq(record.version))
            .exec(db_tx)
            .await?;
        if guarded.rows_affected == 0 {
            return Err(EngineError::Conflict(format!(
                "financing {} was modified concurrently",
                record.id
            )));
        }

        let note = match actor {
            Actor::Admin => Some(match note {
                Some(note) => format!("admin override: {note}"),
                None => "admin override".to_string(),
            }),
            _ => note,
        };
        append_event(
            db_tx,
            TimelineEvent::new(record.id, at, actor, edge.action, note),
        )
        .await?;

        let model = self.require_financing(db_tx, record.id).await?;
        Ok((FinancingRecord::try_from(model)?, events))
    }

    /// Generate and persist the schedule if the record has none yet.
    /// Returns how many installments the record has afterwards.
    async fn ensure_schedule(
        &self,
        db_tx: &DatabaseTransaction,
        record: &FinancingRecord,
        disbursed_at: DateTime<Utc>,
    ) -> ResultEngine<usize> {
        let existing = installments::Entity::find()
            .filter(installments::Column::FinancingId.eq(record.id.to_string()))
            .count(db_tx)
            .await?;
        if existing > 0 {
            return Ok(existing as usize);
        }

        let rate = record
            .annual_rate_percent
            .unwrap_or(DEFAULT_ANNUAL_RATE_PERCENT);
        let rows = build_schedule(record.amount_minor, record.term_months, rate, disbursed_at)?;
        let actives: Vec<installments::ActiveModel> = rows
            .iter()
            .map(|row| (&Installment::from_row(record.id, row)).into())
            .collect();
        let count = actives.len();
        installments::Entity::insert_many(actives).exec(db_tx).await?;

        Ok(count)
    }

    /// Refresh `updated_at` and bump the version without a status change,
    /// for mutations of the aggregate below the record itself.
    pub(super) async fn bump_version(
        &self,
        db_tx: &DatabaseTransaction,
        record: &FinancingRecord,
        at: DateTime<Utc>,
    ) -> ResultEngine<FinancingRecord> {
        let guarded = records::Entity::update_many()
            .set(records::ActiveModel {
                updated_at: ActiveValue::Set(at),
                version: ActiveValue::Set(record.version + 1),
                ..Default::default()
            })
            .filter(records::Column::Id.eq(record.id.to_string()))
            .filter(records::Column::Version.eq(record.version))
            .exec(db_tx)
            .await?;
        if guarded.rows_affected == 0 {
            return Err(EngineError::Conflict(format!(
                "financing {} was modified concurrently",
                record.id
            )));
        }

        let model = self.require_financing(db_tx, record.id).await?;
        FinancingRecord::try_from(model)
    }
}

fn require_edge(record: &FinancingRecord, target: FinancingStatus) -> ResultEngine<status::Edge> {
    status::edge(record.status, target).ok_or_else(|| {
        EngineError::InvalidTransition(format!(
            "{} -> {} is not a legal edge",
            record.status.as_str(),
            target.as_str()
        ))
    })
}

pub(super) fn check_expected_version(
    record: &FinancingRecord,
    expected: Option<i64>,
) -> ResultEngine<()> {
    if let Some(expected) = expected
        && expected != record.version
    {
        return Err(EngineError::Conflict(format!(
            "financing {} is at version {}, caller expected {}",
            record.id, record.version, expected
        )));
    }
    Ok(())
}
