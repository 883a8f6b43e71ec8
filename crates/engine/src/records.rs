//! The financing record is the single source of truth for one loan: its
//! requested amount and term, lifecycle status, review and disbursement
//! metadata, and the optimistic-lock version every mutation must go
//! through. The schedule and timeline hang off it as child rows.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, FinancingStatus, Installment, ResultEngine, Timeline, util::parse_uuid,
};

/// One loan, from application to settlement.
#[derive(Clone, Debug, PartialEq)]
pub struct FinancingRecord {
    pub id: Uuid,
    /// Owning farmer, by reference only. The engine never resolves it.
    pub farmer_id: String,
    /// Requested principal in minor units. Immutable after disbursement.
    pub amount_minor: i64,
    /// Repayment term in months. Immutable after disbursement.
    pub term_months: i32,
    pub purpose: Option<String>,
    pub status: FinancingStatus,
    /// Fixed by the bank at approval; the default applies when left unset.
    pub annual_rate_percent: Option<f64>,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub credit_score: Option<i32>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock counter, incremented by every successful mutation.
    pub version: i64,
}

impl FinancingRecord {
    /// Build a fresh application in `applied` state.
    pub fn new(
        farmer_id: &str,
        amount_minor: i64,
        term_months: i32,
        purpose: Option<String>,
        submitted_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let farmer_id = farmer_id.trim();
        if farmer_id.is_empty() {
            return Err(EngineError::Validation(
                "farmer id must not be empty".to_string(),
            ));
        }
        if amount_minor <= 0 {
            return Err(EngineError::Validation(
                "financing amount must be positive".to_string(),
            ));
        }
        if term_months <= 0 {
            return Err(EngineError::Validation(
                "term must be at least one month".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            farmer_id: farmer_id.to_string(),
            amount_minor,
            term_months,
            purpose,
            status: FinancingStatus::Applied,
            annual_rate_percent: None,
            reviewer_id: None,
            reviewed_at: None,
            review_note: None,
            credit_score: None,
            disbursed_at: None,
            created_at: submitted_at,
            updated_at: submitted_at,
            version: 0,
        })
    }
}

/// A record together with its schedule and audit trail.
#[derive(Clone, Debug)]
pub struct FinancingDetail {
    pub record: FinancingRecord,
    /// Installments ordered by `seq`; empty until disbursement.
    pub schedule: Vec<Installment>,
    pub timeline: Timeline,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "financing_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub farmer_id: String,
    pub amount_minor: i64,
    pub term_months: i32,
    pub purpose: Option<String>,
    pub status: String,
    pub annual_rate_percent: Option<f64>,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub credit_score: Option<i32>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::installments::Entity")]
    Installments,
    #[sea_orm(has_many = "super::timeline::Entity")]
    TimelineEvents,
}

impl Related<super::installments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Installments.def()
    }
}

impl Related<super::timeline::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TimelineEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&FinancingRecord> for ActiveModel {
    fn from(value: &FinancingRecord) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            farmer_id: ActiveValue::Set(value.farmer_id.clone()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            term_months: ActiveValue::Set(value.term_months),
            purpose: ActiveValue::Set(value.purpose.clone()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            annual_rate_percent: ActiveValue::Set(value.annual_rate_percent),
            reviewer_id: ActiveValue::Set(value.reviewer_id.clone()),
            reviewed_at: ActiveValue::Set(value.reviewed_at),
            review_note: ActiveValue::Set(value.review_note.clone()),
            credit_score: ActiveValue::Set(value.credit_score),
            disbursed_at: ActiveValue::Set(value.disbursed_at),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
            version: ActiveValue::Set(value.version),
        }
    }
}

impl TryFrom<Model> for FinancingRecord {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let status =
            FinancingStatus::try_from(value.status.as_str()).map_err(EngineError::Validation)?;

        Ok(Self {
            id: parse_uuid(&value.id, "financing")?,
            farmer_id: value.farmer_id,
            amount_minor: value.amount_minor,
            term_months: value.term_months,
            purpose: value.purpose,
            status,
            annual_rate_percent: value.annual_rate_percent,
            reviewer_id: value.reviewer_id,
            reviewed_at: value.reviewed_at,
            review_note: value.review_note,
            credit_score: value.credit_score,
            disbursed_at: value.disbursed_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: value.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn new_record_starts_applied_at_version_zero() {
        let record =
            FinancingRecord::new("farmer-1", 200_000, 12, Some("equipment".to_string()), now())
                .unwrap();

        assert_eq!(record.status, FinancingStatus::Applied);
        assert_eq!(record.version, 0);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.disbursed_at.is_none());
    }

    #[test]
    fn rejects_blank_farmer() {
        let err = FinancingRecord::new("  ", 200_000, 12, None, now()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("farmer id must not be empty".to_string())
        );
    }

    #[test]
    fn rejects_non_positive_amount_and_term() {
        assert!(FinancingRecord::new("farmer-1", 0, 12, None, now()).is_err());
        assert!(FinancingRecord::new("farmer-1", -100, 12, None, now()).is_err());
        assert!(FinancingRecord::new("farmer-1", 200_000, 0, None, now()).is_err());
    }

    #[test]
    fn model_roundtrip_preserves_fields() {
        let record = FinancingRecord::new("farmer-1", 200_000, 12, None, now()).unwrap();
        let active: ActiveModel = (&record).into();
        let model = Model {
            id: active.id.unwrap(),
            farmer_id: active.farmer_id.unwrap(),
            amount_minor: active.amount_minor.unwrap(),
            term_months: active.term_months.unwrap(),
            purpose: active.purpose.unwrap(),
            status: active.status.unwrap(),
            annual_rate_percent: active.annual_rate_percent.unwrap(),
            reviewer_id: active.reviewer_id.unwrap(),
            reviewed_at: active.reviewed_at.unwrap(),
            review_note: active.review_note.unwrap(),
            credit_score: active.credit_score.unwrap(),
            disbursed_at: active.disbursed_at.unwrap(),
            created_at: active.created_at.unwrap(),
            updated_at: active.updated_at.unwrap(),
            version: active.version.unwrap(),
        };

        assert_eq!(FinancingRecord::try_from(model).unwrap(), record);
    }
}
