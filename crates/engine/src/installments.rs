//! Scheduled repayment periods of a disbursed financing.
//!
//! An installment is delinquent when its due date has passed without
//! payment. That is a derived property of `due_date` and the clock; the
//! stored `overdue` status is only materialized by the reconciliation
//! sweep, never by readers.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, schedule::ScheduleRow, util::parse_uuid};

/// Payment state of a single installment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
}

impl InstallmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl TryFrom<&str> for InstallmentStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            _ => Err(format!("unknown installment status: {value}")),
        }
    }
}

/// One scheduled repayment period.
#[derive(Clone, Debug, PartialEq)]
pub struct Installment {
    pub id: Uuid,
    pub financing_id: Uuid,
    /// 1-based period number, unique per financing.
    pub seq: i32,
    pub due_date: DateTime<Utc>,
    pub principal_minor: i64,
    pub interest_minor: i64,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    /// Materialize a computed schedule row for a financing.
    pub fn from_row(financing_id: Uuid, row: &ScheduleRow) -> Self {
        Self {
            id: Uuid::new_v4(),
            financing_id,
            seq: row.seq,
            due_date: row.due_date,
            principal_minor: row.principal_minor,
            interest_minor: row.interest_minor,
            status: InstallmentStatus::Pending,
            paid_at: None,
        }
    }

    /// Due date has passed and the installment is not paid.
    pub fn is_delinquent(&self, as_of: DateTime<Utc>) -> bool {
        self.status != InstallmentStatus::Paid && self.due_date < as_of
    }
}

/// Totals over a financing's schedule, for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepaymentSummary {
    pub financing_id: Uuid,
    pub total_principal_minor: i64,
    pub total_interest_minor: i64,
    pub paid_principal_minor: i64,
    pub paid_interest_minor: i64,
    pub installments_paid: usize,
    pub installments_pending: usize,
    pub installments_overdue: usize,
    pub next_due_date: Option<DateTime<Utc>>,
}

impl RepaymentSummary {
    /// Fold a schedule (ordered by `seq`) into totals.
    pub fn from_installments(financing_id: Uuid, installments: &[Installment]) -> Self {
        let mut summary = Self {
            financing_id,
            total_principal_minor: 0,
            total_interest_minor: 0,
            paid_principal_minor: 0,
            paid_interest_minor: 0,
            installments_paid: 0,
            installments_pending: 0,
            installments_overdue: 0,
            next_due_date: None,
        };

        for installment in installments {
            summary.total_principal_minor += installment.principal_minor;
            summary.total_interest_minor += installment.interest_minor;
            match installment.status {
                InstallmentStatus::Paid => {
                    summary.installments_paid += 1;
                    summary.paid_principal_minor += installment.principal_minor;
                    summary.paid_interest_minor += installment.interest_minor;
                }
                InstallmentStatus::Pending => summary.installments_pending += 1,
                InstallmentStatus::Overdue => summary.installments_overdue += 1,
            }
            if installment.status != InstallmentStatus::Paid && summary.next_due_date.is_none() {
                summary.next_due_date = Some(installment.due_date);
            }
        }

        summary
    }

    pub fn remaining_principal_minor(&self) -> i64 {
        self.total_principal_minor - self.paid_principal_minor
    }

    pub fn remaining_interest_minor(&self) -> i64 {
        self.total_interest_minor - self.paid_interest_minor
    }
}

/// Early-payoff penalty, in basis points of the remaining principal.
pub const EARLY_SETTLEMENT_PENALTY_BPS: i64 = 100;

/// What settling a financing ahead of schedule would cost right now.
///
/// Paying off early clears the remaining principal plus a penalty, and
/// saves the interest the remaining schedule would have charged.
#[derive(Clone, Debug, PartialEq)]
pub struct EarlySettlementQuote {
    pub financing_id: Uuid,
    pub as_of: DateTime<Utc>,
    pub remaining_principal_minor: i64,
    pub penalty_minor: i64,
    pub interest_saved_minor: i64,
    pub payoff_total_minor: i64,
}

impl EarlySettlementQuote {
    pub fn from_installments(
        financing_id: Uuid,
        installments: &[Installment],
        as_of: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if installments.is_empty() {
            return Err(EngineError::Validation(
                "financing has no repayment schedule".to_string(),
            ));
        }

        let mut remaining_principal_minor = 0;
        let mut interest_saved_minor = 0;
        for installment in installments {
            if installment.status != InstallmentStatus::Paid {
                remaining_principal_minor += installment.principal_minor;
                interest_saved_minor += installment.interest_minor;
            }
        }
        let penalty_minor = remaining_principal_minor * EARLY_SETTLEMENT_PENALTY_BPS / 10_000;

        Ok(Self {
            financing_id,
            as_of,
            remaining_principal_minor,
            penalty_minor,
            interest_saved_minor,
            payoff_total_minor: remaining_principal_minor + penalty_minor,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "installments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub financing_id: String,
    pub seq: i32,
    pub due_date: DateTime<Utc>,
    pub principal_minor: i64,
    pub interest_minor: i64,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::records::Entity",
        from = "Column::FinancingId",
        to = "super::records::Column::Id"
    )]
    Financing,
}

impl Related<super::records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Financing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Installment> for ActiveModel {
    fn from(value: &Installment) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            financing_id: ActiveValue::Set(value.financing_id.to_string()),
            seq: ActiveValue::Set(value.seq),
            due_date: ActiveValue::Set(value.due_date),
            principal_minor: ActiveValue::Set(value.principal_minor),
            interest_minor: ActiveValue::Set(value.interest_minor),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            paid_at: ActiveValue::Set(value.paid_at),
        }
    }
}

impl TryFrom<Model> for Installment {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let status =
            InstallmentStatus::try_from(value.status.as_str()).map_err(EngineError::Validation)?;

        Ok(Self {
            id: parse_uuid(&value.id, "installment")?,
            financing_id: parse_uuid(&value.financing_id, "financing")?,
            seq: value.seq,
            due_date: value.due_date,
            principal_minor: value.principal_minor,
            interest_minor: value.interest_minor,
            status,
            paid_at: value.paid_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn installment(seq: i32, day: u32, status: InstallmentStatus) -> Installment {
        Installment {
            id: Uuid::new_v4(),
            financing_id: Uuid::new_v4(),
            seq,
            due_date: Utc.with_ymd_and_hms(2026, 4, day, 0, 0, 0).unwrap(),
            principal_minor: 10_000,
            interest_minor: 250,
            status,
            paid_at: None,
        }
    }

    #[test]
    fn delinquency_ignores_paid_rows() {
        let as_of = Utc.with_ymd_and_hms(2026, 4, 20, 0, 0, 0).unwrap();

        assert!(installment(1, 10, InstallmentStatus::Pending).is_delinquent(as_of));
        assert!(installment(1, 10, InstallmentStatus::Overdue).is_delinquent(as_of));
        assert!(!installment(1, 10, InstallmentStatus::Paid).is_delinquent(as_of));
        assert!(!installment(1, 25, InstallmentStatus::Pending).is_delinquent(as_of));
    }

    #[test]
    fn summary_splits_paid_and_open() {
        let financing_id = Uuid::new_v4();
        let rows = vec![
            installment(1, 5, InstallmentStatus::Paid),
            installment(2, 10, InstallmentStatus::Overdue),
            installment(3, 15, InstallmentStatus::Pending),
        ];

        let summary = RepaymentSummary::from_installments(financing_id, &rows);

        assert_eq!(summary.total_principal_minor, 30_000);
        assert_eq!(summary.paid_principal_minor, 10_000);
        assert_eq!(summary.remaining_principal_minor(), 20_000);
        assert_eq!(summary.installments_paid, 1);
        assert_eq!(summary.installments_overdue, 1);
        assert_eq!(summary.installments_pending, 1);
        assert_eq!(summary.next_due_date, Some(rows[1].due_date));
    }

    #[test]
    fn quote_charges_penalty_on_open_principal() {
        let financing_id = Uuid::new_v4();
        let rows = vec![
            installment(1, 5, InstallmentStatus::Paid),
            installment(2, 10, InstallmentStatus::Pending),
            installment(3, 15, InstallmentStatus::Pending),
        ];
        let as_of = Utc.with_ymd_and_hms(2026, 4, 8, 0, 0, 0).unwrap();

        let quote = EarlySettlementQuote::from_installments(financing_id, &rows, as_of).unwrap();

        assert_eq!(quote.remaining_principal_minor, 20_000);
        // 1% of the open principal.
        assert_eq!(quote.penalty_minor, 200);
        assert_eq!(quote.interest_saved_minor, 500);
        assert_eq!(quote.payoff_total_minor, 20_200);
    }

    #[test]
    fn quote_requires_a_schedule() {
        let err = EarlySettlementQuote::from_installments(
            Uuid::new_v4(),
            &[],
            Utc.with_ymd_and_hms(2026, 4, 8, 0, 0, 0).unwrap(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            EngineError::Validation("financing has no repayment schedule".to_string())
        );
    }
}
