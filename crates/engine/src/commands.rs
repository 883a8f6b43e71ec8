//! Command structs for engine operations.
//!
//! These types group parameters for write operations (apply, transition,
//! decision, payment), keeping call sites readable and avoiding long
//! argument lists. Timestamps are always passed in by the caller so tests
//! can pin the clock.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Actor, FinancingStatus};

/// Submit a new financing application.
#[derive(Clone, Debug)]
pub struct ApplyCmd {
    pub farmer_id: String,
    pub amount_minor: i64,
    pub term_months: i32,
    pub purpose: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl ApplyCmd {
    #[must_use]
    pub fn new(
        farmer_id: impl Into<String>,
        amount_minor: i64,
        term_months: i32,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            farmer_id: farmer_id.into(),
            amount_minor,
            term_months,
            purpose: None,
            submitted_at,
        }
    }

    #[must_use]
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// Move a record along one lifecycle edge.
#[derive(Clone, Debug)]
pub struct TransitionCmd {
    pub financing_id: Uuid,
    pub target: FinancingStatus,
    pub actor: Actor,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
    /// When set, the record version must still match at write time.
    pub expected_version: Option<i64>,
}

impl TransitionCmd {
    #[must_use]
    pub fn new(
        financing_id: Uuid,
        target: FinancingStatus,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            financing_id,
            target,
            actor,
            note: None,
            at,
            expected_version: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// What the reviewing officer decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionOutcome {
    Approve,
    Reject,
    Return,
}

impl DecisionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Return => "return",
        }
    }

    /// The lifecycle status the decision moves the record to.
    pub fn target(self) -> FinancingStatus {
        match self {
            Self::Approve => FinancingStatus::Approved,
            Self::Reject => FinancingStatus::Rejected,
            Self::Return => FinancingStatus::Returned,
        }
    }
}

impl TryFrom<&str> for DecisionOutcome {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "return" => Ok(Self::Return),
            _ => Err(format!("unknown decision outcome: {value}")),
        }
    }
}

/// Record a bank decision on a reviewed application.
#[derive(Clone, Debug)]
pub struct DecisionCmd {
    pub financing_id: Uuid,
    pub outcome: DecisionOutcome,
    pub reviewer_id: String,
    pub note: Option<String>,
    /// Annual rate fixed on approval; the default applies when unset.
    pub annual_rate_percent: Option<f64>,
    pub credit_score: Option<i32>,
    pub decided_at: DateTime<Utc>,
    pub expected_version: Option<i64>,
}

impl DecisionCmd {
    #[must_use]
    pub fn new(
        financing_id: Uuid,
        outcome: DecisionOutcome,
        reviewer_id: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            financing_id,
            outcome,
            reviewer_id: reviewer_id.into(),
            note: None,
            annual_rate_percent: None,
            credit_score: None,
            decided_at,
            expected_version: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn annual_rate_percent(mut self, rate: f64) -> Self {
        self.annual_rate_percent = Some(rate);
        self
    }

    #[must_use]
    pub fn credit_score(mut self, score: i32) -> Self {
        self.credit_score = Some(score);
        self
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Mark one installment as paid.
#[derive(Clone, Debug)]
pub struct PaymentCmd {
    pub financing_id: Uuid,
    pub installment_id: Uuid,
    pub actor: Actor,
    pub paid_at: DateTime<Utc>,
    pub expected_version: Option<i64>,
}

impl PaymentCmd {
    #[must_use]
    pub fn new(
        financing_id: Uuid,
        installment_id: Uuid,
        actor: Actor,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            financing_id,
            installment_id,
            actor,
            paid_at,
            expected_version: None,
        }
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}
