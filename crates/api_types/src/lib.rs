use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the calling actor, carried in the `x-actor-role` header.
///
/// The server treats roles as:
/// - `farmer`: applies, resubmits, signs, pays.
/// - `bank`: reviews, decides, disburses, records repayment.
/// - `admin`: may force any legal edge; overrides are marked in the timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Farmer,
    Bank,
    Admin,
}

impl ActorRole {
    /// Returns the canonical role string used by the engine/database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Bank => "bank",
            Self::Admin => "admin",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancingStatus {
    Applied,
    Reviewing,
    Approved,
    Rejected,
    Returned,
    Signed,
    Disbursed,
    Repaying,
    Settled,
}

impl FinancingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
            Self::Signed => "signed",
            Self::Disbursed => "disbursed",
            Self::Repaying => "repaying",
            Self::Settled => "settled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
}

pub mod financing {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FinancingNew {
        pub farmer_id: String,
        /// Requested principal in minor units. Must be > 0.
        pub amount_minor: i64,
        pub term_months: i32,
        pub purpose: Option<String>,
        /// Optional: if absent, server uses now().
        pub submitted_at: Option<DateTime<FixedOffset>>,
    }

    /// Query parameters for listing financings.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct FinancingList {
        pub status: Option<FinancingStatus>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FinancingView {
        pub id: Uuid,
        pub farmer_id: String,
        pub amount_minor: i64,
        pub term_months: i32,
        pub purpose: Option<String>,
        pub status: FinancingStatus,
        pub annual_rate_percent: Option<f64>,
        pub reviewer_id: Option<String>,
        pub reviewed_at: Option<DateTime<FixedOffset>>,
        pub review_note: Option<String>,
        pub credit_score: Option<i32>,
        pub disbursed_at: Option<DateTime<FixedOffset>>,
        pub created_at: DateTime<FixedOffset>,
        pub updated_at: DateTime<FixedOffset>,
        /// Optimistic-lock version; echo it back as `expected_version`
        /// to detect concurrent edits.
        pub version: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FinancingListResponse {
        pub financings: Vec<FinancingView>,
    }

    /// A financing with its schedule and audit timeline.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct FinancingDetailView {
        pub financing: FinancingView,
        pub schedule: Vec<super::schedule::InstallmentView>,
        pub timeline: Vec<TimelineEventView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TimelineEventView {
        pub id: Uuid,
        pub at: DateTime<FixedOffset>,
        pub actor: ActorRole,
        pub action: String,
        pub note: Option<String>,
    }

    /// Request body for moving a financing along one lifecycle edge.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransitionRequest {
        pub target: FinancingStatus,
        pub note: Option<String>,
        /// Optional optimistic-lock guard; mismatch yields 409.
        pub expected_version: Option<i64>,
        /// Optional: if absent, server uses now().
        pub at: Option<DateTime<FixedOffset>>,
    }
}

pub mod schedule {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InstallmentView {
        pub id: Uuid,
        /// 1-based period number.
        pub seq: i32,
        pub due_date: DateTime<FixedOffset>,
        pub principal_minor: i64,
        pub interest_minor: i64,
        pub status: InstallmentStatus,
        pub paid_at: Option<DateTime<FixedOffset>>,
    }

    /// What-if schedule request; touches nothing.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SchedulePreview {
        pub amount_minor: i64,
        pub term_months: i32,
        /// Annual nominal rate in percent; server default applies when absent.
        pub annual_rate_percent: Option<f64>,
        pub from: DateTime<FixedOffset>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SchedulePreviewResponse {
        pub rows: Vec<PreviewRow>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PreviewRow {
        pub seq: i32,
        pub due_date: DateTime<FixedOffset>,
        pub principal_minor: i64,
        pub interest_minor: i64,
    }

    /// Query parameters for the overdue evaluation.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct OverdueQuery {
        /// Optional: if absent, server uses now().
        pub as_of: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OverdueResponse {
        pub installments: Vec<InstallmentView>,
    }

    /// Request body for recording an installment payment.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentRequest {
        /// Optional optimistic-lock guard; mismatch yields 409.
        pub expected_version: Option<i64>,
        /// Optional: if absent, server uses now().
        pub paid_at: Option<DateTime<FixedOffset>>,
    }
}

pub mod decision {
    use super::financing::FinancingView;
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
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
    }

    /// Request body for a review decision. The reviewer is taken from the
    /// `x-actor-id` header.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DecisionRequest {
        pub outcome: DecisionOutcome,
        pub note: Option<String>,
        /// Only meaningful on approval; server default applies when absent.
        pub annual_rate_percent: Option<f64>,
        pub credit_score: Option<i32>,
        /// Optional optimistic-lock guard; mismatch yields 409.
        pub expected_version: Option<i64>,
        /// Optional: if absent, server uses now().
        pub decided_at: Option<DateTime<FixedOffset>>,
    }

    /// Applications awaiting review, oldest first.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ApprovalQueueResponse {
        pub financings: Vec<FinancingView>,
    }
}

pub mod summary {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RepaymentSummaryView {
        pub financing_id: Uuid,
        pub total_principal_minor: i64,
        pub total_interest_minor: i64,
        pub paid_principal_minor: i64,
        pub paid_interest_minor: i64,
        pub remaining_principal_minor: i64,
        pub remaining_interest_minor: i64,
        pub installments_paid: u64,
        pub installments_pending: u64,
        pub installments_overdue: u64,
        pub next_due_date: Option<DateTime<FixedOffset>>,
    }

    /// Query parameters for the early-settlement quote.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EarlySettlementQuery {
        /// Optional: if absent, server uses now().
        pub as_of: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EarlySettlementView {
        pub financing_id: Uuid,
        pub as_of: DateTime<FixedOffset>,
        pub remaining_principal_minor: i64,
        /// Early-payoff penalty charged on the remaining principal.
        pub penalty_minor: i64,
        pub interest_saved_minor: i64,
        pub payoff_total_minor: i64,
    }
}

pub mod maintenance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OverdueSweep {
        /// Optional: if absent, server uses now().
        pub as_of: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OverdueSweepResponse {
        /// Installments flipped to `overdue` by this run.
        pub flipped: u64,
    }
}
