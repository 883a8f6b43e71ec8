//! Lifecycle states for a financing record and the actors allowed to move
//! between them.
//!
//! The graph is fixed:
//!
//! ```text
//! applied -> reviewing -> { approved | rejected | returned }
//! approved -> signed -> disbursed -> repaying -> settled
//! returned -> applied
//! ```
//!
//! `rejected` and `settled` are terminal. Every edge carries the single
//! non-admin actor allowed to trigger it; admins may force any edge, which
//! is recorded as an override on the timeline.

use serde::{Deserialize, Serialize};

/// Status of a financing record.
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

    /// A terminal record can never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Settled)
    }
}

impl TryFrom<&str> for FinancingStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "applied" => Ok(Self::Applied),
            "reviewing" => Ok(Self::Reviewing),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "returned" => Ok(Self::Returned),
            "signed" => Ok(Self::Signed),
            "disbursed" => Ok(Self::Disbursed),
            "repaying" => Ok(Self::Repaying),
            "settled" => Ok(Self::Settled),
            _ => Err(format!("unknown financing status: {value}")),
        }
    }
}

/// Who is acting on a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Farmer,
    Bank,
    Admin,
}

impl Actor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Bank => "bank",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Actor {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "farmer" => Ok(Self::Farmer),
            "bank" => Ok(Self::Bank),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("unknown actor: {value}")),
        }
    }
}

/// One legal edge of the lifecycle graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Timeline label recorded when the edge is taken.
    pub action: &'static str,
    /// The non-admin actor allowed to trigger the edge.
    pub actor: Actor,
}

/// Look up the edge between two statuses, if the graph contains one.
pub fn edge(from: FinancingStatus, to: FinancingStatus) -> Option<Edge> {
    use FinancingStatus::*;

    let (action, actor) = match (from, to) {
        (Applied, Reviewing) => ("review_started", Actor::Bank),
        (Reviewing, Approved) => ("approved", Actor::Bank),
        (Reviewing, Rejected) => ("rejected", Actor::Bank),
        (Reviewing, Returned) => ("returned", Actor::Bank),
        (Returned, Applied) => ("resubmitted", Actor::Farmer),
        (Approved, Signed) => ("contract_signed", Actor::Farmer),
        (Signed, Disbursed) => ("disbursed", Actor::Bank),
        (Disbursed, Repaying) => ("repayment_started", Actor::Bank),
        (Repaying, Settled) => ("settled", Actor::Bank),
        _ => return None,
    };
    Some(Edge { action, actor })
}

impl Edge {
    /// Admins may force any edge; everyone else only their own.
    pub fn allows(&self, actor: Actor) -> bool {
        actor == Actor::Admin || actor == self.actor
    }
}
