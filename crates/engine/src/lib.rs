//! Financing lifecycle engine: one record per loan application, a fixed
//! status graph, amortized repayment schedules and an append-only audit
//! timeline, persisted behind optimistically versioned operations.

pub use commands::{ApplyCmd, DecisionCmd, DecisionOutcome, PaymentCmd, TransitionCmd};
pub use error::EngineError;
pub use events::{DomainEvent, EventHub};
pub use installments::{
    EARLY_SETTLEMENT_PENALTY_BPS, EarlySettlementQuote, Installment, InstallmentStatus,
    RepaymentSummary,
};
pub use ops::{Engine, EngineBuilder};
pub use records::{FinancingDetail, FinancingRecord};
pub use schedule::{DEFAULT_ANNUAL_RATE_PERCENT, ScheduleRow, build_schedule};
pub use status::{Actor, Edge, FinancingStatus, edge};
pub use timeline::{Timeline, TimelineEvent};

mod commands;
mod error;
mod events;
mod installments;
mod ops;
mod records;
mod schedule;
mod status;
mod timeline;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
