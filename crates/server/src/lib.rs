use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{Caller, ServerState, run_with_listener, spawn_with_listener};

mod approvals;
mod financings;
mod maintenance;
mod schedules;
mod server;

pub mod types {
    pub mod financing {
        pub use api_types::financing::{
            FinancingDetailView, FinancingList, FinancingListResponse, FinancingNew,
            FinancingView, TimelineEventView, TransitionRequest,
        };
    }

    pub mod schedule {
        pub use api_types::schedule::{
            InstallmentView, OverdueQuery, OverdueResponse, PaymentRequest, PreviewRow,
            SchedulePreview, SchedulePreviewResponse,
        };
    }

    pub mod decision {
        pub use api_types::decision::{ApprovalQueueResponse, DecisionOutcome, DecisionRequest};
    }

    pub mod summary {
        pub use api_types::summary::{
            EarlySettlementQuery, EarlySettlementView, RepaymentSummaryView,
        };
    }

    pub mod maintenance {
        pub use api_types::maintenance::{OverdueSweep, OverdueSweepResponse};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidTransition(_) | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::UnauthorizedActor(_) => StatusCode::FORBIDDEN,
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
