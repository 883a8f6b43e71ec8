//! Review queue and decision endpoints for the bank.

use api_types::decision::{ApprovalQueueResponse, DecisionRequest};
use api_types::financing::FinancingView;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    ServerError,
    financings::{financing_view, utc},
    server::{Caller, ServerState},
};
use engine::{Actor, DecisionCmd, DecisionOutcome, EngineError};

fn map_outcome(outcome: api_types::decision::DecisionOutcome) -> DecisionOutcome {
    match outcome {
        api_types::decision::DecisionOutcome::Approve => DecisionOutcome::Approve,
        api_types::decision::DecisionOutcome::Reject => DecisionOutcome::Reject,
        api_types::decision::DecisionOutcome::Return => DecisionOutcome::Return,
    }
}

pub async fn queue(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
) -> Result<Json<ApprovalQueueResponse>, ServerError> {
    if caller.role == Actor::Farmer {
        return Err(ServerError::Engine(EngineError::UnauthorizedActor(
            "the review queue is restricted to the bank".to_string(),
        )));
    }

    let records = state.engine.approval_queue().await?;

    let utc = utc()?;
    let financings = records
        .into_iter()
        .map(|record| financing_view(record, utc))
        .collect();
    Ok(Json(ApprovalQueueResponse { financings }))
}

pub async fn decision(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<FinancingView>, ServerError> {
    if caller.role == Actor::Farmer {
        return Err(ServerError::Engine(EngineError::UnauthorizedActor(
            "decisions are restricted to the bank".to_string(),
        )));
    }

    let decided_at = payload
        .decided_at
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut cmd = DecisionCmd::new(id, map_outcome(payload.outcome), caller.id, decided_at);
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(rate) = payload.annual_rate_percent {
        cmd = cmd.annual_rate_percent(rate);
    }
    if let Some(score) = payload.credit_score {
        cmd = cmd.credit_score(score);
    }
    if let Some(version) = payload.expected_version {
        cmd = cmd.expected_version(version);
    }

    let record = state.engine.decide(cmd).await?;

    let utc = utc()?;
    Ok(Json(financing_view(record, utc)))
}
