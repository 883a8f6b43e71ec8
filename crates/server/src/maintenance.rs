//! Maintenance endpoints, run by operators or a scheduler.

use api_types::maintenance::{OverdueSweep, OverdueSweepResponse};
use axum::{Extension, Json, extract::State};
use chrono::Utc;

use crate::{
    ServerError,
    server::{Caller, ServerState},
};
use engine::{Actor, EngineError};

pub async fn overdue_sweep(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Json(payload): Json<OverdueSweep>,
) -> Result<Json<OverdueSweepResponse>, ServerError> {
    if caller.role == Actor::Farmer {
        return Err(ServerError::Engine(EngineError::UnauthorizedActor(
            "the overdue sweep is restricted to the bank".to_string(),
        )));
    }

    let as_of = payload
        .as_of
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let flipped = state.engine.reconcile_overdue(as_of).await?;
    Ok(Json(OverdueSweepResponse { flipped }))
}
