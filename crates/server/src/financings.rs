//! Financing lifecycle endpoints.

use api_types::financing::{
    FinancingDetailView, FinancingList, FinancingListResponse, FinancingNew, FinancingView,
    TimelineEventView, TransitionRequest,
};
use api_types::schedule::{InstallmentView, OverdueQuery, OverdueResponse, PaymentRequest};
use api_types::summary::{EarlySettlementQuery, EarlySettlementView, RepaymentSummaryView};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{FixedOffset, Utc};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{Caller, ServerState},
};
use engine::{
    Actor, ApplyCmd, EngineError, FinancingRecord, Installment, PaymentCmd, TimelineEvent,
    TransitionCmd,
};

pub(crate) fn map_status(status: engine::FinancingStatus) -> api_types::FinancingStatus {
    match status {
        engine::FinancingStatus::Applied => api_types::FinancingStatus::Applied,
        engine::FinancingStatus::Reviewing => api_types::FinancingStatus::Reviewing,
        engine::FinancingStatus::Approved => api_types::FinancingStatus::Approved,
        engine::FinancingStatus::Rejected => api_types::FinancingStatus::Rejected,
        engine::FinancingStatus::Returned => api_types::FinancingStatus::Returned,
        engine::FinancingStatus::Signed => api_types::FinancingStatus::Signed,
        engine::FinancingStatus::Disbursed => api_types::FinancingStatus::Disbursed,
        engine::FinancingStatus::Repaying => api_types::FinancingStatus::Repaying,
        engine::FinancingStatus::Settled => api_types::FinancingStatus::Settled,
    }
}

fn map_status_in(status: api_types::FinancingStatus) -> engine::FinancingStatus {
    match status {
        api_types::FinancingStatus::Applied => engine::FinancingStatus::Applied,
        api_types::FinancingStatus::Reviewing => engine::FinancingStatus::Reviewing,
        api_types::FinancingStatus::Approved => engine::FinancingStatus::Approved,
        api_types::FinancingStatus::Rejected => engine::FinancingStatus::Rejected,
        api_types::FinancingStatus::Returned => engine::FinancingStatus::Returned,
        api_types::FinancingStatus::Signed => engine::FinancingStatus::Signed,
        api_types::FinancingStatus::Disbursed => engine::FinancingStatus::Disbursed,
        api_types::FinancingStatus::Repaying => engine::FinancingStatus::Repaying,
        api_types::FinancingStatus::Settled => engine::FinancingStatus::Settled,
    }
}

fn map_actor(actor: Actor) -> api_types::ActorRole {
    match actor {
        Actor::Farmer => api_types::ActorRole::Farmer,
        Actor::Bank => api_types::ActorRole::Bank,
        Actor::Admin => api_types::ActorRole::Admin,
    }
}

fn map_installment_status(status: engine::InstallmentStatus) -> api_types::InstallmentStatus {
    match status {
        engine::InstallmentStatus::Pending => api_types::InstallmentStatus::Pending,
        engine::InstallmentStatus::Paid => api_types::InstallmentStatus::Paid,
        engine::InstallmentStatus::Overdue => api_types::InstallmentStatus::Overdue,
    }
}

pub(crate) fn utc() -> Result<FixedOffset, ServerError> {
    FixedOffset::east_opt(0).ok_or_else(|| ServerError::Generic("invalid UTC offset".to_string()))
}

pub(crate) fn financing_view(record: FinancingRecord, utc: FixedOffset) -> FinancingView {
    FinancingView {
        id: record.id,
        farmer_id: record.farmer_id,
        amount_minor: record.amount_minor,
        term_months: record.term_months,
        purpose: record.purpose,
        status: map_status(record.status),
        annual_rate_percent: record.annual_rate_percent,
        reviewer_id: record.reviewer_id,
        reviewed_at: record.reviewed_at.map(|dt| dt.with_timezone(&utc)),
        review_note: record.review_note,
        credit_score: record.credit_score,
        disbursed_at: record.disbursed_at.map(|dt| dt.with_timezone(&utc)),
        created_at: record.created_at.with_timezone(&utc),
        updated_at: record.updated_at.with_timezone(&utc),
        version: record.version,
    }
}

fn installment_view(installment: Installment, utc: FixedOffset) -> InstallmentView {
    InstallmentView {
        id: installment.id,
        seq: installment.seq,
        due_date: installment.due_date.with_timezone(&utc),
        principal_minor: installment.principal_minor,
        interest_minor: installment.interest_minor,
        status: map_installment_status(installment.status),
        paid_at: installment.paid_at.map(|dt| dt.with_timezone(&utc)),
    }
}

fn timeline_view(event: TimelineEvent, utc: FixedOffset) -> TimelineEventView {
    TimelineEventView {
        id: event.id,
        at: event.at.with_timezone(&utc),
        actor: map_actor(event.actor),
        action: event.action,
        note: event.note,
    }
}

pub async fn create(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Json(payload): Json<FinancingNew>,
) -> Result<(StatusCode, Json<FinancingView>), ServerError> {
    match caller.role {
        Actor::Farmer if caller.id != payload.farmer_id => {
            return Err(ServerError::Engine(EngineError::UnauthorizedActor(
                "farmers may only apply for themselves".to_string(),
            )));
        }
        Actor::Farmer | Actor::Admin => {}
        Actor::Bank => {
            return Err(ServerError::Engine(EngineError::UnauthorizedActor(
                "only farmers may submit applications".to_string(),
            )));
        }
    }

    let submitted_at = payload
        .submitted_at
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut cmd = ApplyCmd::new(
        payload.farmer_id,
        payload.amount_minor,
        payload.term_months,
        submitted_at,
    );
    if let Some(purpose) = payload.purpose {
        cmd = cmd.purpose(purpose);
    }

    let record = state.engine.apply(cmd).await?;

    let utc = utc()?;
    Ok((StatusCode::CREATED, Json(financing_view(record, utc))))
}

pub async fn list(
    State(state): State<ServerState>,
    Query(params): Query<FinancingList>,
) -> Result<Json<FinancingListResponse>, ServerError> {
    let Some(status) = params.status else {
        return Err(ServerError::Generic(
            "status query parameter is required".to_string(),
        ));
    };

    let records = state
        .engine
        .financings_by_status(map_status_in(status))
        .await?;

    let utc = utc()?;
    let financings = records
        .into_iter()
        .map(|record| financing_view(record, utc))
        .collect();
    Ok(Json(FinancingListResponse { financings }))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinancingDetailView>, ServerError> {
    let detail = state.engine.financing(id).await?;

    let utc = utc()?;
    let schedule = detail
        .schedule
        .into_iter()
        .map(|installment| installment_view(installment, utc))
        .collect();
    let timeline = detail
        .timeline
        .snapshot()
        .iter()
        .cloned()
        .map(|event| timeline_view(event, utc))
        .collect();

    Ok(Json(FinancingDetailView {
        financing: financing_view(detail.record, utc),
        schedule,
        timeline,
    }))
}

pub async fn transition(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<FinancingView>, ServerError> {
    let at = payload
        .at
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut cmd = TransitionCmd::new(id, map_status_in(payload.target), caller.role, at);
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(version) = payload.expected_version {
        cmd = cmd.expected_version(version);
    }

    let record = state.engine.transition(cmd).await?;

    let utc = utc()?;
    Ok(Json(financing_view(record, utc)))
}

pub async fn overdue(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Query(params): Query<OverdueQuery>,
) -> Result<Json<OverdueResponse>, ServerError> {
    let as_of = params
        .as_of
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let delinquent = state.engine.evaluate_overdue(id, as_of).await?;

    let utc = utc()?;
    let installments = delinquent
        .into_iter()
        .map(|installment| installment_view(installment, utc))
        .collect();
    Ok(Json(OverdueResponse { installments }))
}

pub async fn summary(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RepaymentSummaryView>, ServerError> {
    let summary = state.engine.repayment_summary(id).await?;

    let utc = utc()?;
    Ok(Json(RepaymentSummaryView {
        financing_id: summary.financing_id,
        total_principal_minor: summary.total_principal_minor,
        total_interest_minor: summary.total_interest_minor,
        paid_principal_minor: summary.paid_principal_minor,
        paid_interest_minor: summary.paid_interest_minor,
        remaining_principal_minor: summary.remaining_principal_minor(),
        remaining_interest_minor: summary.remaining_interest_minor(),
        installments_paid: summary.installments_paid as u64,
        installments_pending: summary.installments_pending as u64,
        installments_overdue: summary.installments_overdue as u64,
        next_due_date: summary.next_due_date.map(|dt| dt.with_timezone(&utc)),
    }))
}

pub async fn early_settlement(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Query(params): Query<EarlySettlementQuery>,
) -> Result<Json<EarlySettlementView>, ServerError> {
    let as_of = params
        .as_of
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let quote = state.engine.early_settlement_quote(id, as_of).await?;

    let utc = utc()?;
    Ok(Json(EarlySettlementView {
        financing_id: quote.financing_id,
        as_of: quote.as_of.with_timezone(&utc),
        remaining_principal_minor: quote.remaining_principal_minor,
        penalty_minor: quote.penalty_minor,
        interest_saved_minor: quote.interest_saved_minor,
        payoff_total_minor: quote.payoff_total_minor,
    }))
}

pub async fn pay(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    Path((id, installment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<FinancingView>, ServerError> {
    if caller.role == Actor::Farmer {
        return Err(ServerError::Engine(EngineError::UnauthorizedActor(
            "only the bank records repayments".to_string(),
        )));
    }

    let paid_at = payload
        .paid_at
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut cmd = PaymentCmd::new(id, installment_id, caller.role, paid_at);
    if let Some(version) = payload.expected_version {
        cmd = cmd.expected_version(version);
    }

    let record = state.engine.mark_installment_paid(cmd).await?;

    let utc = utc()?;
    Ok(Json(financing_view(record, utc)))
}
