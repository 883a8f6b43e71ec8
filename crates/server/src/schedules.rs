//! Stateless schedule preview, for quoting terms before an application
//! exists.

use api_types::schedule::{PreviewRow, SchedulePreview, SchedulePreviewResponse};
use axum::Json;
use chrono::Utc;

use crate::{ServerError, financings::utc};
use engine::{DEFAULT_ANNUAL_RATE_PERCENT, build_schedule};

pub async fn preview(
    Json(payload): Json<SchedulePreview>,
) -> Result<Json<SchedulePreviewResponse>, ServerError> {
    let rate = payload
        .annual_rate_percent
        .unwrap_or(DEFAULT_ANNUAL_RATE_PERCENT);
    let from = payload.from.with_timezone(&Utc);

    let schedule = build_schedule(payload.amount_minor, payload.term_months, rate, from)?;

    let utc = utc()?;
    let rows = schedule
        .into_iter()
        .map(|row| PreviewRow {
            seq: row.seq,
            due_date: row.due_date.with_timezone(&utc),
            principal_minor: row.principal_minor,
            interest_minor: row.interest_minor,
        })
        .collect();
    Ok(Json(SchedulePreviewResponse { rows }))
}
