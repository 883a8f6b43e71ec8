//! Repayment schedule maths.
//!
//! Amortization is reducing balance with an equal total payment per period:
//! the monthly rate is `annual / 100 / 12`, the fixed payment is
//! `amount * r / (1 - (1 + r)^-n)`, and each row splits that payment into
//! interest on the remaining balance plus principal. At zero rate the
//! principal is divided equally. All amounts are integer minor units; the
//! final row absorbs the rounding remainder so the principal column always
//! sums exactly to the financed amount.

use chrono::{DateTime, Months, Utc};

use crate::{EngineError, ResultEngine};

/// Annual rate applied when the reviewer does not fix one.
pub const DEFAULT_ANNUAL_RATE_PERCENT: f64 = 5.5;

/// One computed repayment period, not yet persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleRow {
    /// 1-based period number.
    pub seq: i32,
    pub due_date: DateTime<Utc>,
    pub principal_minor: i64,
    pub interest_minor: i64,
}

/// Compute the repayment plan for a financing.
///
/// Produces exactly `term_months` rows, due monthly starting one month after
/// `from`.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use engine::build_schedule;
///
/// let from = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
/// let rows = build_schedule(120_000, 12, 0.0, from).unwrap();
/// assert_eq!(rows.len(), 12);
/// assert_eq!(rows.iter().map(|row| row.principal_minor).sum::<i64>(), 120_000);
/// ```
pub fn build_schedule(
    amount_minor: i64,
    term_months: i32,
    annual_rate_percent: f64,
    from: DateTime<Utc>,
) -> ResultEngine<Vec<ScheduleRow>> {
    if amount_minor <= 0 {
        return Err(EngineError::Validation(
            "financing amount must be positive".to_string(),
        ));
    }
    if term_months <= 0 {
        return Err(EngineError::Validation(
            "term must be at least one month".to_string(),
        ));
    }
    if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
        return Err(EngineError::Validation(
            "annual rate must be a non-negative percentage".to_string(),
        ));
    }

    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    let periods = term_months;
    let payment = if monthly_rate > 0.0 {
        let compound = (1.0 + monthly_rate).powi(-periods);
        amount_minor as f64 * monthly_rate / (1.0 - compound)
    } else {
        amount_minor as f64 / periods as f64
    };

    let mut rows = Vec::with_capacity(periods as usize);
    let mut remaining = amount_minor;
    for seq in 1..=periods {
        let due_date = from
            .checked_add_months(Months::new(seq as u32))
            .ok_or_else(|| EngineError::Validation("due date out of range".to_string()))?;

        let interest_exact = remaining as f64 * monthly_rate;
        let interest_minor = interest_exact.round() as i64;
        let principal_minor = if seq == periods {
            // Last row takes whatever balance is left after rounding.
            remaining
        } else {
            let exact = payment - interest_exact;
            (exact.round() as i64).clamp(0, remaining)
        };
        remaining -= principal_minor;

        rows.push(ScheduleRow {
            seq,
            due_date,
            principal_minor,
            interest_minor,
        });
    }

    Ok(rows)
}
