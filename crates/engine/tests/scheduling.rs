use chrono::{DateTime, Months, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    Actor, ApplyCmd, DEFAULT_ANNUAL_RATE_PERCENT, DecisionCmd, DecisionOutcome, Engine,
    EngineError, FinancingStatus, InstallmentStatus, PaymentCmd, TransitionCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

async fn approved(engine: &Engine, rate: Option<f64>) -> Uuid {
    let record = engine
        .apply(ApplyCmd::new("farmer-1", 120_000, 12, ts(1, 8)))
        .await
        .unwrap();
    engine
        .transition(TransitionCmd::new(
            record.id,
            FinancingStatus::Reviewing,
            Actor::Bank,
            ts(1, 9),
        ))
        .await
        .unwrap();
    let mut cmd = DecisionCmd::new(record.id, DecisionOutcome::Approve, "officer-7", ts(1, 10));
    if let Some(rate) = rate {
        cmd = cmd.annual_rate_percent(rate);
    }
    engine.decide(cmd).await.unwrap();
    record.id
}

async fn signed(engine: &Engine, rate: Option<f64>) -> Uuid {
    let id = approved(engine, rate).await;
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Signed,
            Actor::Farmer,
            ts(2, 9),
        ))
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn disbursement_generates_the_schedule() {
    let (engine, _db) = engine_with_db().await;
    let id = signed(&engine, Some(6.0)).await;

    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Disbursed,
            Actor::Bank,
            ts(3, 9),
        ))
        .await
        .unwrap();

    let schedule = engine.financing(id).await.unwrap().schedule;
    assert_eq!(schedule.len(), 12);
    assert_eq!(
        schedule.iter().map(|i| i.principal_minor).sum::<i64>(),
        120_000
    );
    assert_eq!(
        schedule.iter().map(|i| i.seq).collect::<Vec<_>>(),
        (1..=12).collect::<Vec<_>>()
    );
    assert_eq!(
        schedule[0].due_date,
        ts(3, 9).checked_add_months(Months::new(1)).unwrap()
    );
    assert!(
        schedule
            .iter()
            .all(|i| i.status == InstallmentStatus::Pending)
    );
}

#[tokio::test]
async fn explicit_generation_requires_an_approved_record() {
    let (engine, _db) = engine_with_db().await;
    let record = engine
        .apply(ApplyCmd::new("farmer-1", 120_000, 12, ts(1, 8)))
        .await
        .unwrap();

    let err = engine
        .generate_schedule(record.id, None, false, ts(1, 9))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("schedule requires an approved financing".to_string())
    );
}

#[tokio::test]
async fn generation_persists_the_rate_used() {
    let (engine, _db) = engine_with_db().await;

    // An admin-forced approval stores no rate, so generation falls back to
    // the default and pins it on the record.
    let record = engine
        .apply(ApplyCmd::new("farmer-1", 120_000, 12, ts(1, 8)))
        .await
        .unwrap();
    engine
        .transition(TransitionCmd::new(
            record.id,
            FinancingStatus::Reviewing,
            Actor::Bank,
            ts(1, 9),
        ))
        .await
        .unwrap();
    engine
        .transition(TransitionCmd::new(
            record.id,
            FinancingStatus::Approved,
            Actor::Admin,
            ts(1, 10),
        ))
        .await
        .unwrap();

    let schedule = engine
        .generate_schedule(record.id, None, false, ts(2, 9))
        .await
        .unwrap();
    assert_eq!(schedule.len(), 12);

    let updated = engine.financing(record.id).await.unwrap().record;
    assert_eq!(
        updated.annual_rate_percent,
        Some(DEFAULT_ANNUAL_RATE_PERCENT)
    );
}

#[tokio::test]
async fn second_generation_requires_overwrite() {
    let (engine, _db) = engine_with_db().await;
    let id = approved(&engine, Some(6.0)).await;

    engine
        .generate_schedule(id, None, false, ts(2, 9))
        .await
        .unwrap();
    let err = engine
        .generate_schedule(id, None, false, ts(2, 10))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("schedule already exists; pass overwrite to replace it".to_string())
    );

    let replaced = engine
        .generate_schedule(id, Some(9.0), true, ts(2, 10))
        .await
        .unwrap();
    assert_eq!(replaced.len(), 12);

    let detail = engine.financing(id).await.unwrap();
    assert_eq!(detail.record.annual_rate_percent, Some(9.0));
    // The old plan is gone, not appended to.
    assert_eq!(detail.schedule.len(), 12);
}

#[tokio::test]
async fn paid_schedules_are_never_replaced() {
    let (engine, _db) = engine_with_db().await;
    let id = signed(&engine, Some(6.0)).await;
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Disbursed,
            Actor::Bank,
            ts(3, 9),
        ))
        .await
        .unwrap();
    let schedule = engine.financing(id).await.unwrap().schedule;
    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(3, 10)))
        .await
        .unwrap();

    let err = engine
        .generate_schedule(id, None, true, ts(3, 11))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("cannot replace a schedule with recorded payments".to_string())
    );
}

#[tokio::test]
async fn disbursement_keeps_a_pregenerated_plan() {
    let (engine, _db) = engine_with_db().await;
    let id = signed(&engine, Some(6.0)).await;

    let planned = engine
        .generate_schedule(id, None, false, ts(2, 10))
        .await
        .unwrap();
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Disbursed,
            Actor::Bank,
            ts(10, 9),
        ))
        .await
        .unwrap();

    let schedule = engine.financing(id).await.unwrap().schedule;
    assert_eq!(schedule.len(), planned.len());
    // Anchored at generation time, not at disbursement.
    assert_eq!(schedule[0].id, planned[0].id);
    assert_eq!(schedule[0].due_date, planned[0].due_date);
}

#[tokio::test]
async fn generation_rejects_bad_rates() {
    let (engine, _db) = engine_with_db().await;
    let id = approved(&engine, None).await;

    let err = engine
        .generate_schedule(id, Some(-1.0), false, ts(2, 9))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("annual rate must be a non-negative percentage".to_string())
    );
}

#[tokio::test]
async fn generation_bumps_the_version() {
    let (engine, _db) = engine_with_db().await;
    let id = approved(&engine, Some(6.0)).await;

    let before = engine.financing(id).await.unwrap().record.version;
    engine
        .generate_schedule(id, None, false, ts(2, 9))
        .await
        .unwrap();
    let after = engine.financing(id).await.unwrap().record.version;
    assert_eq!(after, before + 1);
}
