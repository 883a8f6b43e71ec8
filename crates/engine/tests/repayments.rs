use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    Actor, ApplyCmd, DecisionCmd, DecisionOutcome, DomainEvent, EARLY_SETTLEMENT_PENALTY_BPS,
    Engine, EngineError, FinancingStatus, Installment, InstallmentStatus, PaymentCmd,
    TransitionCmd,
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

fn ts(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, 9, 0, 0).unwrap()
}

/// Walk a fresh application to `disbursed`; installments fall due on the
/// 5th of each month starting in April.
async fn disbursed(
    engine: &Engine,
    amount_minor: i64,
    term_months: i32,
) -> (Uuid, Vec<Installment>) {
    let record = engine
        .apply(ApplyCmd::new("farmer-1", amount_minor, term_months, ts(3, 1)))
        .await
        .unwrap();
    let id = record.id;
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Reviewing,
            Actor::Bank,
            ts(3, 2),
        ))
        .await
        .unwrap();
    engine
        .decide(
            DecisionCmd::new(id, DecisionOutcome::Approve, "officer-7", ts(3, 3))
                .annual_rate_percent(6.0),
        )
        .await
        .unwrap();
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Signed,
            Actor::Farmer,
            ts(3, 4),
        ))
        .await
        .unwrap();
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Disbursed,
            Actor::Bank,
            ts(3, 5),
        ))
        .await
        .unwrap();

    let schedule = engine.financing(id).await.unwrap().schedule;
    (id, schedule)
}

#[tokio::test]
async fn repeated_payment_is_a_no_op() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 90_000, 3).await;

    let first = engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 1)))
        .await
        .unwrap();
    assert_eq!(first.status, FinancingStatus::Repaying);

    let again = engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 2)))
        .await
        .unwrap();
    assert_eq!(again.version, first.version);

    let detail = engine.financing(id).await.unwrap();
    assert_eq!(detail.timeline.len(), 5);
    // Original payment timestamp survives the repeat.
    assert_eq!(detail.schedule[0].paid_at, Some(ts(4, 1)));
}

#[tokio::test]
async fn payments_need_a_disbursed_record() {
    let (engine, _db) = engine_with_db().await;

    let record = engine
        .apply(ApplyCmd::new("farmer-1", 90_000, 3, ts(3, 1)))
        .await
        .unwrap();
    let id = record.id;
    engine
        .transition(TransitionCmd::new(
            id,
            FinancingStatus::Reviewing,
            Actor::Bank,
            ts(3, 2),
        ))
        .await
        .unwrap();
    engine
        .decide(DecisionCmd::new(
            id,
            DecisionOutcome::Approve,
            "officer-7",
            ts(3, 3),
        ))
        .await
        .unwrap();
    let planned = engine
        .generate_schedule(id, None, false, ts(3, 4))
        .await
        .unwrap();

    let err = engine
        .mark_installment_paid(PaymentCmd::new(id, planned[0].id, Actor::Bank, ts(4, 1)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("installments can only be paid after disbursement".to_string())
    );
}

#[tokio::test]
async fn last_payment_settles_the_record() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 60_000, 2).await;

    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 1)))
        .await
        .unwrap();
    let settled = engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[1].id, Actor::Bank, ts(5, 1)))
        .await
        .unwrap();
    assert_eq!(settled.status, FinancingStatus::Settled);

    let summary = engine.repayment_summary(id).await.unwrap();
    assert_eq!(summary.installments_paid, 2);
    assert_eq!(summary.remaining_principal_minor(), 0);
    assert_eq!(summary.remaining_interest_minor(), 0);
    assert_eq!(summary.next_due_date, None);

    let actions: Vec<&str> = engine
        .financing(id)
        .await
        .unwrap()
        .timeline
        .snapshot()
        .iter()
        .map(|event| event.action.as_str())
        .collect();
    assert!(actions.contains(&"repayment_started"));
    assert!(actions.contains(&"settled"));
}

#[tokio::test]
async fn unknown_installments_are_not_found() {
    let (engine, _db) = engine_with_db().await;
    let (id, _) = disbursed(&engine, 90_000, 3).await;

    let err = engine
        .mark_installment_paid(PaymentCmd::new(id, Uuid::new_v4(), Actor::Bank, ts(4, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // An installment of another financing does not leak through.
    let (_, other_schedule) = disbursed(&engine, 50_000, 2).await;
    let err = engine
        .mark_installment_paid(PaymentCmd::new(
            id,
            other_schedule[0].id,
            Actor::Bank,
            ts(4, 1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn stale_payment_version_conflicts() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 90_000, 3).await;

    let err = engine
        .mark_installment_paid(
            PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 1)).expected_version(0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let detail = engine.financing(id).await.unwrap();
    assert_eq!(detail.schedule[0].status, InstallmentStatus::Pending);
}

#[tokio::test]
async fn evaluate_overdue_is_a_pure_read() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 90_000, 3).await;

    let due = engine.evaluate_overdue(id, ts(5, 20)).await.unwrap();
    assert_eq!(due.iter().map(|i| i.seq).collect::<Vec<_>>(), vec![1, 2]);

    // Nothing was written.
    let detail = engine.financing(id).await.unwrap();
    assert!(
        detail
            .schedule
            .iter()
            .all(|i| i.status == InstallmentStatus::Pending)
    );
    assert_eq!(detail.record.status, FinancingStatus::Disbursed);

    // Paid rows stop being delinquent.
    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 6)))
        .await
        .unwrap();
    let due = engine.evaluate_overdue(id, ts(5, 20)).await.unwrap();
    assert_eq!(due.iter().map(|i| i.seq).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn reconcile_overdue_materializes_status() {
    let (engine, _db) = engine_with_db().await;
    let (first, _) = disbursed(&engine, 90_000, 3).await;
    let (second, _) = disbursed(&engine, 50_000, 2).await;
    let mut events = engine.events().subscribe();

    let flipped = engine.reconcile_overdue(ts(4, 20)).await.unwrap();
    assert_eq!(flipped, 2);

    for id in [first, second] {
        let detail = engine.financing(id).await.unwrap();
        assert_eq!(detail.record.status, FinancingStatus::Repaying);
        assert_eq!(detail.schedule[0].status, InstallmentStatus::Overdue);
        assert_eq!(detail.schedule[1].status, InstallmentStatus::Pending);
    }

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen.last(),
        Some(&DomainEvent::InstallmentsOverdue { count: flipped })
    );

    // A second run has nothing left to do.
    assert_eq!(engine.reconcile_overdue(ts(4, 20)).await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_ignores_records_outside_repayment() {
    let (engine, _db) = engine_with_db().await;

    let record = engine
        .apply(ApplyCmd::new("farmer-9", 10_000, 1, ts(3, 1)))
        .await
        .unwrap();

    assert_eq!(engine.reconcile_overdue(ts(12, 1)).await.unwrap(), 0);

    let untouched = engine.financing(record.id).await.unwrap();
    assert_eq!(untouched.record.status, FinancingStatus::Applied);
    assert_eq!(untouched.record.version, 0);
}

#[tokio::test]
async fn sweep_leaves_paid_rows_alone() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 60_000, 2).await;

    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 1)))
        .await
        .unwrap();

    // First row paid, second not yet due: nothing to flip.
    assert_eq!(engine.reconcile_overdue(ts(4, 20)).await.unwrap(), 0);

    let detail = engine.financing(id).await.unwrap();
    assert_eq!(detail.schedule[0].status, InstallmentStatus::Paid);
    assert_eq!(detail.schedule[1].status, InstallmentStatus::Pending);
}

#[tokio::test]
async fn summary_tracks_progress() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 100_000, 4).await;

    let before = engine.repayment_summary(id).await.unwrap();
    assert_eq!(before.total_principal_minor, 100_000);
    assert_eq!(before.installments_pending, 4);
    assert_eq!(before.installments_paid, 0);
    assert_eq!(before.next_due_date, Some(schedule[0].due_date));

    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 6)))
        .await
        .unwrap();

    let after = engine.repayment_summary(id).await.unwrap();
    assert_eq!(after.installments_paid, 1);
    assert_eq!(after.paid_principal_minor, schedule[0].principal_minor);
    assert_eq!(
        after.remaining_principal_minor(),
        100_000 - schedule[0].principal_minor
    );
    assert_eq!(after.next_due_date, Some(schedule[1].due_date));
}

#[tokio::test]
async fn early_settlement_quote_charges_the_penalty() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 100_000, 4).await;
    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 6)))
        .await
        .unwrap();

    let quote = engine.early_settlement_quote(id, ts(4, 10)).await.unwrap();
    let open_principal: i64 = schedule[1..].iter().map(|i| i.principal_minor).sum();
    let open_interest: i64 = schedule[1..].iter().map(|i| i.interest_minor).sum();
    assert_eq!(quote.remaining_principal_minor, open_principal);
    assert_eq!(
        quote.penalty_minor,
        open_principal * EARLY_SETTLEMENT_PENALTY_BPS / 10_000
    );
    assert_eq!(quote.interest_saved_minor, open_interest);
    assert_eq!(quote.payoff_total_minor, open_principal + quote.penalty_minor);
}

#[tokio::test]
async fn quotes_require_a_schedule() {
    let (engine, _db) = engine_with_db().await;

    let bare = engine
        .apply(ApplyCmd::new("farmer-2", 10_000, 2, ts(3, 1)))
        .await
        .unwrap();
    let err = engine
        .early_settlement_quote(bare.id, ts(4, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn payment_events_are_published() {
    let (engine, _db) = engine_with_db().await;
    let (id, schedule) = disbursed(&engine, 60_000, 2).await;
    let mut events = engine.events().subscribe();

    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[0].id, Actor::Bank, ts(4, 6)))
        .await
        .unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        DomainEvent::InstallmentPaid { seq: 1, .. }
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        DomainEvent::StatusChanged {
            to: FinancingStatus::Repaying,
            ..
        }
    ));

    engine
        .mark_installment_paid(PaymentCmd::new(id, schedule[1].id, Actor::Bank, ts(5, 6)))
        .await
        .unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        DomainEvent::InstallmentPaid { seq: 2, .. }
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        DomainEvent::StatusChanged {
            to: FinancingStatus::Settled,
            ..
        }
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        DomainEvent::FinancingSettled { .. }
    ));
}
