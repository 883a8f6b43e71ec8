use sea_orm::{ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, EventHub, Installment, ResultEngine, Timeline, TimelineEvent, installments,
    records, timeline,
};

mod applications;
mod lifecycle;
mod repayments;
mod scheduling;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The financing store and the operations over it.
///
/// All mutations run inside a transaction and go through the record's
/// version counter, so concurrent writers never both win.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    events: EventHub,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Domain events announced by this engine.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub(crate) async fn require_financing<C: ConnectionTrait>(
        &self,
        db: &C,
        financing_id: Uuid,
    ) -> ResultEngine<records::Model> {
        records::Entity::find_by_id(financing_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(financing_id.to_string()))
    }
}

pub(crate) async fn load_schedule<C: ConnectionTrait>(
    db: &C,
    financing_id: Uuid,
) -> ResultEngine<Vec<Installment>> {
    let models = installments::Entity::find()
        .filter(installments::Column::FinancingId.eq(financing_id.to_string()))
        .order_by_asc(installments::Column::Seq)
        .all(db)
        .await?;

    models.into_iter().map(Installment::try_from).collect()
}

pub(crate) async fn load_timeline<C: ConnectionTrait>(
    db: &C,
    financing_id: Uuid,
) -> ResultEngine<Timeline> {
    let models = timeline::Entity::find()
        .filter(timeline::Column::FinancingId.eq(financing_id.to_string()))
        .order_by_asc(timeline::Column::At)
        .all(db)
        .await?;

    let events = models
        .into_iter()
        .map(TimelineEvent::try_from)
        .collect::<ResultEngine<Vec<_>>>()?;
    Ok(Timeline::from_ordered(events))
}

/// Append one audit entry, enforcing the monotonic timestamp rule against
/// the latest persisted entry.
pub(crate) async fn append_event<C: ConnectionTrait>(
    db: &C,
    event: TimelineEvent,
) -> ResultEngine<()> {
    let last = timeline::Entity::find()
        .filter(timeline::Column::FinancingId.eq(event.financing_id.to_string()))
        .order_by_desc(timeline::Column::At)
        .one(db)
        .await?;

    let mut tail = Timeline::from_ordered(match last {
        Some(model) => vec![TimelineEvent::try_from(model)?],
        None => Vec::new(),
    });
    let active: timeline::ActiveModel = (&event).into();
    tail.append(event)?;
    active.insert(db).await?;

    Ok(())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            events: EventHub::new(),
        })
    }
}
