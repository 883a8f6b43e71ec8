//! Append-only audit trail of lifecycle events for a financing record.
//!
//! Entries are only ever appended, with a non-decreasing timestamp. Nothing
//! edits or removes an entry once written; settlement closes a record but
//! its history stays.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{Actor, EngineError, ResultEngine, util::parse_uuid};

/// One audit entry: who did what, when.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub financing_id: Uuid,
    pub at: DateTime<Utc>,
    pub actor: Actor,
    pub action: String,
    pub note: Option<String>,
}

impl TimelineEvent {
    pub fn new(
        financing_id: Uuid,
        at: DateTime<Utc>,
        actor: Actor,
        action: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            financing_id,
            at,
            actor,
            action: action.into(),
            note,
        }
    }
}

/// Ordered view over a record's audit entries.
///
/// The only mutation is [`append`], which rejects a timestamp earlier than
/// the current last entry.
///
/// [`append`]: Timeline::append
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    /// Wrap entries already ordered by `at` (as loaded from storage).
    pub fn from_ordered(events: Vec<TimelineEvent>) -> Self {
        Self { events }
    }

    pub fn append(&mut self, event: TimelineEvent) -> ResultEngine<()> {
        if let Some(last) = self.events.last()
            && event.at < last.at
        {
            return Err(EngineError::Validation(
                "timeline timestamps must not decrease".to_string(),
            ));
        }
        self.events.push(event);
        Ok(())
    }

    pub fn snapshot(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&TimelineEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "timeline_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub financing_id: String,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::records::Entity",
        from = "Column::FinancingId",
        to = "super::records::Column::Id"
    )]
    Financing,
}

impl Related<super::records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Financing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TimelineEvent> for ActiveModel {
    fn from(value: &TimelineEvent) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            financing_id: ActiveValue::Set(value.financing_id.to_string()),
            at: ActiveValue::Set(value.at),
            actor: ActiveValue::Set(value.actor.as_str().to_string()),
            action: ActiveValue::Set(value.action.clone()),
            note: ActiveValue::Set(value.note.clone()),
        }
    }
}

impl TryFrom<Model> for TimelineEvent {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        let actor = Actor::try_from(value.actor.as_str()).map_err(EngineError::Validation)?;

        Ok(Self {
            id: parse_uuid(&value.id, "timeline event")?,
            financing_id: parse_uuid(&value.financing_id, "financing")?,
            at: value.at,
            actor,
            action: value.action,
            note: value.note,
        })
    }
}
