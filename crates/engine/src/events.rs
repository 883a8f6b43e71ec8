//! Domain events announced by the engine.
//!
//! Interested components (notifications, projections) subscribe to the hub;
//! the engine never blocks on them and never reaches into other stores to
//! apply side effects itself.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{Actor, FinancingStatus};

/// Buffered events per subscriber before a slow receiver starts lagging.
const EVENT_BUFFER: usize = 64;

/// Something that happened to a financing record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    FinancingApplied {
        financing_id: Uuid,
        farmer_id: String,
    },
    StatusChanged {
        financing_id: Uuid,
        from: FinancingStatus,
        to: FinancingStatus,
        actor: Actor,
    },
    FinancingDisbursed {
        financing_id: Uuid,
        amount_minor: i64,
        installments: usize,
    },
    InstallmentPaid {
        financing_id: Uuid,
        installment_id: Uuid,
        seq: i32,
    },
    FinancingSettled {
        financing_id: Uuid,
    },
    InstallmentsOverdue {
        count: u64,
    },
}

/// Fan-out hub for [`DomainEvent`].
///
/// Delivery is fire-and-forget: publishing never blocks, and events
/// published while nobody is subscribed are dropped.
#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Open a subscription; only events published from now on are received.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, event: DomainEvent) {
        // Send only errors when no receiver is subscribed.
        let _ = self.sender.send(event);
    }
}
