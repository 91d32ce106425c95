//! Typed event bus owned by the orchestrator
//!
//! Handlers subscribe to one [`EventKind`] and are removed with the
//! [`SubscriptionId`] they were given. Every published event is also kept in
//! a log that pull-style consumers drain once per frame.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::core::types::{SubscriptionId, TeamId, Tick, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    GridGenerated,
    TileUpdated { index: GridIndex },
    TileHeightChanged { index: GridIndex, height: f32 },
    UnitGridIndexChanged { unit: UnitId, from: GridIndex, to: GridIndex },
    UnitReachedDestination { unit: UnitId, index: GridIndex },
    UnitTurnStarted { unit: UnitId },
    UnitTurnEnded { unit: UnitId },
    CombatStarted,
    CombatEnded,
    UnitTeamChanged { unit: UnitId, previous: Option<TeamId>, current: Option<TeamId> },
    UnitAddedToCombat { unit: UnitId, index: GridIndex },
    UnitRemovedFromCombat { unit: UnitId },
    UnitHealthChanged { unit: UnitId, previous: i32, current: i32 },
    UnitDied { unit: UnitId },
    AbilityActivationComplete { unit: UnitId, ability: String, success: bool },
}

/// Discriminant used to key subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    GridGenerated,
    TileUpdated,
    TileHeightChanged,
    UnitGridIndexChanged,
    UnitReachedDestination,
    UnitTurnStarted,
    UnitTurnEnded,
    CombatStarted,
    CombatEnded,
    UnitTeamChanged,
    UnitAddedToCombat,
    UnitRemovedFromCombat,
    UnitHealthChanged,
    UnitDied,
    AbilityActivationComplete,
}

impl CombatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CombatEvent::GridGenerated => EventKind::GridGenerated,
            CombatEvent::TileUpdated { .. } => EventKind::TileUpdated,
            CombatEvent::TileHeightChanged { .. } => EventKind::TileHeightChanged,
            CombatEvent::UnitGridIndexChanged { .. } => EventKind::UnitGridIndexChanged,
            CombatEvent::UnitReachedDestination { .. } => EventKind::UnitReachedDestination,
            CombatEvent::UnitTurnStarted { .. } => EventKind::UnitTurnStarted,
            CombatEvent::UnitTurnEnded { .. } => EventKind::UnitTurnEnded,
            CombatEvent::CombatStarted => EventKind::CombatStarted,
            CombatEvent::CombatEnded => EventKind::CombatEnded,
            CombatEvent::UnitTeamChanged { .. } => EventKind::UnitTeamChanged,
            CombatEvent::UnitAddedToCombat { .. } => EventKind::UnitAddedToCombat,
            CombatEvent::UnitRemovedFromCombat { .. } => EventKind::UnitRemovedFromCombat,
            CombatEvent::UnitHealthChanged { .. } => EventKind::UnitHealthChanged,
            CombatEvent::UnitDied { .. } => EventKind::UnitDied,
            CombatEvent::AbilityActivationComplete { .. } => EventKind::AbilityActivationComplete,
        }
    }
}

/// An event stamped with the tick it was published on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub tick: Tick,
    pub event: CombatEvent,
}

type Handler = Box<dyn FnMut(&CombatEvent)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: AHashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
    log: Vec<EventRecord>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .field("pending", &self.log.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&CombatEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push((id, Box::new(handler)));
        id
    }

    /// Returns false if the id was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(position) = handlers.iter().position(|(handler_id, _)| *handler_id == id) {
                handlers.remove(position);
                return true;
            }
        }
        false
    }

    pub fn subscription_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Deliver to subscribers of the event's kind, in subscription order, then log it
    ///
    /// The log grows until [`EventBus::drain`] is called, so a long-running
    /// caller must drain it every frame or turn.
    pub fn publish(&mut self, tick: Tick, event: CombatEvent) {
        if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
            for (_, handler) in handlers.iter_mut() {
                handler(&event);
            }
        }
        self.log.push(EventRecord { tick, event });
    }

    /// Events published since the last drain
    pub fn pending(&self) -> &[EventRecord] {
        &self.log
    }

    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_handlers_receive_only_their_kind() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(EventKind::CombatStarted, move |event| {
            sink.borrow_mut().push(event.clone());
        });

        bus.publish(0, CombatEvent::CombatStarted);
        bus.publish(0, CombatEvent::CombatEnded);

        assert_eq!(*seen.borrow(), vec![CombatEvent::CombatStarted]);
        assert_eq!(bus.pending().len(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        let id = bus.subscribe(EventKind::CombatEnded, move |_| *counter.borrow_mut() += 1);

        bus.publish(1, CombatEvent::CombatEnded);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(2, CombatEvent::CombatEnded);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_drain_empties_log() {
        let mut bus = EventBus::new();
        bus.publish(4, CombatEvent::GridGenerated);
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].tick, 4);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_event_kind_mapping() {
        let unit = UnitId::new();
        assert_eq!(CombatEvent::UnitDied { unit }.kind(), EventKind::UnitDied);
        assert_eq!(
            CombatEvent::TileUpdated { index: GridIndex::ZERO }.kind(),
            EventKind::TileUpdated
        );
    }
}
