//! # Event Bridge
//!
//! Forwards engine events onto a bounded crossbeam channel so consumers
//! on other threads (a UI, a persistence writer) can drain them on their
//! own schedule.
//!
//! ```text
//! ┌──────────┐ listener ┌───────────┐ drain ┌──────────┐
//! │  Engine  │─────────>│  Channel  │──────>│ Consumer │
//! └──────────┘          └───────────┘       └──────────┘
//! ```

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use branchbuild_economy::{Engine, EngineEvent, EventKind};

/// Bounded channel of engine events.
pub struct EventBus {
    sender: Sender<EngineEvent>,
    receiver: Receiver<EngineEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// A producer handle.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// A consumer handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Creates a connected pair of handles.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

/// Handle for sending events.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<EngineEvent>,
}

impl EventSender {
    /// Sends without blocking. Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: EngineEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(kind = %event.kind(), "event channel full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving events.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<EngineEvent>,
}

impl EventReceiver {
    /// Takes every pending event.
    #[inline]
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.receiver.try_iter().collect()
    }

    /// Takes one pending event.
    #[inline]
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Whether anything is pending.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}

/// Registers listeners that forward the given kinds onto a new channel.
///
/// Events that arrive while the channel is full are dropped with a warning.
pub fn attach(engine: &mut Engine, kinds: &[EventKind], capacity: usize) -> EventReceiver {
    let bus = EventBus::new(capacity);
    for &kind in kinds {
        let sender = bus.sender();
        engine.on(kind, move |event| {
            sender.send(event.clone());
        });
    }
    bus.receiver()
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchbuild_core::Project;
    use serde_json::json;

    #[test]
    fn test_pair_delivers_in_order() {
        let (tx, rx) = EventBus::create_pair(4);
        assert!(tx.send(EngineEvent::Reset));
        assert!(tx.send(EngineEvent::ConfigLoaded { title: None }));
        assert_eq!(rx.pending_count(), 2);
        assert_eq!(rx.try_recv(), Some(EngineEvent::Reset));
        assert_eq!(rx.drain(), vec![EngineEvent::ConfigLoaded { title: None }]);
        assert!(!rx.has_events());
    }

    #[test]
    fn test_full_channel_drops() {
        let (tx, rx) = EventBus::create_pair(1);
        assert!(tx.send(EngineEvent::Reset));
        assert!(!tx.send(EngineEvent::Reset));
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn test_attach_forwards_selected_kinds() {
        let project = Project::from_json_value(json!({
            "pages": [{"layout": [{"type": "item", "id": "a"}]}]
        }))
        .unwrap();
        let mut engine = Engine::new(project);
        let rx = attach(&mut engine, &[EventKind::Selection], 16);

        engine.select("a").unwrap();
        engine.reset();

        let events = rx.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::Selection);
    }
}
