//! # Engine Events
//!
//! Change notifications delivered synchronously to registered listeners
//! before the triggering call returns.
//!
//! | Event | Emitted by |
//! |-------|------------|
//! | `selection` | a successful select / deselect / toggle |
//! | `recalculate` | every pipeline run |
//! | `reset` | [`Engine::reset`](crate::Engine::reset) |
//! | `config_loaded` | [`Engine::load_config`](crate::Engine::load_config) |

use std::collections::HashMap;
use std::fmt;

use crate::state::SelectionState;

/// Event names listeners subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An item's quantity changed through the selection API.
    Selection,
    /// The pipeline finished.
    Recalculate,
    /// The build was cleared.
    Reset,
    /// A new project replaced the old one.
    ConfigLoaded,
}

impl EventKind {
    /// The wire name (`"selection"`, `"recalculate"`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Recalculate => "recalculate",
            Self::Reset => "reset",
            Self::ConfigLoaded => "config_loaded",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "selection" => Some(Self::Selection),
            "recalculate" => Some(Self::Recalculate),
            "reset" => Some(Self::Reset),
            "config_loaded" => Some(Self::ConfigLoaded),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one recalculation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecalcReport {
    /// Cleanup passes run.
    pub cleanup_passes: usize,
    /// False when the cleanup cap was hit.
    pub converged: bool,
    /// Items removed (or trimmed) by cleanup, in removal order.
    pub removed: Vec<String>,
    /// Items auto-selected by effects.
    pub forced: Vec<String>,
}

/// Payload delivered to listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// An item's quantity changed.
    Selection {
        /// Item id.
        item_id: String,
        /// Quantity after the change.
        quantity: i64,
        /// True for select, false for deselect.
        selected: bool,
    },
    /// The pipeline finished.
    Recalculate {
        /// Refreshed state.
        state: SelectionState,
        /// What the pass did.
        report: RecalcReport,
    },
    /// The build was cleared.
    Reset,
    /// A new project was loaded.
    ConfigLoaded {
        /// Project title, if any.
        title: Option<String>,
    },
}

impl EngineEvent {
    /// The event's kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Selection { .. } => EventKind::Selection,
            Self::Recalculate { .. } => EventKind::Recalculate,
            Self::Reset => EventKind::Reset,
            Self::ConfigLoaded { .. } => EventKind::ConfigLoaded,
        }
    }
}

/// A registered callback.
pub type Listener = Box<dyn FnMut(&EngineEvent) + Send>;

/// Listener registry keyed by event kind.
#[derive(Default)]
pub struct Listeners {
    by_kind: HashMap<EventKind, Vec<Listener>>,
}

impl Listeners {
    /// Registers a callback for one kind.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.by_kind.entry(kind).or_default().push(listener);
    }

    /// Delivers an event to every listener of its kind, in registration order.
    pub fn emit(&mut self, event: &EngineEvent) {
        if let Some(listeners) = self.by_kind.get_mut(&event.kind()) {
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
    }

    /// Whether anyone listens for this kind.
    #[must_use]
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|l| !l.is_empty())
    }

    /// Number of listeners for a kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, listeners) in &self.by_kind {
            map.entry(kind, &listeners.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_names_round_trip() {
        for kind in [EventKind::Selection, EventKind::Recalculate, EventKind::Reset, EventKind::ConfigLoaded] {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("explode"), None);
    }

    #[test]
    fn test_emit_only_matching_kind() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut listeners = Listeners::default();
        let counter = Arc::clone(&hits);
        listeners.on(
            EventKind::Reset,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );
        listeners.emit(&EngineEvent::Reset);
        listeners.emit(&EngineEvent::ConfigLoaded { title: None });
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(listeners.has_listeners(EventKind::Reset));
        assert_eq!(listeners.count(EventKind::Selection), 0);
    }
}
