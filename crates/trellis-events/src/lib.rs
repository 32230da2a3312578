use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trellis_core::{ConnectorId, ShapeId};

/// Ids touched by a model mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedIds {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shapes: Vec<ShapeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connectors: Vec<ConnectorId>,
    /// Set when the whole document was replaced (deserialize, reset).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all: bool,
}

impl ChangedIds {
    pub fn shapes(shapes: Vec<ShapeId>) -> Self {
        Self {
            shapes,
            ..Self::default()
        }
    }

    pub fn connectors(connectors: Vec<ConnectorId>) -> Self {
        Self {
            connectors,
            ..Self::default()
        }
    }

    pub fn everything() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.shapes.is_empty() && self.connectors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ModelChanged {
        reason: String,
        changed: ChangedIds,
        version: u64,
    },
    SelectionChanged {
        reason: String,
        shapes: Vec<ShapeId>,
        connectors: Vec<ConnectorId>,
    },
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
        undo_label: Option<String>,
        redo_label: Option<String>,
    },
}

impl Event {
    pub const MODEL_CHANGED: &'static str = "model:changed";
    pub const SELECTION_CHANGED: &'static str = "selection:changed";
    pub const HISTORY_CHANGED: &'static str = "history:changed";

    /// The name subscribers match against.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ModelChanged { .. } => Self::MODEL_CHANGED,
            Event::SelectionChanged { .. } => Self::SELECTION_CHANGED,
            Event::HistoryChanged { .. } => Self::HISTORY_CHANGED,
        }
    }
}

/// `*` matches everything, `model:*` matches every `model:` event, anything else is exact.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => name.starts_with(prefix),
        _ => pattern == name,
    }
}

#[derive(Debug)]
struct Subscriber {
    pattern: String,
    tx: Sender<Event>,
}

/// Fan-out publish/subscribe channel. Every subscriber gets its own queue, so all
/// of them see every matching event after the mutation that caused it.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, pattern: impl Into<String>) -> Subscription {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(Subscriber {
            pattern: pattern.into(),
            tx,
        });
        Subscription { rx }
    }

    /// Deliver to every matching subscriber. Subscribers whose `Subscription` was
    /// dropped are removed here.
    pub fn publish(&self, event: Event) {
        let name = event.name();
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if pattern_matches(&sub.pattern, name) {
                sub.tx.send(event.clone()).is_ok()
            } else {
                true
            }
        });
        tracing::trace!(event = name, subscribers = subscribers.len(), "published");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<Event>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every pending event.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Dispatch all pending events to a listener.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Trait for components that respond to events.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
