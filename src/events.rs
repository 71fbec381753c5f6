//! Lifecycle event notifications with observer isolation
//!
//! The event set is closed: every notification is a variant of
//! [`ResourceEvent`] carrying a specifically-typed payload. An observer that
//! panics is caught and logged; it can never interrupt registration or a
//! cleanup pass, and it cannot prevent delivery to other observers.

use crate::resource::ResourceCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;
use uuid::Uuid;

/// All possible lifecycle notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ResourceEvent {
    Registered {
        id: String,
        category: ResourceCategory,
        timestamp: DateTime<Utc>,
    },
    Unregistered {
        id: String,
        category: ResourceCategory,
        timestamp: DateTime<Utc>,
    },
    Cleaned {
        id: String,
        category: ResourceCategory,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    CleanupFailed {
        id: String,
        category: ResourceCategory,
        error: String,
        timed_out: bool,
        timestamp: DateTime<Utc>,
    },
    CleanupStarted {
        pass_id: Uuid,
        candidates: usize,
        forced: bool,
        timestamp: DateTime<Utc>,
    },
    CleanupCompleted {
        pass_id: Uuid,
        cleaned: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    LeakDetected {
        id: String,
        category: ResourceCategory,
        age_ms: u64,
        potential_leak: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Discriminant for subscribing to one kind of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Registered,
    Unregistered,
    Cleaned,
    CleanupFailed,
    CleanupStarted,
    CleanupCompleted,
    LeakDetected,
}

impl ResourceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Registered { .. } => EventKind::Registered,
            Self::Unregistered { .. } => EventKind::Unregistered,
            Self::Cleaned { .. } => EventKind::Cleaned,
            Self::CleanupFailed { .. } => EventKind::CleanupFailed,
            Self::CleanupStarted { .. } => EventKind::CleanupStarted,
            Self::CleanupCompleted { .. } => EventKind::CleanupCompleted,
            Self::LeakDetected { .. } => EventKind::LeakDetected,
        }
    }
}

/// Token returned by [`EventBus::on`], used to unsubscribe
pub type SubscriptionId = u64;

type Handler = Arc<dyn Fn(&ResourceEvent) + Send + Sync>;

/// Per-kind observer registry
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe a handler to one event kind
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ResourceEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unsubscribe a handler; returns whether it was found
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        match handlers.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(sub_id, _)| *sub_id != id);
                list.len() < before
            }
            None => false,
        }
    }

    /// Remove every listener for one kind, or for all kinds
    pub fn remove_all(&self, kind: Option<EventKind>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        match kind {
            Some(kind) => {
                handlers.remove(&kind);
            }
            None => handlers.clear(),
        }
    }

    /// Deliver an event to every subscriber of its kind
    ///
    /// Handlers run outside the bus lock so a handler may subscribe or
    /// unsubscribe re-entrantly. A panicking handler is logged and skipped.
    pub(crate) fn emit(&self, event: ResourceEvent) {
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!("event observer panicked handling {:?} event", event.kind());
            }
        }
    }
}
