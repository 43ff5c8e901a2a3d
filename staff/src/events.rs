//! Cache invalidation events.
//!
//! Every committed mutation tells downstream caches (rendered public pages,
//! search indexes) which entities to re-publish. Events are delivered only
//! after the transaction that produced them has committed.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::permissions::EntityRef;

/// Signal that cached data derived from an entity is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "entity", rename_all = "snake_case")]
pub enum CacheEvent {
    Invalidate(EntityRef),
}

impl CacheEvent {
    #[must_use]
    pub const fn entity(&self) -> EntityRef {
        match self {
            Self::Invalidate(entity) => *entity,
        }
    }
}

/// Receiver of committed cache events.
pub trait InvalidationSink: Send + Sync {
    fn publish(&self, event: CacheEvent);
}

impl InvalidationSink for broadcast::Sender<CacheEvent> {
    fn publish(&self, event: CacheEvent) {
        if self.send(event).is_err() {
            tracing::trace!(entity = %event.entity(), "No invalidation subscribers");
        }
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl InvalidationSink for NoopSink {
    fn publish(&self, _event: CacheEvent) {}
}

/// Keeps every event in memory, for inspection in tests and tooling.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all events recorded so far.
    pub fn drain(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl InvalidationSink for RecordingSink {
    fn publish(&self, event: CacheEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
