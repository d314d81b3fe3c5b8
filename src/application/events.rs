//! Configuration change events.
//!
//! Writes that actually change stored configuration publish an event; a
//! background consumer drains the queue and applies the side effects.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{cache::MemoryRenderCache, util::lock::mutex_lock};

const SOURCE: &str = "application::events";

/// Monotonic event sequence number within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct ConfigEvent {
    /// Unique identifier (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl ConfigEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Global configuration replaced.
    GlobalUpdated { fingerprint: String },
    /// Board created or its configuration changed.
    BoardUpdated { board: String, fingerprint: String },
    BoardRemoved { board: String },
}

/// In-memory FIFO of configuration events.
///
/// Holds at most `capacity` events; publishing into a full queue drops the
/// oldest event and counts the drop.
pub struct EventQueue {
    queue: Mutex<VecDeque<ConfigEvent>>,
    epoch_counter: AtomicU64,
    capacity: usize,
}

impl EventQueue {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Queue bounded to `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY))),
            epoch_counter: AtomicU64::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let event = ConfigEvent::new(kind, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Config event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                counter!("boardstore_config_event_dropped_total").increment(1);
                warn!(
                    event_id = %dropped.id,
                    event_epoch = dropped.epoch,
                    event_kind = ?dropped.kind,
                    capacity = self.capacity,
                    "Config event queue full; dropped oldest event"
                );
            }
        }
        queue.push_back(event);
        gauge!("boardstore_config_event_queue_len").set(queue.len() as f64);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<ConfigEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained: Vec<ConfigEvent> = queue.drain(..count).collect();
        gauge!("boardstore_config_event_queue_len").set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies queued events: removed boards lose their cached listings.
pub struct EventConsumer {
    queue: Arc<EventQueue>,
    cache: Arc<MemoryRenderCache>,
    batch_limit: usize,
}

impl EventConsumer {
    pub const DEFAULT_BATCH_LIMIT: usize = 64;

    pub fn new(queue: Arc<EventQueue>, cache: Arc<MemoryRenderCache>) -> Self {
        Self {
            queue,
            cache,
            batch_limit: Self::DEFAULT_BATCH_LIMIT,
        }
    }

    /// Process one batch; returns the number of events handled.
    #[instrument(skip(self))]
    pub fn consume(&self) -> usize {
        let events = self.queue.drain(self.batch_limit);
        for event in &events {
            match &event.kind {
                EventKind::BoardRemoved { board } => {
                    self.cache.invalidate_board(board);
                    info!(event_id = %event.id, board = %board, "Dropped cached listings of removed board");
                }
                EventKind::BoardUpdated { board, fingerprint } => {
                    debug!(event_id = %event.id, board = %board, fingerprint = %fingerprint, "Board configuration changed");
                }
                EventKind::GlobalUpdated { fingerprint } => {
                    debug!(event_id = %event.id, fingerprint = %fingerprint, "Global configuration changed");
                }
            }
        }
        events.len()
    }

    /// Poll the queue on a fixed interval until the task is aborted.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                while self.consume() > 0 {}
            }
        })
    }
}
