//! # Event Bus System
//!
//! Decoupled notification of transfer activity using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wraps one enum per domain (`TransferEvent`, `HistoryEvent`)
//! - **EventBus**: Central broadcast channel the engine publishes to
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐  subscribe  ┌──────────────┐
//! │ TransferEngine   ├──────────>│           ├────────────>│ UI / CLI     │
//! └──────────────────┘           │ EventBus  │             └──────────────┘
//! ┌──────────────────┐   emit    │           │  subscribe  ┌──────────────┐
//! │ TransferHistory  ├──────────>│           ├────────────>│ Audit logger │
//! └──────────────────┘           └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Transfer(TransferEvent::Started {
//!         run_id: "run-1".to_string(),
//!         total: 3,
//!     }))
//!     .ok();
//! ```
//!
//! Emission fails only when nobody is subscribed; publishers ignore that
//! error with `.ok()`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, SendError},
    Receiver,
};

/// Default per-subscriber buffer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Severity used by hosts to pick presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Top-level event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Transfer(TransferEvent),
    History(HistoryEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Transfer(event) => event.description(),
            CoreEvent::History(event) => event.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Transfer(TransferEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::CollectionFinished { bucket, .. })
                if bucket == "failed" =>
            {
                EventSeverity::Warning
            }
            CoreEvent::Transfer(TransferEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Transfer(TransferEvent::Progress { .. }) => EventSeverity::Debug,
            CoreEvent::History(_) => EventSeverity::Debug,
            CoreEvent::Transfer(_) => EventSeverity::Info,
        }
    }
}

/// Lifecycle of one transfer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Source collections fetched, processing about to begin.
    Started { run_id: String, total: u32 },
    /// A duplicate collection is waiting for the caller's decision.
    DecisionRequired {
        run_id: String,
        collection_id: String,
        collection_name: String,
    },
    /// One collection finished; `current` never decreases within a run.
    Progress {
        run_id: String,
        current: u32,
        total: u32,
        message: String,
    },
    /// Per-collection result with the matcher sub-counts.
    CollectionFinished {
        run_id: String,
        collection_id: String,
        collection_name: String,
        /// One of `successful`, `merged`, `skipped`, `failed`.
        bucket: String,
        matched: u32,
        unmatched: u32,
    },
    Completed {
        run_id: String,
        successful: u32,
        merged: u32,
        skipped: u32,
        failed: u32,
    },
    Cancelled {
        run_id: String,
        completed: u32,
        remaining: u32,
    },
    /// The run aborted before processing, e.g. the source was unreachable.
    Failed { run_id: String, message: String },
}

impl TransferEvent {
    fn description(&self) -> &str {
        match self {
            TransferEvent::Started { .. } => "Transfer started",
            TransferEvent::DecisionRequired { .. } => "Duplicate collection needs a decision",
            TransferEvent::Progress { .. } => "Transfer progress",
            TransferEvent::CollectionFinished { .. } => "Collection processed",
            TransferEvent::Completed { .. } => "Transfer completed",
            TransferEvent::Cancelled { .. } => "Transfer cancelled",
            TransferEvent::Failed { .. } => "Transfer failed",
        }
    }
}

/// Changes to the persisted transfer history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEvent {
    RecordStored {
        source_collection_id: String,
        target_collection_id: String,
        item_count: u64,
    },
    RecordCleared { source_collection_id: String },
}

impl HistoryEvent {
    fn description(&self) -> &str {
        match self {
            HistoryEvent::RecordStored { .. } => "Transfer record stored",
            HistoryEvent::RecordCleared { .. } => "Transfer record cleared",
        }
    }
}

/// Broadcast hub for [`CoreEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    ///
    /// A subscriber that falls further behind receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers.
    ///
    /// Returns the number of receivers, or an error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to events published from now on; past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events rejected by a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receive the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}
