//! Domain event system — decoupled communication between bounded contexts.
//!
//! The orchestration layer publishes capacity and failure signals here;
//! the telemetry crate subscribes and keeps counters for operators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Which capacity threshold a context crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityLevel {
    /// History passed the summarization threshold (70% by default).
    Summarize,
    /// History passed the warning threshold (80% by default).
    Warning,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// History usage crossed a capacity threshold
    CapacityThreshold {
        session_id: String,
        level: CapacityLevel,
        history_tokens: usize,
        available_tokens: usize,
        timestamp: DateTime<Utc>,
    },

    /// History was condensed into a summary message
    HistorySummarized {
        session_id: String,
        summarized_messages: usize,
        fallback_used: bool,
        timestamp: DateTime<Utc>,
    },

    /// Token accounting could not keep a request within limits
    ContextOverflow {
        session_id: String,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// A collaborator call failed and the request degraded
    CollaboratorFailed {
        session_id: String,
        collaborator: String,
        intent: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A contact request was persisted
    ContactSubmitted {
        reference_id: String,
        query_type: String,
        timestamp: DateTime<Utc>,
    },

    /// Malformed cutoff rows were skipped at load time
    DataQuality {
        source: String,
        rejected: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
