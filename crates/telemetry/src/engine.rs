//! Thread-safe capacity monitor. Folds domain events into counters and
//! serves snapshots.

use crate::model::*;
use admitline_core::event::{CapacityLevel, DomainEvent, EventBus};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

/// Incidents kept for the status endpoint.
const MAX_INCIDENTS: usize = 50;

/// Running counters over every event seen since startup.
pub struct CapacityMonitor {
    totals: RwLock<Totals>,
    incidents: RwLock<VecDeque<Incident>>,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Totals {
    summarize_crossings: u64,
    warning_crossings: u64,
    summarized: u64,
    summary_fallbacks: u64,
    overflows: u64,
    failures: BTreeMap<String, u64>,
    contacts: u64,
    rejected_rows: u64,
    dropped: u64,
}

impl CapacityMonitor {
    pub fn new() -> Self {
        Self {
            totals: RwLock::new(Totals::default()),
            incidents: RwLock::new(VecDeque::with_capacity(MAX_INCIDENTS)),
            started_at: Utc::now(),
        }
    }

    fn totals(&self) -> RwLockWriteGuard<'_, Totals> {
        self.totals.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_totals(&self) -> RwLockReadGuard<'_, Totals> {
        self.totals.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_incident(&self, kind: IncidentKind, subject: &str, detail: String, at: DateTime<Utc>) {
        let mut incidents = self.incidents.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if incidents.len() == MAX_INCIDENTS {
            incidents.pop_front();
        }
        incidents.push_back(Incident { kind, subject: subject.to_string(), detail, at });
    }

    /// Fold one event into the counters.
    pub fn record(&self, event: &DomainEvent) {
        match event {
            DomainEvent::CapacityThreshold { level, .. } => {
                let mut totals = self.totals();
                match level {
                    CapacityLevel::Summarize => totals.summarize_crossings += 1,
                    CapacityLevel::Warning => totals.warning_crossings += 1,
                }
            }
            DomainEvent::HistorySummarized { fallback_used, .. } => {
                let mut totals = self.totals();
                totals.summarized += 1;
                if *fallback_used {
                    totals.summary_fallbacks += 1;
                }
            }
            DomainEvent::ContextOverflow { session_id, detail, timestamp } => {
                self.totals().overflows += 1;
                self.push_incident(IncidentKind::ContextOverflow, session_id, detail.clone(), *timestamp);
            }
            DomainEvent::CollaboratorFailed {
                session_id,
                collaborator,
                intent,
                error_message,
                timestamp,
            } => {
                *self.totals().failures.entry(collaborator.clone()).or_default() += 1;
                self.push_incident(
                    IncidentKind::CollaboratorFailed,
                    session_id,
                    format!("{collaborator} ({intent}): {error_message}"),
                    *timestamp,
                );
            }
            DomainEvent::ContactSubmitted { .. } => self.totals().contacts += 1,
            DomainEvent::DataQuality { source, rejected, timestamp } => {
                self.totals().rejected_rows += *rejected as u64;
                self.push_incident(
                    IncidentKind::DataQuality,
                    source,
                    format!("{rejected} malformed cutoff rows skipped"),
                    *timestamp,
                );
            }
        }
    }

    /// Consume the bus in the background until it closes.
    pub fn spawn(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let monitor = self.clone();
        let mut stream = BroadcastStream::new(bus.subscribe());
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => monitor.record(&event),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!(missed, "capacity monitor fell behind the event bus");
                        monitor.totals().dropped += missed;
                    }
                }
            }
            debug!("event bus closed, capacity monitor stopping");
        })
    }

    pub fn snapshot(&self) -> CapacitySnapshot {
        let totals = self.read_totals();
        let incidents = self.incidents.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        CapacitySnapshot {
            summarize_threshold_crossings: totals.summarize_crossings,
            warning_threshold_crossings: totals.warning_crossings,
            histories_summarized: totals.summarized,
            summary_fallbacks: totals.summary_fallbacks,
            context_overflows: totals.overflows,
            collaborator_failures: totals.failures.clone(),
            contacts_submitted: totals.contacts,
            rejected_cutoff_rows: totals.rejected_rows,
            events_dropped: totals.dropped,
            recent_incidents: incidents.iter().rev().cloned().collect(),
            since: self.started_at,
        }
    }
}

impl Default for CapacityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(collaborator: &str) -> DomainEvent {
        DomainEvent::CollaboratorFailed {
            session_id: "s1".into(),
            collaborator: collaborator.into(),
            intent: "informational".into(),
            error_message: "connection refused".into(),
            timestamp: Utc::now(),
        }
    }

    fn threshold(level: CapacityLevel) -> DomainEvent {
        DomainEvent::CapacityThreshold {
            session_id: "s1".into(),
            level,
            history_tokens: 900,
            available_tokens: 1000,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn thresholds_are_counted_separately() {
        let monitor = CapacityMonitor::new();
        monitor.record(&threshold(CapacityLevel::Summarize));
        monitor.record(&threshold(CapacityLevel::Warning));
        monitor.record(&threshold(CapacityLevel::Warning));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.summarize_threshold_crossings, 1);
        assert_eq!(snapshot.warning_threshold_crossings, 2);
        assert!(snapshot.recent_incidents.is_empty());
    }

    #[test]
    fn failures_grouped_by_collaborator() {
        let monitor = CapacityMonitor::new();
        monitor.record(&failure("retrieval"));
        monitor.record(&failure("generator"));
        monitor.record(&failure("retrieval"));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.collaborator_failures["retrieval"], 2);
        assert_eq!(snapshot.total_collaborator_failures(), 3);
        assert_eq!(snapshot.recent_incidents.len(), 3);
        assert!(snapshot.recent_incidents[0].detail.starts_with("retrieval"));
    }

    #[test]
    fn overflow_and_data_quality_are_incidents() {
        let monitor = CapacityMonitor::new();
        monitor.record(&DomainEvent::ContextOverflow {
            session_id: "s9".into(),
            detail: "guardrails alone exceed the window".into(),
            timestamp: Utc::now(),
        });
        monitor.record(&DomainEvent::DataQuality {
            source: "cutoffs.json".into(),
            rejected: 3,
            timestamp: Utc::now(),
        });

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.context_overflows, 1);
        assert_eq!(snapshot.rejected_cutoff_rows, 3);
        assert_eq!(snapshot.recent_incidents[0].kind, IncidentKind::DataQuality);
        assert_eq!(snapshot.recent_incidents[1].subject, "s9");
    }

    #[test]
    fn incident_list_is_bounded() {
        let monitor = CapacityMonitor::new();
        for _ in 0..(MAX_INCIDENTS + 10) {
            monitor.record(&failure("generator"));
        }
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.recent_incidents.len(), MAX_INCIDENTS);
        assert_eq!(snapshot.collaborator_failures["generator"], (MAX_INCIDENTS + 10) as u64);
    }

    #[test]
    fn snapshot_serializes() {
        let monitor = CapacityMonitor::new();
        monitor.record(&DomainEvent::HistorySummarized {
            session_id: "s1".into(),
            summarized_messages: 6,
            fallback_used: true,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(monitor.snapshot()).unwrap();
        assert_eq!(json["histories_summarized"], 1);
        assert_eq!(json["summary_fallbacks"], 1);
    }

    #[tokio::test]
    async fn spawned_monitor_follows_the_bus() {
        let bus = EventBus::new(16);
        let monitor = Arc::new(CapacityMonitor::new());
        let handle = monitor.spawn(&bus);

        bus.publish(DomainEvent::ContactSubmitted {
            reference_id: "A1B2C3D4".into(),
            query_type: "general_inquiry".into(),
            timestamp: Utc::now(),
        });
        bus.publish(failure("contact_store"));

        for _ in 0..100 {
            if monitor.snapshot().total_collaborator_failures() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.contacts_submitted, 1);
        assert_eq!(snapshot.collaborator_failures["contact_store"], 1);

        drop(bus);
        handle.await.unwrap();
    }
}
