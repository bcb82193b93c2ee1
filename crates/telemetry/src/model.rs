//! Data model for capacity counters and incidents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// ── Incident ──────────────────────────────────────────────────────────────

/// What kind of problem an incident records.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// Token accounting could not keep a request within the window.
    ContextOverflow,
    /// A collaborator failed and the reply degraded.
    CollaboratorFailed,
    /// Malformed cutoff rows were skipped.
    DataQuality,
}

impl std::fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContextOverflow => write!(f, "context_overflow"),
            Self::CollaboratorFailed => write!(f, "collaborator_failed"),
            Self::DataQuality => write!(f, "data_quality"),
        }
    }
}

/// One recorded problem.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub kind: IncidentKind,
    /// Session id, or the data source for data-quality incidents.
    pub subject: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// Point-in-time counters, served by `GET /status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapacitySnapshot {
    /// Contexts whose history crossed the summarize threshold.
    pub summarize_threshold_crossings: u64,
    /// Contexts whose history crossed the warning threshold.
    pub warning_threshold_crossings: u64,
    pub histories_summarized: u64,
    /// Summaries that fell back to the placeholder text.
    pub summary_fallbacks: u64,
    pub context_overflows: u64,
    /// Failures per collaborator name.
    pub collaborator_failures: BTreeMap<String, u64>,
    pub contacts_submitted: u64,
    pub rejected_cutoff_rows: u64,
    /// Events missed because the monitor fell behind the bus.
    pub events_dropped: u64,
    /// Most recent first.
    pub recent_incidents: Vec<Incident>,
    pub since: DateTime<Utc>,
}

impl CapacitySnapshot {
    pub fn total_collaborator_failures(&self) -> u64 {
        self.collaborator_failures.values().sum()
    }
}
