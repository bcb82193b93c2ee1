//! Cutoff snapshot loading.
//!
//! A snapshot is a JSON array of cutoff rows produced by the offline
//! ingestion pipeline. Rows that do not deserialize are skipped and
//! counted rather than failing the whole load.

use admitline_core::cutoff::CutoffRecord;
use admitline_core::error::StoreError;
use std::path::Path;
use tracing::{info, warn};

/// Result of reading a snapshot file.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub records: Vec<CutoffRecord>,
    /// Rows that could not be read as a cutoff record.
    pub unreadable: usize,
}

/// Parse snapshot JSON text.
pub fn parse_snapshot(json: &str) -> Result<Snapshot, StoreError> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| StoreError::Snapshot(format!("expected a JSON array of records: {e}")))?;

    let mut snapshot = Snapshot::default();
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<CutoffRecord>(row) {
            Ok(record) => snapshot.records.push(record),
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable cutoff row");
                snapshot.unreadable += 1;
            }
        }
    }
    Ok(snapshot)
}

/// Read a snapshot file from disk.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
    let snapshot = parse_snapshot(&content)?;
    info!(
        path = %path.display(),
        records = snapshot.records.len(),
        unreadable = snapshot.unreadable,
        "Cutoff snapshot read"
    );
    Ok(snapshot)
}
