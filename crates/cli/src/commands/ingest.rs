//! `admitline ingest` — Dry-run a cutoff snapshot.
//!
//! Reads the file the same way the server does at startup and reports how
//! many rows would be loaded, replaced or rejected, so a bad export can be
//! caught before it is deployed.

use admitline_agent::{CutoffEngine, IngestReport};
use admitline_core::cutoff::RelaxableField;
use admitline_memory::load_snapshot;
use anyhow::Context;
use std::path::{Path, PathBuf};

use super::load_config;

pub fn run(config_path: &Path, file: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let path = file.unwrap_or_else(|| config.cutoff.data_path.clone());

    let (engine, report) = check(&path, config.cutoff.relaxation_order.clone())?;

    println!("📥 Cutoff snapshot: {}", path.display());
    println!("   Loaded:      {}", report.loaded);
    println!("   Overwritten: {}", report.overwritten);
    println!("   Rejected:    {}", report.rejected);
    println!("   Branches:    {}", engine.branches().join(", "));
    println!(
        "   Years:       {}",
        engine.years().iter().map(u16::to_string).collect::<Vec<_>>().join(", ")
    );

    if report.rejected > 0 {
        println!("\n   ⚠️  {} row(s) will be skipped at startup", report.rejected);
    } else {
        println!("\n   ✅ Snapshot is clean");
    }
    Ok(())
}

/// Load `path` into a fresh engine. Unreadable and malformed rows are both
/// counted as rejected.
fn check(path: &Path, order: Vec<RelaxableField>) -> anyhow::Result<(CutoffEngine, IngestReport)> {
    let snapshot = load_snapshot(path).with_context(|| format!("cannot ingest {}", path.display()))?;
    let unreadable = snapshot.unreadable;
    let (engine, mut report) = CutoffEngine::from_records(snapshot.records, order);
    report.rejected += unreadable;
    Ok((engine, report))
}
