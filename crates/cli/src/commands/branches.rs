//! `admitline branches` — List branches in the configured snapshot.

use admitline_agent::CutoffEngine;
use admitline_memory::load_snapshot;
use std::path::Path;

use super::load_config;

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let snapshot = load_snapshot(&config.cutoff.data_path)?;
    let (engine, _) = CutoffEngine::from_records(snapshot.records, config.cutoff.relaxation_order);

    let branches = engine.branches();
    if branches.is_empty() {
        println!("No branches in {}", config.cutoff.data_path.display());
        return Ok(());
    }
    for branch in &branches {
        println!("{branch}");
    }
    Ok(())
}
