//! `admitline doctor` — Diagnose the local setup.

use admitline_agent::counter_for;
use admitline_config::{AppConfig, ContactStoreKind, RetrievalBackend};
use admitline_memory::load_snapshot;
use std::path::Path;

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    println!("🩺 admitline Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    if !config_path.exists() {
        println!("  ⚠️  No config file at {} — using defaults (run `admitline init`)", config_path.display());
        issues += 1;
    }

    let config = match AppConfig::load_with_env(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ Generator API key configured ({})", config.generator.model);
    } else {
        println!("  ⚠️  No API key — set generator.api_key or ADMITLINE_API_KEY");
        issues += 1;
    }

    let counter = counter_for(&config);
    if counter.name() == "heuristic" {
        println!("  ⚠️  Token counts are estimated (heuristic); budgets may be off");
        issues += 1;
    } else {
        println!("  ✅ Token counter: {}", counter.name());
    }

    let data_path = &config.cutoff.data_path;
    match load_snapshot(data_path) {
        Ok(snapshot) if snapshot.unreadable == 0 => {
            println!("  ✅ Cutoff snapshot: {} rows", snapshot.records.len());
        }
        Ok(snapshot) => {
            println!(
                "  ⚠️  Cutoff snapshot: {} rows, {} unreadable (see `admitline ingest`)",
                snapshot.records.len(),
                snapshot.unreadable
            );
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Cutoff snapshot: {e}");
            issues += 1;
        }
    }

    match config.retrieval.backend {
        RetrievalBackend::Local if config.retrieval.knowledge_dir.is_dir() => {
            println!("  ✅ Knowledge directory: {}", config.retrieval.knowledge_dir.display());
        }
        RetrievalBackend::Local => {
            println!(
                "  ❌ Knowledge directory missing: {}",
                config.retrieval.knowledge_dir.display()
            );
            issues += 1;
        }
        RetrievalBackend::Http => println!("  ✅ Retrieval endpoint configured"),
        RetrievalBackend::None => println!("  ⚠️  Retrieval disabled; informational answers are ungrounded"),
    }

    if config.contact.store == ContactStoreKind::Memory {
        println!("  ⚠️  Contact requests are kept in memory only");
    } else {
        println!("  ✅ Contact store: {}", config.contact.database_path.display());
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
