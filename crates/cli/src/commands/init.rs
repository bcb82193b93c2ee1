//! `admitline init` — First-time setup.

use admitline_config::AppConfig;
use anyhow::Context;
use std::path::Path;

pub fn run(config_path: &Path, force: bool) -> anyhow::Result<()> {
    println!("🎓 admitline — First-Time Setup");
    println!("===============================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        println!("✅ Created config directory: {}", dir.display());
    }

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    write_default(config_path)?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set [institution] and add your API key (or export ADMITLINE_API_KEY)");
    println!("   2. Point [cutoff] data_path at your snapshot and run: admitline ingest");
    println!("   3. Run: admitline serve\n");
    Ok(())
}

fn write_default(path: &Path) -> anyhow::Result<()> {
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("failed to write {}", path.display()))
}
