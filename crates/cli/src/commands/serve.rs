//! `admitline serve` — Start the HTTP chat gateway.

use admitline_gateway::GatewayState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::load_config;
use super::runtime::Runtime;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let runtime = Runtime::build(&config).await?;
    let sweeper = runtime
        .orchestrator
        .sessions()
        .spawn_sweeper(Duration::from_secs(config.session.sweep_interval_secs));

    println!("🎓 admitline — {}", config.institution.name);
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.generator.model);
    println!("   Cutoffs:   {} records", runtime.orchestrator.cutoffs().len());

    let state = Arc::new(GatewayState {
        orchestrator: runtime.orchestrator.clone(),
        monitor: runtime.monitor.clone(),
        institution: config.institution.short_name.clone(),
    });

    admitline_gateway::serve(state, &config.gateway, shutdown_signal()).await?;

    sweeper.abort();
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
