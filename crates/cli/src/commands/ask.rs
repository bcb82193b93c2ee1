//! `admitline ask` — One message through the full pipeline.

use admitline_agent::ChatRequest;
use std::path::Path;

use super::load_config;
use super::runtime::Runtime;

pub async fn run(config_path: &Path, message: String, session: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let runtime = Runtime::build(&config).await?;

    let reply = runtime.orchestrator.handle(ChatRequest::new(message, session)).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
