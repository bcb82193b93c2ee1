//! `admitline config` — Configuration management commands.

use admitline_config::AppConfig;
use std::path::Path;

use super::load_config;

const REDACTED: &str = "***";

pub fn validate(config_path: &Path) -> anyhow::Result<()> {
    println!("🔍 Validating configuration...");

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ {e:#}");
            return Err(e);
        }
    };
    println!("   ✅ Config parsed successfully");

    println!();
    println!("   Institution: {} ({})", config.institution.name, config.institution.short_name);
    println!("   Model:       {} via {}", config.generator.model, config.generator.api_url);
    println!("   Context:     {} tokens", config.context_limit());
    println!("   Gateway:     {}:{}", config.gateway.host, config.gateway.port);
    println!("   Cutoffs:     {}", config.cutoff.data_path.display());
    Ok(())
}

pub fn show(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&redacted(config))?);
    Ok(())
}

pub fn path(config_path: &Path) {
    println!("{}", config_path.display());
}

fn redacted(mut config: AppConfig) -> AppConfig {
    if config.generator.api_key.is_some() {
        config.generator.api_key = Some(REDACTED.into());
    }
    if config.contact.webhook_secret.is_some() {
        config.contact.webhook_secret = Some(REDACTED.into());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_never_printed() {
        let mut config = AppConfig::default();
        config.generator.api_key = Some("sk-live-123".into());
        config.contact.webhook_secret = Some("hook-secret".into());

        let text = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!text.contains("sk-live-123"));
        assert!(!text.contains("hook-secret"));
        assert!(text.contains(REDACTED));
    }

    #[test]
    fn config_path_is_valid() {
        let path = crate::commands::default_config_path();
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
