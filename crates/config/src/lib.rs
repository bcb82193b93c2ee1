//! Configuration loading, validation, and management for admitline.
//!
//! Loads configuration from `~/.admitline/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use admitline_core::cutoff::RelaxableField;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.admitline/config.toml`. Every field has a default,
/// so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The institution this assistant answers for
    #[serde(default)]
    pub institution: InstitutionConfig,

    /// Text-generation backend
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Token budget policy
    #[serde(default)]
    pub context: ContextConfig,

    /// Session lifecycle
    #[serde(default)]
    pub session: SessionConfig,

    /// Cutoff data and lookup policy
    #[serde(default)]
    pub cutoff: CutoffConfig,

    /// Retrieval backend
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Contact request persistence and notification
    #[serde(default)]
    pub contact: ContactConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

// ── Institution ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionConfig {
    #[serde(default = "default_institution_name")]
    pub name: String,

    #[serde(default = "default_short_name")]
    pub short_name: String,

    /// Other spellings that count as a reference to this institution.
    #[serde(default = "default_aliases")]
    pub aliases: Vec<String>,

    #[serde(default = "default_admissions_email")]
    pub admissions_email: String,

    #[serde(default = "default_admissions_phone")]
    pub admissions_phone: String,

    /// Only disclosed when the conversation is about fraud.
    #[serde(default = "default_fraud_helpline")]
    pub fraud_helpline: String,
}

fn default_institution_name() -> String {
    "VNR Vignana Jyothi Institute of Engineering and Technology".into()
}
fn default_short_name() -> String {
    "VNRVJIET".into()
}
fn default_aliases() -> Vec<String> {
    vec!["vnr".into(), "vnrvjiet".into(), "vnr vjiet".into(), "vignana jyothi".into()]
}
fn default_admissions_email() -> String {
    "admissions@vnrvjiet.ac.in".into()
}
fn default_admissions_phone() -> String {
    "+91-40-2304 2758".into()
}
fn default_fraud_helpline() -> String {
    "+91-40-2304 2759".into()
}

impl Default for InstitutionConfig {
    fn default() -> Self {
        Self {
            name: default_institution_name(),
            short_name: default_short_name(),
            aliases: default_aliases(),
            admissions_email: default_admissions_email(),
            admissions_phone: default_admissions_phone(),
            fraud_helpline: default_fraud_helpline(),
        }
    }
}

// ── Generator ─────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Tokens requested for each reply; also reserved out of the context window.
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,

    /// Hard deadline for each generator call.
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_response_tokens() -> u32 {
    600
}
fn default_generator_timeout() -> u64 {
    30
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_response_tokens", &self.max_response_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_response_tokens: default_max_response_tokens(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

// ── Context budget ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total context window. When unset, derived from the model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<usize>,

    /// History usage fraction that triggers summarization.
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: f64,

    /// History usage fraction that raises a capacity warning.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Messages kept verbatim after summarization.
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,

    /// Messages kept when even summary + recent does not fit.
    #[serde(default = "default_fallback_messages")]
    pub fallback_messages: usize,

    /// Token encoding. When unset, derived from the model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TokenEncoding>,

    /// `tokenizer.json` for models outside the OpenAI encodings.
    /// Takes precedence over `encoding`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

/// How message sizes are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenEncoding {
    /// gpt-4o, gpt-4.1 and the o-series
    #[serde(rename = "o200k_base")]
    O200kBase,
    /// gpt-4, gpt-3.5-turbo and unknown models
    #[serde(rename = "cl100k_base")]
    Cl100kBase,
    /// ~4 bytes per token; only when asked for explicitly
    #[serde(rename = "heuristic")]
    Heuristic,
}

impl std::fmt::Display for TokenEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::O200kBase => "o200k_base",
            Self::Cl100kBase => "cl100k_base",
            Self::Heuristic => "heuristic",
        })
    }
}

fn default_summarize_threshold() -> f64 {
    0.7
}
fn default_warning_threshold() -> f64 {
    0.8
}
fn default_recent_messages() -> usize {
    4
}
fn default_fallback_messages() -> usize {
    2
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_limit: None,
            summarize_threshold: default_summarize_threshold(),
            warning_threshold: default_warning_threshold(),
            recent_messages: default_recent_messages(),
            fallback_messages: default_fallback_messages(),
            encoding: None,
            tokenizer_path: None,
        }
    }
}

/// Known context windows. Unknown models get the largest common window.
pub fn model_context_limit(model: &str) -> usize {
    match model {
        "gpt-4o-mini" | "gpt-4o" => 128_000,
        "gpt-4" => 8_192,
        "gpt-3.5-turbo" => 16_385,
        _ => 128_000,
    }
}

/// BPE encoding used by a model family. Unknown models fall back to
/// `cl100k_base`.
pub fn model_encoding(model: &str) -> TokenEncoding {
    let family = model.rsplit('/').next().unwrap_or(model);
    if ["gpt-4o", "gpt-4.1", "gpt-4.5", "gpt-5", "o1", "o3", "o4", "chatgpt-4o"]
        .iter()
        .any(|prefix| family.starts_with(prefix))
    {
        TokenEncoding::O200kBase
    } else {
        TokenEncoding::Cl100kBase
    }
}

// ── Sessions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are swept.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Hard cap on stored history, independent of token budgeting.
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,
}

fn default_idle_timeout() -> u64 {
    30 * 60
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_max_history() -> usize {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            max_history_messages: default_max_history(),
        }
    }
}

// ── Cutoff data ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoffConfig {
    /// JSON snapshot of cutoff records.
    #[serde(default = "default_cutoff_path")]
    pub data_path: PathBuf,

    /// Fields dropped, in order, when an exact lookup finds nothing.
    #[serde(default = "default_relaxation_order")]
    pub relaxation_order: Vec<RelaxableField>,
}

fn default_cutoff_path() -> PathBuf {
    AppConfig::config_dir().join("cutoffs.json")
}
fn default_relaxation_order() -> Vec<RelaxableField> {
    vec![RelaxableField::Gender, RelaxableField::Quota]
}

impl Default for CutoffConfig {
    fn default() -> Self {
        Self {
            data_path: default_cutoff_path(),
            relaxation_order: default_relaxation_order(),
        }
    }
}

// ── Retrieval ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    /// Keyword search over a local directory of documents
    Local,
    /// External semantic search service
    Http,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_backend")]
    pub backend: RetrievalBackend,

    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

fn default_retrieval_backend() -> RetrievalBackend {
    RetrievalBackend::Local
}
fn default_knowledge_dir() -> PathBuf {
    AppConfig::config_dir().join("knowledge")
}
fn default_top_k() -> usize {
    5
}
fn default_retrieval_timeout() -> u64 {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            knowledge_dir: default_knowledge_dir(),
            endpoint: None,
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

// ── Contact requests ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStoreKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Log,
    Webhook,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    #[serde(default = "default_contact_store")]
    pub store: ContactStoreKind,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_notify")]
    pub notify: NotifyKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// HMAC-SHA256 key for signing webhook bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
}

fn default_contact_store() -> ContactStoreKind {
    ContactStoreKind::Sqlite
}
fn default_database_path() -> PathBuf {
    AppConfig::config_dir().join("contacts.db")
}
fn default_notify() -> NotifyKind {
    NotifyKind::Log
}
fn default_notify_timeout() -> u64 {
    5
}
fn default_store_timeout() -> u64 {
    10
}

impl std::fmt::Debug for ContactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactConfig")
            .field("store", &self.store)
            .field("database_path", &self.database_path)
            .field("notify", &self.notify)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("notify_timeout_secs", &self.notify_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .finish()
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            store: default_contact_store(),
            database_path: default_database_path(),
            notify: default_notify(),
            webhook_url: None,
            webhook_secret: None,
            notify_timeout_secs: default_notify_timeout(),
            store_timeout_secs: default_store_timeout(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Per-client ceiling over a sliding one-minute window.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_requests_per_minute() -> u32 {
    30
}
fn default_max_message_chars() -> usize {
    1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            requests_per_minute: default_requests_per_minute(),
            max_message_chars: default_max_message_chars(),
            allowed_origins: Vec::new(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.admitline/config.toml).
    ///
    /// Environment variables override file values:
    /// - `ADMITLINE_API_KEY`, then `OPENAI_API_KEY`
    /// - `ADMITLINE_MODEL`, `ADMITLINE_API_URL`
    /// - `ADMITLINE_HOST`, `ADMITLINE_PORT`, `ADMITLINE_RATE_LIMIT`
    /// - `ADMITLINE_INSTITUTION_NAME`, `ADMITLINE_INSTITUTION_SHORT_NAME`
    /// - `ADMITLINE_CUTOFF_DATA`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = get("ADMITLINE_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.generator.api_key = Some(key);
        }
        if let Some(model) = get("ADMITLINE_MODEL") {
            self.generator.model = model;
        }
        if let Some(url) = get("ADMITLINE_API_URL") {
            self.generator.api_url = url;
        }
        if let Some(host) = get("ADMITLINE_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = get("ADMITLINE_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("ADMITLINE_PORT is not a port: {port}"))
            })?;
        }
        if let Some(limit) = get("ADMITLINE_RATE_LIMIT") {
            self.gateway.requests_per_minute = limit.parse().map_err(|_| {
                ConfigError::ValidationError(format!("ADMITLINE_RATE_LIMIT is not a number: {limit}"))
            })?;
        }
        if let Some(name) = get("ADMITLINE_INSTITUTION_NAME") {
            self.institution.name = name;
        }
        if let Some(short) = get("ADMITLINE_INSTITUTION_SHORT_NAME") {
            self.institution.short_name = short;
        }
        if let Some(path) = get("ADMITLINE_CUTOFF_DATA") {
            self.cutoff.data_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".admitline")
    }

    /// Effective context window for the configured model.
    pub fn context_limit(&self) -> usize {
        self.context
            .context_limit
            .unwrap_or_else(|| model_context_limit(&self.generator.model))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = &self.context;
        for (name, value) in [
            ("summarize_threshold", ctx.summarize_threshold),
            ("warning_threshold", ctx.warning_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "context.{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if ctx.summarize_threshold >= ctx.warning_threshold {
            return Err(ConfigError::ValidationError(
                "context.summarize_threshold must be below context.warning_threshold".into(),
            ));
        }
        if ctx.fallback_messages > ctx.recent_messages {
            return Err(ConfigError::ValidationError(
                "context.fallback_messages cannot exceed context.recent_messages".into(),
            ));
        }
        if self.generator.max_response_tokens as usize >= self.context_limit() {
            return Err(ConfigError::ValidationError(
                "generator.max_response_tokens must be smaller than the context window".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generator.temperature) {
            return Err(ConfigError::ValidationError(
                "generator.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.generator.timeout_secs == 0
            || self.retrieval.timeout_secs == 0
            || self.contact.notify_timeout_secs == 0
            || self.contact.store_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError("timeouts must be at least 1 second".into()));
        }
        if self.session.idle_timeout_secs == 0 || self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.idle_timeout_secs and session.sweep_interval_secs must be positive".into(),
            ));
        }
        let order = &self.cutoff.relaxation_order;
        if order.iter().enumerate().any(|(i, f)| order[..i].contains(f)) {
            return Err(ConfigError::ValidationError(
                "cutoff.relaxation_order lists a field twice".into(),
            ));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be non-zero".into()));
        }
        if self.gateway.requests_per_minute == 0 || self.gateway.max_message_chars == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.requests_per_minute and gateway.max_message_chars must be positive".into(),
            ));
        }
        if self.retrieval.backend == RetrievalBackend::Http && self.retrieval.endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "retrieval.endpoint is required for the http backend".into(),
            ));
        }
        if self.contact.notify == NotifyKind::Webhook && self.contact.webhook_url.is_none() {
            return Err(ConfigError::ValidationError(
                "contact.webhook_url is required for webhook notifications".into(),
            ));
        }
        Ok(())
    }

    /// Encoding for token counting: the configured one, else the model's.
    pub fn token_encoding(&self) -> TokenEncoding {
        self.context
            .encoding
            .unwrap_or_else(|| model_encoding(&self.generator.model))
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.generator.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
