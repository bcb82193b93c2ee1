//! Builds the running service from configuration: collaborators, the
//! cutoff table, the event bus and its monitor.

use admitline_agent::{Collaborators, CutoffEngine, IngestReport, Orchestrator, counter_for};
use admitline_channels::{LogNotificationSink, WebhookConfig, WebhookNotificationSink};
use admitline_config::{AppConfig, ContactStoreKind, NotifyKind, RetrievalBackend};
use admitline_core::event::{DomainEvent, EventBus};
use admitline_core::notify::NotificationSink;
use admitline_core::retrieval::{NoRetrieval, RetrievalGateway};
use admitline_core::store::ContactStore;
use admitline_memory::{
    HttpRetrievalGateway, InMemoryContactStore, LocalKnowledgeBase, SqliteContactStore, load_snapshot,
};
use admitline_providers::OpenAiCompatGenerator;
use admitline_telemetry::CapacityMonitor;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const EVENT_BUS_CAPACITY: usize = 256;

/// Everything a command needs to answer messages.
pub struct Runtime {
    pub orchestrator: Arc<Orchestrator>,
    pub monitor: Arc<CapacityMonitor>,
}

impl Runtime {
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let events = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
        let monitor = Arc::new(CapacityMonitor::new());
        // Subscribe before anything publishes so load-time incidents are counted.
        monitor.spawn(&events);

        let (cutoffs, report) = load_cutoffs(config, &events)?;
        info!(
            loaded = report.loaded,
            overwritten = report.overwritten,
            rejected = report.rejected,
            "cutoff table ready"
        );

        let counter = counter_for(config);
        info!(counter = counter.name(), model = %config.generator.model, "token counter ready");

        let collaborators = Collaborators {
            generator: Arc::new(build_generator(config)?),
            retrieval: build_retrieval(config)?,
            store: open_contact_store(config).await?,
            sink: build_sink(config)?,
            counter,
            cutoffs: Arc::new(cutoffs),
            events,
        };

        let orchestrator = Arc::new(Orchestrator::from_config(config, collaborators));
        Ok(Self { orchestrator, monitor })
    }
}

/// Load the configured snapshot. A missing file leaves the table empty so
/// the service can still answer informational questions.
fn load_cutoffs(config: &AppConfig, events: &EventBus) -> anyhow::Result<(CutoffEngine, IngestReport)> {
    let order = config.cutoff.relaxation_order.clone();
    let path = &config.cutoff.data_path;
    if !path.exists() {
        warn!(path = %path.display(), "cutoff snapshot not found; cutoff questions will get the no-data reply");
        return Ok((CutoffEngine::new(order), IngestReport::default()));
    }

    let snapshot = load_snapshot(path).context("failed to read cutoff snapshot")?;
    let unreadable = snapshot.unreadable;
    let (engine, mut report) = CutoffEngine::from_records(snapshot.records, order);
    report.rejected += unreadable;

    if report.rejected > 0 {
        events.publish(DomainEvent::DataQuality {
            source: path.display().to_string(),
            rejected: report.rejected,
            timestamp: chrono::Utc::now(),
        });
    }
    Ok((engine, report))
}

fn build_generator(config: &AppConfig) -> anyhow::Result<OpenAiCompatGenerator> {
    let generator = &config.generator;
    if !config.has_api_key() {
        warn!("no generator API key configured; only keyless endpoints will work");
    }
    OpenAiCompatGenerator::new(
        "openai-compatible",
        generator.api_url.clone(),
        generator.api_key.clone().unwrap_or_default(),
        generator.model.clone(),
        Duration::from_secs(generator.timeout_secs),
    )
    .context("failed to build generator client")
}

fn build_retrieval(config: &AppConfig) -> anyhow::Result<Arc<dyn RetrievalGateway>> {
    let retrieval = &config.retrieval;
    let gateway: Arc<dyn RetrievalGateway> = match retrieval.backend {
        RetrievalBackend::Local => {
            let kb = LocalKnowledgeBase::load_dir(&retrieval.knowledge_dir).with_context(|| {
                format!("failed to load knowledge from {}", retrieval.knowledge_dir.display())
            })?;
            info!(documents = kb.len(), "local knowledge base loaded");
            Arc::new(kb)
        }
        RetrievalBackend::Http => {
            let endpoint = retrieval
                .endpoint
                .clone()
                .context("retrieval.endpoint is required for the http backend")?;
            Arc::new(HttpRetrievalGateway::new(endpoint, Duration::from_secs(retrieval.timeout_secs))?)
        }
        RetrievalBackend::None => Arc::new(NoRetrieval),
    };
    Ok(gateway)
}

/// Open the configured contact store.
pub async fn open_contact_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ContactStore>> {
    let contact = &config.contact;
    let store: Arc<dyn ContactStore> = match contact.store {
        ContactStoreKind::Memory => Arc::new(InMemoryContactStore::new()),
        ContactStoreKind::Sqlite => {
            if let Some(parent) = contact.database_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let url = format!("sqlite://{}", contact.database_path.display());
            Arc::new(SqliteContactStore::new(&url).await?)
        }
    };
    Ok(store)
}

fn build_sink(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationSink>> {
    let contact = &config.contact;
    let sink: Arc<dyn NotificationSink> = match contact.notify {
        NotifyKind::Log => Arc::new(LogNotificationSink),
        NotifyKind::Webhook => {
            let url = contact
                .webhook_url
                .clone()
                .context("contact.webhook_url is required for webhook notifications")?;
            Arc::new(WebhookNotificationSink::new(WebhookConfig {
                url,
                shared_secret: contact.webhook_secret.clone(),
                timeout: Duration::from_secs(contact.notify_timeout_secs),
            })?)
        }
    };
    Ok(sink)
}
