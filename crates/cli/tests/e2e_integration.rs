//! End-to-end tests for the admitline conversation pipeline.
//!
//! These drive the orchestrator and the HTTP router with scripted
//! collaborators, from raw user input to the reply a student would see.

use std::sync::{Arc, Mutex};

use admitline_agent::{
    ChatReply, ChatRequest, Collaborators, ContactStep, CutoffEngine, HeuristicCounter, Orchestrator,
    TokenCounter,
};
use admitline_channels::LogNotificationSink;
use admitline_config::AppConfig;
use admitline_core::contact::QueryType;
use admitline_core::cutoff::{CutoffRecord, Quota};
use admitline_core::error::{GeneratorError, RetrievalError};
use admitline_core::event::{DomainEvent, EventBus};
use admitline_core::generator::{GenerationRequest, Generator};
use admitline_core::intent::Intent;
use admitline_core::message::{Message, SessionId};
use admitline_core::retrieval::{Passage, RetrievalGateway, ScopeFilter};
use admitline_core::store::ContactStore;
use admitline_gateway::{GatewayState, build_router};
use admitline_memory::InMemoryContactStore;
use admitline_telemetry::CapacityMonitor;

// ── Mock collaborators ───────────────────────────────────────────────────

/// Records every request and answers with a fixed line.
struct RecordingGenerator {
    reply: String,
    requests: Mutex<Vec<GenerationRequest>>,
    summaries: Mutex<usize>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Self {
        Self { reply: reply.into(), requests: Mutex::new(Vec::new()), summaries: Mutex::new(0) }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn summaries(&self) -> usize {
        *self.summaries.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Generator for RecordingGenerator {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    fn model(&self) -> &str {
        "e2e-model"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, GeneratorError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.reply.clone())
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, GeneratorError> {
        *self.summaries.lock().unwrap() += 1;
        Ok(format!("Student asked {} admissions questions.", messages.len() / 2))
    }
}

/// Counts queries and returns one passage.
struct CountingRetrieval {
    calls: Mutex<usize>,
}

#[async_trait::async_trait]
impl RetrievalGateway for CountingRetrieval {
    fn name(&self) -> &str {
        "e2e_retrieval"
    }

    async fn query(&self, _text: &str, scope: &ScopeFilter) -> Result<Vec<Passage>, RetrievalError> {
        *self.calls.lock().unwrap() += 1;
        assert_eq!(scope.institution, "VNRVJIET");
        Ok(vec![Passage::new(
            "Original certificates and two photographs are required at reporting.",
            "admissions-guide.md",
        )])
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn record(year: u16, branch: &str, category: &str, gender: &str, quota: Quota, close: u32) -> CutoffRecord {
    CutoffRecord {
        year,
        branch: branch.into(),
        category: category.into(),
        gender: gender.into(),
        quota,
        disability: None,
        opening_rank: 1,
        closing_rank: close,
    }
}

fn cutoff_table(config: &AppConfig) -> CutoffEngine {
    CutoffEngine::from_records(
        vec![
            record(2025, "CSE", "OC", "Boys", Quota::Convenor, 1850),
            record(2025, "CSE", "OC", "Girls", Quota::Convenor, 2450),
            record(2024, "CSE", "OC", "Boys", Quota::Convenor, 2100),
            record(2025, "CSE", "OC", "Boys", Quota::Sports, 9100),
            record(2025, "ECE", "BC-B", "Boys", Quota::Convenor, 7400),
        ],
        config.cutoff.relaxation_order.clone(),
    )
    .0
}

struct Pipeline {
    orchestrator: Arc<Orchestrator>,
    generator: Arc<RecordingGenerator>,
    retrieval: Arc<CountingRetrieval>,
    store: Arc<InMemoryContactStore>,
    events: Arc<EventBus>,
}

fn pipeline_with(config: AppConfig, generator_reply: &str) -> Pipeline {
    let generator = Arc::new(RecordingGenerator::new(generator_reply));
    let retrieval = Arc::new(CountingRetrieval { calls: Mutex::new(0) });
    let store = Arc::new(InMemoryContactStore::new());
    let events = Arc::new(EventBus::new(256));
    let orchestrator = Orchestrator::from_config(
        &config,
        Collaborators {
            generator: generator.clone(),
            retrieval: retrieval.clone(),
            store: store.clone(),
            sink: Arc::new(LogNotificationSink),
            counter: Arc::new(HeuristicCounter),
            cutoffs: Arc::new(cutoff_table(&config)),
            events: events.clone(),
        },
    );
    Pipeline { orchestrator: Arc::new(orchestrator), generator, retrieval, store, events }
}

fn pipeline() -> Pipeline {
    pipeline_with(AppConfig::default(), "Here is what I found.")
}

async fn ask(p: &Pipeline, message: &str, session: &str) -> ChatReply {
    p.orchestrator
        .handle(ChatRequest::new(message, Some(session.to_string())))
        .await
        .unwrap()
}

async fn dialogue_step(p: &Pipeline, session: &str) -> Option<ContactStep> {
    let id = SessionId::parse(Some(session)).unwrap();
    let guard = p.orchestrator.sessions().acquire(&id).await;
    guard.dialogue.as_ref().map(|d| d.step)
}

// ── E2E: Cutoff questions ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_cutoff_question_cites_closing_rank() {
    let p = pipeline();
    let reply = ask(&p, "What is the CSE cutoff for OC category in 2025?", "s1").await;

    assert_eq!(reply.intent, Intent::Cutoff);
    assert!(reply.reply.contains("1,850"), "reply: {}", reply.reply);
    assert_eq!(reply.sources, vec!["VNRVJIET Cutoff Database".to_string()]);

    // The generator was grounded on the matching 2025 record only.
    let request = &p.generator.requests()[0];
    assert!(request.guardrails.contains("1,850"));
    assert!(!request.guardrails.contains("2,100"));
    assert_eq!(*p.retrieval.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn e2e_quota_keeps_separate_rank_lists() {
    let p = pipeline();
    let reply = ask(&p, "CSE OC sports quota cutoff 2025", "s1").await;
    assert_eq!(reply.intent, Intent::Cutoff);
    assert!(reply.reply.contains("9,100"), "reply: {}", reply.reply);
}

#[tokio::test]
async fn e2e_follow_up_fills_missing_category() {
    let p = pipeline();
    let first = ask(&p, "What is the ECE cutoff?", "s1").await;
    assert!(first.reply.contains("category"));
    assert_eq!(p.generator.calls(), 0);

    let second = ask(&p, "BC-B", "s1").await;
    assert_eq!(second.intent, Intent::Cutoff);
    assert!(second.reply.contains("7,400"), "reply: {}", second.reply);
}

#[tokio::test]
async fn e2e_unknown_combination_never_invents_a_rank() {
    let p = pipeline();
    let reply = ask(&p, "What is the EEE cutoff for ST category?", "s1").await;
    assert_eq!(reply.intent, Intent::Cutoff);
    assert!(reply.reply.contains("don't have cutoff data"));
    assert_eq!(p.generator.calls(), 0);
}

// ── E2E: Informational questions ─────────────────────────────────────────

#[tokio::test]
async fn e2e_informational_answer_is_grounded() {
    let p = pipeline();
    let reply = ask(&p, "What documents do I need at reporting?", "s1").await;

    assert_eq!(reply.intent, Intent::Informational);
    assert_eq!(reply.sources, vec!["admissions-guide.md".to_string()]);
    assert!(p.generator.requests()[0].guardrails.contains("two photographs"));
}

// ── E2E: Scope ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_other_institution_is_refused_without_collaborators() {
    let p = pipeline();
    let reply = ask(&p, "What is the CSE cutoff at CBIT?", "s1").await;

    assert_eq!(reply.intent, Intent::OutOfScope);
    assert!(reply.reply.contains("only with admissions information"));
    assert_eq!(p.generator.calls(), 0);
    assert_eq!(*p.retrieval.calls.lock().unwrap(), 0);
    assert!(p.store.list().await.unwrap().is_empty());
}

// ── E2E: Contact dialogue ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_contact_request_starts_at_name() {
    let p = pipeline();
    let reply = ask(&p, "I'm not happy, let me talk to someone", "s1").await;

    assert_eq!(reply.intent, Intent::ContactRequest);
    assert!(reply.reply.contains("full name"));
    assert_eq!(dialogue_step(&p, "s1").await, Some(ContactStep::AwaitingName));
}

#[tokio::test]
async fn e2e_invalid_email_keeps_the_step() {
    let p = pipeline();
    ask(&p, "I'm not happy, let me talk to someone", "s1").await;
    ask(&p, "Ravi Kumar", "s1").await;
    assert_eq!(dialogue_step(&p, "s1").await, Some(ContactStep::AwaitingEmail));

    let retry = ask(&p, "not-an-email", "s1").await;
    assert!(retry.reply.contains("valid email"));
    assert_eq!(dialogue_step(&p, "s1").await, Some(ContactStep::AwaitingEmail));

    // The draft survived the bad input.
    let next = ask(&p, "ravi@example.com", "s1").await;
    assert!(next.reply.contains("phone number"));
    let id = SessionId::parse(Some("s1")).unwrap();
    let session = p.orchestrator.sessions().acquire(&id).await;
    let dialogue = session.dialogue.as_ref().unwrap();
    assert_eq!(dialogue.step, ContactStep::AwaitingPhone);
    assert_eq!(dialogue.draft.name.as_deref(), Some("Ravi Kumar"));
    assert_eq!(dialogue.draft.email.as_deref(), Some("ravi@example.com"));
}

#[tokio::test]
async fn e2e_fraud_report_is_stored_with_phone() {
    let p = pipeline();
    for line in [
        "I want to report fraud, please connect me with the admission team",
        "Meena Iyer",
        "meena@example.com",
        "+91 98480 22338",
        "1",
        "An agent asked for 2 lakhs for a management seat",
    ] {
        ask(&p, line, "s1").await;
    }

    let saved = p.store.list().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].query_type, QueryType::FraudReport);
    assert_eq!(saved[0].phone, "919848022338");
    assert!(saved[0].message.as_deref().unwrap_or_default().contains("management seat"));
    assert_eq!(dialogue_step(&p, "s1").await, None);
}

#[tokio::test]
async fn e2e_cancel_leaves_nothing_behind() {
    let p = pipeline();
    ask(&p, "Can someone call me back?", "s1").await;
    ask(&p, "Ravi Kumar", "s1").await;
    let reply = ask(&p, "cancel", "s1").await;

    assert!(reply.reply.contains("cancelled"));
    assert_eq!(dialogue_step(&p, "s1").await, None);
    assert!(p.store.list().await.unwrap().is_empty());

    let after = ask(&p, "What is the CSE cutoff for OC category in 2025?", "s1").await;
    assert_eq!(after.intent, Intent::Cutoff);
}

// ── E2E: Token budget ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_long_conversation_stays_inside_the_window() {
    let mut config = AppConfig::default();
    config.context.context_limit = Some(2000);
    config.generator.max_response_tokens = 300;
    config.session.max_history_messages = 40;
    let p = pipeline_with(config, "Bring your certificates and fee receipt.");
    let mut events = p.events.subscribe();
    let budget = 2000 - 300;

    for i in 0..12 {
        let message = format!(
            "Question {i}: what documents are needed for reporting? {}",
            "Please explain in detail. ".repeat(35)
        );
        assert!(message.len() <= 1000);
        let reply = ask(&p, &message, "long").await;
        assert_eq!(reply.intent, Intent::Informational);
    }

    for request in p.generator.requests() {
        let used = HeuristicCounter.count(&request.guardrails) + HeuristicCounter.count_messages(&request.messages);
        assert!(used <= budget, "request used {used} of {budget} tokens");
        assert_eq!(request.messages.last().unwrap().role, admitline_core::message::Role::User);
    }
    assert!(p.generator.summaries() >= 1);

    let mut summarized = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event.as_ref(), DomainEvent::HistorySummarized { .. }) {
            summarized += 1;
        }
    }
    assert!(summarized >= 1);
}

// ── E2E: Concurrency ─────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn e2e_concurrent_sessions_are_independent() {
    let p = pipeline();
    let asks = (0..16).map(|i| {
        let orchestrator = p.orchestrator.clone();
        async move {
            orchestrator
                .handle(ChatRequest::new(
                    "What is the CSE cutoff for OC category in 2025?",
                    Some(format!("student-{i}")),
                ))
                .await
        }
    });
    let replies = futures::future::join_all(asks).await;

    for (i, reply) in replies.into_iter().enumerate() {
        let reply = reply.unwrap();
        assert_eq!(reply.session_id, format!("student-{i}"));
        assert!(reply.reply.contains("1,850"));
    }
    assert_eq!(p.orchestrator.sessions().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn e2e_same_session_messages_are_serialized() {
    let p = pipeline();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = p.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .handle(ChatRequest::new(format!("What is the hostel fee, take {i}?"), Some("shared".into())))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Every exchange landed; none overwrote another.
    let id = SessionId::parse(Some("shared")).unwrap();
    let session = p.orchestrator.sessions().acquire(&id).await;
    assert_eq!(session.messages.len(), 16);
    for pair in session.messages.chunks(2) {
        assert_eq!(pair[0].role, admitline_core::message::Role::User);
        assert_eq!(pair[1].role, admitline_core::message::Role::Assistant);
    }
}

// ── E2E: Gateway (router only, no server) ────────────────────────────────

#[tokio::test]
async fn e2e_gateway_chat_round_trip() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let config = AppConfig::default();
    let p = pipeline();
    let state = Arc::new(GatewayState {
        orchestrator: p.orchestrator.clone(),
        monitor: Arc::new(CapacityMonitor::new()),
        institution: config.institution.short_name.clone(),
    });
    let app = build_router(state, &config.gateway);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"message":"What is the CSE cutoff at CBIT?","session_id":"web-1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["intent"], "out_of_scope");
    assert_eq!(json["session_id"], "web-1");
    assert_eq!(p.generator.calls(), 0);
}
