//! Per-message routing.
//!
//! One call to [`Orchestrator::handle`] serves one inbound message: the
//! session is locked for the whole call, an open contact dialogue takes the
//! message before anything else, and otherwise the classified intent picks
//! between fixed templates, the cutoff engine, retrieval and the generator.
//! Collaborator failures degrade to a templated reply; only malformed input
//! is reported as an error.

use admitline_config::AppConfig;
use admitline_core::error::{Error, ValidationError};
use admitline_core::event::{DomainEvent, EventBus};
use admitline_core::generator::Generator;
use admitline_core::intent::{Entities, Intent};
use admitline_core::message::{Message, SessionId, sanitize_input};
use admitline_core::notify::NotificationSink;
use admitline_core::retrieval::{Passage, RetrievalGateway, ScopeFilter};
use admitline_core::store::ContactStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::contact::{ContactFlow, FRAUD_KEYWORDS};
use crate::context::{BudgetPolicy, HistoryStrategy, TokenBudgetManager, TokenCounter};
use crate::cutoff::{self, CutoffEngine, CutoffOutcome};
use crate::intent::IntentClassifier;
use crate::intent::entities::{contains_any, normalize};
use crate::replies::Replies;
use crate::session::{Session, SessionStore};

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self { message: message.into(), session_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub intent: Intent,
    pub session_id: String,
    /// Where the answer came from, in order of first use.
    #[serde(default)]
    pub sources: Vec<String>,
}

// ── Wiring ────────────────────────────────────────────────────────────────

/// External collaborators the orchestrator is built from.
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub retrieval: Arc<dyn RetrievalGateway>,
    pub store: Arc<dyn ContactStore>,
    pub sink: Arc<dyn NotificationSink>,
    pub counter: Arc<dyn TokenCounter>,
    pub cutoffs: Arc<CutoffEngine>,
    pub events: Arc<EventBus>,
}

/// Limits not owned by a collaborator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_message_chars: usize,
    pub max_history_messages: usize,
    pub retrieval_timeout: Duration,
    pub top_k: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_message_chars: config.gateway.max_message_chars,
            max_history_messages: config.session.max_history_messages,
            retrieval_timeout: Duration::from_secs(config.retrieval.timeout_secs),
            top_k: config.retrieval.top_k,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_message_chars: 1000,
            max_history_messages: 20,
            retrieval_timeout: Duration::from_secs(5),
            top_k: 4,
        }
    }
}

/// What a cutoff lookup produced for the reply.
#[derive(Debug, Clone, Default)]
struct CutoffFacts {
    /// Deterministic answer text, also the grounding given to the generator.
    summary: String,
    /// Closing rank the reply must quote, already formatted.
    cite: Option<String>,
}

enum CutoffLookup {
    /// Branch or category still unknown.
    Missing(Vec<&'static str>),
    NotFound(String),
    Found(CutoffFacts),
}

/// A reply before it is recorded on the session.
struct Answer {
    reply: String,
    sources: Vec<String>,
    /// Compacted history to keep in place of the session's, after a
    /// summarizing generation.
    history: Option<Vec<Message>>,
}

impl Answer {
    fn template(reply: String) -> Self {
        Self { reply, sources: Vec::new(), history: None }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────

pub struct Orchestrator {
    classifier: IntentClassifier,
    cutoffs: Arc<CutoffEngine>,
    retrieval: Arc<dyn RetrievalGateway>,
    budget: TokenBudgetManager,
    contact: ContactFlow,
    sessions: Arc<SessionStore>,
    replies: Arc<Replies>,
    events: Arc<EventBus>,
    scope: ScopeFilter,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn from_config(config: &AppConfig, collaborators: Collaborators) -> Self {
        let replies = Arc::new(Replies::new(&config.institution));
        let contact = ContactFlow::new(
            collaborators.store,
            collaborators.sink,
            collaborators.events.clone(),
            replies.clone(),
            Duration::from_secs(config.contact.store_timeout_secs),
            Duration::from_secs(config.contact.notify_timeout_secs),
        );
        let budget = TokenBudgetManager::new(
            collaborators.counter,
            collaborators.generator,
            collaborators.events.clone(),
            BudgetPolicy::from_config(config),
        );
        Self {
            classifier: IntentClassifier::new(&config.institution),
            cutoffs: collaborators.cutoffs,
            retrieval: collaborators.retrieval,
            budget,
            contact,
            sessions: Arc::new(SessionStore::new(Duration::from_secs(config.session.idle_timeout_secs))),
            replies,
            events: collaborators.events,
            scope: ScopeFilter {
                institution: config.institution.short_name.clone(),
                top_k: config.retrieval.top_k,
            },
            settings: OrchestratorSettings::from_config(config),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn cutoffs(&self) -> &CutoffEngine {
        &self.cutoffs
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Serve one message. Only malformed input is an error; every other
    /// failure is answered with a degraded reply.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, ValidationError> {
        let text = sanitize_input(&request.message, self.settings.max_message_chars)?;
        let session_id = SessionId::parse(request.session_id.as_deref())?;

        let mut session = self.sessions.acquire(&session_id).await;
        let user = self.counted(Message::user(text.as_str()));

        // The stored state is only replaced once the step finishes, so a
        // caller that goes away mid-submit leaves the collected fields intact.
        if let Some(state) = session.dialogue.clone() {
            let outcome = self.contact.handle(session_id.as_str(), state, &text).await;
            session.dialogue = outcome.next_state().cloned();
            let reply = outcome.reply().to_string();
            self.record(&mut session, user, &reply, None);
            return Ok(ChatReply {
                reply,
                intent: Intent::ContactRequest,
                session_id: session_id.0,
                sources: Vec::new(),
            });
        }

        let classification = self.classifier.classify(&text, session.last_intent);
        let intent = classification.intent;
        info!(
            session_id = %session_id,
            intent = %intent,
            rule = classification.rule,
            "routing message"
        );

        let answer = match intent {
            Intent::OutOfScope => Answer::template(self.replies.out_of_scope()),
            Intent::Greeting => Answer::template(self.replies.greeting()),
            Intent::ContactRequest => {
                let (state, prompt) = self.contact.start();
                session.dialogue = Some(state);
                Answer::template(prompt)
            }
            Intent::Cutoff | Intent::Mixed | Intent::Informational => {
                self.answer(&mut session, &text, &user, intent, classification.entities).await
            }
        };

        session.last_intent = Some(intent);
        self.record(&mut session, user, &answer.reply, answer.history);
        Ok(ChatReply {
            reply: answer.reply,
            intent,
            session_id: session_id.0,
            sources: answer.sources,
        })
    }

    /// The lookup, retrieval and generation path.
    async fn answer(
        &self,
        session: &mut Session,
        text: &str,
        user: &Message,
        intent: Intent,
        mut entities: Entities,
    ) -> Answer {
        let session_id = session.id.as_str().to_string();
        let mut grounding = String::new();
        let mut sources = Vec::new();
        let mut facts = None;

        if intent.needs_cutoff_lookup() {
            if session.last_intent == Some(Intent::Cutoff)
                && let Some(earlier) = &session.cutoff_entities
            {
                entities.merge_missing(earlier);
            }
            let lookup = self.lookup_cutoffs(&entities);
            session.cutoff_entities = Some(entities);

            match (lookup, intent) {
                (CutoffLookup::Missing(missing), Intent::Cutoff) => {
                    return Answer::template(self.replies.missing_cutoff_fields(&missing));
                }
                (CutoffLookup::NotFound(description), Intent::Cutoff) => {
                    info!(session_id = %session_id, query = %description, "no cutoff data");
                    return Answer::template(self.replies.no_cutoff_data(&description));
                }
                (CutoffLookup::Missing(missing), _) => {
                    grounding.push_str(&format!(
                        "The user has not said which {} they mean. Ask for it before quoting any cutoff rank.\n\n",
                        missing.join(" or ")
                    ));
                }
                (CutoffLookup::NotFound(description), _) => {
                    grounding.push_str(&format!(
                        "No cutoff data is available for {description}. Say so; do not estimate a rank.\n\n"
                    ));
                }
                (CutoffLookup::Found(found), _) => {
                    grounding.push_str("Cutoff data (quote these figures exactly):\n");
                    grounding.push_str(&found.summary);
                    grounding.push_str("\n\n");
                    sources.push(format!("{} Cutoff Database", self.replies.short_name()));
                    facts = Some(found);
                }
            }
        }

        if intent.needs_retrieval() {
            let passages = self.retrieve(&session_id, text, intent).await;
            if !passages.is_empty() {
                grounding.push_str("Reference passages:\n");
                for passage in &passages {
                    grounding.push_str(&format!("[{}] {}\n", passage.source_label, passage.content.trim()));
                    if !sources.contains(&passage.source_label) {
                        sources.push(passage.source_label.clone());
                    }
                }
            }
        }

        let fraud_related = contains_any(&normalize(text), FRAUD_KEYWORDS);
        let mut guardrails = self.replies.guardrails(fraud_related);
        if !grounding.is_empty() {
            guardrails.push('\n');
            guardrails.push_str(grounding.trim_end());
        }

        match self.budget.generate(&session_id, &guardrails, &session.messages, user).await {
            Ok(generated) => {
                debug!(
                    session_id = %session_id,
                    tokens = generated.context.report.total_tokens,
                    available = generated.context.report.available,
                    retried = generated.retried_without_history,
                    "reply generated"
                );
                let mut reply = generated.text.trim().to_string();
                if !fraud_related {
                    reply = self.scrub_helpline(reply);
                }
                if let Some(facts) = &facts {
                    reply = ensure_cited(reply, facts);
                }
                let history = matches!(generated.context.report.strategy, HistoryStrategy::Summarized { .. })
                    .then_some(generated.context.history);
                Answer { reply, sources, history }
            }
            Err(e) => {
                self.collaborator_failed(&session_id, intent, &e);
                match facts {
                    Some(facts) => Answer { reply: facts.summary, sources, history: None },
                    None => Answer::template(self.replies.apology()),
                }
            }
        }
    }

    /// Look up every requested branch. Branch and category are required.
    fn lookup_cutoffs(&self, entities: &Entities) -> CutoffLookup {
        let branches = if entities.all_branches {
            self.cutoffs.branches()
        } else {
            entities.branches.clone()
        };

        let mut missing = Vec::new();
        if branches.is_empty() {
            missing.push("branch");
        }
        if entities.category.is_none() {
            missing.push("category");
        }
        if !missing.is_empty() {
            return CutoffLookup::Missing(missing);
        }

        let mut lines = Vec::new();
        let mut cite = None;
        let mut unmatched = Vec::new();
        for branch in &branches {
            match self.cutoffs.lookup(&cutoff::query_for(entities, Some(branch))) {
                CutoffOutcome::NotFound => unmatched.push(branch.as_str()),
                outcome => {
                    let shown = cutoff::headline(outcome.records());
                    lines.extend(shown.iter().map(|r| format!("• {}", cutoff::describe(r))));
                    if let CutoffOutcome::Relaxed { relaxed, .. } = &outcome {
                        lines.push(self.replies.relaxed_caveat(relaxed));
                    }
                    if let Some(best) = shown.first() {
                        if let Some(rank) = entities.rank {
                            lines.push(cutoff::eligibility_verdict(rank, best));
                        }
                        cite.get_or_insert_with(|| cutoff::format_rank(best.closing_rank));
                    }
                }
            }
        }

        if cite.is_none() {
            return CutoffLookup::NotFound(describe_query(entities, &branches));
        }
        for branch in unmatched {
            lines.push(format!("No cutoff data is available for {branch}."));
        }
        CutoffLookup::Found(CutoffFacts { summary: lines.join("\n"), cite })
    }

    async fn retrieve(&self, session_id: &str, text: &str, intent: Intent) -> Vec<Passage> {
        let scope = ScopeFilter { top_k: self.settings.top_k, ..self.scope.clone() };
        let result = tokio::time::timeout(self.settings.retrieval_timeout, self.retrieval.query(text, &scope))
            .await
            .unwrap_or_else(|_| {
                Err(admitline_core::error::RetrievalError::Timeout(
                    self.settings.retrieval_timeout.as_secs(),
                ))
            });
        match result {
            Ok(passages) => passages,
            Err(e) => {
                self.collaborator_failed(session_id, intent, &Error::Retrieval(e));
                Vec::new()
            }
        }
    }

    fn collaborator_failed(&self, session_id: &str, intent: Intent, e: &Error) {
        if matches!(e, Error::ContextOverflow(_)) {
            error!(session_id, intent = %intent, error = %e, "capacity incident: context overflow");
        } else {
            warn!(
                session_id,
                intent = %intent,
                collaborator = e.collaborator(),
                error = %e,
                "collaborator failed, degrading reply"
            );
        }
        self.events.publish(DomainEvent::CollaboratorFailed {
            session_id: session_id.to_string(),
            collaborator: e.collaborator().to_string(),
            intent: intent.to_string(),
            error_message: e.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn counted(&self, message: Message) -> Message {
        let tokens = self.budget.counter().count_message(&message);
        message.with_token_count(tokens)
    }

    fn record(&self, session: &mut Session, user: Message, reply: &str, compacted: Option<Vec<Message>>) {
        if let Some(history) = compacted {
            session.messages = history;
        }
        let assistant = self.counted(Message::assistant(reply));
        session.record_exchange(user, assistant, self.settings.max_history_messages);
    }

    /// The fraud helpline is only given out for fraud-related questions.
    fn scrub_helpline(&self, reply: String) -> String {
        let helpline = self.replies.fraud_helpline();
        if helpline.is_empty() || !reply.contains(helpline) {
            return reply;
        }
        warn!("generated reply disclosed the fraud helpline; removed");
        reply.replace(helpline, "the admissions office")
    }
}

/// Keep the generated wording but make sure the looked-up rank is quoted.
fn ensure_cited(reply: String, facts: &CutoffFacts) -> String {
    match &facts.cite {
        Some(rank) if !reply.contains(rank.as_str()) => {
            if reply.is_empty() {
                facts.summary.clone()
            } else {
                format!("{reply}\n\n{}", facts.summary)
            }
        }
        _ => reply,
    }
}

/// "CSE, ECE OC (Girls, 2025)" for the no-data reply.
fn describe_query(entities: &Entities, branches: &[String]) -> String {
    let mut description = format!(
        "{} {}",
        branches.join(", "),
        entities.category.as_deref().unwrap_or_default()
    );
    let mut details = Vec::new();
    if let Some(gender) = &entities.gender {
        details.push(gender.clone());
    }
    if let Some(quota) = entities.quota {
        details.push(format!("{quota} quota"));
    }
    if let Some(disability) = &entities.disability {
        details.push(disability.clone());
    }
    if let Some(year) = entities.year {
        details.push(year.to_string());
    }
    if !details.is_empty() {
        description.push_str(&format!(" ({})", details.join(", ")));
    }
    description
}
