//! Multi-turn contact collection.
//!
//! The dialogue is a linear state machine described by [`TRANSITIONS`]:
//! each row names the state it handles, the state it leads to, and the
//! function that validates the input and records it on the draft. A
//! cancellation word ends the dialogue from any state without side
//! effects. Finishing the last row yields a [`ContactRequest`] that is
//! persisted, then handed to the notification sink in the background with
//! the phone number blanked unless the query type allows sharing it.

use admitline_core::contact::{ContactRequest, QueryType};
use admitline_core::error::StoreError;
use admitline_core::event::{DomainEvent, EventBus};
use admitline_core::notify::NotificationSink;
use admitline_core::store::ContactStore;
use chrono::Utc;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::replies::Replies;

/// Exact (trimmed, case-insensitive) inputs that abandon the dialogue.
pub const CANCEL_WORDS: &[&str] = &["cancel", "stop", "nevermind", "never mind", "quit", "exit"];

/// Input that leaves the optional message empty.
pub const SKIP_WORD: &str = "skip";

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 100;
pub const MIN_PHONE_DIGITS: usize = 10;

pub(crate) const FRAUD_KEYWORDS: &[&str] = &["fraud", "agent", "scam", "unauthorized", "unauthorised"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

// ── States ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStep {
    AwaitingName,
    AwaitingEmail,
    AwaitingPhone,
    AwaitingQueryType,
    AwaitingMessage,
    Complete,
}

/// Fields collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub query_type: Option<QueryType>,
    pub message: Option<String>,
}

/// Where a session's contact dialogue stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueState {
    pub step: ContactStep,
    pub draft: ContactDraft,
}

impl DialogueState {
    pub fn start() -> Self {
        Self { step: ContactStep::AwaitingName, draft: ContactDraft::default() }
    }
}

/// Why an input was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInput {
    Name,
    Email,
    Phone,
}

// ── Transition table ──────────────────────────────────────────────────────

/// One row of the dialogue.
pub struct Transition {
    pub from: ContactStep,
    pub to: ContactStep,
    pub accept: fn(&str, &mut ContactDraft) -> Result<(), InvalidInput>,
}

pub const TRANSITIONS: &[Transition] = &[
    Transition { from: ContactStep::AwaitingName, to: ContactStep::AwaitingEmail, accept: accept_name },
    Transition { from: ContactStep::AwaitingEmail, to: ContactStep::AwaitingPhone, accept: accept_email },
    Transition { from: ContactStep::AwaitingPhone, to: ContactStep::AwaitingQueryType, accept: accept_phone },
    Transition {
        from: ContactStep::AwaitingQueryType,
        to: ContactStep::AwaitingMessage,
        accept: accept_query_type,
    },
    Transition { from: ContactStep::AwaitingMessage, to: ContactStep::Complete, accept: accept_message },
];

fn accept_name(input: &str, draft: &mut ContactDraft) -> Result<(), InvalidInput> {
    let name = input.trim();
    let chars = name.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&chars) {
        return Err(InvalidInput::Name);
    }
    draft.name = Some(name.to_string());
    Ok(())
}

fn accept_email(input: &str, draft: &mut ContactDraft) -> Result<(), InvalidInput> {
    let email = input.trim();
    if !is_valid_email(email) {
        return Err(InvalidInput::Email);
    }
    draft.email = Some(email.to_string());
    Ok(())
}

fn accept_phone(input: &str, draft: &mut ContactDraft) -> Result<(), InvalidInput> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return Err(InvalidInput::Phone);
    }
    draft.phone = Some(digits);
    Ok(())
}

fn accept_query_type(input: &str, draft: &mut ContactDraft) -> Result<(), InvalidInput> {
    draft.query_type = Some(parse_query_type(input));
    Ok(())
}

fn accept_message(input: &str, draft: &mut ContactDraft) -> Result<(), InvalidInput> {
    let message = input.trim();
    draft.message = (!message.eq_ignore_ascii_case(SKIP_WORD) && !message.is_empty())
        .then(|| message.to_string());
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Numeric choice 1–4, else fraud keywords, else `Other`.
pub fn parse_query_type(input: &str) -> QueryType {
    let choice = input.trim().to_ascii_lowercase();
    match choice.as_str() {
        "1" => QueryType::FraudReport,
        "2" => QueryType::GeneralInquiry,
        "3" => QueryType::Dissatisfied,
        "4" => QueryType::Other,
        text if FRAUD_KEYWORDS.iter().any(|k| text.contains(k)) => QueryType::FraudReport,
        _ => QueryType::Other,
    }
}

pub fn is_cancel(input: &str) -> bool {
    let input = input.trim();
    CANCEL_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Result of feeding one input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Advanced(DialogueState),
    Invalid(DialogueState, InvalidInput),
    Cancelled,
    Finished(ContactRequest),
}

/// Pure transition function. No I/O.
pub fn advance(mut state: DialogueState, input: &str) -> Step {
    if is_cancel(input) {
        return Step::Cancelled;
    }
    let Some(transition) = TRANSITIONS.iter().find(|t| t.from == state.step) else {
        // `Complete` has no outgoing row; a finished dialogue is never resumed.
        return Step::Cancelled;
    };
    if let Err(invalid) = (transition.accept)(input, &mut state.draft) {
        return Step::Invalid(state, invalid);
    }
    state.step = transition.to;
    if state.step != ContactStep::Complete {
        return Step::Advanced(state);
    }
    match finalize(state.draft.clone()) {
        Some(request) => Step::Finished(request),
        None => Step::Cancelled,
    }
}

fn finalize(draft: ContactDraft) -> Option<ContactRequest> {
    Some(ContactRequest::new(
        draft.name?,
        draft.email?,
        draft.phone?,
        draft.query_type?,
        draft.message,
    ))
}

// ── Flow ──────────────────────────────────────────────────────────────────

/// What the orchestrator should do after one dialogue turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactOutcome {
    /// Moved to the next state; `reply` asks for the next field.
    Continue { state: DialogueState, reply: String },
    /// Input refused; same state, `reply` explains and asks again.
    Reprompt { state: DialogueState, reply: String },
    Submitted { request: ContactRequest, reply: String },
    Cancelled { reply: String },
    /// Everything was collected but the store refused it. `request` holds
    /// the collected fields.
    PersistenceFailed { request: ContactRequest, error: String, reply: String },
}

impl ContactOutcome {
    pub fn reply(&self) -> &str {
        match self {
            ContactOutcome::Continue { reply, .. }
            | ContactOutcome::Reprompt { reply, .. }
            | ContactOutcome::Submitted { reply, .. }
            | ContactOutcome::Cancelled { reply }
            | ContactOutcome::PersistenceFailed { reply, .. } => reply,
        }
    }

    /// State to keep on the session, if the dialogue is still open.
    pub fn next_state(&self) -> Option<&DialogueState> {
        match self {
            ContactOutcome::Continue { state, .. } | ContactOutcome::Reprompt { state, .. } => Some(state),
            _ => None,
        }
    }
}

/// Drives the dialogue against the store and notification sink.
pub struct ContactFlow {
    store: Arc<dyn ContactStore>,
    sink: Arc<dyn NotificationSink>,
    events: Arc<EventBus>,
    replies: Arc<Replies>,
    store_timeout: Duration,
    notify_timeout: Duration,
}

impl ContactFlow {
    pub fn new(
        store: Arc<dyn ContactStore>,
        sink: Arc<dyn NotificationSink>,
        events: Arc<EventBus>,
        replies: Arc<Replies>,
        store_timeout: Duration,
        notify_timeout: Duration,
    ) -> Self {
        Self { store, sink, events, replies, store_timeout, notify_timeout }
    }

    /// Open a dialogue. Returns the initial state and the first prompt.
    pub fn start(&self) -> (DialogueState, String) {
        let state = DialogueState::start();
        let prompt = self.replies.contact_prompt(&state);
        (state, prompt)
    }

    /// Feed one user input to an open dialogue.
    pub async fn handle(&self, session_id: &str, state: DialogueState, input: &str) -> ContactOutcome {
        match advance(state, input) {
            Step::Advanced(state) => {
                let reply = self.replies.contact_prompt(&state);
                ContactOutcome::Continue { state, reply }
            }
            Step::Invalid(state, invalid) => {
                let reply = self.replies.contact_invalid(invalid);
                ContactOutcome::Reprompt { state, reply }
            }
            Step::Cancelled => {
                info!(session = session_id, "contact dialogue cancelled");
                ContactOutcome::Cancelled { reply: self.replies.contact_cancelled() }
            }
            Step::Finished(request) => self.submit(session_id, request).await,
        }
    }

    async fn submit(&self, session_id: &str, request: ContactRequest) -> ContactOutcome {
        let saved = tokio::time::timeout(self.store_timeout, self.store.save(&request))
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Storage(format!(
                    "save not acknowledged within {}s",
                    self.store_timeout.as_secs()
                )))
            });

        match saved {
            Ok(reference_id) => {
                let mut request = request;
                request.reference_id = reference_id;
                info!(
                    session = session_id,
                    reference_id = %request.reference_id,
                    query_type = %request.query_type,
                    "contact request stored"
                );
                self.events.publish(DomainEvent::ContactSubmitted {
                    reference_id: request.reference_id.clone(),
                    query_type: request.query_type.to_string(),
                    timestamp: Utc::now(),
                });
                self.notify(&request);
                let reply = self.replies.contact_submitted(&request);
                ContactOutcome::Submitted { request, reply }
            }
            Err(e) => {
                error!(
                    session = session_id,
                    collaborator = self.store.name(),
                    reference_id = %request.reference_id,
                    query_type = %request.query_type,
                    email = %request.email,
                    error = %e,
                    "contact request could not be stored"
                );
                self.events.publish(DomainEvent::CollaboratorFailed {
                    session_id: session_id.to_string(),
                    collaborator: "contact_store".into(),
                    intent: "contact_request".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                ContactOutcome::PersistenceFailed {
                    request,
                    error: e.to_string(),
                    reply: self.replies.contact_failed(),
                }
            }
        }
    }

    /// Fire-and-forget: the dialogue has already completed.
    fn notify(&self, request: &ContactRequest) {
        let (copy, phone_visible) = request.for_notification();
        let sink = self.sink.clone();
        let timeout = self.notify_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, sink.send(&copy, phone_visible)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    sink = sink.name(),
                    reference_id = %copy.reference_id,
                    error = %e,
                    "staff notification failed"
                ),
                Err(_) => warn!(
                    sink = sink.name(),
                    reference_id = %copy.reference_id,
                    timeout_secs = timeout.as_secs(),
                    "staff notification timed out"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingSink, RecordingStore};
    use admitline_config::InstitutionConfig;

    const WALK: [&str; 5] = ["Asha Rao", "asha@example.com", "+91 98765 43210", "2", "Please call after 5pm"];

    fn flow(store: Arc<RecordingStore>, sink: Arc<RecordingSink>) -> ContactFlow {
        ContactFlow::new(
            store,
            sink,
            Arc::new(EventBus::default()),
            Arc::new(Replies::new(&InstitutionConfig::default())),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    async fn wait_for_notification(sink: &RecordingSink) {
        for _ in 0..100 {
            if !sink.sent().is_empty() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("notification never sent");
    }

    #[test]
    fn table_is_linear() {
        let order: Vec<_> = TRANSITIONS.iter().map(|t| t.from).collect();
        assert_eq!(
            order,
            vec![
                ContactStep::AwaitingName,
                ContactStep::AwaitingEmail,
                ContactStep::AwaitingPhone,
                ContactStep::AwaitingQueryType,
                ContactStep::AwaitingMessage,
            ]
        );
        for pair in TRANSITIONS.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        assert_eq!(TRANSITIONS.last().map(|t| t.to), Some(ContactStep::Complete));
    }

    #[test]
    fn full_walk_yields_one_request_with_inputs() {
        let mut state = DialogueState::start();
        let mut finished = None;
        for input in WALK {
            match advance(state.clone(), input) {
                Step::Advanced(next) => state = next,
                Step::Finished(request) => finished = Some(request),
                other => panic!("unexpected step {other:?}"),
            }
        }
        let request = finished.unwrap();
        assert_eq!(request.name, "Asha Rao");
        assert_eq!(request.email, "asha@example.com");
        assert_eq!(request.phone, "919876543210");
        assert_eq!(request.query_type, QueryType::GeneralInquiry);
        assert_eq!(request.message.as_deref(), Some("Please call after 5pm"));
        assert_eq!(request.reference_id.len(), 8);
    }

    #[test]
    fn cancel_from_every_state() {
        let mut state = DialogueState::start();
        for (i, input) in WALK.iter().enumerate() {
            for word in ["cancel", " STOP ", "nevermind", "Never mind"] {
                assert_eq!(advance(state.clone(), word), Step::Cancelled, "step {i}, {word:?}");
            }
            if let Step::Advanced(next) = advance(state.clone(), input) {
                state = next;
            }
        }
    }

    #[test]
    fn invalid_email_keeps_state_and_fields() {
        let state = match advance(DialogueState::start(), "Asha") {
            Step::Advanced(s) => s,
            other => panic!("{other:?}"),
        };
        match advance(state.clone(), "not-an-email") {
            Step::Invalid(same, InvalidInput::Email) => assert_eq!(same, state),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn guards() {
        let mut draft = ContactDraft::default();
        assert_eq!(accept_name("A", &mut draft), Err(InvalidInput::Name));
        assert_eq!(accept_name("  ", &mut draft), Err(InvalidInput::Name));
        assert_eq!(accept_phone("98765-4321", &mut draft), Ok(()));
        assert_eq!(accept_phone("12345", &mut draft), Err(InvalidInput::Phone));
        assert!(is_valid_email("a.b+c@vnrvjiet.ac.in"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn query_type_choices_and_keywords() {
        assert_eq!(parse_query_type("1"), QueryType::FraudReport);
        assert_eq!(parse_query_type(" 3 "), QueryType::Dissatisfied);
        assert_eq!(parse_query_type("4"), QueryType::Other);
        assert_eq!(parse_query_type("an agent asked me for money"), QueryType::FraudReport);
        assert_eq!(parse_query_type("Unauthorized payment"), QueryType::FraudReport);
        assert_eq!(parse_query_type("hostel question"), QueryType::Other);
    }

    #[test]
    fn skip_leaves_message_empty() {
        let mut draft = ContactDraft::default();
        accept_message("SKIP", &mut draft).unwrap();
        assert_eq!(draft.message, None);
    }

    #[tokio::test]
    async fn submit_persists_and_notifies() {
        let store = Arc::new(RecordingStore::new());
        let sink = Arc::new(RecordingSink::new());
        let flow = flow(store.clone(), sink.clone());
        let (mut state, prompt) = flow.start();
        assert!(prompt.contains("full name"));

        let mut last = None;
        for input in WALK {
            let outcome = flow.handle("s1", state.clone(), input).await;
            if let Some(next) = outcome.next_state() {
                state = next.clone();
            }
            last = Some(outcome);
        }
        let Some(ContactOutcome::Submitted { request, reply }) = last else {
            panic!("expected submission");
        };
        assert!(reply.contains(&request.reference_id));
        assert_eq!(store.saved().len(), 1);

        wait_for_notification(&sink).await;
        let (sent, visible) = &sink.sent()[0];
        assert!(*visible);
        assert_eq!(sent.phone, "919876543210");
    }

    #[tokio::test]
    async fn private_query_types_hide_phone_from_sink() {
        for choice in ["3", "4", "something else"] {
            let store = Arc::new(RecordingStore::new());
            let sink = Arc::new(RecordingSink::new());
            let flow = flow(store.clone(), sink.clone());
            let mut state = flow.start().0;
            let inputs = ["Ravi", "ravi@example.com", "9876543210", choice, "skip"];
            let mut last = None;
            for input in inputs {
                let outcome = flow.handle("s", state.clone(), input).await;
                if let Some(next) = outcome.next_state() {
                    state = next.clone();
                }
                last = Some(outcome);
            }
            let Some(ContactOutcome::Submitted { reply, .. }) = last else {
                panic!("expected submission");
            };
            assert!(reply.contains("kept private"));

            wait_for_notification(&sink).await;
            let (sent, visible) = &sink.sent()[0];
            assert!(!*visible, "choice {choice}");
            assert!(sent.phone.is_empty());
            // The stored copy keeps the number.
            assert_eq!(store.saved()[0].phone, "9876543210");
        }
    }

    #[tokio::test]
    async fn cancellation_has_no_side_effects() {
        let store = Arc::new(RecordingStore::new());
        let sink = Arc::new(RecordingSink::new());
        let flow = flow(store.clone(), sink.clone());
        let state = DialogueState {
            step: ContactStep::AwaitingMessage,
            draft: ContactDraft {
                name: Some("Asha".into()),
                email: Some("asha@example.com".into()),
                phone: Some("9876543210".into()),
                query_type: Some(QueryType::Other),
                message: None,
            },
        };
        let outcome = flow.handle("s", state, "cancel").await;
        assert!(matches!(outcome, ContactOutcome::Cancelled { .. }));
        assert!(outcome.next_state().is_none());
        tokio::task::yield_now().await;
        assert!(store.saved().is_empty());
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_distinct_and_keeps_fields() {
        let store = Arc::new(RecordingStore::failing());
        let sink = Arc::new(RecordingSink::new());
        let flow = flow(store, sink.clone());
        let state = DialogueState {
            step: ContactStep::AwaitingMessage,
            draft: ContactDraft {
                name: Some("Asha".into()),
                email: Some("asha@example.com".into()),
                phone: Some("9876543210".into()),
                query_type: Some(QueryType::FraudReport),
                message: None,
            },
        };
        match flow.handle("s", state, "an agent took money").await {
            ContactOutcome::PersistenceFailed { request, reply, .. } => {
                assert_eq!(request.email, "asha@example.com");
                assert_eq!(request.message.as_deref(), Some("an agent took money"));
                assert!(reply.contains("admissions@vnrvjiet.ac.in"));
            }
            other => panic!("expected persistence failure, got {other:?}"),
        }
        tokio::task::yield_now().await;
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_block_submission() {
        let store = Arc::new(RecordingStore::new());
        let sink = Arc::new(RecordingSink::failing());
        let flow = flow(store.clone(), sink.clone());
        let state = DialogueState {
            step: ContactStep::AwaitingMessage,
            draft: ContactDraft {
                name: Some("Asha".into()),
                email: Some("asha@example.com".into()),
                phone: Some("9876543210".into()),
                query_type: Some(QueryType::GeneralInquiry),
                message: None,
            },
        };
        let outcome = flow.handle("s", state, "skip").await;
        assert!(matches!(outcome, ContactOutcome::Submitted { .. }));
        wait_for_notification(&sink).await;
        assert_eq!(store.saved().len(), 1);
    }
}
