//! Shared fakes for the agent's unit tests.

use admitline_core::contact::ContactRequest;
use admitline_core::error::{GeneratorError, NotifyError, RetrievalError, StoreError};
use admitline_core::generator::{GenerationRequest, Generator};
use admitline_core::message::Message;
use admitline_core::notify::NotificationSink;
use admitline_core::retrieval::{Passage, RetrievalGateway, ScopeFilter};
use admitline_core::store::ContactStore;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::context::TokenCounter;

/// One token per whitespace-separated word, so tests can size messages
/// exactly.
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn name(&self) -> &str {
        "words"
    }

    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// A generator that plays back scripted replies, then a default one.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GeneratorError>>>,
    summary: Mutex<Result<String, GeneratorError>>,
    requests: Mutex<Vec<GenerationRequest>>,
    summarize_calls: Mutex<usize>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            summary: Mutex::new(Ok("student asked about CSE at rank 5000".into())),
            requests: Mutex::new(Vec::new()),
            summarize_calls: Mutex::new(0),
        }
    }

    pub fn with_replies(replies: Vec<Result<String, GeneratorError>>) -> Self {
        let generator = Self::new();
        *generator.replies.lock().unwrap() = replies.into();
        generator
    }

    pub fn with_summary(self, summary: Result<String, GeneratorError>) -> Self {
        *self.summary.lock().unwrap() = summary;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn summarize_calls(&self) -> usize {
        *self.summarize_calls.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, GeneratorError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Here is what I found.".into()))
    }

    async fn summarize(&self, _messages: &[Message]) -> Result<String, GeneratorError> {
        *self.summarize_calls.lock().unwrap() += 1;
        self.summary.lock().unwrap().clone()
    }
}

/// Retrieval that returns fixed passages or a fixed failure.
pub struct StaticRetrieval {
    pub result: Result<Vec<Passage>, RetrievalError>,
    pub calls: Mutex<usize>,
}

impl StaticRetrieval {
    pub fn passages(passages: Vec<Passage>) -> Self {
        Self { result: Ok(passages), calls: Mutex::new(0) }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(RetrievalError::Unavailable("index offline".into())),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RetrievalGateway for StaticRetrieval {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(&self, _text: &str, _scope: &ScopeFilter) -> Result<Vec<Passage>, RetrievalError> {
        *self.calls.lock().unwrap() += 1;
        self.result.clone()
    }
}

/// Contact store that records saves, fails every save, or never answers.
pub struct RecordingStore {
    pub saved: Mutex<Vec<ContactRequest>>,
    pub fail: bool,
    pub hang: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self { saved: Mutex::new(Vec::new()), fail: false, hang: false }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn hanging() -> Self {
        Self { hang: true, ..Self::new() }
    }

    pub fn saved(&self) -> Vec<ContactRequest> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn save(&self, request: &ContactRequest) -> Result<String, StoreError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(StoreError::Storage("disk full".into()));
        }
        self.saved.lock().unwrap().push(request.clone());
        Ok(request.reference_id.clone())
    }

    async fn list(&self) -> Result<Vec<ContactRequest>, StoreError> {
        Ok(self.saved())
    }
}

/// Notification sink that records what it was sent.
pub struct RecordingSink {
    pub sent: Mutex<Vec<(ContactRequest, bool)>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: false }
    }

    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn sent(&self) -> Vec<(ContactRequest, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, request: &ContactRequest, phone_visible: bool) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((request.clone(), phone_visible));
        if self.fail {
            return Err(NotifyError::DeliveryFailed("mail relay down".into()));
        }
        Ok(())
    }
}
