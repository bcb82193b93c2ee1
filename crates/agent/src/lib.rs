//! The conversation core of admitline.
//!
//! Each inbound message goes through the [`Orchestrator`]:
//!
//! 1. **Lock** the session (one in-flight message per session)
//! 2. **Delegate** to the contact dialogue if one is open
//! 3. **Classify** the message with the rule table in [`intent`]
//! 4. **Answer** from a template, the [`CutoffEngine`], retrieval, or the
//!    generator, with the context bounded by the [`TokenBudgetManager`]
//! 5. **Record** the exchange on the session
//!
//! Collaborator failures degrade to templated replies; the orchestrator
//! stays available when a dependency is down.

pub mod contact;
pub mod context;
pub mod cutoff;
pub mod intent;
pub mod orchestrator;
pub mod replies;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use contact::{ContactFlow, ContactOutcome, ContactStep, DialogueState};
pub use context::{
    AssembledContext, BpeCounter, BudgetPolicy, BudgetReport, Generated, HeuristicCounter,
    HistoryStrategy, TokenBudgetManager, TokenCounter, counter_for, encoding_counter,
};
pub use cutoff::{CutoffEngine, CutoffOutcome, IngestReport};
pub use intent::{Classification, IntentClassifier};
pub use orchestrator::{ChatReply, ChatRequest, Collaborators, Orchestrator, OrchestratorSettings};
pub use replies::Replies;
pub use session::{Session, SessionStore};
