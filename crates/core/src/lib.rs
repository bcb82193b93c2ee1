//! # admitline Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! admissions conversation runtime. Everything the orchestration layer
//! consumes from the outside world (generation, retrieval, persistence,
//! notification) is a trait here; implementations live in their own crates.

pub mod contact;
pub mod cutoff;
pub mod error;
pub mod event;
pub mod generator;
pub mod intent;
pub mod message;
pub mod notify;
pub mod retrieval;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use contact::{ContactRequest, ContactStatus, QueryType};
pub use cutoff::{CutoffKey, CutoffQuery, CutoffRecord, Quota, RelaxableField};
pub use error::{Error, GeneratorError, NotifyError, Result, RetrievalError, StoreError, ValidationError};
pub use event::{CapacityLevel, DomainEvent, EventBus};
pub use generator::{GenerationRequest, Generator};
pub use intent::{Entities, Intent};
pub use message::{Message, Role, SessionId};
pub use notify::NotificationSink;
pub use retrieval::{NoRetrieval, Passage, RetrievalGateway, ScopeFilter};
pub use store::ContactStore;
