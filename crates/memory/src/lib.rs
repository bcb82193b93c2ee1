//! Data-side collaborators for admitline: cutoff snapshots, document
//! retrieval, and contact request persistence.

pub mod contacts_memory;
pub mod http_retrieval;
pub mod knowledge;
pub mod snapshot;

#[cfg(feature = "sqlite")]
pub mod contacts_sqlite;

pub use contacts_memory::InMemoryContactStore;
pub use http_retrieval::HttpRetrievalGateway;
pub use knowledge::LocalKnowledgeBase;
pub use snapshot::{Snapshot, load_snapshot, parse_snapshot};

#[cfg(feature = "sqlite")]
pub use contacts_sqlite::SqliteContactStore;
