//! RetrievalGateway trait — the contract to the semantic search collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source_label: String,
    /// Relevance score assigned by the backend, if any.
    #[serde(default)]
    pub score: f32,
}

impl Passage {
    pub fn new(content: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_label: source_label.into(),
            score: 0.0,
        }
    }
}

/// Restricts retrieval to documents about the configured institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub institution: String,
    pub top_k: usize,
}

/// Semantic retrieval over institution documents. Results are ordered,
/// most relevant first.
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, text: &str, scope: &ScopeFilter) -> Result<Vec<Passage>, RetrievalError>;
}

/// Retrieval that never finds anything. Used when no backend is configured.
pub struct NoRetrieval;

#[async_trait]
impl RetrievalGateway for NoRetrieval {
    fn name(&self) -> &str {
        "none"
    }

    async fn query(&self, _text: &str, _scope: &ScopeFilter) -> Result<Vec<Passage>, RetrievalError> {
        Ok(Vec::new())
    }
}
