//! HTTP retrieval gateway — forwards queries to an external semantic
//! search service.
//!
//! Wire format: `POST {endpoint}` with `{"query", "top_k", "scope"}`,
//! answered by a JSON array of `{"content", "source_label", "score"?}`.

use admitline_core::error::RetrievalError;
use admitline_core::retrieval::{Passage, RetrievalGateway, ScopeFilter};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpRetrievalGateway {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    top_k: usize,
    scope: &'a str,
}

impl HttpRetrievalGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        })
    }
}

#[async_trait]
impl RetrievalGateway for HttpRetrievalGateway {
    fn name(&self) -> &str {
        "http"
    }

    async fn query(&self, text: &str, scope: &ScopeFilter) -> Result<Vec<Passage>, RetrievalError> {
        let body = QueryBody {
            query: text,
            top_k: scope.top_k,
            scope: &scope.institution,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::Timeout(self.timeout.as_secs())
                } else {
                    RetrievalError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Retrieval service returned error");
            return Err(RetrievalError::QueryFailed(format!("status {status}")));
        }

        let mut passages: Vec<Passage> = response
            .json()
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("Failed to parse response: {e}")))?;
        passages.truncate(scope.top_k.max(1));
        debug!(hits = passages.len(), "HTTP retrieval");
        Ok(passages)
    }
}
