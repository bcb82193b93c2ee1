//! In-memory contact store — fast, ephemeral, for testing and dev.

use admitline_core::contact::ContactRequest;
use admitline_core::error::StoreError;
use admitline_core::store::ContactStore;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Contact requests held in process memory.
pub struct InMemoryContactStore {
    requests: RwLock<Vec<ContactRequest>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

impl Default for InMemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, request: &ContactRequest) -> Result<String, StoreError> {
        let mut requests = self.requests.write().await;
        if requests.iter().any(|r| r.reference_id == request.reference_id) {
            return Err(StoreError::Storage(format!(
                "duplicate reference id {}",
                request.reference_id
            )));
        }
        requests.push(request.clone());
        Ok(request.reference_id.clone())
    }

    async fn list(&self) -> Result<Vec<ContactRequest>, StoreError> {
        let mut all = self.requests.read().await.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
