//! ContactStore trait — persistence for finalized contact requests.

use async_trait::async_trait;

use crate::contact::{ContactRequest, ContactStatus};
use crate::error::StoreError;

/// Persists contact requests. The core only ever inserts; status changes
/// belong to staff-facing tooling.
#[async_trait]
pub trait ContactStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist the request and return its reference id.
    async fn save(&self, request: &ContactRequest) -> Result<String, StoreError>;

    /// All stored requests, newest first.
    async fn list(&self) -> Result<Vec<ContactRequest>, StoreError>;

    /// Stored requests with one status, newest first.
    async fn list_by_status(&self, status: ContactStatus) -> Result<Vec<ContactRequest>, StoreError> {
        let mut all = self.list().await?;
        all.retain(|r| r.status == status);
        Ok(all)
    }
}
