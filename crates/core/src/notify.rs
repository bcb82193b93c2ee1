//! NotificationSink trait — tells the admissions team a request arrived.

use async_trait::async_trait;

use crate::contact::ContactRequest;
use crate::error::NotifyError;

/// Receives finalized contact requests. Callers pass a copy whose phone
/// field is already blanked when `phone_visible` is false.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: &ContactRequest, phone_visible: bool) -> Result<(), NotifyError>;
}
