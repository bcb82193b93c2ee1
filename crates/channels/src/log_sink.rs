//! Notification sink that writes finalized requests to the structured log.
//!
//! The default for deployments without a staff webhook: operators pick
//! requests up from log aggregation.

use admitline_core::contact::ContactRequest;
use admitline_core::error::NotifyError;
use admitline_core::notify::NotificationSink;
use async_trait::async_trait;
use tracing::info;

pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, request: &ContactRequest, phone_visible: bool) -> Result<(), NotifyError> {
        let phone = if phone_visible { request.phone.as_str() } else { "[private]" };
        info!(
            reference_id = %request.reference_id,
            query_type = %request.query_type,
            name = %request.name,
            email = %request.email,
            phone,
            "New contact request"
        );
        Ok(())
    }
}
