//! Notification sinks for admitline.
//!
//! A sink tells the admissions team that a contact request was submitted.
//!
//! Available sinks:
//! - **Log** — structured `tracing` event
//! - **Webhook** — signed JSON POST to a staff endpoint

pub mod log_sink;
pub mod webhook;

pub use log_sink::LogNotificationSink;
pub use webhook::{WebhookConfig, WebhookNotificationSink};
