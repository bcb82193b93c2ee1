//! Capacity monitoring for admitline.
//!
//! The orchestration layer publishes [`DomainEvent`]s for context
//! thresholds, overflow incidents, degraded replies and data-quality
//! problems. [`CapacityMonitor`] subscribes to the event bus and keeps
//! running counters plus a short list of recent incidents for operators.
//!
//! [`DomainEvent`]: admitline_core::event::DomainEvent

pub mod engine;
pub mod model;

pub use engine::CapacityMonitor;
pub use model::{CapacitySnapshot, Incident, IncidentKind};
