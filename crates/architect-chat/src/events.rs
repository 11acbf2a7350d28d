//! Side-channel event publishing.
//!
//! Write operations may notify interested parties (dashboards, live
//! updates) after the fact. The publisher is an injected dependency,
//! never a process global, and a failing publisher never fails the
//! request that triggered it.

use serde_json::Value;
use tracing::info;

/// Publisher for post-write notifications.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, kind: &str, payload: Value);
}

/// Publisher that emits events to the log stream.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, kind: &str, payload: Value) {
        info!(event = kind, %payload, "event published");
    }
}
