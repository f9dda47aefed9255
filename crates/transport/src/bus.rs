//! Publish and consume traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// Publishing side of the transport.
///
/// Payloads are structured JSON documents; the routing key selects the
/// bound queue. Publishing never blocks on the consumer.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a payload under the given routing key.
    async fn publish(&self, routing_key: &str, payload: Value) -> Result<(), TransportError>;
}

/// A unit of work bound to one queue.
///
/// Returning an error requeues the delivery (at-least-once semantics),
/// so consumers that have their own failure protocol should catch
/// internally and return `Ok`.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Handles one delivered payload.
    async fn consume(&self, payload: Value) -> Result<(), TransportError>;
}
