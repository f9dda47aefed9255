//! Dead-letter sink.
//!
//! Terminal failures are not retried; they land here for operator
//! inspection. The monitor keeps every envelope it sees so tests and
//! tooling can assert on what went to the grave.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use transport::{Consumer, TransportError};

/// Records every envelope arriving on the dead-letter queue.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterMonitor {
    seen: Arc<RwLock<Vec<Value>>>,
}

impl DeadLetterMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dead-lettered envelopes.
    pub fn count(&self) -> usize {
        self.seen.read().unwrap().len()
    }

    /// All recorded envelopes, in arrival order.
    pub fn messages(&self) -> Vec<Value> {
        self.seen.read().unwrap().clone()
    }

    /// The `status` field of each recorded envelope.
    pub fn statuses(&self) -> Vec<String> {
        self.seen
            .read()
            .unwrap()
            .iter()
            .filter_map(|v| v.get("status").and_then(Value::as_str).map(String::from))
            .collect()
    }
}

#[async_trait]
impl Consumer for DeadLetterMonitor {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::error!(%status, "saga message dead-lettered");
        metrics::counter!("saga_dead_lettered").increment(1);
        self.seen.write().unwrap().push(payload);
        Ok(())
    }
}
