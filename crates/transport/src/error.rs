//! Transport error types.

use thiserror::Error;

/// Errors that can occur at the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Payload could not be serialized or deserialized.
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A queue was referenced before being declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// A consumer rejected a delivery.
    #[error("Consumer failure: {0}")]
    Consumer(String),
}

/// Convenience type alias for transport results.
pub type Result<T> = std::result::Result<T, TransportError>;
