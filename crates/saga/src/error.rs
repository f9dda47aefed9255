//! Saga-level error type.

use thiserror::Error;

/// Errors surfaced by the saga entry points.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Transport-level failure (publish, topology).
    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    /// Resource-level failure outside a step handler.
    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    /// Envelope serialization failure.
    #[error("payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),
}
