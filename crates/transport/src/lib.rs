//! Message transport boundary for the order saga.
//!
//! Models a topic exchange with durable queues bound by routing key.
//! Delivery is at-least-once: a consumer that fails sees the same
//! payload again, so consumers must tolerate duplicates.
//!
//! [`InMemoryBroker`] is the in-process implementation used by tests
//! and local wiring; its [`InMemoryBroker::run_until_idle`] pump makes
//! multi-hop message flows deterministic without a real broker.

pub mod bus;
pub mod error;
pub mod memory;

pub use bus::{Consumer, MessageBus};
pub use error::TransportError;
pub use memory::{DEFAULT_MAX_REDELIVERIES, InMemoryBroker};
