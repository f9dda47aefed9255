//! Choreographed order-creation saga.
//!
//! An order purchase spans independently owned resources: inventory,
//! coupons, member points, an external payment provider, and the order
//! database. No distributed transaction exists across them; instead a
//! [`message::SagaMessage`] travels queue to queue, each step handler
//! mutates exactly one resource and reports back, and the
//! [`router::SagaRouter`] decides the next hop from a pure transition
//! table. Any forward failure fans out compensating actions for the
//! steps that already committed, in reverse order of commitment.
//!
//! Entry points: [`app::SagaApp::order_invoke`] starts a creation saga;
//! [`app::SagaApp::request_cancel`] unwinds an already completed order.

pub mod app;
pub mod cancel;
pub mod compensate;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod message;
pub mod router;
pub mod routing;
pub mod status;

pub use app::{SagaApp, SagaResources};
pub use config::SagaConfig;
pub use error::SagaError;
pub use message::{PaymentRequest, RequestPayCancelMessage, SagaMessage, SkipFlags};
pub use router::{Route, SagaRouter, route};
pub use status::SagaStatus;
