//! Step handlers: one consumer per saga stage.
//!
//! Every handler follows the same contract: deserialize the envelope,
//! perform one unit of work against its own resource, set the
//! `SUCCESS_*`/`FAIL_*` outcome, and republish to the router inbound
//! key on a guaranteed-finally path — the republish happens whatever
//! the work's outcome, so the saga never silently vanishes.

pub mod cart;
pub mod coupon;
pub mod payment;
pub mod persist;
pub mod point;
pub mod verify;

pub use cart::CartDeleteHandler;
pub use coupon::CouponApplyHandler;
pub use payment::PaymentApproveHandler;
pub use persist::PersistOrderHandler;
pub use point::{PointDecrementHandler, PointEarnHandler};
pub use verify::FormVerifyHandler;
