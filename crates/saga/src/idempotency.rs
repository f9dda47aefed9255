//! Duplicate-delivery guard.
//!
//! The transport is at-least-once, so every mutating step checks here
//! before touching its resource: the first delivery for a given
//! (order, step) pair wins, later duplicates skip the mutation and
//! republish their outcome unchanged.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use common::OrderCode;

/// Step labels used as idempotency keys.
pub mod step {
    pub const CONFIRM_ORDER_FORM: &str = "confirm_order_form";
    pub const APPLY_COUPON: &str = "apply_coupon";
    pub const POINT_DECREMENT: &str = "point_decrement";
    pub const APPROVE_PAYMENT: &str = "approve_payment";
    pub const SAVE_ORDERS: &str = "save_orders";
    pub const EARN_POINT: &str = "earn_point";
    pub const COMPENSATE_FORM_CONFIRM: &str = "compensate_form_confirm";
    pub const COMPENSATE_COUPON: &str = "compensate_coupon";
    pub const COMPENSATE_POINT: &str = "compensate_point";
    pub const COMPENSATE_PAYMENT: &str = "compensate_payment";
}

/// Shared first-delivery tracker.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyGuard {
    seen: Arc<RwLock<HashSet<(OrderCode, &'static str)>>>,
}

impl IdempotencyGuard {
    /// Creates an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the (order, step) pair; returns true on first delivery.
    pub fn first_delivery(&self, order: OrderCode, step: &'static str) -> bool {
        self.seen.write().unwrap().insert((order, step))
    }

    /// Returns true if the step already ran for this order.
    pub fn already_done(&self, order: OrderCode, step: &'static str) -> bool {
        self.seen.read().unwrap().contains(&(order, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delivery_wins_once() {
        let guard = IdempotencyGuard::new();
        let order = OrderCode::new();

        assert!(guard.first_delivery(order, step::POINT_DECREMENT));
        assert!(!guard.first_delivery(order, step::POINT_DECREMENT));
        assert!(guard.already_done(order, step::POINT_DECREMENT));
    }

    #[test]
    fn test_steps_and_orders_are_independent() {
        let guard = IdempotencyGuard::new();
        let order_a = OrderCode::new();
        let order_b = OrderCode::new();

        assert!(guard.first_delivery(order_a, step::APPLY_COUPON));
        assert!(guard.first_delivery(order_a, step::POINT_DECREMENT));
        assert!(guard.first_delivery(order_b, step::APPLY_COUPON));
    }
}
