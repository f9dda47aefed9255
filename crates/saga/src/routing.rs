//! Routing keys, queue names, and the exchange topology.
//!
//! One topic exchange; durable queues per stage, bound by routing key.
//! [`BINDINGS`] is the single source of truth shared by the wiring in
//! `app` and by tests that assert on topology.

/// Logical exchange name (informational for the in-memory broker).
pub const SAGA_EXCHANGE: &str = "nova.orders.saga.exchange";

// Routing keys.
pub const FORM_VERIFY_KEY: &str = "orders.form.verify.routing.key";
pub const COUPON_APPLY_KEY: &str = "coupon.apply.routing.key";
pub const POINT_DECREMENT_KEY: &str = "point.decrement.routing.key";
pub const APPROVE_PAYMENT_KEY: &str = "orders.approve.payment.routing.key";
pub const SAVE_DATABASE_KEY: &str = "orders.save.database.routing.key";
pub const POINT_EARN_KEY: &str = "point.earn.routing.key";
pub const POINT_EARN_RETRY_KEY: &str = "point.earn.retry.routing.key";
pub const CART_DELETE_KEY: &str = "cart.delete.routing.key";
pub const DEAD_LETTER_KEY: &str = "nova.orders.saga.dead.routing.key";

pub const COMPENSATE_FORM_CONFIRM_KEY: &str = "compensate.orders.form.confirm.routing.key";
pub const COMPENSATE_COUPON_APPLY_KEY: &str = "compensate.coupon.apply.routing.key";
pub const COMPENSATE_POINT_DECREMENT_KEY: &str = "compensate.point.decrement.routing.key";
pub const COMPENSATE_APPROVE_PAYMENT_KEY: &str = "compensate.approve.payment.routing.key";

pub const PAYMENT_CANCEL_KEY: &str = "payment.cancel.routing.key";
pub const REQUEST_PAY_CANCEL_KEY: &str = "orders.request.pay.cancel.routing.key";

/// Every step handler republishes its outcome here; the router is the
/// only consumer of this key.
pub const SAGA_REPLY_KEY: &str = "orders.saga.reply.routing.key";

// Queue names.
pub const FORM_VERIFY_QUEUE: &str = "nova.orders.form.verify.queue";
pub const COUPON_APPLY_QUEUE: &str = "nova.coupon.apply.queue";
pub const POINT_DECREMENT_QUEUE: &str = "nova.point.decrement.queue";
pub const APPROVE_PAYMENT_QUEUE: &str = "nova.orders.approve.payment.queue";
pub const SAVE_DATABASE_QUEUE: &str = "nova.orders.save.orders.database.queue";
pub const POINT_EARN_QUEUE: &str = "nova.point.earn.queue";
pub const POINT_EARN_RETRY_QUEUE: &str = "nova.point.earn.retry.queue";
pub const CART_DELETE_QUEUE: &str = "nova.cart.delete.queue";
pub const DEAD_LETTER_QUEUE: &str = "nova.orders.saga.dead.queue";

pub const COMPENSATE_FORM_CONFIRM_QUEUE: &str = "nova.orders.compensate.form.confirm.queue";
pub const COMPENSATE_COUPON_APPLY_QUEUE: &str = "nova.coupon.compensate.apply.queue";
pub const COMPENSATE_POINT_DECREMENT_QUEUE: &str = "nova.point.compensate.decrement.queue";
pub const COMPENSATE_APPROVE_PAYMENT_QUEUE: &str = "nova.orders.compensate.approve.payment.queue";

pub const PAYMENT_CANCEL_QUEUE: &str = "nova.payment.cancel.queue";
pub const REQUEST_PAY_CANCEL_QUEUE: &str = "nova.orders.request.pay.cancel.queue";
pub const SAGA_REPLY_QUEUE: &str = "nova.orders.saga.router.queue";

/// (routing key, queue) pairs making up the full topology.
pub const BINDINGS: &[(&str, &str)] = &[
    (FORM_VERIFY_KEY, FORM_VERIFY_QUEUE),
    (COUPON_APPLY_KEY, COUPON_APPLY_QUEUE),
    (POINT_DECREMENT_KEY, POINT_DECREMENT_QUEUE),
    (APPROVE_PAYMENT_KEY, APPROVE_PAYMENT_QUEUE),
    (SAVE_DATABASE_KEY, SAVE_DATABASE_QUEUE),
    (POINT_EARN_KEY, POINT_EARN_QUEUE),
    (POINT_EARN_RETRY_KEY, POINT_EARN_RETRY_QUEUE),
    (CART_DELETE_KEY, CART_DELETE_QUEUE),
    (DEAD_LETTER_KEY, DEAD_LETTER_QUEUE),
    (COMPENSATE_FORM_CONFIRM_KEY, COMPENSATE_FORM_CONFIRM_QUEUE),
    (COMPENSATE_COUPON_APPLY_KEY, COMPENSATE_COUPON_APPLY_QUEUE),
    (
        COMPENSATE_POINT_DECREMENT_KEY,
        COMPENSATE_POINT_DECREMENT_QUEUE,
    ),
    (
        COMPENSATE_APPROVE_PAYMENT_KEY,
        COMPENSATE_APPROVE_PAYMENT_QUEUE,
    ),
    (PAYMENT_CANCEL_KEY, PAYMENT_CANCEL_QUEUE),
    (REQUEST_PAY_CANCEL_KEY, REQUEST_PAY_CANCEL_QUEUE),
    (SAGA_REPLY_KEY, SAGA_REPLY_QUEUE),
];
