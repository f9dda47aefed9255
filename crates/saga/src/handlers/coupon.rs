//! Coupon application step.

use async_trait::async_trait;
use domain::{CouponStore, DraftStore};
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::idempotency::{IdempotencyGuard, step};
use crate::message::SagaMessage;
use crate::routing;
use crate::status::SagaStatus;

/// Marks the draft's chosen coupon used and records its discount.
pub struct CouponApplyHandler<B> {
    bus: B,
    drafts: DraftStore,
    coupons: CouponStore,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> CouponApplyHandler<B> {
    pub fn new(bus: B, drafts: DraftStore, coupons: CouponStore, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            drafts,
            coupons,
            guard,
        }
    }

    async fn apply(&self, msg: &mut SagaMessage) -> domain::error::Result<()> {
        let draft = self
            .drafts
            .find(msg.payment.member_id, msg.payment.order_code)?;
        let coupon_id = draft
            .coupon_id
            .ok_or(domain::DomainError::CouponMissingOnDraft(
                msg.payment.order_code,
            ))?;

        let discount = if self
            .guard
            .already_done(msg.payment.order_code, step::APPLY_COUPON)
        {
            self.coupons.discount_of(coupon_id)?
        } else {
            let discount = self.coupons.mark_used(coupon_id)?;
            self.guard
                .first_delivery(msg.payment.order_code, step::APPLY_COUPON);
            discount
        };

        msg.coupon_amount = discount;
        tracing::info!(
            order = %msg.payment.order_code,
            coupon = %coupon_id,
            discount = %discount,
            "coupon applied"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for CouponApplyHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        match self.apply(&mut msg).await {
            Ok(()) => msg.status = SagaStatus::SuccessApplyCoupon,
            Err(err) => {
                tracing::error!(order = %msg.payment.order_code, %err, "coupon application failed");
                msg.status = SagaStatus::FailApplyCoupon;
            }
        }
        self.bus
            .publish(routing::SAGA_REPLY_KEY, serde_json::to_value(&msg)?)
            .await
    }
}
