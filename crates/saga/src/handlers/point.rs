//! Point decrement and point earn steps.

use async_trait::async_trait;
use domain::{DraftStore, PointLedger};
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::idempotency::{IdempotencyGuard, step};
use crate::message::SagaMessage;
use crate::routing;
use crate::status::SagaStatus;

/// Debits the points the buyer chose to spend.
pub struct PointDecrementHandler<B> {
    bus: B,
    drafts: DraftStore,
    points: PointLedger,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> PointDecrementHandler<B> {
    pub fn new(bus: B, drafts: DraftStore, points: PointLedger, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            drafts,
            points,
            guard,
        }
    }

    async fn decrement(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        let member = msg
            .payment
            .member_id
            .ok_or(domain::DomainError::MemberRequired)?;
        let draft = self.drafts.find(Some(member), msg.payment.order_code)?;

        if self
            .guard
            .already_done(msg.payment.order_code, step::POINT_DECREMENT)
        {
            return Ok(());
        }
        self.points.debit(member, draft.use_point_amount)?;
        self.guard
            .first_delivery(msg.payment.order_code, step::POINT_DECREMENT);

        tracing::info!(
            order = %msg.payment.order_code,
            member = %member,
            debited = %draft.use_point_amount,
            "points decremented"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for PointDecrementHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        match self.decrement(&msg).await {
            Ok(()) => msg.status = SagaStatus::SuccessPointDecrement,
            Err(err) => {
                tracing::error!(order = %msg.payment.order_code, %err, "point decrement failed");
                msg.status = SagaStatus::FailPointDecrement;
            }
        }
        self.bus
            .publish(routing::SAGA_REPLY_KEY, serde_json::to_value(&msg)?)
            .await
    }
}

/// Credits the reward points computed at verification time.
pub struct PointEarnHandler<B> {
    bus: B,
    points: PointLedger,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> PointEarnHandler<B> {
    pub fn new(bus: B, points: PointLedger, guard: IdempotencyGuard) -> Self {
        Self { bus, points, guard }
    }

    async fn earn(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        let member = msg
            .payment
            .member_id
            .ok_or(domain::DomainError::MemberRequired)?;

        if self
            .guard
            .already_done(msg.payment.order_code, step::EARN_POINT)
        {
            return Ok(());
        }
        self.points.credit(member, msg.earn_point_amount)?;
        self.guard
            .first_delivery(msg.payment.order_code, step::EARN_POINT);

        tracing::info!(
            order = %msg.payment.order_code,
            member = %member,
            credited = %msg.earn_point_amount,
            "points earned"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for PointEarnHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        match self.earn(&msg).await {
            Ok(()) => msg.status = SagaStatus::SuccessEarnPoint,
            Err(err) => {
                tracing::error!(order = %msg.payment.order_code, %err, "point earn failed");
                msg.status = SagaStatus::FailEarnPoint;
            }
        }
        self.bus
            .publish(routing::SAGA_REPLY_KEY, serde_json::to_value(&msg)?)
            .await
    }
}
