//! Post-success cancellation flow.
//!
//! Separate entry path from the creation saga: the order already
//! persisted, the buyer wants it undone. The order flips to
//! `Canceled`, the provider gets a cancel instruction, and guest
//! orders additionally re-publish the creation saga's compensation
//! keys so the shared compensation handlers reverse the resource
//! usage. No second state machine.

use async_trait::async_trait;
use domain::OrderRepository;
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::message::{PaymentCancelRequest, PaymentRequest, RequestPayCancelMessage, SagaMessage};
use crate::routing;
use crate::status::SagaStatus;

/// Reason string sent to the provider for buyer-requested cancels.
pub const BUYER_CANCEL_REASON: &str = "purchase cancellation";

/// Consumes [`RequestPayCancelMessage`] and unwinds a persisted order.
pub struct CancelRequestHandler<B> {
    bus: B,
    orders: OrderRepository,
}

impl<B: MessageBus> CancelRequestHandler<B> {
    pub fn new(bus: B, orders: OrderRepository) -> Self {
        Self { bus, orders }
    }

    async fn cancel(&self, req: &RequestPayCancelMessage) -> Result<(), TransportError> {
        self.orders
            .cancel(req.order_code)
            .map_err(|err| TransportError::Consumer(err.to_string()))?;

        self.bus
            .publish(
                routing::PAYMENT_CANCEL_KEY,
                serde_json::to_value(PaymentCancelRequest {
                    payment_key: req.payment_key.clone(),
                    cancel_reason: BUYER_CANCEL_REASON.to_string(),
                })?,
            )
            .await?;

        // Member resource reversal is handled by the member-facing
        // services; only guest usage is unwound through the saga's
        // compensation keys.
        if req.member_id.is_none() {
            let envelope = serde_json::to_value(
                SagaMessage::builder(
                    SagaStatus::ProceedRequestPayCancel,
                    PaymentRequest {
                        member_id: None,
                        order_code: req.order_code,
                        payment_key: req.payment_key.clone(),
                        reported_amount: common::Amount::zero(),
                    },
                )
                .build(),
            )?;

            if !req.use_point_amount.is_zero() {
                // The re-credit handler requires a member id, so this
                // guest envelope ends up in the dead-letter queue.
                // Guest drafts cannot hold points; a nonzero amount
                // here is bad upstream data and surfaces there.
                self.bus
                    .publish(routing::COMPENSATE_POINT_DECREMENT_KEY, envelope.clone())
                    .await?;
            }
            if req.coupon_id.is_some() {
                self.bus
                    .publish(routing::COMPENSATE_COUPON_APPLY_KEY, envelope.clone())
                    .await?;
            }
            self.bus
                .publish(routing::COMPENSATE_FORM_CONFIRM_KEY, envelope)
                .await?;
        }

        tracing::info!(order = %req.order_code, "order cancellation requested");
        metrics::counter!("saga_order_cancellations").increment(1);
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for CancelRequestHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let req: RequestPayCancelMessage = serde_json::from_value(payload)?;
        self.cancel(&req).await
    }
}
