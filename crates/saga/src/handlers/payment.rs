//! Payment approval step.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentProvider;
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::idempotency::{IdempotencyGuard, step};
use crate::message::SagaMessage;
use crate::routing;
use crate::status::SagaStatus;

/// Confirms the prepared payment with the external provider.
///
/// The provider-reported amount must equal the running total computed
/// by the earlier steps; on mismatch the step fails without the
/// provider ever being called.
pub struct PaymentApproveHandler<B> {
    bus: B,
    provider: Arc<dyn PaymentProvider>,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> PaymentApproveHandler<B> {
    pub fn new(bus: B, provider: Arc<dyn PaymentProvider>, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            provider,
            guard,
        }
    }

    async fn approve(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        if msg.payment.reported_amount != msg.calculate_total_amount {
            return Err(domain::DomainError::AmountMismatch {
                reported: msg.payment.reported_amount,
                calculated: msg.calculate_total_amount,
            });
        }

        if self
            .guard
            .already_done(msg.payment.order_code, step::APPROVE_PAYMENT)
        {
            return Ok(());
        }
        self.provider
            .confirm(
                msg.payment.order_code,
                &msg.payment.payment_key,
                msg.calculate_total_amount,
            )
            .await?;
        self.guard
            .first_delivery(msg.payment.order_code, step::APPROVE_PAYMENT);

        tracing::info!(
            order = %msg.payment.order_code,
            amount = %msg.calculate_total_amount,
            "payment approved"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for PaymentApproveHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        match self.approve(&msg).await {
            Ok(()) => msg.status = SagaStatus::SuccessApprovePayment,
            Err(err) => {
                tracing::error!(order = %msg.payment.order_code, %err, "payment approval failed");
                msg.status = SagaStatus::FailApprovePayment;
            }
        }
        self.bus
            .publish(routing::SAGA_REPLY_KEY, serde_json::to_value(&msg)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Amount, MemberId, OrderCode};
    use domain::InMemoryPaymentProvider;
    use transport::InMemoryBroker;

    fn broker_with_reply_queue() -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker.declare_queue(routing::SAGA_REPLY_QUEUE);
        broker
            .bind(routing::SAGA_REPLY_KEY, routing::SAGA_REPLY_QUEUE)
            .unwrap();
        broker
    }

    fn message(code: OrderCode, reported: u64, calculated: u64) -> SagaMessage {
        SagaMessage::builder(
            SagaStatus::ProceedApprovePayment,
            crate::message::PaymentRequest {
                member_id: Some(MemberId::new(7)),
                order_code: code,
                payment_key: "pay-key".to_string(),
                reported_amount: Amount::new(reported),
            },
        )
        .calculate_total_amount(Amount::new(calculated))
        .build()
    }

    fn reply(broker: &InMemoryBroker) -> SagaMessage {
        let mut replies = broker.drain_queue(routing::SAGA_REPLY_QUEUE);
        assert_eq!(replies.len(), 1);
        serde_json::from_value(replies.pop().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_matching_amounts_confirm_payment() {
        let broker = broker_with_reply_queue();
        let provider = InMemoryPaymentProvider::new();
        let handler = PaymentApproveHandler::new(
            broker.clone(),
            Arc::new(provider.clone()),
            IdempotencyGuard::new(),
        );

        handler
            .consume(serde_json::to_value(message(OrderCode::new(), 23_500, 23_500)).unwrap())
            .await
            .unwrap();

        assert_eq!(reply(&broker).status, SagaStatus::SuccessApprovePayment);
        assert!(provider.is_confirmed("pay-key"));
    }

    #[tokio::test]
    async fn test_amount_mismatch_never_reaches_provider() {
        let broker = broker_with_reply_queue();
        let provider = InMemoryPaymentProvider::new();
        let handler = PaymentApproveHandler::new(
            broker.clone(),
            Arc::new(provider.clone()),
            IdempotencyGuard::new(),
        );

        handler
            .consume(serde_json::to_value(message(OrderCode::new(), 99_999, 23_500)).unwrap())
            .await
            .unwrap();

        assert_eq!(reply(&broker).status, SagaStatus::FailApprovePayment);
        assert_eq!(provider.confirmed_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_rejection_fails_step() {
        let broker = broker_with_reply_queue();
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on_confirm(true);
        let handler = PaymentApproveHandler::new(
            broker.clone(),
            Arc::new(provider.clone()),
            IdempotencyGuard::new(),
        );

        handler
            .consume(serde_json::to_value(message(OrderCode::new(), 23_500, 23_500)).unwrap())
            .await
            .unwrap();

        assert_eq!(reply(&broker).status, SagaStatus::FailApprovePayment);
        assert_eq!(provider.confirmed_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_confirms_once() {
        let broker = broker_with_reply_queue();
        let provider = InMemoryPaymentProvider::new();
        let handler = PaymentApproveHandler::new(
            broker.clone(),
            Arc::new(provider.clone()),
            IdempotencyGuard::new(),
        );
        let payload = serde_json::to_value(message(OrderCode::new(), 23_500, 23_500)).unwrap();

        handler.consume(payload.clone()).await.unwrap();
        broker.drain_queue(routing::SAGA_REPLY_QUEUE);
        handler.consume(payload).await.unwrap();

        assert_eq!(reply(&broker).status, SagaStatus::SuccessApprovePayment);
        assert_eq!(provider.confirmed_count(), 1);
    }
}
