//! Compensation handlers: the reverse path.
//!
//! Each handler undoes one forward step. Deltas are re-derived from
//! the original draft, never from current resource state, so a
//! compensation applied after unrelated catalog or ledger changes
//! still reverses exactly what the forward step did. Every mutation is
//! guarded by the idempotency store; a retried compensation cannot
//! double-credit. A compensation that itself fails publishes the
//! envelope to the dead-letter key, the end of the line.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{BookStore, CouponStore, DraftStore, PaymentProvider, PointLedger};
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::idempotency::{IdempotencyGuard, step};
use crate::message::{PaymentCancelRequest, SagaMessage};
use crate::routing;
use crate::status::SagaStatus;

/// Reason string sent to the provider when the saga unwinds a payment.
pub const SAGA_CANCEL_REASON: &str = "order saga compensation";

/// Re-increments inventory for every draft line.
pub struct RestockHandler<B> {
    bus: B,
    drafts: DraftStore,
    books: BookStore,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> RestockHandler<B> {
    pub fn new(bus: B, drafts: DraftStore, books: BookStore, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            drafts,
            books,
            guard,
        }
    }

    fn restock(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        if self
            .guard
            .already_done(msg.payment.order_code, step::COMPENSATE_FORM_CONFIRM)
        {
            return Ok(());
        }
        let draft = self
            .drafts
            .find(msg.payment.member_id, msg.payment.order_code)?;
        self.books.restock(&draft.lines)?;
        self.guard
            .first_delivery(msg.payment.order_code, step::COMPENSATE_FORM_CONFIRM);
        tracing::info!(order = %msg.payment.order_code, "inventory restocked");
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for RestockHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        if let Err(err) = self.restock(&msg) {
            tracing::error!(order = %msg.payment.order_code, %err, "restock compensation failed");
            msg.status = SagaStatus::FailCompensateConfirmOrderForm;
            metrics::counter!("saga_compensation_failures").increment(1);
            return self
                .bus
                .publish(routing::DEAD_LETTER_KEY, serde_json::to_value(&msg)?)
                .await;
        }
        Ok(())
    }
}

/// Reverts the draft's coupon back to unused.
pub struct CouponRevertHandler<B> {
    bus: B,
    drafts: DraftStore,
    coupons: CouponStore,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> CouponRevertHandler<B> {
    pub fn new(bus: B, drafts: DraftStore, coupons: CouponStore, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            drafts,
            coupons,
            guard,
        }
    }

    fn revert(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        if self
            .guard
            .already_done(msg.payment.order_code, step::COMPENSATE_COUPON)
        {
            return Ok(());
        }
        let draft = self
            .drafts
            .find(msg.payment.member_id, msg.payment.order_code)?;
        // A draft without a coupon means the forward step never ran.
        if let Some(coupon_id) = draft.coupon_id {
            self.coupons.revert(coupon_id)?;
            tracing::info!(order = %msg.payment.order_code, coupon = %coupon_id, "coupon reverted");
        }
        self.guard
            .first_delivery(msg.payment.order_code, step::COMPENSATE_COUPON);
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for CouponRevertHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let msg: SagaMessage = serde_json::from_value(payload)?;
        if let Err(err) = self.revert(&msg) {
            tracing::error!(order = %msg.payment.order_code, %err, "coupon compensation failed");
            metrics::counter!("saga_compensation_failures").increment(1);
            return self
                .bus
                .publish(routing::DEAD_LETTER_KEY, serde_json::to_value(&msg)?)
                .await;
        }
        Ok(())
    }
}

/// Re-credits the points the forward step debited.
pub struct PointRecreditHandler<B> {
    bus: B,
    drafts: DraftStore,
    points: PointLedger,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> PointRecreditHandler<B> {
    pub fn new(bus: B, drafts: DraftStore, points: PointLedger, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            drafts,
            points,
            guard,
        }
    }

    fn recredit(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        if self
            .guard
            .already_done(msg.payment.order_code, step::COMPENSATE_POINT)
        {
            return Ok(());
        }
        let member = msg
            .payment
            .member_id
            .ok_or(domain::DomainError::MemberRequired)?;
        let draft = self.drafts.find(Some(member), msg.payment.order_code)?;
        self.points.credit(member, draft.use_point_amount)?;
        self.guard
            .first_delivery(msg.payment.order_code, step::COMPENSATE_POINT);
        tracing::info!(
            order = %msg.payment.order_code,
            member = %member,
            credited = %draft.use_point_amount,
            "points re-credited"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for PointRecreditHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let msg: SagaMessage = serde_json::from_value(payload)?;
        if let Err(err) = self.recredit(&msg) {
            tracing::error!(order = %msg.payment.order_code, %err, "point compensation failed");
            metrics::counter!("saga_compensation_failures").increment(1);
            return self
                .bus
                .publish(routing::DEAD_LETTER_KEY, serde_json::to_value(&msg)?)
                .await;
        }
        Ok(())
    }
}

/// Cancels the confirmed payment with the provider.
pub struct PaymentCompensateHandler<B> {
    bus: B,
    provider: Arc<dyn PaymentProvider>,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> PaymentCompensateHandler<B> {
    pub fn new(bus: B, provider: Arc<dyn PaymentProvider>, guard: IdempotencyGuard) -> Self {
        Self {
            bus,
            provider,
            guard,
        }
    }

    async fn cancel(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        if self
            .guard
            .already_done(msg.payment.order_code, step::COMPENSATE_PAYMENT)
        {
            return Ok(());
        }
        self.provider
            .cancel(&msg.payment.payment_key, SAGA_CANCEL_REASON)
            .await?;
        self.guard
            .first_delivery(msg.payment.order_code, step::COMPENSATE_PAYMENT);
        tracing::info!(order = %msg.payment.order_code, "payment canceled");
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for PaymentCompensateHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let msg: SagaMessage = serde_json::from_value(payload)?;
        if let Err(err) = self.cancel(&msg).await {
            tracing::error!(order = %msg.payment.order_code, %err, "payment compensation failed");
            metrics::counter!("saga_compensation_failures").increment(1);
            return self
                .bus
                .publish(routing::DEAD_LETTER_KEY, serde_json::to_value(&msg)?)
                .await;
        }
        Ok(())
    }
}

/// Executes provider cancel instructions from the cancellation flow.
pub struct PaymentCancelHandler {
    provider: Arc<dyn PaymentProvider>,
}

impl PaymentCancelHandler {
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Consumer for PaymentCancelHandler {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let req: PaymentCancelRequest = serde_json::from_value(payload)?;
        self.provider
            .cancel(&req.payment_key, &req.cancel_reason)
            .await
            .map_err(|err| TransportError::Consumer(err.to_string()))?;
        tracing::info!(payment_key = %req.payment_key, reason = %req.cancel_reason, "payment cancel executed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PaymentRequest;
    use common::{Amount, BookId, CouponId, MemberId, OrderCode};
    use domain::{
        Book, BookSaleStatus, Coupon, CouponState, InMemoryPaymentProvider, OrderDraft, OrderLine,
    };
    use transport::InMemoryBroker;

    fn broker_with_dead_letter() -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker.declare_queue(routing::DEAD_LETTER_QUEUE);
        broker
            .bind(routing::DEAD_LETTER_KEY, routing::DEAD_LETTER_QUEUE)
            .unwrap();
        broker
    }

    fn draft(member: MemberId, code: OrderCode) -> OrderDraft {
        OrderDraft {
            order_code: code,
            member_id: Some(member),
            lines: vec![OrderLine {
                book_id: BookId::new(1),
                quantity: 2,
            }],
            delivery_fee: Amount::new(3_000),
            wrapping_fee: Amount::zero(),
            use_point_amount: Amount::new(1_000),
            coupon_id: Some(CouponId::new(1)),
        }
    }

    fn message(member: Option<MemberId>, code: OrderCode) -> SagaMessage {
        SagaMessage::builder(
            SagaStatus::FailApprovePayment,
            PaymentRequest {
                member_id: member,
                order_code: code,
                payment_key: "pay-key".to_string(),
                reported_amount: Amount::new(23_500),
            },
        )
        .build()
    }

    #[tokio::test]
    async fn test_restock_reverses_decrement() {
        let broker = broker_with_dead_letter();
        let (drafts, books) = (DraftStore::new(), BookStore::new());
        let member = MemberId::new(7);
        let code = OrderCode::new();
        books.put(Book {
            id: BookId::new(1),
            title: "book-1".to_string(),
            price: Amount::new(10_000),
            discount: Amount::zero(),
            inventory: 0,
            status: BookSaleStatus::OutOfStock,
        });
        drafts.put(draft(member, code));

        let handler =
            RestockHandler::new(broker.clone(), drafts, books.clone(), IdempotencyGuard::new());
        handler
            .consume(serde_json::to_value(message(Some(member), code)).unwrap())
            .await
            .unwrap();

        assert_eq!(books.inventory_of(BookId::new(1)), Some(2));
        assert_eq!(
            books.status_of(BookId::new(1)),
            Some(BookSaleStatus::ForSale)
        );
        assert_eq!(broker.queue_len(routing::DEAD_LETTER_QUEUE), 0);
    }

    #[tokio::test]
    async fn test_duplicate_restock_applies_once() {
        let broker = broker_with_dead_letter();
        let (drafts, books) = (DraftStore::new(), BookStore::new());
        let member = MemberId::new(7);
        let code = OrderCode::new();
        books.put(Book {
            id: BookId::new(1),
            title: "book-1".to_string(),
            price: Amount::new(10_000),
            discount: Amount::zero(),
            inventory: 3,
            status: BookSaleStatus::ForSale,
        });
        drafts.put(draft(member, code));

        let handler =
            RestockHandler::new(broker.clone(), drafts, books.clone(), IdempotencyGuard::new());
        let payload = serde_json::to_value(message(Some(member), code)).unwrap();
        handler.consume(payload.clone()).await.unwrap();
        handler.consume(payload).await.unwrap();

        assert_eq!(books.inventory_of(BookId::new(1)), Some(5));
    }

    #[tokio::test]
    async fn test_failed_restock_dead_letters_with_compensation_status() {
        let broker = broker_with_dead_letter();
        // No draft seeded, the lookup fails.
        let handler = RestockHandler::new(
            broker.clone(),
            DraftStore::new(),
            BookStore::new(),
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(None, OrderCode::new())).unwrap())
            .await
            .unwrap();

        let mut dead = broker.drain_queue(routing::DEAD_LETTER_QUEUE);
        assert_eq!(dead.len(), 1);
        let msg: SagaMessage = serde_json::from_value(dead.pop().unwrap()).unwrap();
        assert_eq!(msg.status, SagaStatus::FailCompensateConfirmOrderForm);
    }

    #[tokio::test]
    async fn test_coupon_revert_restores_unused() {
        let broker = broker_with_dead_letter();
        let (drafts, coupons) = (DraftStore::new(), CouponStore::new());
        let member = MemberId::new(7);
        let code = OrderCode::new();
        drafts.put(draft(member, code));
        coupons.put(Coupon {
            id: CouponId::new(1),
            discount_amount: Amount::new(2_000),
            state: CouponState::Used,
        });

        let handler = CouponRevertHandler::new(
            broker.clone(),
            drafts,
            coupons.clone(),
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(Some(member), code)).unwrap())
            .await
            .unwrap();

        assert_eq!(coupons.state_of(CouponId::new(1)), Some(CouponState::Unused));
    }

    #[tokio::test]
    async fn test_coupon_revert_without_coupon_is_noop() {
        let broker = broker_with_dead_letter();
        let (drafts, coupons) = (DraftStore::new(), CouponStore::new());
        let member = MemberId::new(7);
        let code = OrderCode::new();
        let mut d = draft(member, code);
        d.coupon_id = None;
        drafts.put(d);

        let handler =
            CouponRevertHandler::new(broker.clone(), drafts, coupons, IdempotencyGuard::new());
        handler
            .consume(serde_json::to_value(message(Some(member), code)).unwrap())
            .await
            .unwrap();

        assert_eq!(broker.queue_len(routing::DEAD_LETTER_QUEUE), 0);
    }

    #[tokio::test]
    async fn test_point_recredit_restores_balance() {
        let broker = broker_with_dead_letter();
        let (drafts, points) = (DraftStore::new(), PointLedger::new());
        let member = MemberId::new(7);
        let code = OrderCode::new();
        points.set_balance(member, Amount::new(4_000));
        drafts.put(draft(member, code));

        let handler = PointRecreditHandler::new(
            broker.clone(),
            drafts,
            points.clone(),
            IdempotencyGuard::new(),
        );
        let payload = serde_json::to_value(message(Some(member), code)).unwrap();
        handler.consume(payload.clone()).await.unwrap();
        // Duplicate delivery credits once.
        handler.consume(payload).await.unwrap();

        assert_eq!(points.balance(member), Amount::new(5_000));
    }

    #[tokio::test]
    async fn test_point_recredit_without_member_dead_letters() {
        let broker = broker_with_dead_letter();
        let (drafts, points) = (DraftStore::new(), PointLedger::new());

        let handler = PointRecreditHandler::new(
            broker.clone(),
            drafts,
            points,
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(None, OrderCode::new())).unwrap())
            .await
            .unwrap();

        assert_eq!(broker.queue_len(routing::DEAD_LETTER_QUEUE), 1);
    }

    #[tokio::test]
    async fn test_payment_compensation_cancels_once() {
        let broker = broker_with_dead_letter();
        let provider = InMemoryPaymentProvider::new();
        let code = OrderCode::new();
        provider
            .confirm(code, "pay-key", Amount::new(23_500))
            .await
            .unwrap();

        let handler = PaymentCompensateHandler::new(
            broker.clone(),
            Arc::new(provider.clone()),
            IdempotencyGuard::new(),
        );
        let payload = serde_json::to_value(message(Some(MemberId::new(7)), code)).unwrap();
        handler.consume(payload.clone()).await.unwrap();
        handler.consume(payload).await.unwrap();

        assert!(!provider.is_confirmed("pay-key"));
        assert_eq!(provider.cancellations().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_payment_compensation_dead_letters() {
        let broker = broker_with_dead_letter();
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on_cancel(true);

        let handler = PaymentCompensateHandler::new(
            broker.clone(),
            Arc::new(provider),
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(Some(MemberId::new(7)), OrderCode::new())).unwrap())
            .await
            .unwrap();

        assert_eq!(broker.queue_len(routing::DEAD_LETTER_QUEUE), 1);
    }

    #[tokio::test]
    async fn test_cancel_instruction_reaches_provider() {
        let provider = InMemoryPaymentProvider::new();
        let handler = PaymentCancelHandler::new(Arc::new(provider.clone()));

        handler
            .consume(
                serde_json::to_value(PaymentCancelRequest {
                    payment_key: "pay-key".to_string(),
                    cancel_reason: "customer request".to_string(),
                })
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            provider.cancellations(),
            vec![("pay-key".to_string(), "customer request".to_string())]
        );
    }
}
