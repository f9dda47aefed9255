//! Form verification: the first forward step.

use async_trait::async_trait;
use common::Amount;
use domain::{BookStore, DraftStore, PointLedger};
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::idempotency::{IdempotencyGuard, step};
use crate::message::SagaMessage;
use crate::routing;
use crate::status::SagaStatus;

/// Verifies the pending order draft and commits the inventory decrement.
///
/// Computes the skip flags and all running totals exactly once per
/// order attempt. On any failure the step's resource changes are never
/// applied (the inventory decrement is all-or-nothing), matching the
/// one-message transactional boundary.
pub struct FormVerifyHandler<B> {
    bus: B,
    drafts: DraftStore,
    books: BookStore,
    points: PointLedger,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> FormVerifyHandler<B> {
    pub fn new(
        bus: B,
        drafts: DraftStore,
        books: BookStore,
        points: PointLedger,
        guard: IdempotencyGuard,
    ) -> Self {
        Self {
            bus,
            drafts,
            books,
            points,
            guard,
        }
    }

    async fn verify(&self, msg: &mut SagaMessage) -> domain::error::Result<()> {
        let draft = self
            .drafts
            .find(msg.payment.member_id, msg.payment.order_code)?;

        // Skip flags are decided here and never change afterwards.
        msg.no_use_point = draft.use_point_amount.is_zero();
        msg.no_use_coupon = draft.coupon_id.is_none();
        msg.no_earn_point = msg.payment.member_id.is_none();

        // Duplicate deliveries recompute totals from reads only; the
        // step is marked done only after the decrement committed.
        let net = if self
            .guard
            .already_done(msg.payment.order_code, step::CONFIRM_ORDER_FORM)
        {
            self.books.price_order(&draft.lines)?
        } else {
            let net = self.books.decrement_for_order(&draft.lines)?;
            self.guard
                .first_delivery(msg.payment.order_code, step::CONFIRM_ORDER_FORM);
            net
        };

        msg.book_amount = net;
        msg.earn_point_amount = match msg.payment.member_id {
            Some(member) => {
                let percent = self.points.reward_percent(member)?;
                net.percent(percent)
                    .ok_or(domain::DomainError::AmountOverflow)?
            }
            None => Amount::zero(),
        };
        msg.calculate_total_amount = net
            .checked_add(draft.delivery_fee)
            .and_then(|t| t.checked_add(draft.wrapping_fee))
            .ok_or(domain::DomainError::AmountOverflow)?;

        tracing::info!(
            order = %msg.payment.order_code,
            total = %msg.calculate_total_amount,
            "order form verified"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for FormVerifyHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        match self.verify(&mut msg).await {
            Ok(()) => msg.status = SagaStatus::SuccessConfirmOrderForm,
            Err(err) => {
                tracing::error!(order = %msg.payment.order_code, %err, "form verification failed");
                msg.status = SagaStatus::FailConfirmOrderForm;
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
    use common::{BookId, MemberId, OrderCode};
    use domain::{Book, BookSaleStatus, OrderDraft, OrderLine};
    use std::sync::Arc;
    use transport::InMemoryBroker;

    fn broker_with_reply_queue() -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker.declare_queue(routing::SAGA_REPLY_QUEUE);
        broker
            .bind(routing::SAGA_REPLY_KEY, routing::SAGA_REPLY_QUEUE)
            .unwrap();
        broker
    }

    fn seed_book(books: &BookStore, id: u64, price: u64, inventory: u32) {
        books.put(Book {
            id: BookId::new(id),
            title: format!("book-{id}"),
            price: Amount::new(price),
            discount: Amount::zero(),
            inventory,
            status: BookSaleStatus::ForSale,
        });
    }

    fn member_draft(member: MemberId, code: OrderCode) -> OrderDraft {
        OrderDraft {
            order_code: code,
            member_id: Some(member),
            lines: vec![OrderLine {
                book_id: BookId::new(1),
                quantity: 2,
            }],
            delivery_fee: Amount::new(3_000),
            wrapping_fee: Amount::new(500),
            use_point_amount: Amount::new(1_000),
            coupon_id: None,
        }
    }

    fn message(member: Option<MemberId>, code: OrderCode) -> SagaMessage {
        SagaMessage::builder(
            SagaStatus::ProceedConfirmOrderForm,
            crate::message::PaymentRequest {
                member_id: member,
                order_code: code,
                payment_key: "pay-key".to_string(),
                reported_amount: Amount::new(23_500),
            },
        )
        .build()
    }

    fn reply(broker: &InMemoryBroker) -> SagaMessage {
        let mut replies = broker.drain_queue(routing::SAGA_REPLY_QUEUE);
        assert_eq!(replies.len(), 1);
        serde_json::from_value(replies.pop().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_verify_computes_totals_and_flags() {
        let broker = broker_with_reply_queue();
        let (drafts, books, points) = (DraftStore::new(), BookStore::new(), PointLedger::new());
        seed_book(&books, 1, 10_000, 5);
        let member = MemberId::new(7);
        let code = OrderCode::new();
        drafts.put(member_draft(member, code));

        let handler = FormVerifyHandler::new(
            broker.clone(),
            drafts,
            books.clone(),
            points,
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(Some(member), code)).unwrap())
            .await
            .unwrap();

        let out = reply(&broker);
        assert_eq!(out.status, SagaStatus::SuccessConfirmOrderForm);
        assert_eq!(out.book_amount, Amount::new(20_000));
        assert_eq!(out.calculate_total_amount, Amount::new(23_500));
        // 3% basic tier on 20_000.
        assert_eq!(out.earn_point_amount, Amount::new(600));
        assert!(!out.no_use_point);
        assert!(out.no_use_coupon);
        assert!(!out.no_earn_point);
        assert_eq!(books.inventory_of(BookId::new(1)), Some(3));
    }

    #[tokio::test]
    async fn test_guest_earns_nothing() {
        let broker = broker_with_reply_queue();
        let (drafts, books, points) = (DraftStore::new(), BookStore::new(), PointLedger::new());
        seed_book(&books, 1, 10_000, 5);
        let code = OrderCode::new();
        let mut draft = member_draft(MemberId::new(0), code);
        draft.member_id = None;
        draft.use_point_amount = Amount::zero();
        drafts.put(draft);

        let handler =
            FormVerifyHandler::new(broker.clone(), drafts, books, points, IdempotencyGuard::new());
        handler
            .consume(serde_json::to_value(message(None, code)).unwrap())
            .await
            .unwrap();

        let out = reply(&broker);
        assert_eq!(out.status, SagaStatus::SuccessConfirmOrderForm);
        assert!(out.earn_point_amount.is_zero());
        assert!(out.no_earn_point);
        assert!(out.no_use_point);
    }

    #[tokio::test]
    async fn test_insufficient_inventory_fails_without_mutation() {
        let broker = broker_with_reply_queue();
        let (drafts, books, points) = (DraftStore::new(), BookStore::new(), PointLedger::new());
        seed_book(&books, 1, 10_000, 1);
        let member = MemberId::new(7);
        let code = OrderCode::new();
        drafts.put(member_draft(member, code));

        let handler = FormVerifyHandler::new(
            broker.clone(),
            drafts,
            books.clone(),
            points,
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(Some(member), code)).unwrap())
            .await
            .unwrap();

        let out = reply(&broker);
        assert_eq!(out.status, SagaStatus::FailConfirmOrderForm);
        assert_eq!(books.inventory_of(BookId::new(1)), Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_does_not_double_decrement() {
        let broker = broker_with_reply_queue();
        let (drafts, books, points) = (DraftStore::new(), BookStore::new(), PointLedger::new());
        seed_book(&books, 1, 10_000, 5);
        let member = MemberId::new(7);
        let code = OrderCode::new();
        drafts.put(member_draft(member, code));

        let handler = FormVerifyHandler::new(
            broker.clone(),
            drafts,
            books.clone(),
            points,
            IdempotencyGuard::new(),
        );
        let payload = serde_json::to_value(message(Some(member), code)).unwrap();
        handler.consume(payload.clone()).await.unwrap();
        broker.drain_queue(routing::SAGA_REPLY_QUEUE);
        handler.consume(payload).await.unwrap();

        let out = reply(&broker);
        assert_eq!(out.status, SagaStatus::SuccessConfirmOrderForm);
        assert_eq!(out.book_amount, Amount::new(20_000));
        // Inventory decremented once, not twice.
        assert_eq!(books.inventory_of(BookId::new(1)), Some(3));
    }

    #[tokio::test]
    async fn test_missing_draft_fails_step() {
        let broker = broker_with_reply_queue();
        let handler = FormVerifyHandler::new(
            broker.clone(),
            DraftStore::new(),
            BookStore::new(),
            PointLedger::new(),
            IdempotencyGuard::new(),
        );
        handler
            .consume(serde_json::to_value(message(None, OrderCode::new())).unwrap())
            .await
            .unwrap();

        assert_eq!(reply(&broker).status, SagaStatus::FailConfirmOrderForm);
    }
}
