//! Order persistence step.

use async_trait::async_trait;
use chrono::Utc;
use domain::{BookStore, DraftStore, OrderLineRecord, OrderRecord, OrderRepository, OrderStatus};
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::idempotency::{IdempotencyGuard, step};
use crate::message::SagaMessage;
use crate::routing;
use crate::status::SagaStatus;

/// Writes the durable order record once payment is confirmed.
///
/// The draft is kept after persistence; the cancellation flow still
/// reads it to reverse guest resource usage.
pub struct PersistOrderHandler<B> {
    bus: B,
    drafts: DraftStore,
    books: BookStore,
    orders: OrderRepository,
    guard: IdempotencyGuard,
}

impl<B: MessageBus> PersistOrderHandler<B> {
    pub fn new(
        bus: B,
        drafts: DraftStore,
        books: BookStore,
        orders: OrderRepository,
        guard: IdempotencyGuard,
    ) -> Self {
        Self {
            bus,
            drafts,
            books,
            orders,
            guard,
        }
    }

    async fn persist(&self, msg: &SagaMessage) -> domain::error::Result<()> {
        if self
            .guard
            .already_done(msg.payment.order_code, step::SAVE_ORDERS)
        {
            return Ok(());
        }

        let draft = self
            .drafts
            .find(msg.payment.member_id, msg.payment.order_code)?;
        let mut lines = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            lines.push(OrderLineRecord {
                book_id: line.book_id,
                quantity: line.quantity,
                unit_price: self.books.unit_price(line.book_id)?,
            });
        }

        self.orders.save(OrderRecord {
            order_code: msg.payment.order_code,
            member_id: msg.payment.member_id,
            total_amount: msg.calculate_total_amount,
            book_amount: msg.book_amount,
            coupon_amount: msg.coupon_amount,
            earn_point_amount: msg.earn_point_amount,
            payment_key: msg.payment.payment_key.clone(),
            status: OrderStatus::Pending,
            ordered_at: Utc::now(),
            lines,
        })?;
        self.guard
            .first_delivery(msg.payment.order_code, step::SAVE_ORDERS);

        tracing::info!(
            order = %msg.payment.order_code,
            total = %msg.calculate_total_amount,
            "order persisted"
        );
        Ok(())
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for PersistOrderHandler<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        match self.persist(&msg).await {
            Ok(()) => msg.status = SagaStatus::SuccessSaveOrdersDatabase,
            Err(err) => {
                tracing::error!(order = %msg.payment.order_code, %err, "order persistence failed");
                msg.status = SagaStatus::FailSaveOrdersDatabase;
            }
        }
        self.bus
            .publish(routing::SAGA_REPLY_KEY, serde_json::to_value(&msg)?)
            .await
    }
}
