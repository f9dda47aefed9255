//! Saga wiring: topology declaration and consumer registration.

use std::sync::Arc;

use domain::{
    BookStore, CartStore, CouponStore, DraftStore, OrderRepository, PaymentProvider, PointLedger,
};
use transport::{Consumer, InMemoryBroker, MessageBus};

use crate::cancel::CancelRequestHandler;
use crate::compensate::{
    CouponRevertHandler, PaymentCancelHandler, PaymentCompensateHandler, PointRecreditHandler,
    RestockHandler,
};
use crate::config::SagaConfig;
use crate::dead_letter::DeadLetterMonitor;
use crate::error::SagaError;
use crate::handlers::{
    CartDeleteHandler, CouponApplyHandler, FormVerifyHandler, PaymentApproveHandler,
    PersistOrderHandler, PointDecrementHandler, PointEarnHandler,
};
use crate::idempotency::IdempotencyGuard;
use crate::message::{PaymentRequest, RequestPayCancelMessage, SagaMessage};
use crate::router::SagaRouter;
use crate::routing;
use crate::status::SagaStatus;

/// The resource stores the saga mutates.
#[derive(Debug, Clone, Default)]
pub struct SagaResources {
    pub books: BookStore,
    pub points: PointLedger,
    pub coupons: CouponStore,
    pub drafts: DraftStore,
    pub carts: CartStore,
    pub orders: OrderRepository,
}

impl SagaResources {
    /// Creates a set of empty stores.
    pub fn new() -> Self {
        Self::default()
    }
}

/// The assembled saga: broker, topology, and every consumer.
///
/// The point-earn retry queue is deliberately left without a consumer;
/// parked messages wait for an out-of-band retry.
pub struct SagaApp {
    broker: InMemoryBroker,
    router: Arc<SagaRouter<InMemoryBroker>>,
    dead_letters: DeadLetterMonitor,
}

impl SagaApp {
    /// Declares the full queue topology and registers all consumers.
    pub fn new(
        config: &SagaConfig,
        resources: &SagaResources,
        provider: Arc<dyn PaymentProvider>,
    ) -> Result<Self, SagaError> {
        let broker = InMemoryBroker::new()
            .with_max_redeliveries(config.max_redeliveries)
            .with_dead_letter_queue(routing::DEAD_LETTER_QUEUE);
        for (key, queue) in routing::BINDINGS {
            broker.declare_queue(queue);
            broker.bind(key, queue)?;
        }
        tracing::info!(exchange = %config.exchange, queues = routing::BINDINGS.len(), "saga topology declared");

        let guard = IdempotencyGuard::new();
        let router = Arc::new(SagaRouter::new(broker.clone()));
        let dead_letters = DeadLetterMonitor::new();

        broker.subscribe(routing::SAGA_REPLY_QUEUE, Arc::clone(&router) as Arc<dyn Consumer>)?;
        broker.subscribe(routing::DEAD_LETTER_QUEUE, Arc::new(dead_letters.clone()))?;

        broker.subscribe(
            routing::FORM_VERIFY_QUEUE,
            Arc::new(FormVerifyHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.books.clone(),
                resources.points.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::COUPON_APPLY_QUEUE,
            Arc::new(CouponApplyHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.coupons.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::POINT_DECREMENT_QUEUE,
            Arc::new(PointDecrementHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.points.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::APPROVE_PAYMENT_QUEUE,
            Arc::new(PaymentApproveHandler::new(
                broker.clone(),
                Arc::clone(&provider),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::SAVE_DATABASE_QUEUE,
            Arc::new(PersistOrderHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.books.clone(),
                resources.orders.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::POINT_EARN_QUEUE,
            Arc::new(PointEarnHandler::new(
                broker.clone(),
                resources.points.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::CART_DELETE_QUEUE,
            Arc::new(CartDeleteHandler::new(resources.carts.clone())),
        )?;

        broker.subscribe(
            routing::COMPENSATE_FORM_CONFIRM_QUEUE,
            Arc::new(RestockHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.books.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::COMPENSATE_COUPON_APPLY_QUEUE,
            Arc::new(CouponRevertHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.coupons.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::COMPENSATE_POINT_DECREMENT_QUEUE,
            Arc::new(PointRecreditHandler::new(
                broker.clone(),
                resources.drafts.clone(),
                resources.points.clone(),
                guard.clone(),
            )),
        )?;
        broker.subscribe(
            routing::COMPENSATE_APPROVE_PAYMENT_QUEUE,
            Arc::new(PaymentCompensateHandler::new(
                broker.clone(),
                Arc::clone(&provider),
                guard.clone(),
            )),
        )?;

        broker.subscribe(
            routing::PAYMENT_CANCEL_QUEUE,
            Arc::new(PaymentCancelHandler::new(Arc::clone(&provider))),
        )?;
        broker.subscribe(
            routing::REQUEST_PAY_CANCEL_QUEUE,
            Arc::new(CancelRequestHandler::new(
                broker.clone(),
                resources.orders.clone(),
            )),
        )?;

        Ok(Self {
            broker,
            router,
            dead_letters,
        })
    }

    /// Starts the creation saga for one order attempt and fires the
    /// cart cleanup. Returns as soon as both messages are published.
    #[tracing::instrument(skip_all, fields(order = %payment.order_code))]
    pub async fn order_invoke(&self, payment: PaymentRequest) -> Result<(), SagaError> {
        tracing::info!("order saga invoked");
        let start =
            SagaMessage::builder(SagaStatus::ProceedConfirmOrderForm, payment.clone()).build();
        self.broker
            .publish(routing::FORM_VERIFY_KEY, serde_json::to_value(&start)?)
            .await?;

        let cleanup = SagaMessage::builder(SagaStatus::ProceedDeleteCart, payment).build();
        self.broker
            .publish(routing::CART_DELETE_KEY, serde_json::to_value(&cleanup)?)
            .await?;
        Ok(())
    }

    /// Submits a post-success cancellation request.
    #[tracing::instrument(skip_all, fields(order = %request.order_code))]
    pub async fn request_cancel(&self, request: RequestPayCancelMessage) -> Result<(), SagaError> {
        self.broker
            .publish(
                routing::REQUEST_PAY_CANCEL_KEY,
                serde_json::to_value(&request)?,
            )
            .await?;
        Ok(())
    }

    /// The underlying broker, for driving and inspecting tests.
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Messages that reached terminal success.
    pub fn completed(&self) -> Vec<SagaMessage> {
        self.router.completed()
    }

    /// The dead-letter monitor.
    pub fn dead_letters(&self) -> &DeadLetterMonitor {
        &self.dead_letters
    }
}
