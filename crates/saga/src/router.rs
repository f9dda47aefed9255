//! Saga router: the state-transition table and its consumer.
//!
//! [`route`] is a pure function from (status, skip flags) to the next
//! action, so the whole transition table is unit-testable without a
//! broker. [`SagaRouter`] is the thin consumer that executes a
//! decision: it owns every compensation fan-out; step handlers never
//! publish compensations themselves.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use transport::{Consumer, MessageBus, TransportError};

use crate::message::{SagaMessage, SkipFlags};
use crate::routing;
use crate::status::SagaStatus;

/// The router's decision for one inbound outcome message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Advance the saga: set the next status and publish to the key.
    Forward {
        next: SagaStatus,
        routing_key: &'static str,
    },
    /// Terminal success of the whole saga.
    Complete,
    /// Terminal failure: dead-letter the message, then fan out the
    /// listed compensations in order.
    DeadLetter { compensations: Vec<&'static str> },
    /// Non-fatal failure: park the message on a retry queue and leave
    /// committed steps standing.
    Park { routing_key: &'static str },
    /// The router should never see this token.
    Unroutable,
}

/// The authoritative transition table.
///
/// Compensations are cumulative and ordered in reverse of commitment:
/// a failure compensates only steps already completed, gated by the
/// same skip flags used forward, with form confirmation (inventory)
/// always last since it committed first.
pub fn route(status: SagaStatus, flags: SkipFlags) -> Route {
    match status {
        SagaStatus::SuccessConfirmOrderForm => {
            if !flags.no_use_point {
                Route::Forward {
                    next: SagaStatus::ProceedPointDecrement,
                    routing_key: routing::POINT_DECREMENT_KEY,
                }
            } else if !flags.no_use_coupon {
                Route::Forward {
                    next: SagaStatus::ProceedApplyCoupon,
                    routing_key: routing::COUPON_APPLY_KEY,
                }
            } else {
                Route::Forward {
                    next: SagaStatus::ProceedApprovePayment,
                    routing_key: routing::APPROVE_PAYMENT_KEY,
                }
            }
        }
        // Nothing committed yet, so nothing to compensate.
        SagaStatus::FailConfirmOrderForm => Route::DeadLetter {
            compensations: vec![],
        },

        SagaStatus::SuccessApplyCoupon => {
            if flags.no_use_point {
                Route::Forward {
                    next: SagaStatus::ProceedApprovePayment,
                    routing_key: routing::APPROVE_PAYMENT_KEY,
                }
            } else {
                Route::Forward {
                    next: SagaStatus::ProceedPointDecrement,
                    routing_key: routing::POINT_DECREMENT_KEY,
                }
            }
        }
        SagaStatus::FailApplyCoupon => Route::DeadLetter {
            compensations: vec![routing::COMPENSATE_FORM_CONFIRM_KEY],
        },

        SagaStatus::SuccessPointDecrement => Route::Forward {
            next: SagaStatus::ProceedApprovePayment,
            routing_key: routing::APPROVE_PAYMENT_KEY,
        },
        SagaStatus::FailPointDecrement => {
            let mut compensations = Vec::new();
            if !flags.no_use_coupon {
                compensations.push(routing::COMPENSATE_COUPON_APPLY_KEY);
            }
            compensations.push(routing::COMPENSATE_FORM_CONFIRM_KEY);
            Route::DeadLetter { compensations }
        }

        SagaStatus::SuccessApprovePayment => Route::Forward {
            next: SagaStatus::ProceedSaveOrdersDatabase,
            routing_key: routing::SAVE_DATABASE_KEY,
        },
        SagaStatus::FailApprovePayment => {
            let mut compensations = Vec::new();
            if !flags.no_use_coupon {
                compensations.push(routing::COMPENSATE_COUPON_APPLY_KEY);
            }
            if !flags.no_use_point {
                compensations.push(routing::COMPENSATE_POINT_DECREMENT_KEY);
            }
            compensations.push(routing::COMPENSATE_FORM_CONFIRM_KEY);
            Route::DeadLetter { compensations }
        }

        SagaStatus::SuccessSaveOrdersDatabase => {
            if !flags.no_earn_point {
                Route::Forward {
                    next: SagaStatus::ProceedEarnPoint,
                    routing_key: routing::POINT_EARN_KEY,
                }
            } else {
                Route::Complete
            }
        }
        SagaStatus::FailSaveOrdersDatabase => {
            let mut compensations = Vec::new();
            if !flags.no_use_coupon {
                compensations.push(routing::COMPENSATE_COUPON_APPLY_KEY);
            }
            if !flags.no_use_point {
                compensations.push(routing::COMPENSATE_POINT_DECREMENT_KEY);
            }
            compensations.push(routing::COMPENSATE_APPROVE_PAYMENT_KEY);
            compensations.push(routing::COMPENSATE_FORM_CONFIRM_KEY);
            Route::DeadLetter { compensations }
        }

        SagaStatus::SuccessEarnPoint => Route::Complete,
        // The order and payment already stand; reward credit is
        // best-effort and retried from a parking queue instead of
        // unwinding a completed purchase.
        SagaStatus::FailEarnPoint => Route::Park {
            routing_key: routing::POINT_EARN_RETRY_KEY,
        },

        SagaStatus::ProceedConfirmOrderForm
        | SagaStatus::ProceedDeleteCart
        | SagaStatus::ProceedApplyCoupon
        | SagaStatus::ProceedPointDecrement
        | SagaStatus::ProceedApprovePayment
        | SagaStatus::ProceedSaveOrdersDatabase
        | SagaStatus::ProceedEarnPoint
        | SagaStatus::ProceedRequestPayCancel
        | SagaStatus::SuccessAllOrderSaga
        | SagaStatus::FailCompensateConfirmOrderForm => Route::Unroutable,
    }
}

/// Consumer bound to the router inbound queue.
pub struct SagaRouter<B> {
    bus: B,
    completed: Arc<RwLock<Vec<SagaMessage>>>,
}

impl<B: MessageBus> SagaRouter<B> {
    /// Creates a router publishing through the given bus.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            completed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Messages that reached terminal success, in completion order.
    pub fn completed(&self) -> Vec<SagaMessage> {
        self.completed.read().unwrap().clone()
    }

    async fn publish(&self, routing_key: &str, msg: &SagaMessage) -> Result<(), TransportError> {
        self.bus
            .publish(routing_key, serde_json::to_value(msg)?)
            .await
    }
}

#[async_trait]
impl<B: MessageBus> Consumer for SagaRouter<B> {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let mut msg: SagaMessage = serde_json::from_value(payload)?;
        let order = msg.payment.order_code;
        tracing::info!(%order, status = %msg.status, "saga transition");

        match route(msg.status, msg.skip_flags()) {
            Route::Forward { next, routing_key } => {
                msg.status = next;
                self.publish(routing_key, &msg).await?;
            }
            Route::Complete => {
                msg.status = SagaStatus::SuccessAllOrderSaga;
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%order, "order saga completed");
                self.completed.write().unwrap().push(msg);
            }
            Route::DeadLetter { compensations } => {
                metrics::counter!("saga_failed").increment(1);
                tracing::error!(
                    %order,
                    status = %msg.status,
                    compensations = compensations.len(),
                    "saga failed, starting compensation"
                );
                self.publish(routing::DEAD_LETTER_KEY, &msg).await?;
                for key in compensations {
                    metrics::counter!("saga_compensations_total").increment(1);
                    self.publish(key, &msg).await?;
                }
            }
            Route::Park { routing_key } => {
                metrics::counter!("saga_point_earn_parked").increment(1);
                tracing::error!(%order, status = %msg.status, "parking message for retry");
                self.publish(routing_key, &msg).await?;
            }
            Route::Unroutable => {
                tracing::warn!(%order, status = %msg.status, "unroutable status at router");
            }
        }
        Ok(())
    }
}
