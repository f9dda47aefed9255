//! Durable order records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use common::{Amount, BookId, MemberId, OrderCode};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Status of a persisted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Persisted and paid, awaiting fulfillment.
    #[default]
    Pending,
    /// Canceled after persistence (terminal state).
    Canceled,
}

impl OrderStatus {
    /// Returns true if the order can still be canceled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted line item, with the unit price captured at purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: Amount,
}

/// The durable order aggregate, created once at the persistence step.
///
/// Immutable after creation except for status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_code: OrderCode,
    /// `None` for guest orders.
    pub member_id: Option<MemberId>,
    pub total_amount: Amount,
    pub book_amount: Amount,
    pub coupon_amount: Amount,
    pub earn_point_amount: Amount,
    pub payment_key: String,
    pub status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub lines: Vec<OrderLineRecord>,
}

#[derive(Debug, Default)]
struct OrderRepositoryState {
    orders: HashMap<OrderCode, OrderRecord>,
    fail_on_save: bool,
}

/// Shared handle over persisted orders.
#[derive(Debug, Clone, Default)]
pub struct OrderRepository {
    state: Arc<RwLock<OrderRepositoryState>>,
}

impl OrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the repository to fail on save (failure injection).
    pub fn set_fail_on_save(&self, fail: bool) {
        self.state.write().unwrap().fail_on_save = fail;
    }

    /// Persists an order and its lines in one local transaction.
    ///
    /// Saving an already persisted order code is rejected, which makes
    /// duplicate persistence deliveries converge without a second row.
    pub fn save(&self, order: OrderRecord) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_save {
            return Err(DomainError::Storage("induced save failure".to_string()));
        }
        if state.orders.contains_key(&order.order_code) {
            return Err(DomainError::DuplicateOrder(order.order_code));
        }
        tracing::debug!(order = %order.order_code, total = %order.total_amount, "order saved");
        state.orders.insert(order.order_code, order);
        Ok(())
    }

    /// Loads an order by code.
    pub fn find(&self, order_code: OrderCode) -> Option<OrderRecord> {
        self.state.read().unwrap().orders.get(&order_code).cloned()
    }

    /// Transitions an order to `Canceled`.
    pub fn cancel(&self, order_code: OrderCode) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let order = state
            .orders
            .get_mut(&order_code)
            .ok_or(DomainError::OrderNotFound(order_code))?;
        if order.status.can_cancel() {
            order.status = OrderStatus::Canceled;
            tracing::debug!(order = %order_code, "order canceled");
        }
        Ok(())
    }

    /// Number of persisted orders.
    pub fn count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}
