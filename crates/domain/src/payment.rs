//! External payment provider seam.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Amount, OrderCode};

use crate::error::{DomainError, Result};

/// The payment provider's confirm/cancel API.
///
/// Both calls are synchronous and all-or-nothing from the saga's
/// perspective: a network error or non-200 response surfaces as an
/// `Err` and the step fails.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Confirms a prepared payment for the given amount.
    async fn confirm(
        &self,
        order_code: OrderCode,
        payment_key: &str,
        amount: Amount,
    ) -> Result<()>;

    /// Cancels a confirmed payment (refund).
    async fn cancel(&self, payment_key: &str, reason: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    confirmed: HashMap<String, (OrderCode, Amount)>,
    canceled: Vec<(String, String)>,
    fail_on_confirm: bool,
    fail_on_cancel: bool,
}

/// In-memory payment provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProvider {
    /// Creates a new in-memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to fail confirm calls.
    pub fn set_fail_on_confirm(&self, fail: bool) {
        self.state.write().unwrap().fail_on_confirm = fail;
    }

    /// Configures the provider to fail cancel calls.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Number of confirmed, not yet canceled payments.
    pub fn confirmed_count(&self) -> usize {
        self.state.read().unwrap().confirmed.len()
    }

    /// Returns true if the payment key has been confirmed.
    pub fn is_confirmed(&self, payment_key: &str) -> bool {
        self.state.read().unwrap().confirmed.contains_key(payment_key)
    }

    /// Cancel calls observed so far, as (payment key, reason) pairs.
    pub fn cancellations(&self) -> Vec<(String, String)> {
        self.state.read().unwrap().canceled.clone()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn confirm(
        &self,
        order_code: OrderCode,
        payment_key: &str,
        amount: Amount,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_confirm {
            return Err(DomainError::PaymentProvider(
                "confirm rejected".to_string(),
            ));
        }
        tracing::debug!(order = %order_code, %payment_key, %amount, "payment confirmed");
        state
            .confirmed
            .insert(payment_key.to_string(), (order_code, amount));
        Ok(())
    }

    async fn cancel(&self, payment_key: &str, reason: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_cancel {
            return Err(DomainError::PaymentProvider("cancel rejected".to_string()));
        }
        state.confirmed.remove(payment_key);
        state
            .canceled
            .push((payment_key.to_string(), reason.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_confirm_and_cancel() {
        let provider = InMemoryPaymentProvider::new();
        let code = OrderCode::new();

        provider
            .confirm(code, "pay-1", Amount::new(10_000))
            .await
            .unwrap();
        assert!(provider.is_confirmed("pay-1"));
        assert_eq!(provider.confirmed_count(), 1);

        provider.cancel("pay-1", "customer request").await.unwrap();
        assert!(!provider.is_confirmed("pay-1"));
        assert_eq!(
            provider.cancellations(),
            vec![("pay-1".to_string(), "customer request".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fail_on_confirm() {
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on_confirm(true);

        let result = provider
            .confirm(OrderCode::new(), "pay-1", Amount::new(10_000))
            .await;
        assert!(result.is_err());
        assert_eq!(provider.confirmed_count(), 0);
    }
}
