//! Cart cleanup, fired alongside the saga start.

use async_trait::async_trait;
use domain::{CartKey, CartStore};
use serde_json::Value;
use transport::{Consumer, TransportError};

use crate::message::SagaMessage;

/// Deletes the buyer's cart after the order is invoked.
///
/// Fire-and-forget: runs independently of the saga pipeline and never
/// publishes a reply, so a missing cart or a failed delete cannot
/// affect the order outcome.
pub struct CartDeleteHandler {
    carts: CartStore,
}

impl CartDeleteHandler {
    pub fn new(carts: CartStore) -> Self {
        Self { carts }
    }
}

#[async_trait]
impl Consumer for CartDeleteHandler {
    async fn consume(&self, payload: Value) -> Result<(), TransportError> {
        let msg: SagaMessage = serde_json::from_value(payload)?;
        let key = match msg.payment.member_id {
            Some(member) => CartKey::Member(member),
            None => CartKey::Guest(msg.payment.order_code),
        };
        let existed = self.carts.delete(key);
        tracing::info!(order = %msg.payment.order_code, existed, "cart deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PaymentRequest;
    use crate::status::SagaStatus;
    use common::{Amount, MemberId, OrderCode};

    fn message(member: Option<MemberId>, code: OrderCode) -> SagaMessage {
        SagaMessage::builder(
            SagaStatus::ProceedDeleteCart,
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
    async fn test_deletes_member_cart() {
        let carts = CartStore::new();
        let member = MemberId::new(7);
        carts.put(CartKey::Member(member));

        let handler = CartDeleteHandler::new(carts.clone());
        handler
            .consume(serde_json::to_value(message(Some(member), OrderCode::new())).unwrap())
            .await
            .unwrap();

        assert!(!carts.contains(CartKey::Member(member)));
    }

    #[tokio::test]
    async fn test_deletes_guest_cart_by_order_code() {
        let carts = CartStore::new();
        let code = OrderCode::new();
        carts.put(CartKey::Guest(code));

        let handler = CartDeleteHandler::new(carts.clone());
        handler
            .consume(serde_json::to_value(message(None, code)).unwrap())
            .await
            .unwrap();

        assert!(!carts.contains(CartKey::Guest(code)));
    }

    #[tokio::test]
    async fn test_absent_cart_is_noop() {
        let handler = CartDeleteHandler::new(CartStore::new());
        let result = handler
            .consume(serde_json::to_value(message(None, OrderCode::new())).unwrap())
            .await;
        assert!(result.is_ok());
    }
}
