//! Saga message envelopes.
//!
//! A [`SagaMessage`] is the single token that travels through the
//! pipeline: it carries everything a step handler needs so no handler
//! consults state outside its own resource. Field names serialize in
//! camelCase to match the original wire format.

use common::{Amount, CouponId, MemberId, OrderCode};
use serde::{Deserialize, Serialize};

use crate::status::SagaStatus;

/// Identifies the originating order attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// `None` means a guest order.
    pub member_id: Option<MemberId>,
    pub order_code: OrderCode,
    /// Opaque provider-side payment key from the checkout page.
    pub payment_key: String,
    /// Amount the provider reported at preparation time; must match
    /// the computed total before the confirm call is made.
    pub reported_amount: Amount,
}

/// The mutable envelope passed through every saga hop.
///
/// Created exactly once per order attempt via [`SagaMessage::builder`];
/// the status and payment request are mandatory so a partial message
/// can never be routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaMessage {
    pub status: SagaStatus,
    #[serde(rename = "paymentRequest")]
    pub payment: PaymentRequest,
    pub book_amount: Amount,
    pub calculate_total_amount: Amount,
    pub coupon_amount: Amount,
    pub earn_point_amount: Amount,
    pub no_use_point: bool,
    pub no_use_coupon: bool,
    pub no_earn_point: bool,
}

/// The skip flags computed once at verification time.
///
/// These are the routing decision inputs for conditionally skipped
/// steps; they never change after verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipFlags {
    pub no_use_point: bool,
    pub no_use_coupon: bool,
    pub no_earn_point: bool,
}

impl SagaMessage {
    /// Starts building a message. Status and payment request are the
    /// two fields without a meaningful default.
    pub fn builder(status: SagaStatus, payment: PaymentRequest) -> SagaMessageBuilder {
        SagaMessageBuilder {
            message: SagaMessage {
                status,
                payment,
                book_amount: Amount::zero(),
                calculate_total_amount: Amount::zero(),
                coupon_amount: Amount::zero(),
                earn_point_amount: Amount::zero(),
                no_use_point: false,
                no_use_coupon: false,
                no_earn_point: false,
            },
        }
    }

    /// The skip flags as a value, for the router's pure transition.
    pub fn skip_flags(&self) -> SkipFlags {
        SkipFlags {
            no_use_point: self.no_use_point,
            no_use_coupon: self.no_use_coupon,
            no_earn_point: self.no_earn_point,
        }
    }
}

/// Builder for [`SagaMessage`].
#[derive(Debug)]
pub struct SagaMessageBuilder {
    message: SagaMessage,
}

impl SagaMessageBuilder {
    pub fn book_amount(mut self, amount: Amount) -> Self {
        self.message.book_amount = amount;
        self
    }

    pub fn calculate_total_amount(mut self, amount: Amount) -> Self {
        self.message.calculate_total_amount = amount;
        self
    }

    pub fn coupon_amount(mut self, amount: Amount) -> Self {
        self.message.coupon_amount = amount;
        self
    }

    pub fn earn_point_amount(mut self, amount: Amount) -> Self {
        self.message.earn_point_amount = amount;
        self
    }

    pub fn no_use_point(mut self, flag: bool) -> Self {
        self.message.no_use_point = flag;
        self
    }

    pub fn no_use_coupon(mut self, flag: bool) -> Self {
        self.message.no_use_coupon = flag;
        self
    }

    pub fn no_earn_point(mut self, flag: bool) -> Self {
        self.message.no_earn_point = flag;
        self
    }

    pub fn build(self) -> SagaMessage {
        self.message
    }
}

/// Envelope for the post-success cancellation flow.
///
/// Independent of [`SagaMessage`]: it references an already persisted
/// order, not an in-flight saga instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayCancelMessage {
    pub order_code: OrderCode,
    pub member_id: Option<MemberId>,
    pub coupon_id: Option<CouponId>,
    pub use_point_amount: Amount,
    pub earn_point_amount: Amount,
    pub payment_key: String,
    pub status: SagaStatus,
}

/// Provider-side cancel instruction published on the payment-cancel key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCancelRequest {
    pub payment_key: String,
    pub cancel_reason: String,
}
