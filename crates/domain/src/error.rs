//! Domain error types.

use common::{Amount, BookId, CouponId, MemberId, OrderCode};
use thiserror::Error;

use crate::coupon::CouponState;

/// Errors that can occur while mutating saga resources.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Book does not exist in the catalog.
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    /// Book exists but is not currently for sale.
    #[error("Book not for sale: {0}")]
    BookNotForSale(BookId),

    /// Requested quantity exceeds available inventory.
    #[error("Insufficient inventory for book {book}: requested {requested}, available {available}")]
    InsufficientInventory {
        book: BookId,
        requested: u32,
        available: u32,
    },

    /// Discount on a book exceeds its list price.
    #[error("Discount exceeds price for book {0}")]
    DiscountExceedsPrice(BookId),

    /// The order's net amount computed to zero.
    #[error("Order net amount is zero")]
    ZeroNetAmount,

    /// Reward percentage would credit the full purchase or more.
    #[error("Reward percentage out of range: {0}%")]
    RewardPercentTooHigh(u64),

    /// No pending draft for a guest order code.
    #[error("Draft not found for order {0}")]
    DraftNotFound(OrderCode),

    /// No pending draft for a member.
    #[error("Draft not found for member {0}")]
    MemberDraftNotFound(MemberId),

    /// Coupon does not exist.
    #[error("Coupon not found: {0}")]
    CouponNotFound(CouponId),

    /// Coupon step reached for a draft that chose no coupon.
    #[error("No coupon on draft for order {0}")]
    CouponMissingOnDraft(OrderCode),

    /// Coupon exists but cannot be applied in its current state.
    #[error("Coupon {coupon} not usable: {state}")]
    CouponNotUsable {
        coupon: CouponId,
        state: CouponState,
    },

    /// Member point balance is too low for the requested debit.
    #[error("Insufficient points for member {member}: requested {requested}, balance {balance}")]
    InsufficientPoints {
        member: MemberId,
        requested: Amount,
        balance: Amount,
    },

    /// No durable order with the given code.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderCode),

    /// An order with this code was already persisted.
    #[error("Order already persisted: {0}")]
    DuplicateOrder(OrderCode),

    /// The external payment provider rejected or failed a call.
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    /// Provider-reported amount differs from the computed total.
    #[error("Payment amount mismatch: reported {reported}, calculated {calculated}")]
    AmountMismatch { reported: Amount, calculated: Amount },

    /// Operation requires a registered member but the order is a guest order.
    #[error("Operation requires a member")]
    MemberRequired,

    /// An amount computation overflowed.
    #[error("Amount arithmetic overflow")]
    AmountOverflow,

    /// Simulated storage failure (failure injection in tests).
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
