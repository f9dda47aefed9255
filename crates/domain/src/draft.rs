//! Pending order drafts.
//!
//! A draft is the checkout form captured before the saga starts: line
//! items, fees, and the buyer's point/coupon choices. Drafts live in a
//! fast key-value store (keyed by member id for members, by order code
//! for guests) and are the single source the compensation handlers
//! re-derive their deltas from.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::{Amount, BookId, CouponId, MemberId, OrderCode};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// One line item of a draft: which book, how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: BookId,
    pub quantity: u32,
}

/// The pending order form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub order_code: OrderCode,
    /// `None` for guest orders.
    pub member_id: Option<MemberId>,
    pub lines: Vec<OrderLine>,
    pub delivery_fee: Amount,
    pub wrapping_fee: Amount,
    /// Points the buyer chose to spend; zero means no point usage.
    pub use_point_amount: Amount,
    /// Coupon the buyer chose to apply, if any.
    pub coupon_id: Option<CouponId>,
}

#[derive(Debug, Default)]
struct DraftStoreState {
    member_drafts: HashMap<MemberId, OrderDraft>,
    guest_drafts: HashMap<OrderCode, OrderDraft>,
}

/// Shared handle over pending drafts.
///
/// Drafts are retained after the order is persisted; the post-success
/// cancellation flow still reads them to reverse guest resource usage.
#[derive(Debug, Clone, Default)]
pub struct DraftStore {
    state: Arc<RwLock<DraftStoreState>>,
}

impl DraftStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a draft, keyed by member id when present, else by order code.
    pub fn put(&self, draft: OrderDraft) {
        let mut state = self.state.write().unwrap();
        match draft.member_id {
            Some(member_id) => {
                state.member_drafts.insert(member_id, draft);
            }
            None => {
                state.guest_drafts.insert(draft.order_code, draft);
            }
        }
    }

    /// Resolves the draft for an order attempt.
    pub fn find(&self, member_id: Option<MemberId>, order_code: OrderCode) -> Result<OrderDraft> {
        let state = self.state.read().unwrap();
        match member_id {
            Some(member_id) => state
                .member_drafts
                .get(&member_id)
                .cloned()
                .ok_or(DomainError::MemberDraftNotFound(member_id)),
            None => state
                .guest_drafts
                .get(&order_code)
                .cloned()
                .ok_or(DomainError::DraftNotFound(order_code)),
        }
    }

    /// Removes a draft once it is no longer needed.
    pub fn remove(&self, member_id: Option<MemberId>, order_code: OrderCode) {
        let mut state = self.state.write().unwrap();
        match member_id {
            Some(member_id) => {
                state.member_drafts.remove(&member_id);
            }
            None => {
                state.guest_drafts.remove(&order_code);
            }
        }
    }
}
