//! Coupon store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::{Amount, CouponId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Lifecycle state of an issued coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CouponState {
    /// Issued and available.
    Unused,
    /// Consumed by an order.
    Used,
    /// Past its validity window.
    Expired,
}

impl std::fmt::Display for CouponState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CouponState::Unused => "Unused",
            CouponState::Used => "Used",
            CouponState::Expired => "Expired",
        };
        write!(f, "{name}")
    }
}

/// An issued coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub discount_amount: Amount,
    pub state: CouponState,
}

#[derive(Debug, Default)]
struct CouponStoreState {
    coupons: HashMap<CouponId, Coupon>,
}

/// Shared handle over issued coupons.
#[derive(Debug, Clone, Default)]
pub struct CouponStore {
    state: Arc<RwLock<CouponStoreState>>,
}

impl CouponStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an issued coupon.
    pub fn put(&self, coupon: Coupon) {
        self.state.write().unwrap().coupons.insert(coupon.id, coupon);
    }

    /// Current state of a coupon.
    pub fn state_of(&self, id: CouponId) -> Option<CouponState> {
        self.state.read().unwrap().coupons.get(&id).map(|c| c.state)
    }

    /// Discount amount of a coupon, regardless of its state.
    pub fn discount_of(&self, id: CouponId) -> Result<Amount> {
        self.state
            .read()
            .unwrap()
            .coupons
            .get(&id)
            .map(|c| c.discount_amount)
            .ok_or(DomainError::CouponNotFound(id))
    }

    /// Marks a coupon used and returns its discount amount.
    ///
    /// Only an `Unused` coupon can be applied; anything else is a
    /// resource-conflict failure for the step.
    pub fn mark_used(&self, id: CouponId) -> Result<Amount> {
        let mut state = self.state.write().unwrap();
        let coupon = state
            .coupons
            .get_mut(&id)
            .ok_or(DomainError::CouponNotFound(id))?;
        if coupon.state != CouponState::Unused {
            return Err(DomainError::CouponNotUsable {
                coupon: id,
                state: coupon.state,
            });
        }
        coupon.state = CouponState::Used;
        Ok(coupon.discount_amount)
    }

    /// Reverts a used coupon back to `Unused`. Reverting an already
    /// unused coupon is a no-op, so retried compensations are safe.
    pub fn revert(&self, id: CouponId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let coupon = state
            .coupons
            .get_mut(&id)
            .ok_or(DomainError::CouponNotFound(id))?;
        if coupon.state == CouponState::Used {
            coupon.state = CouponState::Unused;
        }
        Ok(())
    }
}
