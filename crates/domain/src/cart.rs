//! Cart store for post-invoke cleanup.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use common::{MemberId, OrderCode};

/// Key identifying a buyer's cart: member id for members, the order
/// code for guest sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartKey {
    Member(MemberId),
    Guest(OrderCode),
}

/// Shared handle over active carts.
///
/// The saga only deletes carts; creation belongs to the cart service
/// proper. Deleting an absent cart is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    carts: Arc<RwLock<HashSet<CartKey>>>,
}

impl CartStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an active cart (test fixture).
    pub fn put(&self, key: CartKey) {
        self.carts.write().unwrap().insert(key);
    }

    /// Returns true if the cart exists.
    pub fn contains(&self, key: CartKey) -> bool {
        self.carts.read().unwrap().contains(&key)
    }

    /// Deletes a cart, returning whether one existed.
    pub fn delete(&self, key: CartKey) -> bool {
        self.carts.write().unwrap().remove(&key)
    }
}
