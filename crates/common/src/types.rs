use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique code identifying one order attempt.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// order codes with other UUID-based identifiers. The same code keys
/// the pending draft for guest orders and the durable order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(Uuid);

impl OrderCode {
    /// Creates a new random order code.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an order code from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderCode {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderCode {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OrderCode> for Uuid {
    fn from(code: OrderCode) -> Self {
        code.0
    }
}

/// Identifier for a registered member. Absent on guest orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(u64);

impl MemberId {
    /// Creates a member ID from a raw numeric value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MemberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier for a book in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(u64);

impl BookId {
    /// Creates a book ID from a raw numeric value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BookId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier for an issued coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponId(u64);

impl CouponId {
    /// Creates a coupon ID from a raw numeric value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CouponId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CouponId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Monetary amount in whole currency units.
///
/// Unsigned by construction so running totals can never go negative;
/// all arithmetic is checked and subtraction reports underflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Creates an amount from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction; `None` signals underflow.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Checked multiplication by a unitless factor (e.g. a quantity).
    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Applies a whole-number percentage, truncating toward zero.
    pub fn percent(self, percent: u64) -> Option<Amount> {
        self.0.checked_mul(percent).map(|v| Amount(v / 100))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
