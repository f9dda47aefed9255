//! Resource stores and service seams for the order saga.
//!
//! Each store models one independently owned resource (book inventory,
//! point ledger, coupon state, pending drafts, carts, durable orders)
//! that a saga step mutates under its own local transaction. Stores
//! are cheaply cloneable handles over shared state, in the same shape
//! a repository layer would take over a real database.

pub mod book;
pub mod cart;
pub mod coupon;
pub mod draft;
pub mod error;
pub mod orders;
pub mod payment;
pub mod point;

pub use book::{Book, BookSaleStatus, BookStore};
pub use cart::{CartKey, CartStore};
pub use coupon::{Coupon, CouponState, CouponStore};
pub use draft::{DraftStore, OrderDraft, OrderLine};
pub use error::DomainError;
pub use orders::{OrderLineRecord, OrderRecord, OrderRepository, OrderStatus};
pub use payment::{InMemoryPaymentProvider, PaymentProvider};
pub use point::PointLedger;
