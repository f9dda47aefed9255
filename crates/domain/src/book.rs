//! Book catalog and inventory store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::{Amount, BookId};
use serde::{Deserialize, Serialize};

use crate::draft::OrderLine;
use crate::error::{DomainError, Result};

/// Sale status of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookSaleStatus {
    /// Available for purchase.
    ForSale,
    /// Inventory exhausted; purchases are rejected.
    OutOfStock,
    /// Removed from sale by the seller.
    Discontinued,
}

impl std::fmt::Display for BookSaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BookSaleStatus::ForSale => "ForSale",
            BookSaleStatus::OutOfStock => "OutOfStock",
            BookSaleStatus::Discontinued => "Discontinued",
        };
        write!(f, "{name}")
    }
}

/// A catalog entry with live inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub price: Amount,
    pub discount: Amount,
    pub inventory: u32,
    pub status: BookSaleStatus,
}

impl Book {
    /// Net price per unit after discount.
    fn net_price(&self) -> Result<Amount> {
        self.price
            .checked_sub(self.discount)
            .ok_or(DomainError::DiscountExceedsPrice(self.id))
    }
}

#[derive(Debug, Default)]
struct BookStoreState {
    books: HashMap<BookId, Book>,
}

/// Shared handle over the book catalog.
///
/// `decrement_for_order` and `restock` are all-or-nothing: every line
/// is validated before any inventory changes, so a rejected order
/// leaves the catalog untouched (the step's transactional boundary).
#[derive(Debug, Clone, Default)]
pub struct BookStore {
    state: Arc<RwLock<BookStoreState>>,
}

impl BookStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog entry.
    pub fn put(&self, book: Book) {
        self.state.write().unwrap().books.insert(book.id, book);
    }

    /// Current inventory of a book.
    pub fn inventory_of(&self, id: BookId) -> Option<u32> {
        self.state.read().unwrap().books.get(&id).map(|b| b.inventory)
    }

    /// Current sale status of a book.
    pub fn status_of(&self, id: BookId) -> Option<BookSaleStatus> {
        self.state.read().unwrap().books.get(&id).map(|b| b.status)
    }

    /// Computes the net purchase amount, `Σ (price − discount) ×
    /// quantity`, without validating availability or mutating
    /// inventory. Used to recompute totals on duplicate deliveries
    /// whose decrement already committed.
    pub fn price_order(&self, lines: &[OrderLine]) -> Result<Amount> {
        let state = self.state.read().unwrap();
        let mut net = Amount::zero();
        for line in lines {
            let book = state
                .books
                .get(&line.book_id)
                .ok_or(DomainError::BookNotFound(line.book_id))?;
            let line_amount = book
                .net_price()?
                .checked_mul(u64::from(line.quantity))
                .ok_or(DomainError::AmountOverflow)?;
            net = net
                .checked_add(line_amount)
                .ok_or(DomainError::AmountOverflow)?;
        }
        if net.is_zero() {
            return Err(DomainError::ZeroNetAmount);
        }
        Ok(net)
    }

    fn validate_and_price(state: &BookStoreState, lines: &[OrderLine]) -> Result<Amount> {
        let mut net = Amount::zero();
        for line in lines {
            let book = state
                .books
                .get(&line.book_id)
                .ok_or(DomainError::BookNotFound(line.book_id))?;
            if book.status != BookSaleStatus::ForSale {
                return Err(DomainError::BookNotForSale(book.id));
            }
            if book.inventory < line.quantity {
                return Err(DomainError::InsufficientInventory {
                    book: book.id,
                    requested: line.quantity,
                    available: book.inventory,
                });
            }
            let line_amount = book
                .net_price()?
                .checked_mul(u64::from(line.quantity))
                .ok_or(DomainError::AmountOverflow)?;
            net = net
                .checked_add(line_amount)
                .ok_or(DomainError::AmountOverflow)?;
        }
        if net.is_zero() {
            return Err(DomainError::ZeroNetAmount);
        }
        Ok(net)
    }

    /// Decrements inventory for every order line and returns the net
    /// purchase amount.
    ///
    /// All-or-nothing: every line is validated before any inventory
    /// changes. A book whose inventory reaches zero flips to
    /// `OutOfStock`.
    pub fn decrement_for_order(&self, lines: &[OrderLine]) -> Result<Amount> {
        let mut state = self.state.write().unwrap();
        let net = Self::validate_and_price(&state, lines)?;

        for line in lines {
            let book = state.books.get_mut(&line.book_id).unwrap();
            book.inventory -= line.quantity;
            if book.inventory == 0 {
                book.status = BookSaleStatus::OutOfStock;
            }
        }

        Ok(net)
    }

    /// Re-increments inventory for every order line, flipping
    /// `OutOfStock` books back to `ForSale`.
    pub fn restock(&self, lines: &[OrderLine]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for line in lines {
            if !state.books.contains_key(&line.book_id) {
                return Err(DomainError::BookNotFound(line.book_id));
            }
        }
        for line in lines {
            let book = state.books.get_mut(&line.book_id).unwrap();
            book.inventory += line.quantity;
            if book.inventory > 0 && book.status == BookSaleStatus::OutOfStock {
                book.status = BookSaleStatus::ForSale;
            }
        }
        Ok(())
    }

    /// Unit price of a book at this moment, for persisted order lines.
    pub fn unit_price(&self, id: BookId) -> Result<Amount> {
        let state = self.state.read().unwrap();
        let book = state.books.get(&id).ok_or(DomainError::BookNotFound(id))?;
        Ok(book.price)
    }
}
