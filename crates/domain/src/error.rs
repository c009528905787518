//! Domain error types.

use common::ItemId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing or reading orders.
///
/// Every error returned by a placement leaves the store exactly as it was:
/// the unit of work is rolled back before the error reaches the caller.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line has a zero quantity, or quantities overflow once combined.
    #[error("Invalid quantity for item {item_id}")]
    InvalidQuantity { item_id: ItemId },

    /// The cart references an item that does not exist.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: ItemId },

    /// The item has fewer units on hand than the cart asks for.
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// The caller's identity lacks the capability for the operation.
    #[error("Forbidden: caller may not {action}")]
    Forbidden { action: &'static str },

    /// The store failed (lock timeout, deadlock, lost connection, commit
    /// failure). Not retried.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl OrderError {
    /// Short stable name used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::EmptyCart => "empty_cart",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ItemNotFound { .. } => "item_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::Forbidden { .. } => "forbidden",
            OrderError::Persistence(_) => "persistence",
        }
    }
}
