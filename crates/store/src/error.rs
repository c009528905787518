use thiserror::Error;

use crate::ItemId;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Waiting for an inventory row lock exceeded the configured timeout.
    #[error("Lock timeout waiting for inventory item {0}")]
    LockTimeout(ItemId),

    /// The backing database aborted the transaction to break a deadlock.
    #[error("Deadlock detected, transaction aborted")]
    Deadlock,

    /// A decrement would take the quantity on hand below zero.
    #[error("Stock for item {0} would become negative")]
    NegativeStock(ItemId),

    /// A restock would take the quantity on hand past `u32::MAX`.
    #[error("Stock for item {0} would overflow")]
    StockOverflow(ItemId),

    /// The inventory row does not exist.
    #[error("Inventory item not found: {0}")]
    ItemNotFound(ItemId),

    /// A stored row could not be mapped back into a model.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// The store rejected the operation (connection lost, injected failure).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
