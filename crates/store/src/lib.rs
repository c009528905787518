//! Persistence for the retail order backend.
//!
//! Holds the inventory table, the order ledger and the audit log. Writes that
//! must be atomic go through a [`UnitOfWork`] obtained from [`Store::begin`]:
//! row locks taken with [`InventoryStore::lock_and_read`] are held until the
//! unit of work commits or rolls back, and dropping it without committing
//! discards every staged write.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BuyerId, ItemId, Money, OrderId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use model::{AuditEntry, InventoryItem, Order, OrderLine, OrderLineView, OrderRecord, OrderScope};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{InventoryStore, OrderLedger, Store, UnitOfWork};
