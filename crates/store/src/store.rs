use async_trait::async_trait;

use crate::{
    AuditEntry, BuyerId, InventoryItem, ItemId, Money, Order, OrderLine, OrderRecord, OrderScope,
    Result,
};

/// Inventory operations available inside an open unit of work.
#[async_trait]
pub trait InventoryStore: Send {
    /// Acquires an exclusive lock on the item row and reads it.
    ///
    /// The lock is held until the unit of work commits or rolls back and
    /// blocks any other unit of work (or catalog write) touching the same row.
    /// Locking a row already held by this unit of work returns the row as seen
    /// through this unit of work's staged decrements.
    ///
    /// Returns `None` if the item does not exist.
    async fn lock_and_read(&mut self, item_id: &ItemId) -> Result<Option<InventoryItem>>;

    /// Decrements the quantity on hand of the item.
    ///
    /// Fails with `NegativeStock` rather than letting the quantity drop below
    /// zero.
    async fn decrement(&mut self, item_id: &ItemId, amount: u32) -> Result<()>;
}

/// Order ledger operations available inside an open unit of work.
#[async_trait]
pub trait OrderLedger: Send {
    /// Inserts an order header and returns it with its assigned ID and
    /// creation time.
    async fn insert_order(&mut self, buyer_id: BuyerId, total: Money) -> Result<Order>;

    /// Inserts one line of an order inserted by this unit of work.
    async fn insert_line(&mut self, line: &OrderLine) -> Result<()>;
}

/// A transaction spanning inventory locks and ledger writes.
///
/// `commit` and `rollback` are the only two exits. Dropping a unit of work
/// without calling either rolls it back and releases its locks.
#[async_trait]
pub trait UnitOfWork: InventoryStore + OrderLedger + Sized {
    /// Makes every staged write visible atomically and releases the locks.
    async fn commit(self) -> Result<()>;

    /// Discards every staged write and releases the locks.
    async fn rollback(self) -> Result<()>;
}

/// Entry point to the store.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: UnitOfWork + 'static;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Reads the committed state of an item without locking.
    async fn get_item(&self, item_id: &ItemId) -> Result<Option<InventoryItem>>;

    /// Lists every item ordered by ID.
    async fn list_items(&self) -> Result<Vec<InventoryItem>>;

    /// Creates an item or replaces an existing one.
    ///
    /// Replacing waits for the row lock.
    async fn upsert_item(&self, item: InventoryItem) -> Result<()>;

    /// Changes the catalog price of an item. Waits for the row lock.
    async fn set_price(&self, item_id: &ItemId, unit_price: Money) -> Result<InventoryItem>;

    /// Adds stock to an item. Waits for the row lock.
    async fn restock(&self, item_id: &ItemId, amount: u32) -> Result<InventoryItem>;

    /// Returns committed orders in scope with their lines, newest first.
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderRecord>>;

    /// Appends an audit entry.
    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;

    /// Returns every audit entry in insertion order.
    async fn audit_entries(&self) -> Result<Vec<AuditEntry>>;
}
