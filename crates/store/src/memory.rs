use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    AuditEntry, BuyerId, InventoryItem, ItemId, Money, Order, OrderId, OrderLine, OrderLineView,
    OrderRecord, OrderScope, Result, StoreError,
    store::{InventoryStore, OrderLedger, Store, UnitOfWork},
};

/// How long a unit of work waits for a row lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// An inventory row: the exclusive lock plus the committed item state.
///
/// The committed state is only written while the row lock is held, so plain
/// readers never observe a half-applied unit of work.
struct Row {
    lock: Arc<Mutex<()>>,
    item: RwLock<InventoryItem>,
}

impl Row {
    fn new(item: InventoryItem) -> Arc<Self> {
        Arc::new(Self {
            lock: Arc::new(Mutex::new(())),
            item: RwLock::new(item),
        })
    }

    async fn acquire(&self, timeout: Duration, item_id: &ItemId) -> Result<OwnedMutexGuard<()>> {
        tokio::time::timeout(timeout, self.lock.clone().lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(item_id.clone()))
    }
}

#[derive(Default)]
struct Ledger {
    orders: Vec<Order>,
    lines: Vec<OrderLine>,
    audit: Vec<AuditEntry>,
}

struct Shared {
    items: RwLock<BTreeMap<ItemId, Arc<Row>>>,
    ledger: RwLock<Ledger>,
    lock_timeout: Duration,
    fail_on_commit: AtomicBool,
    fail_on_audit: AtomicBool,
}

impl Shared {
    async fn row(&self, item_id: &ItemId) -> Option<Arc<Row>> {
        self.items.read().await.get(item_id).cloned()
    }
}

/// In-memory store implementation.
///
/// Provides the same locking and atomicity guarantees as the PostgreSQL
/// implementation: one exclusive lock per inventory row, writes staged in the
/// unit of work until commit.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a store whose units of work give up waiting for a row lock
    /// after `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                items: RwLock::new(BTreeMap::new()),
                ledger: RwLock::new(Ledger::default()),
                lock_timeout,
                fail_on_commit: AtomicBool::new(false),
                fail_on_audit: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a store pre-populated with items.
    pub async fn with_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.shared.items.write().await;
            for item in items {
                rows.insert(item.id.clone(), Row::new(item));
            }
        }
        store
    }

    /// Configures every subsequent commit to fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.shared.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Configures every subsequent audit append to fail.
    pub fn set_fail_on_audit(&self, fail: bool) {
        self.shared.fail_on_audit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.shared.ledger.read().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn line_count(&self) -> usize {
        self.shared.ledger.read().await.lines.len()
    }

    /// Returns the committed lines of an order.
    pub async fn lines_for(&self, order_id: OrderId) -> Vec<OrderLine> {
        self.shared
            .ledger
            .read()
            .await
            .lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect()
    }

    async fn existing_row(&self, item_id: &ItemId) -> Result<Arc<Row>> {
        self.shared
            .row(item_id)
            .await
            .ok_or_else(|| StoreError::ItemNotFound(item_id.clone()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A row locked by a unit of work, with the quantity it has taken so far.
struct HeldRow {
    row: Arc<Row>,
    _guard: OwnedMutexGuard<()>,
    decremented: u32,
}

impl HeldRow {
    async fn view(&self) -> InventoryItem {
        let mut item = self.row.item.read().await.clone();
        item.quantity_on_hand -= self.decremented;
        item
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    held: HashMap<ItemId, HeldRow>,
    orders: Vec<Order>,
    lines: Vec<OrderLine>,
    finished: bool,
}

#[async_trait]
impl InventoryStore for InMemoryTransaction {
    async fn lock_and_read(&mut self, item_id: &ItemId) -> Result<Option<InventoryItem>> {
        if let Some(held) = self.held.get(item_id) {
            return Ok(Some(held.view().await));
        }

        let Some(row) = self.shared.row(item_id).await else {
            return Ok(None);
        };
        let guard = row.acquire(self.shared.lock_timeout, item_id).await?;
        let item = row.item.read().await.clone();

        self.held.insert(
            item_id.clone(),
            HeldRow {
                row,
                _guard: guard,
                decremented: 0,
            },
        );
        Ok(Some(item))
    }

    async fn decrement(&mut self, item_id: &ItemId, amount: u32) -> Result<()> {
        if !self.held.contains_key(item_id) && self.lock_and_read(item_id).await?.is_none() {
            return Err(StoreError::ItemNotFound(item_id.clone()));
        }
        let Some(held) = self.held.get_mut(item_id) else {
            return Err(StoreError::ItemNotFound(item_id.clone()));
        };

        let on_hand = held.row.item.read().await.quantity_on_hand;
        on_hand
            .checked_sub(held.decremented)
            .and_then(|q| q.checked_sub(amount))
            .ok_or_else(|| StoreError::NegativeStock(item_id.clone()))?;

        held.decremented += amount;
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for InMemoryTransaction {
    async fn insert_order(&mut self, buyer_id: BuyerId, total: Money) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            buyer_id,
            total,
            created_at: Utc::now(),
        };
        self.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_line(&mut self, line: &OrderLine) -> Result<()> {
        if !self.orders.iter().any(|o| o.id == line.order_id) {
            return Err(StoreError::InvalidRow(format!(
                "order line references unknown order {}",
                line.order_id
            )));
        }
        if !self.held.contains_key(&line.item_id) && self.shared.row(&line.item_id).await.is_none()
        {
            return Err(StoreError::ItemNotFound(line.item_id.clone()));
        }
        self.lines.push(line.clone());
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        if self.shared.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }

        let mut ledger = self.shared.ledger.write().await;
        for held in self.held.values() {
            if held.decremented > 0 {
                held.row.item.write().await.quantity_on_hand -= held.decremented;
            }
        }
        ledger.orders.append(&mut self.orders);
        ledger.lines.append(&mut self.lines);
        drop(ledger);

        self.finished = true;
        tracing::debug!(locked_rows = self.held.len(), "transaction committed");
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        tracing::debug!(locked_rows = self.held.len(), "transaction rolled back");
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                locked_rows = self.held.len(),
                "transaction dropped without commit, rolled back"
            );
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            shared: self.shared.clone(),
            held: HashMap::new(),
            orders: Vec::new(),
            lines: Vec::new(),
            finished: false,
        })
    }

    async fn get_item(&self, item_id: &ItemId) -> Result<Option<InventoryItem>> {
        match self.shared.row(item_id).await {
            Some(row) => Ok(Some(row.item.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let items = self.shared.items.read().await;
        let mut out = Vec::with_capacity(items.len());
        for row in items.values() {
            out.push(row.item.read().await.clone());
        }
        Ok(out)
    }

    async fn upsert_item(&self, item: InventoryItem) -> Result<()> {
        let row = {
            let mut items = self.shared.items.write().await;
            if let Some(row) = items.get(&item.id).cloned() {
                row
            } else {
                items.insert(item.id.clone(), Row::new(item));
                return Ok(());
            }
        };

        let _guard = row.acquire(self.shared.lock_timeout, &item.id).await?;
        *row.item.write().await = item;
        Ok(())
    }

    async fn set_price(&self, item_id: &ItemId, unit_price: Money) -> Result<InventoryItem> {
        let row = self.existing_row(item_id).await?;
        let _guard = row.acquire(self.shared.lock_timeout, item_id).await?;
        let mut item = row.item.write().await;
        item.unit_price = unit_price;
        Ok(item.clone())
    }

    async fn restock(&self, item_id: &ItemId, amount: u32) -> Result<InventoryItem> {
        let row = self.existing_row(item_id).await?;
        let _guard = row.acquire(self.shared.lock_timeout, item_id).await?;
        let mut item = row.item.write().await;
        item.quantity_on_hand = item
            .quantity_on_hand
            .checked_add(amount)
            .ok_or_else(|| StoreError::StockOverflow(item_id.clone()))?;
        Ok(item.clone())
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderRecord>> {
        let ledger = self.shared.ledger.read().await;
        let items = self.shared.items.read().await;

        // Later commits first among equal timestamps.
        let mut orders: Vec<&Order> = ledger
            .orders
            .iter()
            .rev()
            .filter(|o| scope.includes(o.buyer_id))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut records = Vec::with_capacity(orders.len());
        for order in orders {
            let mut lines = Vec::new();
            for line in ledger.lines.iter().filter(|l| l.order_id == order.id) {
                let item_name = match items.get(&line.item_id) {
                    Some(row) => row.item.read().await.name.clone(),
                    None => String::new(),
                };
                lines.push(OrderLineView {
                    item_id: line.item_id.clone(),
                    item_name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                });
            }
            records.push(OrderRecord {
                order: order.clone(),
                lines,
            });
        }
        Ok(records)
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        if self.shared.fail_on_audit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit log rejected entry".to_string()));
        }
        self.shared.ledger.write().await.audit.push(entry);
        Ok(())
    }

    async fn audit_entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.shared.ledger.read().await.audit.clone())
    }
}
