use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AuditEntry, BuyerId, InventoryItem, ItemId, Money, Order, OrderId, OrderLine, OrderLineView,
    OrderRecord, OrderScope, Result, StoreError,
    store::{InventoryStore, OrderLedger, Store, UnitOfWork},
};

const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";
const SQLSTATE_CHECK_VIOLATION: &str = "23514";

const QUANTITY_NON_NEGATIVE: &str = "inventory_quantity_non_negative";
const QUANTITY_FITS_U32: &str = "inventory_quantity_fits_u32";

const ITEM_COLUMNS: &str = "id, name, category, unit_price_cents, quantity_on_hand";

/// PostgreSQL-backed store implementation.
///
/// Row locks are `SELECT ... FOR UPDATE` locks held by the open transaction.
/// The `inventory_quantity_non_negative` and `inventory_quantity_fits_u32`
/// check constraints keep every stock level inside `u32`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bounds how long a unit of work or catalog write waits for a row lock.
    ///
    /// Applied with `SET LOCAL lock_timeout` at the start of every
    /// transaction; without it the server default applies.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = Some(lock_timeout);
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Opens a transaction with the configured lock timeout applied.
    async fn begin_bounded(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await?;
        }

        Ok(tx)
    }
}

fn classify(err: sqlx::Error, item_id: Option<&ItemId>) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    let constraint = err
        .as_database_error()
        .and_then(|db| db.constraint())
        .map(str::to_owned);

    match (code.as_deref(), constraint.as_deref(), item_id) {
        (Some(SQLSTATE_LOCK_NOT_AVAILABLE), _, Some(id)) => StoreError::LockTimeout(id.clone()),
        (Some(SQLSTATE_DEADLOCK_DETECTED), _, _) => StoreError::Deadlock,
        (Some(SQLSTATE_CHECK_VIOLATION), Some(QUANTITY_NON_NEGATIVE), Some(id)) => {
            StoreError::NegativeStock(id.clone())
        }
        (Some(SQLSTATE_CHECK_VIOLATION), Some(QUANTITY_FITS_U32), Some(id)) => {
            StoreError::StockOverflow(id.clone())
        }
        _ => StoreError::Database(err),
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidRow(format!("{column} out of range: {value}")))
}

fn row_to_item(row: &PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: ItemId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        quantity_on_hand: to_u32(row.try_get("quantity_on_hand")?, "quantity_on_hand")?,
    })
}

/// Unit of work over a PostgreSQL transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryStore for PostgresTransaction {
    async fn lock_and_read(&mut self, item_id: &ItemId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(item_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify(e, Some(item_id)))?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn decrement(&mut self, item_id: &ItemId, amount: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET quantity_on_hand = quantity_on_hand - $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(item_id.as_str())
        .bind(i64::from(amount))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, Some(item_id)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound(item_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for PostgresTransaction {
    async fn insert_order(&mut self, buyer_id: BuyerId, total: Money) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            buyer_id,
            total,
            // Postgres keeps microseconds; truncate so the returned order
            // matches what a later read sees.
            created_at: Utc::now().trunc_subsecs(6),
        };

        sqlx::query(
            r#"
            INSERT INTO orders (id, buyer_id, total_cents, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, None))?;

        Ok(order)
    }

    async fn insert_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, line_no, item_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(line.order_id.as_uuid())
        .bind(i64::from(line.line_no))
        .bind(line.item_id.as_str())
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, None))?;

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| classify(e, None))
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.begin_bounded().await?,
        })
    }

    async fn get_item(&self, item_id: &ItemId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1"
        ))
        .bind(item_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    #[tracing::instrument(skip_all, fields(item_id = %item.id))]
    async fn upsert_item(&self, item: InventoryItem) -> Result<()> {
        let mut tx = self.begin_bounded().await?;
        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, name, category, unit_price_cents, quantity_on_hand)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                unit_price_cents = EXCLUDED.unit_price_cents,
                quantity_on_hand = EXCLUDED.quantity_on_hand,
                updated_at = now()
            "#,
        )
        .bind(item.id.as_str())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price.cents())
        .bind(i64::from(item.quantity_on_hand))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, Some(&item.id)))?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, item_id), fields(item_id = %item_id))]
    async fn set_price(&self, item_id: &ItemId, unit_price: Money) -> Result<InventoryItem> {
        let mut tx = self.begin_bounded().await?;
        let row = sqlx::query(&format!(
            "UPDATE inventory_items SET unit_price_cents = $2, updated_at = now() \
             WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id.as_str())
        .bind(unit_price.cents())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify(e, Some(item_id)))?;

        let item = match row {
            Some(row) => row_to_item(&row)?,
            None => return Err(StoreError::ItemNotFound(item_id.clone())),
        };
        tx.commit().await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self, item_id), fields(item_id = %item_id))]
    async fn restock(&self, item_id: &ItemId, amount: u32) -> Result<InventoryItem> {
        let mut tx = self.begin_bounded().await?;
        let row = sqlx::query(&format!(
            "UPDATE inventory_items SET quantity_on_hand = quantity_on_hand + $2, updated_at = now() \
             WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id.as_str())
        .bind(i64::from(amount))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify(e, Some(item_id)))?;

        let item = match row {
            Some(row) => row_to_item(&row)?,
            None => return Err(StoreError::ItemNotFound(item_id.clone())),
        };
        tx.commit().await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderRecord>> {
        let buyer: Option<Uuid> = match scope {
            OrderScope::Buyer(id) => Some(id.as_uuid()),
            OrderScope::All => None,
        };

        let rows = sqlx::query(
            r#"
            SELECT o.id, o.buyer_id, o.total_cents, o.created_at,
                   l.item_id, COALESCE(i.name, '') AS item_name, l.quantity, l.unit_price_cents
            FROM orders o
            JOIN order_lines l ON l.order_id = o.id
            LEFT JOIN inventory_items i ON i.id = l.item_id
            WHERE $1::uuid IS NULL OR o.buyer_id = $1
            ORDER BY o.created_at DESC, o.id ASC, l.line_no ASC
            "#,
        )
        .bind(buyer)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<OrderRecord> = Vec::new();
        for row in rows {
            let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let line = OrderLineView {
                item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
                item_name: row.try_get("item_name")?,
                quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            };

            match records.last_mut() {
                Some(record) if record.order.id == order_id => record.lines.push(line),
                _ => records.push(OrderRecord {
                    order: Order {
                        id: order_id,
                        buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
                        total: Money::from_cents(row.try_get("total_cents")?),
                        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                    },
                    lines: vec![line],
                }),
            }
        }

        Ok(records)
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor_id, action, details, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id.as_uuid())
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn audit_entries(&self) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, action, details, recorded_at
            FROM audit_log
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<AuditEntry> {
                Ok(AuditEntry {
                    id: row.try_get("id")?,
                    actor_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("actor_id")?),
                    action: row.try_get("action")?,
                    details: row.try_get("details")?,
                    timestamp: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}
