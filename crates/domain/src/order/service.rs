//! Order service: the placement engine and the order history read path.

use std::collections::HashMap;
use std::time::Instant;

use common::{BuyerId, ItemId, Money};
use serde::{Deserialize, Serialize};
use store::{
    InventoryStore, Order, OrderLedger, OrderLine, OrderRecord, OrderScope, Store, UnitOfWork,
};

use crate::audit::{AuditSink, ORDER_PLACED, StoreAuditSink};
use crate::error::OrderError;
use crate::identity::Identity;

use super::{Cart, CartLine};

/// The outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    /// Lines in cart order, with the unit price captured under lock.
    pub lines: Vec<OrderLine>,
}

impl PlacedOrder {
    pub fn total(&self) -> Money {
        self.order.total
    }
}

/// Service for placing and reading orders.
///
/// Holds no in-process locks: concurrent placements are coordinated solely by
/// the store's row locks, so one service can be shared by every request.
pub struct OrderService<S, A = StoreAuditSink<S>> {
    store: S,
    audit: A,
}

impl<S: Store + Clone> OrderService<S> {
    /// Creates a service that audits into the same store it places orders in.
    pub fn new(store: S) -> Self {
        let audit = StoreAuditSink::new(store.clone());
        Self { store, audit }
    }
}

impl<S: Store, A: AuditSink> OrderService<S, A> {
    /// Creates a service with a custom audit sink.
    pub fn with_audit_sink(store: S, audit: A) -> Self {
        Self { store, audit }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order for `buyer_id`.
    ///
    /// Validates the cart before opening a unit of work, then locks every
    /// item row, checks stock, prices the cart with the prices read under
    /// lock, records the order and its lines, decrements stock and commits.
    /// Any failure rolls the whole unit of work back. The audit entry is
    /// written after commit and its failure is only logged.
    #[tracing::instrument(skip_all, fields(buyer_id = %buyer_id, lines = lines.len()))]
    pub async fn place_order(
        &self,
        buyer_id: BuyerId,
        lines: Vec<CartLine>,
    ) -> Result<PlacedOrder, OrderError> {
        let started = Instant::now();

        match self.try_place(buyer_id, lines).await {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total,
                    "order placed"
                );

                self.record_placement(buyer_id, &placed).await;
                Ok(placed)
            }
            Err(err) => {
                metrics::counter!("order_placement_failures_total", "reason" => err.kind())
                    .increment(1);
                tracing::warn!(error = %err, "order placement failed");
                Err(err)
            }
        }
    }

    async fn try_place(
        &self,
        buyer_id: BuyerId,
        lines: Vec<CartLine>,
    ) -> Result<PlacedOrder, OrderError> {
        let cart = Cart::new(lines)?;

        let mut tx = self.store.begin().await?;
        match Self::apply(&mut tx, buyer_id, &cart).await {
            Ok(placed) => {
                tx.commit().await?;
                Ok(placed)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Runs every placement step against an open unit of work.
    async fn apply(
        tx: &mut S::Tx,
        buyer_id: BuyerId,
        cart: &Cart,
    ) -> Result<PlacedOrder, OrderError> {
        // Rows are locked in item order so two carts over the same items can
        // never wait on each other in a cycle.
        let mut prices: HashMap<ItemId, Money> = HashMap::with_capacity(cart.len());
        for line in cart.lock_order() {
            let item = tx
                .lock_and_read(&line.item_id)
                .await?
                .ok_or_else(|| OrderError::ItemNotFound {
                    item_id: line.item_id.clone(),
                })?;

            if item.quantity_on_hand < line.quantity {
                return Err(OrderError::InsufficientStock {
                    item_id: line.item_id.clone(),
                    requested: line.quantity,
                    available: item.quantity_on_hand,
                });
            }
            prices.insert(item.id, item.unit_price);
        }

        let mut priced = Vec::with_capacity(cart.len());
        let mut total = Money::zero();
        for line in cart.lines() {
            let unit_price = prices.get(&line.item_id).copied().ok_or_else(|| {
                OrderError::ItemNotFound {
                    item_id: line.item_id.clone(),
                }
            })?;
            total = unit_price
                .checked_multiply(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or_else(|| OrderError::InvalidQuantity {
                    item_id: line.item_id.clone(),
                })?;
            priced.push((line, unit_price));
        }

        let order = tx.insert_order(buyer_id, total).await?;

        let mut lines = Vec::with_capacity(priced.len());
        for (line_no, (line, unit_price)) in (1u32..).zip(priced) {
            let order_line = OrderLine {
                order_id: order.id,
                line_no,
                item_id: line.item_id.clone(),
                quantity: line.quantity,
                unit_price,
            };
            tx.insert_line(&order_line).await?;
            tx.decrement(&line.item_id, line.quantity).await?;
            lines.push(order_line);
        }

        Ok(PlacedOrder { order, lines })
    }

    async fn record_placement(&self, buyer_id: BuyerId, placed: &PlacedOrder) {
        let details = serde_json::json!({
            "order_id": placed.order.id,
            "total_cents": placed.order.total.cents(),
            "line_count": placed.lines.len(),
        });

        if let Err(err) = self.audit.record(buyer_id, ORDER_PLACED, details).await {
            metrics::counter!("audit_write_failures_total").increment(1);
            tracing::warn!(
                order_id = %placed.order.id,
                error = %err,
                "failed to record audit entry, order unaffected"
            );
        }
    }

    /// Returns the caller's own orders, newest first.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
    pub async fn order_history(&self, caller: &Identity) -> Result<Vec<OrderRecord>, OrderError> {
        Ok(self
            .store
            .list_orders(OrderScope::Buyer(caller.user_id))
            .await?)
    }

    /// Returns the orders of every buyer, newest first.
    ///
    /// Requires the `view_all_orders` capability.
    #[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
    pub async fn all_orders(&self, caller: &Identity) -> Result<Vec<OrderRecord>, OrderError> {
        if !caller.can_view_all_orders() {
            return Err(OrderError::Forbidden {
                action: "view all orders",
            });
        }
        Ok(self.store.list_orders(OrderScope::All).await?)
    }
}
