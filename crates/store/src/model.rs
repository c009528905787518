//! Rows held by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BuyerId, ItemId, Money, OrderId};

/// A sellable item with its stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    /// Never negative in any committed state.
    pub quantity_on_hand: u32,
}

impl InventoryItem {
    /// Creates a new inventory item.
    pub fn new(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        category: impl Into<String>,
        unit_price: Money,
        quantity_on_hand: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            unit_price,
            quantity_on_hand,
        }
    }
}

/// Header of a completed purchase. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: BuyerId,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

/// One line of an order, with the unit price captured at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    /// Position of the line within its order, starting at 1.
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns `quantity * unit_price`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order line joined to the item's current name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineView {
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order header together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order: Order,
    pub lines: Vec<OrderLineView>,
}

/// Which orders a ledger read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Orders placed by one buyer.
    Buyer(BuyerId),
    /// Orders of every buyer.
    All,
}

impl OrderScope {
    pub fn includes(&self, buyer_id: BuyerId) -> bool {
        match self {
            OrderScope::Buyer(id) => *id == buyer_id,
            OrderScope::All => true,
        }
    }
}

/// Append-only record of an action taken by an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: BuyerId,
    pub action: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(actor_id: BuyerId, action: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            action: action.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_captured_price() {
        let line = OrderLine {
            order_id: OrderId::new(),
            line_no: 1,
            item_id: ItemId::new("A"),
            quantity: 3,
            unit_price: Money::from_cents(1000),
        };
        assert_eq!(line.line_total(), Money::from_cents(3000));
    }

    #[test]
    fn scope_filters_by_buyer() {
        let buyer = BuyerId::new();
        let other = BuyerId::new();
        assert!(OrderScope::Buyer(buyer).includes(buyer));
        assert!(!OrderScope::Buyer(buyer).includes(other));
        assert!(OrderScope::All.includes(other));
    }
}
