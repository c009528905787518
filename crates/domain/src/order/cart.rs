//! Carts submitted for placement.

use common::ItemId;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// One requested item and quantity, as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// A validated cart.
///
/// Non-empty, every quantity positive, and at most one line per item:
/// duplicate item IDs are merged into the first line naming that item, so a
/// single stock check covers the combined quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Validates and merges the submitted lines.
    pub fn new(lines: impl IntoIterator<Item = CartLine>) -> Result<Self, OrderError> {
        let mut merged: Vec<CartLine> = Vec::new();

        for line in lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    item_id: line.item_id,
                });
            }

            match merged.iter().position(|m| m.item_id == line.item_id) {
                Some(idx) => {
                    let existing = &mut merged[idx];
                    existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(
                        || OrderError::InvalidQuantity {
                            item_id: line.item_id.clone(),
                        },
                    )?;
                }
                None => merged.push(line),
            }
        }

        if merged.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        Ok(Self { lines: merged })
    }

    /// Lines in submission order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines sorted by item ID, the order in which rows are locked.
    pub fn lock_order(&self) -> Vec<&CartLine> {
        let mut lines: Vec<&CartLine> = self.lines.iter().collect();
        lines.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cart_is_rejected() {
        assert!(matches!(Cart::new(vec![]), Err(OrderError::EmptyCart)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let result = Cart::new(vec![CartLine::new("A", 1), CartLine::new("B", 0)]);
        assert!(matches!(
            result,
            Err(OrderError::InvalidQuantity { item_id }) if item_id == ItemId::new("B")
        ));
    }

    #[test]
    fn duplicate_items_are_merged_into_first_line() {
        let cart = Cart::new(vec![
            CartLine::new("B", 1),
            CartLine::new("A", 2),
            CartLine::new("B", 3),
        ])
        .unwrap();

        assert_eq!(
            cart.lines(),
            &[CartLine::new("B", 4), CartLine::new("A", 2)]
        );
    }

    #[test]
    fn merged_quantity_overflow_is_rejected() {
        let result = Cart::new(vec![CartLine::new("A", u32::MAX), CartLine::new("A", 1)]);
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn lock_order_sorts_by_item_id() {
        let cart = Cart::new(vec![
            CartLine::new("C", 1),
            CartLine::new("A", 1),
            CartLine::new("B", 1),
        ])
        .unwrap();

        let ids: Vec<&str> = cart
            .lock_order()
            .iter()
            .map(|l| l.item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(cart.lines()[0].item_id.as_str(), "C");
    }
}
