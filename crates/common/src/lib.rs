//! Shared types used across the retail order backend.

mod money;
mod types;

pub use money::Money;
pub use types::{BuyerId, ItemId, OrderId};
