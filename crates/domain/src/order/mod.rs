//! Order placement and order history.

mod cart;
mod service;

pub use cart::{Cart, CartLine};
pub use service::{OrderService, PlacedOrder};
