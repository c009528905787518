//! Domain layer for the retail order backend.
//!
//! This crate provides:
//! - Cart validation (non-empty, positive quantities, duplicates merged)
//! - The order placement engine, which locks, prices, records and
//!   decrements inside a single unit of work
//! - Order history queries scoped by caller capability
//! - A best-effort audit sink

pub mod audit;
pub mod error;
pub mod identity;
pub mod order;

pub use audit::{AuditError, AuditSink, ORDER_PLACED, StoreAuditSink};
pub use error::OrderError;
pub use identity::{Capabilities, Identity};
pub use order::{Cart, CartLine, OrderService, PlacedOrder};
