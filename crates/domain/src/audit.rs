//! Best-effort audit trail of actions taken through the domain layer.

use async_trait::async_trait;
use common::BuyerId;
use store::{AuditEntry, Store, StoreError};
use thiserror::Error;

/// Action name recorded after an order commits.
pub const ORDER_PLACED: &str = "order.placed";

/// Failure to record an audit entry.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit store error: {0}")]
    Store(#[from] StoreError),
}

/// Destination for audit entries.
///
/// Callers treat recording as fire-and-forget: an error is logged and never
/// changes the outcome of the audited action.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        actor_id: BuyerId,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), AuditError>;
}

/// Audit sink that appends to the store's audit log.
#[derive(Debug, Clone)]
pub struct StoreAuditSink<S> {
    store: S,
}

impl<S> StoreAuditSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store> AuditSink for StoreAuditSink<S> {
    async fn record(
        &self,
        actor_id: BuyerId,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), AuditError> {
        self.store
            .append_audit(AuditEntry::new(actor_id, action, details))
            .await?;
        Ok(())
    }
}
