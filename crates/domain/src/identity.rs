//! Caller identity as handed over by the identity provider.

use common::BuyerId;
use serde::{Deserialize, Serialize};

/// Privileges attached to an identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// May read the orders of every buyer.
    pub view_all_orders: bool,
    /// May edit catalog prices and stock levels.
    pub manage_catalog: bool,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: BuyerId,
    pub capabilities: Capabilities,
}

impl Identity {
    /// An ordinary buyer with no extra capabilities.
    pub fn buyer(user_id: BuyerId) -> Self {
        Self {
            user_id,
            capabilities: Capabilities::default(),
        }
    }

    /// A staff member.
    pub fn staff(user_id: BuyerId) -> Self {
        Self {
            user_id,
            capabilities: Capabilities {
                view_all_orders: true,
                manage_catalog: true,
            },
        }
    }

    pub fn can_view_all_orders(&self) -> bool {
        self.capabilities.view_all_orders
    }

    pub fn can_manage_catalog(&self) -> bool {
        self.capabilities.manage_catalog
    }
}
