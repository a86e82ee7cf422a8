// Topology — where each relay and user endpoint listens

use crate::registry::NodeId;
use crate::wire::Address;
use serde::{Deserialize, Serialize};

pub type UserId = u32;

pub const DEFAULT_REGISTRY_PORT: u16 = 8080;
pub const DEFAULT_BASE_RELAY_PORT: u16 = 4000;
pub const DEFAULT_BASE_USER_PORT: u16 = 3000;

/// Maps relay and user ids to network addresses (`base port + id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub registry_port: u16,
    pub base_relay_port: u16,
    pub base_user_port: u16,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            registry_port: DEFAULT_REGISTRY_PORT,
            base_relay_port: DEFAULT_BASE_RELAY_PORT,
            base_user_port: DEFAULT_BASE_USER_PORT,
        }
    }
}

impl Topology {
    pub fn relay_address(&self, node_id: NodeId) -> Address {
        Address::from_base(self.base_relay_port, node_id)
    }

    pub fn user_address(&self, user_id: UserId) -> Address {
        Address::from_base(self.base_user_port, user_id)
    }
}
