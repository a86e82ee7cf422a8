// Node registry — directory of relay ids and their public keys
//
// The registry is a plain upsert store. Senders take a snapshot with
// `list_nodes` and build a circuit from it; no ordering is guaranteed.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay identifier
pub type NodeId = u32;

/// A published relay: id plus base64 SPKI public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub pub_key: String,
}

impl NodeRecord {
    pub fn new(node_id: NodeId, pub_key: impl Into<String>) -> Self {
        Self {
            node_id,
            pub_key: pub_key.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid node record: {0}")]
    InvalidRecord(&'static str),
}

/// Directory of relays, local or remote
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Insert or replace the record for `record.node_id`
    async fn register(&self, record: NodeRecord) -> Result<(), RegistryError>;

    /// Snapshot of every registered node
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, RegistryError>;
}

/// In-process registry used by the registry service and tests
#[derive(Debug, Default)]
pub struct Registry {
    nodes: RwLock<Vec<NodeRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: NodeRecord) -> Result<(), RegistryError> {
        if record.pub_key.trim().is_empty() {
            return Err(RegistryError::InvalidRecord("missing public key"));
        }

        let mut nodes = self.nodes.write();
        match nodes.iter_mut().find(|n| n.node_id == record.node_id) {
            Some(existing) => {
                tracing::debug!("Replacing public key of node {}", record.node_id);
                existing.pub_key = record.pub_key;
            }
            None => {
                tracing::info!("Registered node {}", record.node_id);
                nodes.push(record);
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<NodeRecord> {
        self.nodes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[async_trait]
impl NodeDirectory for Registry {
    async fn register(&self, record: NodeRecord) -> Result<(), RegistryError> {
        self.upsert(record)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, RegistryError> {
        Ok(self.snapshot())
    }
}
