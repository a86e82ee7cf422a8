// Transport seam — how packets move between nodes
//
// The core never opens sockets. Relays and users hand packets to a
// `Transport`; the binary provides an HTTP implementation.

use crate::wire::Address;
use async_trait::async_trait;
use thiserror::Error;

/// What travels to the next hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A further envelope, bound for another relay
    Onion(Vec<u8>),
    /// The final payload, bound for a user endpoint
    Plaintext(String),
}

impl Packet {
    pub fn len(&self) -> usize {
        match self {
            Packet::Onion(bytes) => bytes.len(),
            Packet::Plaintext(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Destination {0} unreachable: {1}")]
    Unreachable(Address, String),
    #[error("Destination {0} rejected packet: {1}")]
    Rejected(Address, String),
    #[error("Address {0} cannot be routed")]
    Unroutable(Address),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand `packet` to the node at `to`. Resolves once the next hop acknowledged it.
    async fn deliver(&self, to: Address, packet: Packet) -> Result<(), TransportError>;
}
