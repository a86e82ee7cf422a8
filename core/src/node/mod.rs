// Node services — relay and user endpoint state machines
//
// Each node owns its own state; nothing is shared between nodes in-process.

pub mod relay;
pub mod user;

use crate::crypto::CryptoError;
use crate::onion::OnionError;
use crate::registry::RegistryError;
use crate::transport::TransportError;
use thiserror::Error;

pub use relay::{RelayNode, RelayPhase, RelayState};
pub use user::{UserNode, UserState};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Packet rejected: {0}")]
    Rejected(OnionError),
    #[error("Forwarding failed: {0}")]
    ForwardFailed(TransportError),
    #[error("Registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Onion(#[from] OnionError),
    #[error("Entry relay unreachable: {0}")]
    Transport(#[from] TransportError),
}
