// Onion routing — circuit selection, layered construction and peeling
//
// Each layer reveals only the next hop to the relay that peels it, so no
// single relay sees both the sender side and the destination.

pub mod circuit;
pub mod encoder;
mod layer;
pub mod peeler;

use crate::crypto::CryptoError;
use crate::wire::WireError;
use thiserror::Error;

pub use circuit::{Circuit, CircuitBuilder, CircuitHop, CIRCUIT_LENGTH};
pub use encoder::construct_onion;
pub use peeler::{peel_layer, PeeledLayer, Remainder};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnionError {
    #[error("Not enough nodes for a circuit: need {needed}, registry has {available}")]
    InsufficientNodes { needed: usize, available: usize },
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(&'static str),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Wire(#[from] WireError),
}
