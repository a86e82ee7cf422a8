// onionrelay core — layered encryption and per-hop peeling
//
// A sender wraps a message in one envelope per relay of a random
// three-relay circuit. Each relay opens exactly one envelope, learns the
// next hop, and forwards what is left. Sockets, process bootstrap and
// configuration live in the binary; this crate sees them only through the
// `NodeDirectory` and `Transport` traits.

pub mod crypto;
pub mod node;
pub mod onion;
pub mod registry;
pub mod topology;
pub mod transport;
pub mod wire;

pub use crypto::{CryptoError, KeyPair, SymmetricKey};
pub use node::{RelayError, RelayNode, RelayPhase, SendError, UserNode};
pub use onion::{
    construct_onion, peel_layer, Circuit, CircuitBuilder, OnionError, PeeledLayer, Remainder,
    CIRCUIT_LENGTH,
};
pub use registry::{NodeDirectory, NodeId, NodeRecord, Registry, RegistryError};
pub use topology::{Topology, UserId};
pub use transport::{Packet, Transport, TransportError};
pub use wire::{Address, WireError};
