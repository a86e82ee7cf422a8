// Relay node — peels one layer per packet and forwards the rest
//
// Phase cycle for every packet:
//
//   Idle -> ReceivedPacket -> Decrypting -> Forwarding     -> Idle
//                                        -> DeliveredFinal -> Idle
//                                        -> Rejected       -> Idle
//
// Packets are independent. The only state kept between them is the debug
// snapshot of the most recent one.

use super::RelayError;
use crate::crypto::{export_private_key, export_public_key, CryptoError, KeyPair};
use crate::onion::{peel_layer, PeeledLayer, Remainder};
use crate::registry::{NodeDirectory, NodeId, NodeRecord};
use crate::transport::Transport;
use crate::wire::Address;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Idle,
    ReceivedPacket,
    Decrypting,
    Forwarding,
    DeliveredFinal,
    Rejected,
}

/// Snapshot of the most recent packet, overwritten each time
#[derive(Debug, Clone)]
pub struct RelayState {
    pub phase: RelayPhase,
    pub last_received: Option<Vec<u8>>,
    pub last_decrypted: Option<Remainder>,
    pub last_destination: Option<Address>,
    /// Terminal phase reached by the most recent packet
    pub last_outcome: Option<RelayPhase>,
}

impl Default for RelayState {
    fn default() -> Self {
        Self {
            phase: RelayPhase::Idle,
            last_received: None,
            last_decrypted: None,
            last_destination: None,
            last_outcome: None,
        }
    }
}

pub struct RelayNode {
    node_id: NodeId,
    keys: KeyPair,
    state: Mutex<RelayState>,
}

impl RelayNode {
    pub fn new(node_id: NodeId, keys: KeyPair) -> Self {
        Self {
            node_id,
            keys,
            state: Mutex::new(RelayState::default()),
        }
    }

    /// Start a relay with a freshly generated key pair
    pub fn generate(node_id: NodeId) -> Result<Self, CryptoError> {
        tracing::info!("🔑 Generating key pair for relay {}", node_id);
        Ok(Self::new(node_id, KeyPair::generate()?))
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Registry entry for this relay
    pub fn record(&self) -> Result<NodeRecord, CryptoError> {
        Ok(NodeRecord::new(
            self.node_id,
            export_public_key(self.keys.public_key())?,
        ))
    }

    /// Publish this relay's public key
    pub async fn register(&self, directory: &dyn NodeDirectory) -> Result<(), RelayError> {
        directory.register(self.record()?).await?;
        tracing::info!("Relay {} registered", self.node_id);
        Ok(())
    }

    /// Record an incoming packet and move to `ReceivedPacket`
    pub fn receive(&self, packet: &[u8]) {
        let mut state = self.state.lock();
        state.last_received = Some(packet.to_vec());
        state.phase = RelayPhase::ReceivedPacket;
    }

    /// Remove one layer, recording debug state. Does not forward.
    pub fn peel(&self, packet: &[u8]) -> Result<PeeledLayer, RelayError> {
        self.receive(packet);
        self.state.lock().phase = RelayPhase::Decrypting;

        match peel_layer(packet, self.keys.private_key()) {
            Ok(peeled) => {
                let mut state = self.state.lock();
                state.last_decrypted = Some(peeled.remainder.clone());
                state.last_destination = Some(peeled.next_hop);
                state.phase = if peeled.is_final() {
                    RelayPhase::DeliveredFinal
                } else {
                    RelayPhase::Forwarding
                };
                Ok(peeled)
            }
            Err(e) => {
                tracing::warn!("Relay {} rejected packet: {}", self.node_id, e);
                self.finish(RelayPhase::Rejected);
                Err(RelayError::Rejected(e))
            }
        }
    }

    /// Entry point for a received packet: peel, then forward or deliver.
    ///
    /// A rejected packet is dropped without any forward. A failed forward is
    /// logged and returned; it is never retried.
    pub async fn handle_packet(
        &self,
        packet: &[u8],
        transport: &dyn Transport,
    ) -> Result<RelayPhase, RelayError> {
        let peeled = self.peel(packet)?;
        self.forward(peeled, transport).await
    }

    /// Hand a peeled layer to its next hop and return to `Idle`
    pub async fn forward(
        &self,
        peeled: PeeledLayer,
        transport: &dyn Transport,
    ) -> Result<RelayPhase, RelayError> {
        let outcome = if peeled.is_final() {
            RelayPhase::DeliveredFinal
        } else {
            RelayPhase::Forwarding
        };

        let (next_hop, next_packet) = peeled.into_packet();
        tracing::debug!(
            "Relay {} forwarding {} bytes to {}",
            self.node_id,
            next_packet.len(),
            next_hop
        );

        let result = transport.deliver(next_hop, next_packet).await;
        self.finish(outcome);

        match result {
            Ok(()) => {
                tracing::info!("Relay {} forwarded packet to {}", self.node_id, next_hop);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!("Relay {} failed delivery to {}: {}", self.node_id, next_hop, e);
                Err(RelayError::ForwardFailed(e))
            }
        }
    }

    fn finish(&self, outcome: RelayPhase) {
        let mut state = self.state.lock();
        state.last_outcome = Some(outcome);
        state.phase = RelayPhase::Idle;
    }

    pub fn state(&self) -> RelayState {
        self.state.lock().clone()
    }

    pub fn phase(&self) -> RelayPhase {
        self.state.lock().phase
    }

    /// Last received packet, base64 encoded
    pub fn last_received_encrypted(&self) -> Option<String> {
        self.state
            .lock()
            .last_received
            .as_ref()
            .map(|bytes| STANDARD.encode(bytes))
    }

    /// Last peeled remainder: the final payload as text, or an inner envelope as base64
    pub fn last_decrypted(&self) -> Option<String> {
        self.state
            .lock()
            .last_decrypted
            .as_ref()
            .map(|remainder| match remainder {
                Remainder::Final(text) => text.clone(),
                Remainder::Onion(bytes) => STANDARD.encode(bytes),
            })
    }

    pub fn last_destination(&self) -> Option<Address> {
        self.state.lock().last_destination
    }

    /// Exposed for the simulation's debug surface only
    pub fn export_private_key(&self) -> Result<Option<String>, CryptoError> {
        export_private_key(Some(self.keys.private_key()))
    }
}
