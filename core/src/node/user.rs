// User endpoint — origin and final destination of messages
//
// Sending: fetch the registry, draw a circuit, build the onion, hand it to
// the first relay. The sender only learns whether that first hand-off
// succeeded.

use super::SendError;
use crate::onion::{construct_onion, Circuit, CircuitBuilder};
use crate::registry::{NodeDirectory, NodeId};
use crate::topology::{Topology, UserId};
use crate::transport::{Packet, Transport};
use crate::wire::strip_address_prefix;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub last_received: Option<String>,
    pub last_sent: Option<String>,
    pub last_circuit: Option<Vec<NodeId>>,
}

pub struct UserNode {
    user_id: UserId,
    topology: Topology,
    state: Mutex<UserState>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl UserNode {
    pub fn new(user_id: UserId, topology: Topology) -> Self {
        Self::with_rng(user_id, topology, Box::new(StdRng::from_entropy()))
    }

    /// Use `rng` for circuit selection
    pub fn with_rng(user_id: UserId, topology: Topology, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            user_id,
            topology,
            state: Mutex::new(UserState::default()),
            rng: Mutex::new(rng),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Accept a delivered message, dropping a leading ten-digit address if present
    pub fn receive(&self, message: &str) {
        let message = strip_address_prefix(message);
        tracing::info!("User {} received {} bytes", self.user_id, message.len());
        self.state.lock().last_received = Some(message.to_string());
    }

    /// Route `message` to user `destination` through a fresh circuit.
    ///
    /// Fails before any network call to a relay if no circuit can be built.
    /// Returns the circuit used.
    pub async fn send_message(
        &self,
        message: &str,
        destination: UserId,
        directory: &dyn NodeDirectory,
        transport: &dyn Transport,
    ) -> Result<Vec<NodeId>, SendError> {
        self.state.lock().last_sent = Some(message.to_string());

        let nodes = directory.list_nodes().await?;
        let selected = CircuitBuilder::select(&nodes, &mut *self.rng.lock())?;
        let circuit = Circuit::from_records(&selected, &self.topology)?;
        let node_ids = circuit.node_ids();
        self.state.lock().last_circuit = Some(node_ids.clone());

        let final_destination = self.topology.user_address(destination);
        let onion = construct_onion(&circuit, final_destination, message.as_bytes())?;
        let entry = circuit.entry().address;

        tracing::info!(
            "User {} sending {} byte onion to user {} via {:?}",
            self.user_id,
            onion.len(),
            destination,
            node_ids
        );
        transport.deliver(entry, Packet::Onion(onion)).await?;
        Ok(node_ids)
    }

    pub fn state(&self) -> UserState {
        self.state.lock().clone()
    }

    pub fn last_received(&self) -> Option<String> {
        self.state.lock().last_received.clone()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.state.lock().last_sent.clone()
    }

    pub fn last_circuit(&self) -> Option<Vec<NodeId>> {
        self.state.lock().last_circuit.clone()
    }
}
