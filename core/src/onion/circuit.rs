// Circuit selection — picking the relays a message travels through
//
// A circuit is built fresh for every message: three distinct relays drawn
// uniformly at random from the registry snapshot. The random source is
// injected so tests can fix the draw.

use super::OnionError;
use crate::crypto::import_public_key;
use crate::registry::{NodeId, NodeRecord};
use crate::topology::Topology;
use crate::wire::Address;
use rand::seq::SliceRandom;
use rand::Rng;
use rsa::RsaPublicKey;
use std::collections::{BTreeMap, HashSet};

/// Number of relays in every circuit
pub const CIRCUIT_LENGTH: usize = 3;

/// One relay of a circuit, ready for layer construction
#[derive(Debug, Clone)]
pub struct CircuitHop {
    pub node_id: NodeId,
    /// Where the previous hop sends this relay its packet
    pub address: Address,
    pub public_key: RsaPublicKey,
}

/// Ordered relay path; `hops[0]` receives the packet from the sender
#[derive(Debug, Clone)]
pub struct Circuit {
    hops: Vec<CircuitHop>,
}

impl Circuit {
    pub fn new(hops: Vec<CircuitHop>) -> Result<Self, OnionError> {
        if hops.is_empty() {
            return Err(OnionError::InvalidCircuit("circuit has no hops"));
        }
        let mut seen = HashSet::new();
        if !hops.iter().all(|hop| seen.insert(hop.node_id)) {
            return Err(OnionError::InvalidCircuit("duplicate relay in circuit"));
        }
        Ok(Self { hops })
    }

    /// Resolve registry records into hops, importing each public key
    pub fn from_records(records: &[NodeRecord], topology: &Topology) -> Result<Self, OnionError> {
        let hops = records
            .iter()
            .map(|record| {
                Ok(CircuitHop {
                    node_id: record.node_id,
                    address: topology.relay_address(record.node_id),
                    public_key: import_public_key(&record.pub_key)?,
                })
            })
            .collect::<Result<Vec<_>, OnionError>>()?;
        Self::new(hops)
    }

    pub fn hops(&self) -> &[CircuitHop] {
        &self.hops
    }

    pub fn entry(&self) -> &CircuitHop {
        &self.hops[0]
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.hops.iter().map(|hop| hop.node_id).collect()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Draws circuits from a registry snapshot
pub struct CircuitBuilder;

impl CircuitBuilder {
    /// Choose `CIRCUIT_LENGTH` distinct relays, in random order.
    ///
    /// Records sharing a node id count once (the later record wins, matching
    /// registry upsert).
    pub fn select<R: Rng + ?Sized>(
        nodes: &[NodeRecord],
        rng: &mut R,
    ) -> Result<Vec<NodeRecord>, OnionError> {
        let distinct: BTreeMap<NodeId, &NodeRecord> =
            nodes.iter().map(|n| (n.node_id, n)).collect();

        if distinct.len() < CIRCUIT_LENGTH {
            return Err(OnionError::InsufficientNodes {
                needed: CIRCUIT_LENGTH,
                available: distinct.len(),
            });
        }

        let candidates: Vec<&NodeRecord> = distinct.into_values().collect();
        let selected = candidates
            .choose_multiple(rng, CIRCUIT_LENGTH)
            .map(|record| (*record).clone())
            .collect();
        Ok(selected)
    }
}
