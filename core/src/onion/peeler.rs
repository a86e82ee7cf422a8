// Onion peeling — the relay side of one layer
//
// 1. Split the envelope into sealed key and encrypted layer
// 2. Open the sealed key with the relay's private key
// 3. Check the layer MAC, then decrypt
// 4. Read the next-hop address; the rest is either another envelope
//    (forwarded untouched) or the final payload (delivered as text)
//
// Every failure is reported as `MalformedPacket`; nothing is forwarded.

use super::layer::LayerKeys;
use super::OnionError;
use crate::crypto::{asymmetric_decrypt, symmetric_decrypt, SymmetricKey};
use crate::transport::Packet;
use crate::wire::{decode_envelope, is_envelope, split_address, Address};
use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

/// What is left after removing one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remainder {
    /// Another envelope for the next relay
    Onion(Vec<u8>),
    /// `final_address || message`, for a user endpoint
    Final(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeledLayer {
    pub next_hop: Address,
    pub remainder: Remainder,
}

impl PeeledLayer {
    pub fn is_final(&self) -> bool {
        matches!(self.remainder, Remainder::Final(_))
    }

    /// The packet to hand to `next_hop`
    pub fn into_packet(self) -> (Address, Packet) {
        let packet = match self.remainder {
            Remainder::Onion(bytes) => Packet::Onion(bytes),
            Remainder::Final(text) => Packet::Plaintext(text),
        };
        (self.next_hop, packet)
    }
}

fn malformed(stage: &str, err: impl std::fmt::Display) -> OnionError {
    OnionError::MalformedPacket(format!("{}: {}", stage, err))
}

/// Remove exactly one layer from `packet` using this relay's private key
pub fn peel_layer(packet: &[u8], private_key: &RsaPrivateKey) -> Result<PeeledLayer, OnionError> {
    let frame = decode_envelope(packet).map_err(|e| malformed("framing", e))?;

    let seed_bytes = Zeroizing::new(
        asymmetric_decrypt(frame.sealed_key, private_key).map_err(|e| malformed("sealed key", e))?,
    );
    let seed = SymmetricKey::from_bytes(&seed_bytes).map_err(|e| malformed("sealed key", e))?;
    let keys = LayerKeys::derive(&seed);

    if !keys.verify(frame.authenticated, frame.tag) {
        return Err(OnionError::MalformedPacket("layer MAC mismatch".into()));
    }

    let decrypted = Zeroizing::new(
        symmetric_decrypt(keys.cipher(), frame.encrypted_layer)
            .map_err(|e| malformed("layer", e))?,
    );
    let (next_hop, rest) = split_address(&decrypted).map_err(|e| malformed("next hop", e))?;

    let remainder = if is_envelope(rest) {
        // Validate the framing now so a broken inner envelope is never forwarded
        decode_envelope(rest).map_err(|e| malformed("inner envelope", e))?;
        Remainder::Onion(rest.to_vec())
    } else {
        split_address(rest).map_err(|e| malformed("final payload", e))?;
        let text = String::from_utf8(rest.to_vec()).map_err(|e| malformed("final payload", e))?;
        Remainder::Final(text)
    };

    Ok(PeeledLayer {
        next_hop,
        remainder,
    })
}
