// Onion construction — nesting one envelope per circuit hop
//
// Layers are built innermost first, from the last relay back to the first:
//
//   payload = final || message
//   for each hop, last to first:
//       payload = envelope(hop, next_hop || payload)
//
// where `next_hop` is the final destination for the last relay and the
// following relay's address otherwise.

use super::circuit::Circuit;
use super::layer::LayerKeys;
use super::OnionError;
use crate::crypto::{asymmetric_encrypt, symmetric_encrypt, SymmetricKey};
use crate::wire::{append_tag, encode_envelope, Address, ADDRESS_WIDTH};
use rsa::RsaPublicKey;

/// Build the full onion for `message`, addressed to `final_destination`.
///
/// The result is sent to `circuit.entry().address`. Peeling it takes exactly
/// `circuit.len()` relays, and each relay learns only the address after it.
pub fn construct_onion(
    circuit: &Circuit,
    final_destination: Address,
    message: &[u8],
) -> Result<Vec<u8>, OnionError> {
    let mut payload = Vec::with_capacity(ADDRESS_WIDTH + message.len());
    final_destination.write_to(&mut payload);
    payload.extend_from_slice(message);

    let hops = circuit.hops();
    for (i, hop) in hops.iter().enumerate().rev() {
        let next_hop = hops
            .get(i + 1)
            .map(|next| next.address)
            .unwrap_or(final_destination);

        let mut to_encrypt = Vec::with_capacity(ADDRESS_WIDTH + payload.len());
        next_hop.write_to(&mut to_encrypt);
        to_encrypt.extend_from_slice(&payload);

        payload = seal_layer(&hop.public_key, &to_encrypt)?;
        tracing::trace!(node_id = hop.node_id, size = payload.len(), "Sealed onion layer");
    }

    Ok(payload)
}

/// Encrypt one layer under a fresh key and seal that key to `public_key`
fn seal_layer(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, OnionError> {
    let seed = SymmetricKey::generate();
    let keys = LayerKeys::derive(&seed);

    let encrypted_layer = symmetric_encrypt(keys.cipher(), plaintext);
    let sealed_key = asymmetric_encrypt(seed.as_bytes(), public_key)?;

    let mut frame = encode_envelope(&sealed_key, &encrypted_layer)?;
    let tag = keys.tag(&frame);
    append_tag(&mut frame, &tag);
    Ok(frame)
}
