// Per-layer key schedule
//
// The 32-byte key sealed to a relay is a seed, not the AES key. The raw
// seed bytes are sealed; `SymmetricKey::export` never goes on the wire.
// Cipher and MAC keys are derived from the seed with distinct blake3
// contexts. Changing a context breaks compatibility with every relay on the
// network.

use crate::crypto::SymmetricKey;
use crate::wire::MAC_SIZE;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

const CIPHER_CONTEXT: &str = "onionrelay 2026-10 layer cipher key v1";
const MAC_CONTEXT: &str = "onionrelay 2026-10 layer mac key v1";

pub(crate) struct LayerKeys {
    cipher: SymmetricKey,
    mac: Zeroizing<[u8; 32]>,
}

impl LayerKeys {
    pub(crate) fn derive(seed: &SymmetricKey) -> Self {
        let cipher_bytes = Zeroizing::new(blake3::derive_key(CIPHER_CONTEXT, seed.as_bytes()));
        let mac = Zeroizing::new(blake3::derive_key(MAC_CONTEXT, seed.as_bytes()));
        Self {
            cipher: SymmetricKey::from_array(*cipher_bytes),
            mac,
        }
    }

    pub(crate) fn cipher(&self) -> &SymmetricKey {
        &self.cipher
    }

    pub(crate) fn tag(&self, data: &[u8]) -> [u8; MAC_SIZE] {
        *blake3::keyed_hash(&self.mac, data).as_bytes()
    }

    pub(crate) fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        self.tag(data)[..].ct_eq(tag).into()
    }
}
