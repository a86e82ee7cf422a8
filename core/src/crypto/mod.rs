// Cryptography module — hybrid RSA-OAEP + AES-CBC primitives for onion layers

pub mod keys;
pub mod symmetric;

use thiserror::Error;

pub use keys::{
    asymmetric_decrypt, asymmetric_encrypt, export_private_key, export_public_key,
    import_private_key, import_public_key, KeyPair, SEALED_KEY_SIZE,
};
pub use symmetric::{symmetric_decrypt, symmetric_encrypt, SymmetricKey, IV_SIZE, SYMMETRIC_KEY_SIZE};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Key format error: {0}")]
    KeyFormat(String),
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    #[error("Encryption failed: {0}")]
    Encryption(String),
    #[error("Decryption failed: {0}")]
    Decryption(&'static str),
}

/// RSA key generation is slow; unit tests share a few pairs.
#[cfg(test)]
pub(crate) mod test_keys {
    use super::KeyPair;
    use std::sync::OnceLock;

    static PAIRS: OnceLock<Vec<KeyPair>> = OnceLock::new();

    pub fn pair(index: usize) -> KeyPair {
        PAIRS.get_or_init(|| {
            (0..4)
                .map(|_| KeyPair::generate().expect("key generation"))
                .collect()
        })[index]
            .clone()
    }
}
