// Asymmetric key management — RSA-2048 with OAEP(SHA-256)
//
// Relays publish the public half to the registry; senders use it to seal
// the one-time symmetric key of a layer. RSA is never used for bulk data.

use super::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Modulus size of relay keys in bits
pub const RSA_KEY_BITS: usize = 2048;

/// Size of an RSA-2048 ciphertext (bytes). Every sealed key on the wire has this length.
pub const SEALED_KEY_SIZE: usize = RSA_KEY_BITS / 8;

/// SHA-256 output size, the OAEP hash parameter
const OAEP_HASH_SIZE: usize = 32;

/// Largest plaintext OAEP can seal under a key of `modulus_bytes`
pub fn max_sealable_len(modulus_bytes: usize) -> usize {
    modulus_bytes.saturating_sub(2 * OAEP_HASH_SIZE + 2)
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// A relay's encryption key pair
#[derive(Clone)]
pub struct KeyPair {
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

impl KeyPair {
    /// Generate a new RSA-2048 key pair from the OS random source
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { public, private })
    }

    /// Rebuild a key pair from an exported private key
    pub fn from_private_key(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        Self { public, private }
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("modulus_bytes", &self.public.size())
            .finish_non_exhaustive()
    }
}

/// Export a public key as base64-encoded SPKI DER
pub fn export_public_key(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
    Ok(STANDARD.encode(der.as_bytes()))
}

/// Export a private key as base64-encoded PKCS#8 DER.
///
/// Returns `Ok(None)` when no key is held.
pub fn export_private_key(key: Option<&RsaPrivateKey>) -> Result<Option<String>, CryptoError> {
    let Some(key) = key else {
        return Ok(None);
    };
    let der = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
    Ok(Some(STANDARD.encode(der.as_bytes())))
}

/// Import a public key exported by [`export_public_key`]
pub fn import_public_key(encoded: &str) -> Result<RsaPublicKey, CryptoError> {
    let der = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::KeyFormat(format!("public key is not base64: {}", e)))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptoError::KeyFormat(format!("public key is not SPKI DER: {}", e)))
}

/// Import a private key exported by [`export_private_key`]
pub fn import_private_key(encoded: &str) -> Result<RsaPrivateKey, CryptoError> {
    let der = zeroize::Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::KeyFormat(format!("private key is not base64: {}", e)))?,
    );
    RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| CryptoError::KeyFormat(format!("private key is not PKCS#8 DER: {}", e)))
}

/// Seal a short payload (a symmetric key) to a public key with RSA-OAEP
pub fn asymmetric_encrypt(plaintext: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    let limit = max_sealable_len(key.size());
    if plaintext.len() > limit {
        return Err(CryptoError::Encryption(format!(
            "payload of {} bytes exceeds OAEP limit of {} bytes",
            plaintext.len(),
            limit
        )));
    }
    key.encrypt(&mut OsRng, oaep(), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Open an RSA-OAEP ciphertext with the matching private key
pub fn asymmetric_decrypt(ciphertext: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    key.decrypt(oaep(), ciphertext)
        .map_err(|_| CryptoError::Decryption("sealed key does not open with this private key"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_keys;

    #[test]
    fn test_seal_open_roundtrip() {
        let keys = test_keys::pair(0);
        let sealed = asymmetric_encrypt(b"thirty-two bytes of key material", keys.public_key()).unwrap();
        assert_eq!(sealed.len(), SEALED_KEY_SIZE);

        let opened = asymmetric_decrypt(&sealed, keys.private_key()).unwrap();
        assert_eq!(opened, b"thirty-two bytes of key material");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let alice = test_keys::pair(0);
        let bob = test_keys::pair(1);

        let sealed = asymmetric_encrypt(b"secret", alice.public_key()).unwrap();
        let result = asymmetric_decrypt(&sealed, bob.private_key());
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_open_truncated_ciphertext_fails() {
        let keys = test_keys::pair(0);
        let sealed = asymmetric_encrypt(b"secret", keys.public_key()).unwrap();
        let result = asymmetric_decrypt(&sealed[..sealed.len() - 1], keys.private_key());
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_oaep_size_limit() {
        let keys = test_keys::pair(0);
        assert_eq!(max_sealable_len(SEALED_KEY_SIZE), 190);

        let at_limit = vec![7u8; 190];
        assert!(asymmetric_encrypt(&at_limit, keys.public_key()).is_ok());

        let over_limit = vec![7u8; 191];
        let result = asymmetric_encrypt(&over_limit, keys.public_key());
        assert!(matches!(result, Err(CryptoError::Encryption(_))));
    }

    #[test]
    fn test_public_key_export_import() {
        let keys = test_keys::pair(0);
        let exported = export_public_key(keys.public_key()).unwrap();
        let imported = import_public_key(&exported).unwrap();
        assert_eq!(&imported, keys.public_key());
    }

    #[test]
    fn test_private_key_export_import() {
        let keys = test_keys::pair(0);
        let exported = export_private_key(Some(keys.private_key())).unwrap().unwrap();
        let imported = import_private_key(&exported).unwrap();

        let sealed = asymmetric_encrypt(b"k", keys.public_key()).unwrap();
        assert_eq!(asymmetric_decrypt(&sealed, &imported).unwrap(), b"k");

        let rebuilt = KeyPair::from_private_key(imported);
        assert_eq!(rebuilt.public_key(), keys.public_key());
    }

    #[test]
    fn test_export_missing_private_key() {
        assert!(export_private_key(None).unwrap().is_none());
    }

    #[test]
    fn test_import_malformed_keys() {
        assert!(matches!(import_public_key("not base64!"), Err(CryptoError::KeyFormat(_))));
        assert!(matches!(import_public_key("AAAA"), Err(CryptoError::KeyFormat(_))));
        assert!(matches!(import_private_key("AAAA"), Err(CryptoError::KeyFormat(_))));

        // A public key is not a private key
        let keys = test_keys::pair(0);
        let public = export_public_key(keys.public_key()).unwrap();
        assert!(matches!(import_private_key(&public), Err(CryptoError::KeyFormat(_))));
    }
}
