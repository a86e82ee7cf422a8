// Envelope framing — length-prefixed binary layout of one onion layer
//
// Byte layout (big-endian):
//
//   offset  size  field
//   0       1     magic (0xA7)
//   1       1     version (1)
//   2       2     sealed key length L
//   4       1     IV length (16)
//   5       L     sealed symmetric key (RSA-OAEP ciphertext)
//   5+L     16    IV
//   21+L    n     AES-256-CBC ciphertext, n > 0 and n % 16 == 0
//   end-32  32    layer MAC tag over bytes [0, end-32)
//
// The magic byte is never an ASCII digit, so a peeled remainder is either an
// envelope (starts with 0xA7) or a final payload (starts with an address).

use super::WireError;
use crate::crypto::IV_SIZE;

pub const ENVELOPE_MAGIC: u8 = 0xA7;
pub const ENVELOPE_VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 5;
pub const MAC_SIZE: usize = 32;

/// Maximum accepted packet size: 256 KB
pub const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Borrowed view of a parsed envelope
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeFrame<'a> {
    /// RSA-OAEP sealed symmetric key
    pub sealed_key: &'a [u8],
    /// `IV || ciphertext`
    pub encrypted_layer: &'a [u8],
    /// Header, sealed key and encrypted layer: the bytes covered by `tag`
    pub authenticated: &'a [u8],
    pub tag: &'a [u8],
}

/// Whether `bytes` starts like an envelope rather than a final payload
pub fn is_envelope(bytes: &[u8]) -> bool {
    bytes.first() == Some(&ENVELOPE_MAGIC)
}

/// Frame `header || sealed_key || encrypted_layer`. The caller appends the tag
/// with [`append_tag`] once it has been computed over the returned bytes.
pub fn encode_envelope(sealed_key: &[u8], encrypted_layer: &[u8]) -> Result<Vec<u8>, WireError> {
    let sealed_len = u16::try_from(sealed_key.len())
        .map_err(|_| WireError::BadLength("sealed key longer than 65535 bytes"))?;
    if sealed_key.is_empty() {
        return Err(WireError::BadLength("empty sealed key"));
    }
    check_layer_len(encrypted_layer.len())?;

    let total = HEADER_SIZE + sealed_key.len() + encrypted_layer.len() + MAC_SIZE;
    if total > MAX_PACKET_SIZE {
        return Err(WireError::TooLarge(total));
    }

    let mut out = Vec::with_capacity(total);
    out.push(ENVELOPE_MAGIC);
    out.push(ENVELOPE_VERSION);
    out.extend_from_slice(&sealed_len.to_be_bytes());
    out.push(IV_SIZE as u8);
    out.extend_from_slice(sealed_key);
    out.extend_from_slice(encrypted_layer);
    Ok(out)
}

pub fn append_tag(frame: &mut Vec<u8>, tag: &[u8; MAC_SIZE]) {
    frame.extend_from_slice(tag);
}

/// Parse an envelope, validating every length field
pub fn decode_envelope(bytes: &[u8]) -> Result<EnvelopeFrame<'_>, WireError> {
    if bytes.len() > MAX_PACKET_SIZE {
        return Err(WireError::TooLarge(bytes.len()));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(WireError::Truncated {
            needed: HEADER_SIZE,
            got: bytes.len(),
        });
    }
    if bytes[0] != ENVELOPE_MAGIC {
        return Err(WireError::BadMagic(bytes[0]));
    }
    if bytes[1] != ENVELOPE_VERSION {
        return Err(WireError::UnsupportedVersion(bytes[1]));
    }

    let sealed_len = usize::from(u16::from_be_bytes([bytes[2], bytes[3]]));
    if sealed_len == 0 {
        return Err(WireError::BadLength("empty sealed key"));
    }
    if usize::from(bytes[4]) != IV_SIZE {
        return Err(WireError::BadLength("IV length does not match AES block size"));
    }

    // At least one ciphertext block must follow the IV
    let needed = HEADER_SIZE + sealed_len + IV_SIZE + IV_SIZE + MAC_SIZE;
    if bytes.len() < needed {
        return Err(WireError::Truncated {
            needed,
            got: bytes.len(),
        });
    }

    let tag_start = bytes.len() - MAC_SIZE;
    let layer_start = HEADER_SIZE + sealed_len;
    check_layer_len(tag_start - layer_start)?;

    Ok(EnvelopeFrame {
        sealed_key: &bytes[HEADER_SIZE..layer_start],
        encrypted_layer: &bytes[layer_start..tag_start],
        authenticated: &bytes[..tag_start],
        tag: &bytes[tag_start..],
    })
}

fn check_layer_len(len: usize) -> Result<(), WireError> {
    if len < IV_SIZE + IV_SIZE || (len - IV_SIZE) % IV_SIZE != 0 {
        return Err(WireError::BadLength("encrypted layer is not IV plus whole blocks"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut frame = encode_envelope(&[1u8; 256], &[2u8; 48]).unwrap();
        append_tag(&mut frame, &[3u8; MAC_SIZE]);
        frame
    }

    #[test]
    fn test_layout_offsets() {
        let frame = sample();
        assert_eq!(frame.len(), HEADER_SIZE + 256 + 48 + MAC_SIZE);
        assert_eq!(&frame[..HEADER_SIZE], &[0xA7, 1, 0x01, 0x00, 16]);
        assert_eq!(frame[HEADER_SIZE], 1);
        assert_eq!(frame[HEADER_SIZE + 256], 2);
    }

    #[test]
    fn test_decode_splits_segments() {
        let frame = sample();
        let parsed = decode_envelope(&frame).unwrap();

        assert_eq!(parsed.sealed_key, &[1u8; 256][..]);
        assert_eq!(parsed.encrypted_layer, &[2u8; 48][..]);
        assert_eq!(parsed.tag, &[3u8; MAC_SIZE][..]);
        assert_eq!(parsed.authenticated.len(), frame.len() - MAC_SIZE);
    }

    #[test]
    fn test_is_envelope() {
        assert!(is_envelope(&sample()));
        assert!(!is_envelope(b"0000003007hello"));
        assert!(!is_envelope(b""));
    }

    #[test]
    fn test_decode_rejects_bad_header() {
        let mut frame = sample();
        frame[0] = b'0';
        assert!(matches!(decode_envelope(&frame), Err(WireError::BadMagic(b'0'))));

        let mut frame = sample();
        frame[1] = 2;
        assert!(matches!(decode_envelope(&frame), Err(WireError::UnsupportedVersion(2))));

        let mut frame = sample();
        frame[4] = 12;
        assert!(matches!(decode_envelope(&frame), Err(WireError::BadLength(_))));

        let mut frame = sample();
        frame[2] = 0;
        frame[3] = 0;
        assert!(matches!(decode_envelope(&frame), Err(WireError::BadLength(_))));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let frame = sample();
        assert!(matches!(decode_envelope(&frame[..3]), Err(WireError::Truncated { .. })));
        assert!(matches!(
            decode_envelope(&frame[..HEADER_SIZE + 256 + 16 + MAC_SIZE]),
            Err(WireError::Truncated { .. })
        ));
        // Dropping one byte leaves the ciphertext unaligned
        assert!(matches!(
            decode_envelope(&frame[..frame.len() - 1]),
            Err(WireError::BadLength(_))
        ));
    }

    #[test]
    fn test_sealed_length_prefix_is_honoured() {
        // A larger sealed key shifts every later offset
        let mut frame = encode_envelope(&[9u8; 512], &[2u8; 32]).unwrap();
        append_tag(&mut frame, &[0u8; MAC_SIZE]);
        let parsed = decode_envelope(&frame).unwrap();
        assert_eq!(parsed.sealed_key.len(), 512);
        assert_eq!(parsed.encrypted_layer.len(), 32);
    }

    #[test]
    fn test_encode_rejects_bad_segments() {
        assert!(encode_envelope(&[], &[0u8; 32]).is_err());
        assert!(encode_envelope(&[1u8; 256], &[0u8; 20]).is_err());
        assert!(encode_envelope(&[1u8; 256], &[0u8; 16]).is_err());
        assert!(matches!(
            encode_envelope(&[1u8; 256], &vec![0u8; MAX_PACKET_SIZE]),
            Err(WireError::TooLarge(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let big = vec![ENVELOPE_MAGIC; MAX_PACKET_SIZE + 1];
        assert!(matches!(decode_envelope(&big), Err(WireError::TooLarge(_))));
    }
}
