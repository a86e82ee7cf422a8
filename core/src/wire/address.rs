// Fixed-width address codec
//
// Every hop address is exactly ten ASCII digits, zero-padded, so a peeled
// layer splits into `address || rest` without a delimiter.

use super::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of an encoded address (ASCII digits)
pub const ADDRESS_WIDTH: usize = 10;

/// Largest network identifier that fits in `ADDRESS_WIDTH` digits
pub const MAX_ADDRESS: u64 = 9_999_999_999;

/// Network identifier of a relay or user endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address {
    pub fn new(value: u64) -> Result<Self, WireError> {
        if value > MAX_ADDRESS {
            return Err(WireError::AddressOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Address of service `id` above a base port.
    ///
    /// `u16::MAX + u32::MAX` is well below `MAX_ADDRESS`, so this cannot fail.
    pub fn from_base(base: u16, id: u32) -> Self {
        Self(u64::from(base) + u64::from(id))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Ten ASCII digits, zero-padded
    pub fn encode(&self) -> String {
        format!("{:0width$}", self.0, width = ADDRESS_WIDTH)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.encode().as_bytes());
    }

    /// Parse exactly `ADDRESS_WIDTH` ASCII digits
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != ADDRESS_WIDTH {
            return Err(WireError::InvalidAddress(format!(
                "expected {} digits, got {} bytes",
                ADDRESS_WIDTH,
                bytes.len()
            )));
        }
        if !bytes.iter().all(u8::is_ascii_digit) {
            return Err(WireError::InvalidAddress("non-digit byte in address".into()));
        }

        let value = bytes
            .iter()
            .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'));
        Ok(Self(value))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split `address || rest`
pub fn split_address(data: &[u8]) -> Result<(Address, &[u8]), WireError> {
    if data.len() < ADDRESS_WIDTH {
        return Err(WireError::Truncated {
            needed: ADDRESS_WIDTH,
            got: data.len(),
        });
    }
    let (head, rest) = data.split_at(ADDRESS_WIDTH);
    Ok((Address::decode(head)?, rest))
}

/// Strip a leading ten-digit prefix when present.
///
/// Used by user endpoints, which receive `final_address || message`.
pub fn strip_address_prefix(message: &str) -> &str {
    let bytes = message.as_bytes();
    if bytes.len() >= ADDRESS_WIDTH && bytes[..ADDRESS_WIDTH].iter().all(u8::is_ascii_digit) {
        &message[ADDRESS_WIDTH..]
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_zero_padded() {
        assert_eq!(Address::new(7).unwrap().encode(), "0000000007");
        assert_eq!(Address::new(3007).unwrap().encode(), "0000003007");
        assert_eq!(Address::new(MAX_ADDRESS).unwrap().encode(), "9999999999");
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            Address::new(MAX_ADDRESS + 1),
            Err(WireError::AddressOutOfRange(_))
        ));
    }

    #[test]
    fn test_from_base() {
        assert_eq!(Address::from_base(4000, 2).value(), 4002);
        let widest = Address::from_base(u16::MAX, u32::MAX);
        assert_eq!(widest.encode().len(), ADDRESS_WIDTH);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(Address::decode(b"123").is_err());
        assert!(Address::decode(b"00000000070").is_err());
        assert!(Address::decode(b"00000a0007").is_err());
        assert!(Address::decode(b"-000000007").is_err());
    }

    #[test]
    fn test_split_address() {
        let (address, rest) = split_address(b"0000004001tail").unwrap();
        assert_eq!(address.value(), 4001);
        assert_eq!(rest, b"tail");

        let (address, rest) = split_address(b"0000004001").unwrap();
        assert_eq!(address.value(), 4001);
        assert!(rest.is_empty());

        assert!(matches!(
            split_address(b"00004"),
            Err(WireError::Truncated { needed: 10, got: 5 })
        ));
    }

    #[test]
    fn test_strip_address_prefix() {
        assert_eq!(strip_address_prefix("0000003007hello"), "hello");
        assert_eq!(strip_address_prefix("0000003007"), "");
        assert_eq!(strip_address_prefix("hello"), "hello");
        assert_eq!(strip_address_prefix("12345abcdefg"), "12345abcdefg");
        assert_eq!(strip_address_prefix("ünïcødé-text"), "ünïcødé-text");
    }

    proptest! {
        #[test]
        fn prop_encoded_address_is_ten_digits(value in 0u64..=MAX_ADDRESS) {
            let encoded = Address::new(value).unwrap().encode();
            prop_assert_eq!(encoded.len(), ADDRESS_WIDTH);
            prop_assert!(encoded.bytes().all(|b| b.is_ascii_digit()));
            prop_assert_eq!(Address::decode(encoded.as_bytes()).unwrap().value(), value);
        }
    }
}
