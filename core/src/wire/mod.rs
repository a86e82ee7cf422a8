// Wire codec — addresses and envelope framing shared by senders and relays

pub mod address;
pub mod envelope;

use thiserror::Error;

pub use address::{split_address, strip_address_prefix, Address, ADDRESS_WIDTH};
pub use envelope::{
    append_tag, decode_envelope, encode_envelope, is_envelope, EnvelopeFrame, MAC_SIZE,
    MAX_PACKET_SIZE,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Address {0} does not fit in 10 digits")]
    AddressOutOfRange(u64),
    #[error("Truncated input: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("Bad envelope magic byte 0x{0:02x}")]
    BadMagic(u8),
    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u8),
    #[error("Bad length: {0}")]
    BadLength(&'static str),
    #[error("Packet too large: {0} bytes")]
    TooLarge(usize),
}
