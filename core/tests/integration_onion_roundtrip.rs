//! Integration tests: build an onion for a three-relay circuit and peel it
//! relay by relay through the public API.
//!
//! No transport and no tokio runtime — only the encoder, the peeler and the
//! wire codec.
//!
//! Run with:
//!   cargo test --test integration_onion_roundtrip

use onionrelay_core::crypto::{export_public_key, KeyPair};
use onionrelay_core::onion::Remainder;
use onionrelay_core::wire::{decode_envelope, ADDRESS_WIDTH};
use onionrelay_core::{
    construct_onion, peel_layer, Address, Circuit, NodeRecord, OnionError, Topology,
};
use std::sync::OnceLock;

// ============================================================================
// Helpers
// ============================================================================

fn relay_keys() -> &'static [KeyPair] {
    static KEYS: OnceLock<Vec<KeyPair>> = OnceLock::new();
    KEYS.get_or_init(|| {
        (0..3)
            .map(|_| KeyPair::generate().expect("key generation must succeed"))
            .collect()
    })
}

/// Circuit A(1) -> B(2) -> C(3) built the way a sender builds it: from
/// registry records.
fn circuit() -> Circuit {
    let records: Vec<NodeRecord> = relay_keys()
        .iter()
        .enumerate()
        .map(|(i, keys)| {
            NodeRecord::new(
                i as u32 + 1,
                export_public_key(keys.public_key()).expect("export must succeed"),
            )
        })
        .collect();
    Circuit::from_records(&records, &Topology::default()).expect("records must import")
}

fn user(id: u32) -> Address {
    Topology::default().user_address(id)
}

/// Peel every layer in order, returning the next hop seen by each relay and
/// the final remainder.
fn peel_all(onion: &[u8]) -> (Vec<Address>, String) {
    let mut hops = Vec::new();
    let mut packet = onion.to_vec();

    for (i, keys) in relay_keys().iter().enumerate() {
        let peeled = peel_layer(&packet, keys.private_key())
            .unwrap_or_else(|e| panic!("relay {} failed to peel: {}", i + 1, e));
        hops.push(peeled.next_hop);

        match peeled.remainder {
            Remainder::Onion(inner) => packet = inner,
            Remainder::Final(text) => {
                assert_eq!(i, 2, "only the last relay may see the final payload");
                return (hops, text);
            }
        }
    }
    panic!("three peels did not reach the final payload");
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_three_peels_recover_message() {
    let message = "hello";
    let onion = construct_onion(&circuit(), user(7), message.as_bytes()).unwrap();

    let (hops, final_payload) = peel_all(&onion);

    let values: Vec<u64> = hops.iter().map(|a| a.value()).collect();
    assert_eq!(values, vec![4002, 4003, 3007]);
    assert_eq!(final_payload, "0000003007hello");
    assert_eq!(&final_payload[ADDRESS_WIDTH..], message);
}

#[test]
fn test_round_trip_varied_messages() {
    let messages = [
        String::new(),
        "a".to_string(),
        "exactly sixteen!".to_string(),
        "ünïcødé ✉ payload".to_string(),
        "x".repeat(10_000),
    ];

    for message in messages {
        let onion = construct_onion(&circuit(), user(2), message.as_bytes()).unwrap();
        let (_, final_payload) = peel_all(&onion);
        assert_eq!(&final_payload[ADDRESS_WIDTH..], message);
    }
}

// ============================================================================
// Layer isolation
// ============================================================================

#[test]
fn test_first_relay_learns_only_second_relay() {
    let onion = construct_onion(&circuit(), user(7), b"meet at the usual place").unwrap();
    let peeled = peel_layer(&onion, relay_keys()[0].private_key()).unwrap();

    assert_eq!(peeled.next_hop.encode(), "0000004002");

    let Remainder::Onion(blob) = peeled.remainder else {
        panic!("first relay must see an opaque envelope");
    };
    assert!(decode_envelope(&blob).is_ok());
    for needle in [&b"usual place"[..], &b"0000004003"[..], &b"0000003007"[..]] {
        assert!(
            !blob.windows(needle.len()).any(|w| w == needle),
            "inner envelope leaks {:?}",
            String::from_utf8_lossy(needle)
        );
    }
}

#[test]
fn test_layers_must_be_peeled_in_order() {
    let onion = construct_onion(&circuit(), user(7), b"hello").unwrap();

    // B and C cannot open A's layer
    for keys in &relay_keys()[1..] {
        assert!(matches!(
            peel_layer(&onion, keys.private_key()),
            Err(OnionError::MalformedPacket(_))
        ));
    }
}

// ============================================================================
// Tamper detection
// ============================================================================

#[test]
fn test_every_flipped_byte_is_rejected() {
    let onion = construct_onion(&circuit(), user(7), b"hello").unwrap();
    let keys = &relay_keys()[0];

    // Walk the whole outer layer with a stride to keep RSA work bounded
    for pos in (0..onion.len()).step_by(7).chain([onion.len() - 1]) {
        let mut tampered = onion.clone();
        tampered[pos] ^= 0x80;
        assert!(
            matches!(
                peel_layer(&tampered, keys.private_key()),
                Err(OnionError::MalformedPacket(_))
            ),
            "flip at byte {} went unnoticed",
            pos
        );
    }
}

#[test]
fn test_tampered_inner_layer_rejected_by_its_relay() {
    let onion = construct_onion(&circuit(), user(7), b"hello").unwrap();
    let first = peel_layer(&onion, relay_keys()[0].private_key()).unwrap();
    let Remainder::Onion(mut inner) = first.remainder else {
        panic!("expected envelope");
    };

    let mid = inner.len() / 2;
    inner[mid] ^= 0x01;
    assert!(peel_layer(&inner, relay_keys()[1].private_key()).is_err());
}
