//! Key-transfer envelope used during pairing.
//!
//! The system key is never sent in the clear: it is XOR-masked with an
//! AES pad derived from a publicly known transfer key and an IV built
//! from the destination address (1W) or the session challenge (2W). This
//! is obfuscation for wire compatibility, not confidentiality against an
//! attacker who owns the transfer key.

use super::block::encrypt_block;
use super::iv::IV_PADDING;
use crate::error::Error;
use crate::types::{Challenge, NodeId, SystemKey};

/// Fixed, publicly known key wrapping the system key during pairing.
pub const TRANSFER_KEY: [u8; 16] = [
    0x34, 0xC3, 0x46, 0x6E, 0xD8, 0x8F, 0x4E, 0x8E, 0x16, 0xAA, 0x47, 0x39, 0x49, 0x88,
    0x43, 0x73,
];

/// IV source for the envelope pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWrapIv {
    /// 1W pairing: the destination node id, repeated to fill the block.
    Node(NodeId),
    /// 2W pairing: ten bytes of 0x55 followed by the challenge.
    Challenge(Challenge),
}

fn envelope_iv(source: KeyWrapIv) -> [u8; 16] {
    match source {
        KeyWrapIv::Node(node) => {
            let id = node.as_bytes();
            let mut iv = [0u8; 16];
            for (i, byte) in iv.iter_mut().enumerate() {
                *byte = id[i % 3];
            }
            iv
        }
        KeyWrapIv::Challenge(challenge) => {
            let mut iv = [IV_PADDING; 16];
            iv[10..16].copy_from_slice(challenge.as_bytes());
            iv
        }
    }
}

fn envelope_pad(source: KeyWrapIv) -> Result<[u8; 16], Error> {
    encrypt_block(&TRANSFER_KEY, &envelope_iv(source))
}

/// Produce the on-wire ciphertext of a system key.
pub fn wrap_system_key(key: &SystemKey, source: KeyWrapIv) -> Result<[u8; 16], Error> {
    let pad = envelope_pad(source)?;
    let mut out = *key.as_bytes();
    for (byte, pad_byte) in out.iter_mut().zip(pad.iter()) {
        *byte ^= pad_byte;
    }
    Ok(out)
}

/// Recover a system key from its on-wire ciphertext.
///
/// The receiver must supply the same IV source the sender used: its own
/// node id for 1W, the active challenge for 2W.
pub fn unwrap_system_key(envelope: &[u8; 16], source: KeyWrapIv) -> Result<SystemKey, Error> {
    let pad = envelope_pad(source)?;
    let mut out = *envelope;
    for (byte, pad_byte) in out.iter_mut().zip(pad.iter()) {
        *byte ^= pad_byte;
    }
    Ok(SystemKey::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SystemKey {
        SystemKey::new([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
            0x0D, 0x0E, 0x0F,
        ])
    }

    #[test]
    fn test_1w_iv_repeats_node_id() {
        let iv = envelope_iv(KeyWrapIv::Node(NodeId::new([0xAA, 0xBB, 0xCC])));
        assert_eq!(
            iv,
            [
                0xAA, 0xBB, 0xCC, 0xAA, 0xBB, 0xCC, 0xAA, 0xBB, 0xCC, 0xAA, 0xBB, 0xCC,
                0xAA, 0xBB, 0xCC, 0xAA,
            ]
        );
    }

    #[test]
    fn test_2w_iv_layout() {
        let iv = envelope_iv(KeyWrapIv::Challenge(Challenge::new([
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
        ])));
        assert_eq!(&iv[..10], &[0x55; 10]);
        assert_eq!(&iv[10..], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }

    #[test]
    fn test_1w_reference_envelope() {
        let envelope = wrap_system_key(
            &test_key(),
            KeyWrapIv::Node(NodeId::new([0xAA, 0xBB, 0xCC])),
        )
        .unwrap();
        assert_eq!(
            envelope,
            [
                0x5A, 0x34, 0x9B, 0xD1, 0xE0, 0xC4, 0x35, 0x88, 0x85, 0x8A, 0xF6, 0xC3,
                0x9B, 0x39, 0xA8, 0x19,
            ]
        );
    }

    #[test]
    fn test_1w_round_trip() {
        let node = NodeId::new([0xAA, 0xBB, 0xCC]);
        let envelope = wrap_system_key(&test_key(), KeyWrapIv::Node(node)).unwrap();
        let recovered = unwrap_system_key(&envelope, KeyWrapIv::Node(node)).unwrap();
        assert_eq!(recovered, test_key());
    }

    #[test]
    fn test_2w_round_trip() {
        let challenge = Challenge::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let envelope = wrap_system_key(&test_key(), KeyWrapIv::Challenge(challenge)).unwrap();
        assert_eq!(
            envelope,
            [
                0x9B, 0x39, 0x97, 0x25, 0xB8, 0x6F, 0x03, 0xB8, 0xAC, 0x42, 0x3E, 0xB4,
                0xC2, 0x76, 0x73, 0x06,
            ]
        );

        let recovered = unwrap_system_key(&envelope, KeyWrapIv::Challenge(challenge)).unwrap();
        assert_eq!(recovered, test_key());
    }

    #[test]
    fn test_wrong_iv_source_garbles_key() {
        let envelope = wrap_system_key(
            &test_key(),
            KeyWrapIv::Node(NodeId::new([0xAA, 0xBB, 0xCC])),
        )
        .unwrap();
        let wrong = unwrap_system_key(&envelope, KeyWrapIv::Node(NodeId::new([0xAA, 0xBB, 0xCD])))
            .unwrap();
        assert_ne!(wrong, test_key());
    }
}
