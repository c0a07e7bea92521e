//! AES-128-ECB single-block operations.
//!
//! The protocol only ever encrypts or decrypts one 16-byte block at a
//! time: the tag IV during authentication and the key-transfer envelope
//! during pairing. No chaining mode exists on this wire.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::error::Error;

/// Encrypt a single 16-byte block under a 128-bit key.
pub fn encrypt_block(key: &[u8; 16], block: &[u8; 16]) -> Result<[u8; 16], Error> {
    let cipher = Aes128::new_from_slice(key)
        .map_err(|e| Error::CryptoBackendFailure(format!("cipher init: {e}")))?;

    let mut output = *block;
    cipher.encrypt_block((&mut output).into());
    Ok(output)
}

/// Decrypt a single 16-byte block under a 128-bit key.
pub fn decrypt_block(key: &[u8; 16], block: &[u8; 16]) -> Result<[u8; 16], Error> {
    let cipher = Aes128::new_from_slice(key)
        .map_err(|e| Error::CryptoBackendFailure(format!("cipher init: {e}")))?;

    let mut output = *block;
    cipher.decrypt_block((&mut output).into());
    Ok(output)
}
