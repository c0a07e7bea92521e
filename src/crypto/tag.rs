//! 6-byte truncated authentication tag.
//!
//! The tag is the first 6 bytes of AES-128-ECB over the IV of
//! [`super::iv`]. Truncation is a wire-compatibility requirement, not a
//! design choice; comparison is constant-time.

use super::block::encrypt_block;
use super::iv::{build_iv, TagBinding};
use super::secure_compare;
use crate::error::{AuthError, Error};
use crate::types::SystemKey;

/// Tag length on the wire.
pub const TAG_SIZE: usize = 6;

/// Derive the frame tag from `cmd ‖ params`, the mode binding and the
/// system key.
pub fn compute_tag(
    cmd_and_params: &[u8],
    binding: TagBinding,
    key: &SystemKey,
) -> Result<[u8; TAG_SIZE], Error> {
    let iv = build_iv(cmd_and_params, binding);
    let block = encrypt_block(key.as_bytes(), &iv)?;

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&block[..TAG_SIZE]);
    Ok(tag)
}

/// Recompute the tag and compare against the received one.
///
/// Returns `InvalidTag` on mismatch; `CryptoBackendFailure` surfaces only
/// if the AES call itself fails.
pub fn verify_tag(
    cmd_and_params: &[u8],
    binding: TagBinding,
    key: &SystemKey,
    received: &[u8; TAG_SIZE],
) -> Result<(), Error> {
    let expected = compute_tag(cmd_and_params, binding, key)?;
    if secure_compare(&expected, received) {
        Ok(())
    } else {
        Err(AuthError::InvalidTag.into())
    }
}
