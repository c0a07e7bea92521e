//! IV construction for the authentication tag.
//!
//! The 16-byte block fed into AES is assembled from the frame's command
//! byte and parameters plus a mode-specific binding: the 2-byte rolling
//! code in 1W, the 6-byte challenge in 2W.
//!
//! ```text
//! ┌───────────────────────────┬───────────┬─────────────────────────┐
//! │ bytes 0-7                 │ bytes 8-9 │ bytes 10-15             │
//! │ cmd ‖ params (0x55 pad)   │ (c1, c2)  │ 1W: rc LE ‖ 0x55 × 4    │
//! │                           │           │ 2W: challenge           │
//! └───────────────────────────┴───────────┴─────────────────────────┘
//! ```
//!
//! The running checksum at bytes 8-9 covers ALL of `cmd ‖ params`, not
//! just the first eight bytes copied verbatim.

use byteorder::{ByteOrder, LittleEndian};

use super::checksum::running_checksum;
use crate::types::Challenge;

/// Size of the AES input block.
pub const IV_SIZE: usize = 16;

/// Padding byte for short command data and the 1W tail.
pub const IV_PADDING: u8 = 0x55;

/// The per-mode value bound into the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBinding {
    /// 1W: the frame's rolling code.
    Rolling(u16),
    /// 2W: the session challenge.
    Challenge(Challenge),
}

/// Assemble the tag IV from `cmd ‖ params` and the mode binding.
///
/// `cmd_and_params` is the command byte followed by the parameter bytes,
/// at most 22 bytes total.
pub fn build_iv(cmd_and_params: &[u8], binding: TagBinding) -> [u8; IV_SIZE] {
    let mut iv = [IV_PADDING; IV_SIZE];

    let head = cmd_and_params.len().min(8);
    iv[..head].copy_from_slice(&cmd_and_params[..head]);

    let (c1, c2) = running_checksum(cmd_and_params);
    iv[8] = c1;
    iv[9] = c2;

    match binding {
        TagBinding::Rolling(code) => {
            LittleEndian::write_u16(&mut iv[10..12], code);
            // bytes 12-15 stay 0x55
        }
        TagBinding::Challenge(challenge) => {
            iv[10..16].copy_from_slice(challenge.as_bytes());
        }
    }

    iv
}
