//! Link-layer frame format.
//!
//! Defines the on-wire record, its builder, and the parse/validate path.
//!
//! ## Frame Format
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ Ctrl0 (1) │ Ctrl1 (1) │ Dest (3) │ Src (3) │ Cmd (1) │ Params 0-21 │
//! ├───────────────────────────────────────────────────────────────────┤
//! │ RollingCode (2, 1W only) │ Tag (6) │ CRC (2)                      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ctrl0: bits 7-6 order tag (opaque pass-through), bit 5 mode
//! (0 = 1W, 1 = 2W), bits 4-0 `total_len - 11`. Ctrl1: bit 7 beacon,
//! bit 6 routed, bit 5 low-power, bit 4 ack/priority, bits 3-0 protocol
//! version. Multi-byte integers are little-endian.
//!
//! The Ctrl0 length field does not count the 6-byte tag: a frame's wire
//! size is always `total_len + TAG_SIZE`.

mod codec;
#[allow(clippy::module_inception)]
mod frame;

pub use codec::parse;
pub use frame::{Ctrl1Flags, Frame};

use crate::crypto::TAG_SIZE;

/// Minimum Ctrl0-declared length: the 9-byte header plus CRC, no
/// params, no rolling code. The tag is not counted by this field.
pub const FRAME_MIN_SIZE: usize = 11;

/// Maximum Ctrl0-declared length.
pub const FRAME_MAX_SIZE: usize = 32;

/// Smallest possible serialization (declared minimum plus the tag).
pub const MIN_WIRE_SIZE: usize = FRAME_MIN_SIZE + TAG_SIZE;

/// Largest possible serialization; radio buffers size to this.
pub const MAX_WIRE_SIZE: usize = FRAME_MAX_SIZE + TAG_SIZE;

/// Maximum command parameter bytes.
pub const MAX_PARAMS: usize = 21;

/// Node id field width.
pub const NODE_ID_SIZE: usize = 3;

/// Rolling code field width (1W only).
pub const ROLLING_CODE_SIZE: usize = 2;

/// CRC field width.
pub const CRC_SIZE: usize = 2;

// Fixed field offsets in the serialization.
pub(crate) const OFFSET_CTRL0: usize = 0;
pub(crate) const OFFSET_CTRL1: usize = 1;
pub(crate) const OFFSET_DEST: usize = 2;
pub(crate) const OFFSET_SRC: usize = 5;
pub(crate) const OFFSET_CMD: usize = 8;
pub(crate) const OFFSET_PARAMS: usize = 9;

// Ctrl0 bit layout.
pub(crate) const CTRL0_ORDER_MASK: u8 = 0xC0;
pub(crate) const CTRL0_MODE_MASK: u8 = 0x20;
pub(crate) const CTRL0_LENGTH_MASK: u8 = 0x1F;
