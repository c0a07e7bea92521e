//! Frame parsing.

use byteorder::{ByteOrder, LittleEndian};

use super::frame::{Ctrl1Flags, Frame};
use super::{
    CRC_SIZE, CTRL0_LENGTH_MASK, CTRL0_MODE_MASK, FRAME_MAX_SIZE, FRAME_MIN_SIZE, MAX_PARAMS,
    MIN_WIRE_SIZE, OFFSET_CMD, OFFSET_CTRL0, OFFSET_CTRL1, OFFSET_DEST, OFFSET_PARAMS,
    OFFSET_SRC, ROLLING_CODE_SIZE,
};
use crate::crypto::TAG_SIZE;
use crate::error::{FrameError, Result};
use crate::types::{Command, Mode, NodeId};

/// Parse a frame from received bytes.
///
/// The buffer may be longer than the frame (radios hand over fixed-size
/// reads); trailing bytes are ignored. Returns `Truncated` when the
/// buffer is shorter than the wire size Ctrl0 implies (its declared
/// length plus the uncounted tag), `MalformedHeader` when the declared
/// length is inconsistent with the mode.
pub fn parse(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < MIN_WIRE_SIZE {
        return Err(FrameError::Truncated {
            got: bytes.len(),
            expected: MIN_WIRE_SIZE,
        }
        .into());
    }

    let ctrl0 = bytes[OFFSET_CTRL0];
    let mode = if ctrl0 & CTRL0_MODE_MASK != 0 {
        Mode::TwoWay
    } else {
        Mode::OneWay
    };
    let total_len = FRAME_MIN_SIZE + usize::from(ctrl0 & CTRL0_LENGTH_MASK);

    if total_len > FRAME_MAX_SIZE {
        return Err(FrameError::MalformedHeader.into());
    }
    let wire_len = total_len + TAG_SIZE;
    if bytes.len() < wire_len {
        return Err(FrameError::Truncated {
            got: bytes.len(),
            expected: wire_len,
        }
        .into());
    }

    let fixed_overhead = if mode.is_one_way() {
        FRAME_MIN_SIZE + ROLLING_CODE_SIZE
    } else {
        FRAME_MIN_SIZE
    };
    let params_len = total_len
        .checked_sub(fixed_overhead)
        .ok_or(FrameError::MalformedHeader)?;
    if params_len > MAX_PARAMS {
        return Err(FrameError::MalformedHeader.into());
    }

    let mut dest = [0u8; 3];
    dest.copy_from_slice(&bytes[OFFSET_DEST..OFFSET_DEST + 3]);
    let mut src = [0u8; 3];
    src.copy_from_slice(&bytes[OFFSET_SRC..OFFSET_SRC + 3]);
    let cmd = Command::from(bytes[OFFSET_CMD]);

    let mut offset = OFFSET_PARAMS;
    let params = bytes[offset..offset + params_len].to_vec();
    offset += params_len;

    let rolling_code = if mode.is_one_way() {
        let code = LittleEndian::read_u16(&bytes[offset..offset + 2]);
        offset += ROLLING_CODE_SIZE;
        code
    } else {
        0
    };

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&bytes[offset..offset + TAG_SIZE]);
    offset += TAG_SIZE;

    let crc = LittleEndian::read_u16(&bytes[offset..offset + CRC_SIZE]);

    Ok(Frame {
        mode,
        order_tag: ctrl0 >> 6,
        ctrl1: Ctrl1Flags::new(bytes[OFFSET_CTRL1]),
        dest: NodeId::new(dest),
        src: NodeId::new(src),
        cmd,
        params,
        rolling_code,
        tag,
        crc,
    })
}
