//! Frame structure, builder and serialization.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use super::{
    CRC_SIZE, CTRL0_LENGTH_MASK, CTRL0_MODE_MASK, CTRL0_ORDER_MASK, FRAME_MIN_SIZE, MAX_PARAMS,
    OFFSET_CMD, OFFSET_CTRL0, OFFSET_CTRL1, OFFSET_DEST, OFFSET_PARAMS, OFFSET_SRC,
    ROLLING_CODE_SIZE,
};
use crate::crypto::{compute_tag, crc16, TagBinding, TAG_SIZE};
use crate::error::{AuthError, Error, FrameError, Result};
use crate::types::{Challenge, Command, Mode, NodeId, SystemKey};

/// Ctrl1 flag byte: link options in the high nibble, protocol version in
/// the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ctrl1Flags(u8);

impl Ctrl1Flags {
    /// No flags, protocol version 0.
    pub const NONE: Self = Self(0);

    /// Frame is a beacon.
    pub const BEACON: u8 = 1 << 7;

    /// Frame was relayed by a repeater.
    pub const ROUTED: u8 = 1 << 6;

    /// Sender is a low-power device.
    pub const LOW_POWER: u8 = 1 << 5;

    /// Acknowledgement requested / priority traffic.
    pub const ACK: u8 = 1 << 4;

    /// Create flags from a raw byte.
    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Check if a flag is set.
    pub fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Set a flag.
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Clear a flag.
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// Protocol version (low nibble). Unknown versions are tolerated.
    pub fn version(self) -> u8 {
        self.0 & 0x0F
    }

    /// Replace the protocol version nibble.
    pub fn with_version(self, version: u8) -> Self {
        Self((self.0 & 0xF0) | (version & 0x0F))
    }

    /// Raw byte.
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// A link-layer frame.
///
/// Construct with [`Frame::build`], stamp the rolling code (1W), then
/// [`Frame::finalize`] before serializing for the radio. Parsed frames
/// come back from [`super::parse`] with tag and CRC as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Operating mode, mirrored by Ctrl0 bit 5.
    pub mode: Mode,
    /// Ctrl0 bits 7-6, semantics undocumented; passed through opaquely.
    pub order_tag: u8,
    /// Ctrl1 flag byte.
    pub ctrl1: Ctrl1Flags,
    /// Destination node; all-zeros is broadcast.
    pub dest: NodeId,
    /// Source node.
    pub src: NodeId,
    /// Command identifier.
    pub cmd: Command,
    /// Command parameters, at most 21 bytes.
    pub params: Vec<u8>,
    /// Rolling code, 1W frames only. Zero until stamped.
    pub rolling_code: u16,
    /// Truncated authentication tag. Zero until finalized.
    pub tag: [u8; TAG_SIZE],
    /// CRC-16/KERMIT over the preceding serialization. Zero until
    /// finalized.
    pub crc: u16,
}

impl Frame {
    /// Create an unfinalized frame.
    ///
    /// Rolling code, tag and CRC are zero-initialized; `finalize` fills
    /// them in. Fails with `ParamsTooLong` when `params` exceeds 21
    /// bytes.
    pub fn build(
        mode: Mode,
        dest: NodeId,
        src: NodeId,
        ctrl1: Ctrl1Flags,
        cmd: Command,
        params: &[u8],
    ) -> Result<Self> {
        // The rolling code field eats into the 32-byte frame cap in 1W
        let max = if mode.is_one_way() {
            MAX_PARAMS - ROLLING_CODE_SIZE
        } else {
            MAX_PARAMS
        };
        if params.len() > max {
            return Err(FrameError::ParamsTooLong {
                len: params.len(),
                max,
            }
            .into());
        }

        Ok(Self {
            mode,
            order_tag: 0,
            ctrl1,
            dest,
            src,
            cmd,
            params: params.to_vec(),
            rolling_code: 0,
            tag: [0; TAG_SIZE],
            crc: 0,
        })
    }

    /// The Ctrl0-declared length: header, params, rolling code and CRC.
    ///
    /// The 6-byte tag is not counted by the length field; see
    /// [`Frame::wire_len`] for the serialized size.
    pub fn total_len(&self) -> usize {
        let rolling = if self.mode.is_one_way() {
            ROLLING_CODE_SIZE
        } else {
            0
        };
        FRAME_MIN_SIZE + self.params.len() + rolling
    }

    /// Serialized size on the wire: `total_len` plus the tag.
    pub fn wire_len(&self) -> usize {
        self.total_len() + TAG_SIZE
    }

    /// The Ctrl0 byte for this frame.
    pub fn ctrl0(&self) -> u8 {
        let mut byte = (self.order_tag << 6) & CTRL0_ORDER_MASK;
        if !self.mode.is_one_way() {
            byte |= CTRL0_MODE_MASK;
        }
        byte | ((self.total_len() - FRAME_MIN_SIZE) as u8 & CTRL0_LENGTH_MASK)
    }

    /// Whether this frame is addressed to everyone.
    pub fn is_broadcast(&self) -> bool {
        self.dest.is_broadcast()
    }

    /// Whether this frame carries the beacon flag.
    pub fn is_beacon(&self) -> bool {
        self.ctrl1.has(Ctrl1Flags::BEACON)
    }

    /// Stamp the rolling code of a 1W frame.
    pub fn set_rolling_code(&mut self, code: u16) {
        self.rolling_code = code;
    }

    /// The command byte followed by the parameter bytes: the input to tag
    /// derivation.
    pub fn cmd_and_params(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + self.params.len());
        data.push(self.cmd.as_byte());
        data.extend_from_slice(&self.params);
        data
    }

    /// The tag binding implied by this frame's mode.
    ///
    /// 1W frames bind to their own rolling code; 2W frames need the
    /// session challenge supplied by the caller.
    pub fn tag_binding(&self, challenge: Option<Challenge>) -> Result<TagBinding> {
        match self.mode {
            Mode::OneWay => Ok(TagBinding::Rolling(self.rolling_code)),
            Mode::TwoWay => challenge
                .map(TagBinding::Challenge)
                .ok_or_else(|| AuthError::MissingChallenge.into()),
        }
    }

    /// Compute the tag and CRC, completing the frame for transmission.
    ///
    /// 1W: the rolling code must already be stamped. 2W: `challenge`
    /// must carry the session challenge (`MissingChallenge` otherwise).
    pub fn finalize(&mut self, key: &SystemKey, challenge: Option<Challenge>) -> Result<()> {
        let binding = self.tag_binding(challenge)?;
        self.tag = compute_tag(&self.cmd_and_params(), binding, key)?;

        let serialized = self.serialize();
        self.crc = crc16(&serialized[..serialized.len() - CRC_SIZE]);
        Ok(())
    }

    /// Serialize to the exact wire layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_len()];

        buf[OFFSET_CTRL0] = self.ctrl0();
        buf[OFFSET_CTRL1] = self.ctrl1.bits();
        buf[OFFSET_DEST..OFFSET_DEST + 3].copy_from_slice(self.dest.as_bytes());
        buf[OFFSET_SRC..OFFSET_SRC + 3].copy_from_slice(self.src.as_bytes());
        buf[OFFSET_CMD] = self.cmd.as_byte();

        let mut offset = OFFSET_PARAMS;
        buf[offset..offset + self.params.len()].copy_from_slice(&self.params);
        offset += self.params.len();

        if self.mode.is_one_way() {
            LittleEndian::write_u16(&mut buf[offset..offset + 2], self.rolling_code);
            offset += ROLLING_CODE_SIZE;
        }

        buf[offset..offset + TAG_SIZE].copy_from_slice(&self.tag);
        offset += TAG_SIZE;

        LittleEndian::write_u16(&mut buf[offset..offset + 2], self.crc);

        buf
    }

    /// Verify CRC and, when a key is given, the authentication tag.
    ///
    /// CRC is checked first over the full serialization. The tag check
    /// binds to the frame's own rolling code in 1W; 2W requires
    /// `challenge` (`MissingChallenge` when absent).
    pub fn validate(&self, key: Option<&SystemKey>, challenge: Option<Challenge>) -> Result<()> {
        let serialized = self.serialize();
        crate::crypto::verify_crc(&serialized).map_err(Error::from)?;

        if let Some(key) = key {
            let binding = self.tag_binding(challenge)?;
            crate::crypto::verify_tag(&self.cmd_and_params(), binding, key, &self.tag)?;
        }

        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} cmd={} len={}",
            self.mode,
            self.src,
            self.dest,
            self.cmd,
            self.total_len()
        )?;
        if !self.params.is_empty() {
            write!(f, " params={}", hex::encode_upper(&self.params))?;
        }
        if self.mode.is_one_way() {
            write!(f, " rc={:04X}", self.rolling_code)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_oversized_params() {
        let result = Frame::build(
            Mode::TwoWay,
            NodeId::new([1, 2, 3]),
            NodeId::new([4, 5, 6]),
            Ctrl1Flags::NONE,
            Command::SET_POSITION,
            &[0u8; 22],
        );
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::ParamsTooLong { len: 22, max: 21 }))
        ));

        // The 1W rolling code leaves 19 bytes within the 32-byte cap
        let result = Frame::build(
            Mode::OneWay,
            NodeId::new([1, 2, 3]),
            NodeId::new([4, 5, 6]),
            Ctrl1Flags::NONE,
            Command::SET_POSITION,
            &[0u8; 20],
        );
        assert!(matches!(
            result,
            Err(Error::Frame(FrameError::ParamsTooLong { len: 20, max: 19 }))
        ));
    }

    #[test]
    fn test_ctrl0_encoding() {
        let frame = Frame::build(
            Mode::OneWay,
            NodeId::new([0x64, 0x65, 0x75]),
            NodeId::new([0xAB, 0xCD, 0xEF]),
            Ctrl1Flags::NONE,
            Command::SET_POSITION,
            &[50, 0x00],
        )
        .unwrap();

        // 11 + 2 params + 2 rolling code = 15; length bits = 4; 1W bit clear
        assert_eq!(frame.total_len(), 15);
        assert_eq!(frame.ctrl0(), 0x04);

        let two_way = Frame::build(
            Mode::TwoWay,
            NodeId::new([0x64, 0x65, 0x75]),
            NodeId::new([0xAB, 0xCD, 0xEF]),
            Ctrl1Flags::NONE,
            Command::SET_POSITION,
            &[50, 0x00],
        )
        .unwrap();

        // No rolling code field in 2W
        assert_eq!(two_way.total_len(), 13);
        assert_eq!(two_way.ctrl0(), 0x20 | 0x02);
    }

    #[test]
    fn test_order_tag_preserved_in_ctrl0() {
        let mut frame = Frame::build(
            Mode::OneWay,
            NodeId::BROADCAST,
            NodeId::new([1, 2, 3]),
            Ctrl1Flags::NONE,
            Command::PING,
            &[],
        )
        .unwrap();
        frame.order_tag = 0b10;
        assert_eq!(frame.ctrl0() & 0xC0, 0x80);
    }

    #[test]
    fn test_ctrl1_flag_operations() {
        let mut flags = Ctrl1Flags::NONE.with_version(1);
        assert_eq!(flags.version(), 1);
        assert!(!flags.has(Ctrl1Flags::BEACON));

        flags.set(Ctrl1Flags::BEACON);
        flags.set(Ctrl1Flags::LOW_POWER);
        assert!(flags.has(Ctrl1Flags::BEACON));
        assert!(flags.has(Ctrl1Flags::LOW_POWER));
        assert_eq!(flags.version(), 1);

        flags.clear(Ctrl1Flags::BEACON);
        assert!(!flags.has(Ctrl1Flags::BEACON));
    }

    #[test]
    fn test_finalize_2w_requires_challenge() {
        let key = SystemKey::new([0; 16]);
        let mut frame = Frame::build(
            Mode::TwoWay,
            NodeId::new([1, 2, 3]),
            NodeId::new([4, 5, 6]),
            Ctrl1Flags::NONE,
            Command::STOP,
            &[0x00],
        )
        .unwrap();

        assert!(matches!(
            frame.finalize(&key, None),
            Err(Error::Auth(AuthError::MissingChallenge))
        ));
        assert!(frame
            .finalize(&key, Some(Challenge::new([1, 2, 3, 4, 5, 6])))
            .is_ok());
    }

    #[test]
    fn test_serialized_length_bounds() {
        let min = Frame::build(
            Mode::TwoWay,
            NodeId::BROADCAST,
            NodeId::new([1, 2, 3]),
            Ctrl1Flags::NONE,
            Command::PING,
            &[],
        )
        .unwrap();
        assert_eq!(min.total_len(), FRAME_MIN_SIZE);
        assert_eq!(min.serialize().len(), super::super::MIN_WIRE_SIZE);

        let max = Frame::build(
            Mode::OneWay,
            NodeId::BROADCAST,
            NodeId::new([1, 2, 3]),
            Ctrl1Flags::NONE,
            Command::SET_NAME,
            &[0xAA; 19],
        )
        .unwrap();
        assert_eq!(max.total_len(), super::super::FRAME_MAX_SIZE);
        assert_eq!(max.serialize().len(), super::super::MAX_WIRE_SIZE);
    }
}
