//! Core types used throughout the iohc engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 3-byte node identifier. Opaque to the engine; all-zeros is broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 3]);

impl NodeId {
    /// The broadcast address (all zeros).
    pub const BROADCAST: Self = Self([0x00, 0x00, 0x00]);

    pub fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Check whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0x00, 0x00, 0x00]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl From<[u8; 3]> for NodeId {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

/// 16-byte shared secret between a controller and its paired actuators.
///
/// Zeroed on drop. Debug output is redacted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct SystemKey(pub [u8; 16]);

impl SystemKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Key material must not leak into logs
impl fmt::Debug for SystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemKey(..)")
    }
}

/// 6-byte random challenge minted by a 2W initiator.
///
/// Bound into both the authentication tag and the key-transfer envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(pub [u8; 6]);

impl Challenge {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Parse a challenge from a 6-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 6] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// Command identifier byte.
///
/// Known commands are named constants; unknown values pass through
/// opaquely so the engine can carry vendor extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command(pub u8);

impl Command {
    // Discovery (0x28-0x2D)
    pub const DISCOVER_ACTUATOR: Self = Self(0x28);
    pub const DISCOVER_SENSOR: Self = Self(0x29);
    pub const DISCOVER_BEACON: Self = Self(0x2A);
    pub const DISCOVER_CONTROLLER: Self = Self(0x2B);

    // Key transfer
    pub const KEY_TRANSFER_1W: Self = Self(0x30);
    pub const KEY_TRANSFER_2W: Self = Self(0x31);

    // Challenge-response authentication
    pub const CHALLENGE_REQUEST: Self = Self(0x3C);
    pub const CHALLENGE_RESPONSE: Self = Self(0x3D);

    // Naming / info (0x50-0x57)
    pub const GET_NAME: Self = Self(0x50);
    pub const SET_NAME: Self = Self(0x51);
    pub const GET_INFO: Self = Self(0x52);
    pub const SET_INFO: Self = Self(0x53);

    // Actuator control
    pub const SET_POSITION: Self = Self(0x60);
    pub const STOP: Self = Self(0x61);
    pub const OPEN: Self = Self(0x62);
    pub const CLOSE: Self = Self(0x63);

    // Bootloader
    pub const BOOTLOADER_START: Self = Self(0xE0);
    pub const BOOTLOADER_DATA: Self = Self(0xE1);

    // Service
    pub const PING: Self = Self(0xF0);
    pub const RESET: Self = Self(0xF1);

    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if this is a discovery request/response command.
    pub fn is_discovery(self) -> bool {
        (0x28..=0x2D).contains(&self.0)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

/// Link-layer operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One-way: no acknowledgement, rolling-code replay protection.
    OneWay,
    /// Two-way: bidirectional, challenge-response, frequency hopping.
    TwoWay,
}

impl Mode {
    pub fn is_one_way(self) -> bool {
        matches!(self, Self::OneWay)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneWay => write!(f, "1W"),
            Self::TwoWay => write!(f, "2W"),
        }
    }
}

/// The three FHSS channels. Ch2 is the rest state and the sole 1W channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
}

impl Channel {
    /// Center frequency in MHz.
    pub fn frequency_mhz(self) -> f32 {
        match self {
            Self::Ch1 => 868.25,
            Self::Ch2 => 868.95,
            Self::Ch3 => 869.85,
        }
    }

    /// Next channel in the hop schedule (Ch1 -> Ch2 -> Ch3 -> Ch1).
    pub fn next(self) -> Self {
        match self {
            Self::Ch1 => Self::Ch2,
            Self::Ch2 => Self::Ch3,
            Self::Ch3 => Self::Ch1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ch1 => write!(f, "ch1/868.25MHz"),
            Self::Ch2 => write!(f, "ch2/868.95MHz"),
            Self::Ch3 => write!(f, "ch3/869.85MHz"),
        }
    }
}

/// Actuator device taxonomy carried in discovery responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceType {
    RollerShutter = 0x00,
    AdjustableSlatShutter = 0x01,
    Screen = 0x02,
    WindowOpener = 0x03,
    VenetianBlind = 0x04,
    ExteriorBlind = 0x05,
    DualShutter = 0x06,
    GarageDoor = 0x07,
    Awning = 0x08,
    Curtain = 0x09,
    Pergola = 0x0A,
    HorizontalAwning = 0x0B,
    ExteriorScreen = 0x0C,
    Light = 0x0D,
    Lock = 0x0E,
    Heating = 0x0F,
    Gate = 0x10,
    Beacon = 0x11,
    Sensor = 0x12,
}

impl DeviceType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::RollerShutter),
            0x01 => Some(Self::AdjustableSlatShutter),
            0x02 => Some(Self::Screen),
            0x03 => Some(Self::WindowOpener),
            0x04 => Some(Self::VenetianBlind),
            0x05 => Some(Self::ExteriorBlind),
            0x06 => Some(Self::DualShutter),
            0x07 => Some(Self::GarageDoor),
            0x08 => Some(Self::Awning),
            0x09 => Some(Self::Curtain),
            0x0A => Some(Self::Pergola),
            0x0B => Some(Self::HorizontalAwning),
            0x0C => Some(Self::ExteriorScreen),
            0x0D => Some(Self::Light),
            0x0E => Some(Self::Lock),
            0x0F => Some(Self::Heating),
            0x10 => Some(Self::Gate),
            0x11 => Some(Self::Beacon),
            0x12 => Some(Self::Sensor),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RollerShutter => "roller-shutter",
            Self::AdjustableSlatShutter => "adjustable-slat-shutter",
            Self::Screen => "screen",
            Self::WindowOpener => "window-opener",
            Self::VenetianBlind => "venetian-blind",
            Self::ExteriorBlind => "exterior-blind",
            Self::DualShutter => "dual-shutter",
            Self::GarageDoor => "garage-door",
            Self::Awning => "awning",
            Self::Curtain => "curtain",
            Self::Pergola => "pergola",
            Self::HorizontalAwning => "horizontal-awning",
            Self::ExteriorScreen => "exterior-screen",
            Self::Light => "light",
            Self::Lock => "lock",
            Self::Heating => "heating",
            Self::Gate => "gate",
            Self::Beacon => "beacon",
            Self::Sensor => "sensor",
        };
        write!(f, "{name}")
    }
}

/// Receive/transmit counters.
///
/// Structural and integrity faults on the receive path are absorbed by
/// dropping the frame; these counters are the only trace they leave.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinkStats {
    pub frames_tx: u64,
    pub frames_rx: u64,
    pub dropped_parse: u64,
    pub dropped_crc: u64,
    pub dropped_tag: u64,
    pub dropped_replay: u64,
    pub dropped_missing_challenge: u64,
    pub dropped_session: u64,
    pub duplicates: u64,
    pub discovery_overflow: u64,
}

impl LinkStats {
    pub fn add(&mut self, other: &Self) {
        self.frames_tx += other.frames_tx;
        self.frames_rx += other.frames_rx;
        self.dropped_parse += other.dropped_parse;
        self.dropped_crc += other.dropped_crc;
        self.dropped_tag += other.dropped_tag;
        self.dropped_replay += other.dropped_replay;
        self.dropped_missing_challenge += other.dropped_missing_challenge;
        self.dropped_session += other.dropped_session;
        self.duplicates += other.duplicates;
        self.discovery_overflow += other.discovery_overflow;
    }

    /// Total frames dropped on the receive path.
    pub fn total_dropped(&self) -> u64 {
        self.dropped_parse
            + self.dropped_crc
            + self.dropped_tag
            + self.dropped_replay
            + self.dropped_missing_challenge
            + self.dropped_session
    }
}
