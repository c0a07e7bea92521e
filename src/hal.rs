//! Hardware abstraction boundary.
//!
//! The engine never touches hardware directly. The radio, clock, entropy
//! source and key store are capability traits injected at construction;
//! hosts provide implementations, tests provide fakes.

use crate::error::Result;
use crate::types::{NodeId, SystemKey};

/// FSK bit rate of the physical layer, bits per second.
pub const BIT_RATE_BPS: u32 = 38_400;

/// Frequency deviation in kHz.
pub const FREQ_DEVIATION_KHZ: f32 = 19.2;

/// Preamble length in bits.
pub const PREAMBLE_BITS: u32 = 512;

/// Sync word length in bits (3 bytes: FF 33 xx).
pub const SYNC_WORD_BITS: u32 = 24;

/// First two sync word bytes; the third is radio-specific.
pub const SYNC_WORD_PREFIX: [u8; 2] = [0xFF, 0x33];

/// Estimated on-air time of a serialized frame, in microseconds.
///
/// Preamble and sync word are counted; the radio is assumed to have been
/// configured with them at construction.
pub fn air_time_us(frame_len: usize) -> u64 {
    let bits = u64::from(PREAMBLE_BITS) + u64::from(SYNC_WORD_BITS) + frame_len as u64 * 8;
    bits * 1_000_000 / u64::from(BIT_RATE_BPS)
}

/// Transmit half of the radio.
///
/// The engine hands it opaque byte blobs and frequency change requests;
/// modulation, sync word and preamble are configured when the sink is
/// constructed.
pub trait RadioSink {
    fn set_frequency(&mut self, mhz: f32) -> Result<()>;
    fn transmit(&mut self, bytes: &[u8]) -> Result<()>;
}

/// A received byte blob with link quality readings.
#[derive(Debug, Clone)]
pub struct Received {
    pub bytes: Vec<u8>,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Signal-to-noise ratio in dB.
    pub snr: f32,
}

/// Receive half of the radio. Polled; never blocks.
pub trait RadioSource {
    fn try_receive(&mut self) -> Option<Received>;
}

/// Monotonic microsecond clock. Must be non-decreasing across the
/// process lifetime.
pub trait MonotonicClock {
    fn now_us(&self) -> u64;
}

/// Cryptographically suitable entropy source for challenge generation.
pub trait RandomSource {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Default entropy source backed by the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, buf);
    }
}

/// Persistent key and rolling-counter store.
///
/// Read-only for the system key after initialization; the per-peer
/// rolling counters are the only mutable persistent state and must be
/// flushed before a frame carrying the new value is emitted.
pub trait KeyVault {
    fn system_key(&self) -> Result<SystemKey>;
    fn load_rc(&self, peer: NodeId) -> Result<u16>;
    fn store_rc(&mut self, peer: NodeId, rc: u16) -> Result<()>;
}
