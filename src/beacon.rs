//! Beacon tracking.
//!
//! A frame with Ctrl1 bit 7 set is a beacon. Observations are kept per
//! source, with a cheap accessor for the most recent beacon overall; a
//! peer is live while its last beacon falls inside the liveness window.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::frame::Frame;
use crate::types::NodeId;

/// Beacon classification from the first parameter byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconKind {
    /// Parameter-less synchronization beacon.
    Sync,
    /// Typed beacon; the byte is device-defined.
    Typed(u8),
}

impl fmt::Display for BeaconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Typed(t) => write!(f, "type-0x{t:02X}"),
        }
    }
}

/// One received beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconObservation {
    pub src: NodeId,
    pub kind: BeaconKind,
    /// The beacon's parameter bytes, verbatim.
    pub params: Vec<u8>,
    pub rssi: i16,
    pub snr: f32,
    pub received_at: u64,
}

/// Tracks the last beacon per source.
#[derive(Debug, Default)]
pub struct BeaconTracker {
    by_source: HashMap<NodeId, BeaconObservation>,
    latest: Option<BeaconObservation>,
}

impl BeaconTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a beacon frame. Returns the observation, or `None` when
    /// the frame does not carry the beacon flag.
    pub fn observe(
        &mut self,
        frame: &Frame,
        rssi: i16,
        snr: f32,
        now_us: u64,
    ) -> Option<BeaconObservation> {
        if !frame.is_beacon() {
            return None;
        }

        let kind = match frame.params.first() {
            Some(&byte) => BeaconKind::Typed(byte),
            None => BeaconKind::Sync,
        };

        let observation = BeaconObservation {
            src: frame.src,
            kind,
            params: frame.params.clone(),
            rssi,
            snr,
            received_at: now_us,
        };
        trace!(src = %frame.src, kind = %kind, rssi, "beacon");

        self.by_source.insert(frame.src, observation.clone());
        self.latest = Some(observation.clone());
        Some(observation)
    }

    /// The most recent beacon from any source.
    pub fn latest(&self) -> Option<&BeaconObservation> {
        self.latest.as_ref()
    }

    /// The last beacon from a specific peer.
    pub fn last_from(&self, peer: NodeId) -> Option<&BeaconObservation> {
        self.by_source.get(&peer)
    }

    /// Whether `peer`'s last beacon is within `timeout_us` of `now_us`.
    pub fn is_live(&self, peer: NodeId, timeout_us: u64, now_us: u64) -> bool {
        self.by_source
            .get(&peer)
            .is_some_and(|b| now_us.saturating_sub(b.received_at) <= timeout_us)
    }

    /// Microseconds since the last beacon overall, if any was seen.
    pub fn time_since_latest(&self, now_us: u64) -> Option<u64> {
        self.latest
            .as_ref()
            .map(|b| now_us.saturating_sub(b.received_at))
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.by_source.clear();
        self.latest = None;
    }
}
