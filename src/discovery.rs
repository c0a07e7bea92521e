//! Device discovery and key-transfer pairing.
//!
//! A discovery session broadcasts a filtered probe, collects deduplicated
//! responses into a bounded peer list, and closes on `stop()` or timeout.
//! Pairing wraps the system key in the transfer-key envelope and hands it
//! to a discovered peer.

use tracing::{debug, warn};

use crate::crypto::{wrap_system_key, KeyWrapIv};
use crate::error::{Error, Result};
use crate::frame::{Ctrl1Flags, Frame};
use crate::types::{Challenge, Command, DeviceType, Mode, NodeId, SystemKey};

/// Default capacity of the discovered-peer list.
pub const DEFAULT_PEER_CAPACITY: usize = 32;

/// What a discovery probe asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFilter {
    /// Any device; probes the actuator discovery command.
    Any,
    /// A specific device type.
    Type(DeviceType),
}

impl DiscoveryFilter {
    /// The probe command for this filter.
    pub fn command(self) -> Command {
        match self {
            Self::Any => Command::DISCOVER_ACTUATOR,
            Self::Type(DeviceType::Sensor) => Command::DISCOVER_SENSOR,
            Self::Type(DeviceType::Beacon) => Command::DISCOVER_BEACON,
            Self::Type(_) => Command::DISCOVER_ACTUATOR,
        }
    }

    /// The single parameter byte of the probe.
    pub fn filter_byte(self) -> u8 {
        match self {
            Self::Any => 0xFF,
            Self::Type(t) => t.as_u8(),
        }
    }
}

/// Discovery session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Discovering {
        started_at: u64,
        timeout_us: u64,
        filter: DiscoveryFilter,
    },
    /// Session closed; the peer list is preserved until `reset`.
    Complete,
}

/// A device that answered a discovery probe.
///
/// Created on the first response from its address and never mutated;
/// later responses from the same source are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub node: NodeId,
    pub device_type: DeviceType,
    pub manufacturer: u8,
    pub protocol_version: u8,
    pub rssi: i16,
    pub first_seen_at: u64,
}

/// Runs discovery sessions and builds pairing frames.
#[derive(Debug)]
pub struct DiscoveryManager {
    capacity: usize,
    state: DiscoveryState,
    peers: Vec<DiscoveredPeer>,
    overflow_dropped: u64,
}

impl DiscoveryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: DiscoveryState::Idle,
            peers: Vec::new(),
            overflow_dropped: 0,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn is_discovering(&self) -> bool {
        matches!(self.state, DiscoveryState::Discovering { .. })
    }

    /// Discovered peers so far, in arrival order.
    pub fn peers(&self) -> &[DiscoveredPeer] {
        &self.peers
    }

    /// Responses dropped because the list was full.
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped
    }

    /// Open a session and build the broadcast probe frame.
    ///
    /// The returned frame is unfinalized; the caller stamps a rolling
    /// code and finalizes before transmit. Starting over an open session
    /// restarts it in place.
    pub fn start(
        &mut self,
        own: NodeId,
        filter: DiscoveryFilter,
        timeout_us: u64,
        now_us: u64,
    ) -> Result<Frame> {
        self.state = DiscoveryState::Discovering {
            started_at: now_us,
            timeout_us,
            filter,
        };
        self.peers.clear();
        self.overflow_dropped = 0;
        debug!(?filter, timeout_us, "discovery started");

        Frame::build(
            Mode::OneWay,
            NodeId::BROADCAST,
            own,
            Ctrl1Flags::NONE,
            filter.command(),
            &[filter.filter_byte()],
        )
    }

    /// Route a discovery response into the peer list.
    ///
    /// Returns the new entry, `None` for duplicates or when no session is
    /// open, `CapacityExceeded` when the list is full (callers absorb
    /// this as a counted drop).
    pub fn ingest(
        &mut self,
        frame: &Frame,
        rssi: i16,
        now_us: u64,
    ) -> Result<Option<DiscoveredPeer>> {
        if !self.is_discovering() {
            return Ok(None);
        }
        if self.peers.iter().any(|p| p.node == frame.src) {
            return Ok(None);
        }
        if self.peers.len() >= self.capacity {
            self.overflow_dropped += 1;
            warn!(src = %frame.src, capacity = self.capacity, "discovery list full, response dropped");
            return Err(Error::CapacityExceeded(self.capacity));
        }

        let device_type = frame
            .params
            .first()
            .and_then(|&b| DeviceType::from_u8(b))
            .unwrap_or(DeviceType::RollerShutter);
        let peer = DiscoveredPeer {
            node: frame.src,
            device_type,
            manufacturer: frame.params.get(1).copied().unwrap_or(0),
            protocol_version: frame.params.get(2).copied().unwrap_or(0),
            rssi,
            first_seen_at: now_us,
        };
        debug!(node = %peer.node, device_type = %peer.device_type, rssi, "peer discovered");

        self.peers.push(peer.clone());
        Ok(Some(peer))
    }

    /// Close the session, preserving the peer list.
    pub fn stop(&mut self) {
        if self.state != DiscoveryState::Idle {
            self.state = DiscoveryState::Complete;
        }
    }

    /// Clear the peer list and return to `Idle`.
    pub fn reset(&mut self) {
        self.state = DiscoveryState::Idle;
        self.peers.clear();
        self.overflow_dropped = 0;
    }

    /// Expire the session when its timeout has elapsed.
    pub fn tick(&mut self, now_us: u64) {
        if let DiscoveryState::Discovering {
            started_at,
            timeout_us,
            ..
        } = self.state
        {
            if now_us.saturating_sub(started_at) > timeout_us {
                debug!(found = self.peers.len(), "discovery timed out");
                self.state = DiscoveryState::Complete;
            }
        }
    }

    /// Build the 1W key-transfer frame for `peer`.
    ///
    /// The params are the system key wrapped under the transfer key with
    /// the destination address as IV. Unfinalized, like `start`.
    pub fn pair_1w(&self, own: NodeId, peer: NodeId, key: &SystemKey) -> Result<Frame> {
        let envelope = wrap_system_key(key, KeyWrapIv::Node(peer))?;
        Frame::build(
            Mode::OneWay,
            peer,
            own,
            Ctrl1Flags::NONE,
            Command::KEY_TRANSFER_1W,
            &envelope,
        )
    }

    /// Build the 2W key-transfer frame for `peer`, bound to the session
    /// challenge.
    pub fn pair_2w(
        &self,
        own: NodeId,
        peer: NodeId,
        key: &SystemKey,
        challenge: Challenge,
    ) -> Result<Frame> {
        let envelope = wrap_system_key(key, KeyWrapIv::Challenge(challenge))?;
        Frame::build(
            Mode::TwoWay,
            peer,
            own,
            Ctrl1Flags::NONE,
            Command::KEY_TRANSFER_2W,
            &envelope,
        )
    }
}

impl Default for DiscoveryManager {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_CAPACITY)
    }
}
