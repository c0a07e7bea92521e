//! Three-channel frequency-hopping schedule.
//!
//! A round-robin over Ch1 -> Ch2 -> Ch3 with a fixed dwell, driven by
//! polling the monotonic clock. Disabled, the hopper pins Ch2, the rest
//! channel; 1W traffic bypasses it entirely.

use tracing::trace;

use crate::types::Channel;

/// Default dwell time per channel: 2.7 ms.
pub const DEFAULT_DWELL_US: u64 = 2_700;

/// Poll-driven FHSS scheduler.
#[derive(Debug, Clone)]
pub struct ChannelHopper {
    current: Channel,
    last_hop_us: u64,
    dwell_us: u64,
    enabled: bool,
}

impl ChannelHopper {
    pub fn new(dwell_us: u64) -> Self {
        Self {
            current: Channel::Ch2,
            last_hop_us: 0,
            dwell_us,
            enabled: false,
        }
    }

    /// Start hopping, anchored at `now_us`.
    pub fn enable(&mut self, now_us: u64) {
        self.enabled = true;
        self.last_hop_us = now_us;
    }

    /// Stop hopping and pin Ch2.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.current = Channel::Ch2;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The channel a radio should be tuned to right now.
    pub fn current(&self) -> Channel {
        if self.enabled {
            self.current
        } else {
            Channel::Ch2
        }
    }

    /// Advance one state when a full dwell has elapsed.
    ///
    /// Returns `true` when a hop occurred. Exactly one transition per
    /// call; the caller's poll cadence must stay below the dwell.
    pub fn tick(&mut self, now_us: u64) -> bool {
        if !self.enabled {
            return false;
        }
        if now_us.saturating_sub(self.last_hop_us) >= self.dwell_us {
            self.current = self.current.next();
            self.last_hop_us = now_us;
            trace!(channel = %self.current, "hop");
            return true;
        }
        false
    }

    /// Microseconds of dwell remaining before the next hop is due.
    pub fn time_until_next_hop_us(&self, now_us: u64) -> u64 {
        self.dwell_us
            .saturating_sub(now_us.saturating_sub(self.last_hop_us))
    }

    /// Claim a dwell slot long enough for a transmission of
    /// `air_time_us`.
    ///
    /// When the remaining dwell is too short the hopper advances first,
    /// so the transmit starts at the beginning of a fresh dwell and is
    /// never cut by a hop.
    pub fn acquire_transmit_slot(&mut self, now_us: u64, air_time_us: u64) -> Channel {
        if !self.enabled {
            return Channel::Ch2;
        }
        if self.time_until_next_hop_us(now_us) < air_time_us {
            self.current = self.current.next();
            self.last_hop_us = now_us;
            trace!(channel = %self.current, "hop forced ahead of transmit");
        }
        self.current
    }

    /// Return to the rest channel, re-anchored at `now_us`.
    pub fn reset(&mut self, now_us: u64) {
        self.current = Channel::Ch2;
        self.last_hop_us = now_us;
    }
}
