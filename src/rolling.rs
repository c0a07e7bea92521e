//! Rolling-code allocation and replay protection.
//!
//! Transmit side: a per-peer 16-bit counter allocated monotonically and
//! persisted through the key vault BEFORE the frame leaves the radio, so
//! a power loss can never cause reuse. Receive side: a per-source
//! `last_seen` high-water mark with a modular acceptance window.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{AuthError, ReplayVerdict, Result};
use crate::hal::KeyVault;
use crate::types::NodeId;

/// Default receive acceptance window.
pub const DEFAULT_WINDOW: u16 = 100;

/// Per-peer rolling-code state.
#[derive(Debug)]
pub struct RollingCodeManager {
    /// Acceptance window W: a received code is accepted iff
    /// `(rc - last_seen) mod 2^16` is in `[1, W]`.
    window: u16,
    /// Transmit counters, cached over the vault.
    tx_next: HashMap<NodeId, u16>,
    /// Receive high-water marks per source.
    rx_last_seen: HashMap<NodeId, u16>,
}

impl RollingCodeManager {
    pub fn new(window: u16) -> Self {
        Self {
            window,
            tx_next: HashMap::new(),
            rx_last_seen: HashMap::new(),
        }
    }

    /// Allocate the next transmit code for `peer`.
    ///
    /// The advanced counter is flushed to the vault before the code is
    /// handed out; a vault failure aborts the allocation and the caller
    /// must not send the frame.
    pub fn allocate(&mut self, peer: NodeId, vault: &mut dyn KeyVault) -> Result<u16> {
        let next = match self.tx_next.get(&peer) {
            Some(&cached) => cached,
            None => vault.load_rc(peer)?,
        };

        let code = next;
        let advanced = next.wrapping_add(1);

        // Flush-before-emit: on failure the cache is left untouched and
        // the code is never used.
        vault.store_rc(peer, advanced)?;
        self.tx_next.insert(peer, advanced);

        debug!(peer = %peer, code, "allocated rolling code");
        Ok(code)
    }

    /// Check a received code against the window without updating state.
    ///
    /// Used for broadcast frames, which are verified but must never
    /// advance the per-source counter.
    pub fn check(&self, src: NodeId, rc: u16) -> Result<ReplayVerdict> {
        let Some(&last_seen) = self.rx_last_seen.get(&src) else {
            // First contact with this source; accept and let the caller
            // establish the baseline.
            return Ok(ReplayVerdict::Accept);
        };
        self.verdict(src, rc, last_seen)
    }

    /// Check a received code and, when accepted, advance `last_seen`.
    pub fn check_and_update(&mut self, src: NodeId, rc: u16) -> Result<ReplayVerdict> {
        let verdict = match self.rx_last_seen.get(&src) {
            Some(&last_seen) => self.verdict(src, rc, last_seen)?,
            None => ReplayVerdict::Accept,
        };
        if verdict == ReplayVerdict::Accept {
            self.rx_last_seen.insert(src, rc);
        }
        Ok(verdict)
    }

    fn verdict(&self, src: NodeId, rc: u16, last_seen: u16) -> Result<ReplayVerdict> {
        let delta = rc.wrapping_sub(last_seen);
        if delta == 0 {
            // Same code, valid tag upstream: a duplicate, not an attack
            debug!(src = %src, rc, "duplicate rolling code");
            return Ok(ReplayVerdict::Duplicate);
        }
        if delta > self.window {
            // No fast-forward: resynchronization requires re-pairing
            warn!(src = %src, rc, last_seen, window = self.window, "rolling code outside window");
            return Err(AuthError::ReplayOrOutOfWindow.into());
        }
        Ok(ReplayVerdict::Accept)
    }

    /// Last accepted code from `src`, if any.
    pub fn last_seen(&self, src: NodeId) -> Option<u16> {
        self.rx_last_seen.get(&src).copied()
    }

    /// Forget all receive-side state (testing and re-pairing flows).
    pub fn reset_receive_state(&mut self) {
        self.rx_last_seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::persist::MemoryVault;
    use crate::types::SystemKey;

    fn vault() -> MemoryVault {
        MemoryVault::new(NodeId::new([1, 2, 3]), SystemKey::new([0; 16]))
    }

    #[test]
    fn test_allocation_is_sequential() {
        let mut manager = RollingCodeManager::new(DEFAULT_WINDOW);
        let mut vault = vault();
        let peer = NodeId::new([9, 9, 9]);

        for expected in 0..5u16 {
            assert_eq!(manager.allocate(peer, &mut vault).unwrap(), expected);
        }
    }

    #[test]
    fn test_allocation_survives_restart() {
        let mut vault = vault();
        let peer = NodeId::new([9, 9, 9]);

        let mut manager = RollingCodeManager::new(DEFAULT_WINDOW);
        assert_eq!(manager.allocate(peer, &mut vault).unwrap(), 0);
        assert_eq!(manager.allocate(peer, &mut vault).unwrap(), 1);

        // New manager over the same vault: continues, never reuses
        let mut manager = RollingCodeManager::new(DEFAULT_WINDOW);
        assert_eq!(manager.allocate(peer, &mut vault).unwrap(), 2);
    }

    #[test]
    fn test_allocation_wraps() {
        let mut manager = RollingCodeManager::new(DEFAULT_WINDOW);
        let mut vault = vault();
        let peer = NodeId::new([9, 9, 9]);
        vault.store_rc(peer, 0xFFFF).unwrap();

        assert_eq!(manager.allocate(peer, &mut vault).unwrap(), 0xFFFF);
        assert_eq!(manager.allocate(peer, &mut vault).unwrap(), 0x0000);
    }

    #[test]
    fn test_independent_peers() {
        let mut manager = RollingCodeManager::new(DEFAULT_WINDOW);
        let mut vault = vault();
        let a = NodeId::new([0xA, 0, 0]);
        let b = NodeId::new([0xB, 0, 0]);

        assert_eq!(manager.allocate(a, &mut vault).unwrap(), 0);
        assert_eq!(manager.allocate(a, &mut vault).unwrap(), 1);
        assert_eq!(manager.allocate(b, &mut vault).unwrap(), 0);
    }

    #[test]
    fn test_replay_window_scenario() {
        // Codes 5, 6, 7, 7, 6, 200 with W=100:
        // accept, accept, accept, duplicate, reject, reject
        let mut manager = RollingCodeManager::new(100);
        let src = NodeId::new([7, 7, 7]);

        assert_eq!(
            manager.check_and_update(src, 5).unwrap(),
            ReplayVerdict::Accept
        );
        assert_eq!(
            manager.check_and_update(src, 6).unwrap(),
            ReplayVerdict::Accept
        );
        assert_eq!(
            manager.check_and_update(src, 7).unwrap(),
            ReplayVerdict::Accept
        );
        assert_eq!(
            manager.check_and_update(src, 7).unwrap(),
            ReplayVerdict::Duplicate
        );
        assert!(matches!(
            manager.check_and_update(src, 6),
            Err(Error::Auth(AuthError::ReplayOrOutOfWindow))
        ));
        assert!(matches!(
            manager.check_and_update(src, 200),
            Err(Error::Auth(AuthError::ReplayOrOutOfWindow))
        ));

        // State unchanged by the rejections
        assert_eq!(manager.last_seen(src), Some(7));
    }

    #[test]
    fn test_window_boundary() {
        let mut manager = RollingCodeManager::new(100);
        let src = NodeId::new([7, 7, 7]);

        manager.check_and_update(src, 0).unwrap();
        // Exactly at the window edge
        assert_eq!(
            manager.check_and_update(src, 100).unwrap(),
            ReplayVerdict::Accept
        );
        // One beyond
        assert!(manager.check_and_update(src, 201).is_err());
    }

    #[test]
    fn test_wraparound_accepted_within_window() {
        let mut manager = RollingCodeManager::new(100);
        let src = NodeId::new([7, 7, 7]);

        manager.check_and_update(src, 0xFFF0).unwrap();
        // 0xFFF0 -> 0x0010 is a modular advance of 0x20, inside W
        assert_eq!(
            manager.check_and_update(src, 0x0010).unwrap(),
            ReplayVerdict::Accept
        );
    }

    #[test]
    fn test_check_does_not_advance() {
        let mut manager = RollingCodeManager::new(100);
        let src = NodeId::new([7, 7, 7]);

        manager.check_and_update(src, 10).unwrap();
        assert_eq!(manager.check(src, 11).unwrap(), ReplayVerdict::Accept);
        assert_eq!(manager.check(src, 11).unwrap(), ReplayVerdict::Accept);
        assert_eq!(manager.last_seen(src), Some(10));
    }

    #[test]
    fn test_vault_failure_blocks_allocation() {
        struct FailingVault;
        impl KeyVault for FailingVault {
            fn system_key(&self) -> Result<SystemKey> {
                Ok(SystemKey::new([0; 16]))
            }
            fn load_rc(&self, _peer: NodeId) -> Result<u16> {
                Ok(0)
            }
            fn store_rc(&mut self, _peer: NodeId, _rc: u16) -> Result<()> {
                Err(Error::KeyVaultFailure("flash write failed".into()))
            }
        }

        let mut manager = RollingCodeManager::new(DEFAULT_WINDOW);
        let peer = NodeId::new([9, 9, 9]);
        assert!(matches!(
            manager.allocate(peer, &mut FailingVault),
            Err(Error::KeyVaultFailure(_))
        ));
    }
}
