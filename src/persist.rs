//! Persistent engine state.
//!
//! The layout is `{version, own_node_id, system_key, per_peer_rc}`; the
//! encoding is an implementation detail but must round-trip exactly.
//! [`MemoryVault`] is the in-memory [`KeyVault`] over this state, used by
//! tests and by hosts that handle durability themselves.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::KeyVault;
use crate::types::{NodeId, SystemKey};

/// Current state format version.
pub const STATE_VERSION: u8 = 1;

/// Everything the engine must remember across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    /// Format version for forward migration.
    pub version: u8,
    /// This node's identity.
    pub own_node_id: NodeId,
    /// The shared system key.
    pub system_key: [u8; 16],
    /// Per-peer rolling counters (transmit side).
    pub per_peer_rc: HashMap<NodeId, u16>,
}

impl PersistedState {
    pub fn new(own_node_id: NodeId, system_key: SystemKey) -> Self {
        Self {
            version: STATE_VERSION,
            own_node_id,
            system_key: *system_key.as_bytes(),
            per_peer_rc: HashMap::new(),
        }
    }

    /// Encode for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Persistence(e.to_string()))
    }

    /// Decode from storage, rejecting unknown format versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: Self =
            bincode::deserialize(bytes).map_err(|e| Error::Persistence(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        Ok(state)
    }

    /// Load from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| Error::Persistence(format!("failed to read state: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Save to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)
            .map_err(|e| Error::Persistence(format!("failed to write state: {e}")))
    }
}

/// In-memory key vault over [`PersistedState`].
///
/// Unknown peers read as counter zero, matching a factory-fresh pairing.
#[derive(Debug, Clone)]
pub struct MemoryVault {
    state: PersistedState,
}

impl MemoryVault {
    pub fn new(own_node_id: NodeId, system_key: SystemKey) -> Self {
        Self {
            state: PersistedState::new(own_node_id, system_key),
        }
    }

    pub fn from_state(state: PersistedState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn own_node_id(&self) -> NodeId {
        self.state.own_node_id
    }
}

impl KeyVault for MemoryVault {
    fn system_key(&self) -> Result<SystemKey> {
        Ok(SystemKey::new(self.state.system_key))
    }

    fn load_rc(&self, peer: NodeId) -> Result<u16> {
        Ok(self.state.per_peer_rc.get(&peer).copied().unwrap_or(0))
    }

    fn store_rc(&mut self, peer: NodeId, rc: u16) -> Result<()> {
        self.state.per_peer_rc.insert(peer, rc);
        Ok(())
    }
}
