//! # iohc
//!
//! Protocol engine for a half-duplex 868 MHz radio control system for
//! roller shutters, blinds and roof windows.
//!
//! The engine builds, authenticates, serializes, parses and validates
//! link-layer frames; maintains replay protection via a rolling counter;
//! performs challenge-response authentication for the bidirectional
//! variant; drives a three-channel frequency-hopping schedule; and
//! manages device discovery and encrypted session-key distribution.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Controller facade                         │
//! ├──────────────┬──────────────┬───────────────┬───────────────────┤
//! │ Rolling-code │  Challenge   │    Channel    │    Discovery      │
//! │   manager    │   manager    │    hopper     │     manager       │
//! ├──────────────┴──────────────┴───────────────┴───────────────────┤
//! │              Frame codec (build / parse / validate)             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │    Crypto primitives (CRC-16, checksum, AES-128-ECB, tags)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        HAL traits (radio, clock, entropy, key vault)            │
//! └─────────────────────────────────────────────────────────────────┘
//!
//! The engine is single-threaded and cooperative; it never blocks and
//! has no suspension points. Drive it by alternating `tick(now)` with
//! `send_command`/`receive_once`.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]      // Many functions can't be const due to trait bounds
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]        // Numeric literals are clear
#![allow(clippy::cast_possible_truncation)]  // Intentional wire-width narrowing
#![allow(clippy::cast_sign_loss)]            // RSSI handling is explicit
#![allow(clippy::cast_precision_loss)]       // Acceptable for frequency math
#![allow(clippy::match_same_arms)]           // Explicit arm per variant is clearer
#![allow(clippy::option_if_let_else)]        // More readable in context
#![allow(clippy::use_self)]                  // Explicit type names in matches
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use

pub mod beacon;
pub mod challenge;
pub mod config;
pub mod controller;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod hal;
pub mod hopper;
pub mod persist;
pub mod rolling;
pub mod types;

pub use config::EngineConfig;
pub use controller::{Controller, Event};
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version carried in the Ctrl1 low nibble
pub const PROTOCOL_VERSION: u8 = 0;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::beacon::{BeaconObservation, BeaconTracker};
    pub use crate::challenge::{ChallengeManager, SessionState};
    pub use crate::config::EngineConfig;
    pub use crate::controller::{Controller, Event};
    pub use crate::discovery::{DiscoveredPeer, DiscoveryFilter, DiscoveryManager, DiscoveryState};
    pub use crate::error::{Error, Result};
    pub use crate::frame::{Ctrl1Flags, Frame};
    pub use crate::hal::{KeyVault, MonotonicClock, RadioSink, RadioSource, RandomSource};
    pub use crate::hopper::ChannelHopper;
    pub use crate::persist::{MemoryVault, PersistedState};
    pub use crate::rolling::RollingCodeManager;
    pub use crate::types::*;
}
