//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Mode;

/// Engine configuration.
///
/// Durations are humantime strings in the TOML form ("5s", "2ms 700us").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Link mode used by `send_command`.
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Replay acceptance window W for received rolling codes.
    #[serde(default = "default_replay_window")]
    pub replay_window: u16,

    /// Challenge response timeout T.
    #[serde(default = "default_challenge_timeout", with = "humantime_serde")]
    pub challenge_timeout: Duration,

    /// Lifetime of an authenticated 2W session.
    #[serde(default = "default_session_lifetime", with = "humantime_serde")]
    pub session_lifetime: Duration,

    /// FHSS dwell time per channel.
    #[serde(default = "default_hop_dwell", with = "humantime_serde")]
    pub hop_dwell: Duration,

    /// Run the channel hopper. Disabled, all traffic stays on Ch2.
    #[serde(default)]
    pub fhss_enabled: bool,

    /// Capacity of the discovered-peer list.
    #[serde(default = "default_discovery_capacity")]
    pub discovery_capacity: usize,

    /// Liveness window for beacon tracking.
    #[serde(default = "default_beacon_liveness", with = "humantime_serde")]
    pub beacon_liveness: Duration,
}

fn default_mode() -> Mode {
    Mode::OneWay
}
fn default_replay_window() -> u16 {
    100
}
fn default_challenge_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_session_lifetime() -> Duration {
    Duration::from_secs(60)
}
fn default_hop_dwell() -> Duration {
    Duration::from_micros(2_700)
}
fn default_discovery_capacity() -> usize {
    32
}
fn default_beacon_liveness() -> Duration {
    Duration::from_secs(10)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            replay_window: default_replay_window(),
            challenge_timeout: default_challenge_timeout(),
            session_lifetime: default_session_lifetime(),
            hop_dwell: default_hop_dwell(),
            fhss_enabled: false,
            discovery_capacity: default_discovery_capacity(),
            beacon_liveness: default_beacon_liveness(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("failed to write config: {e}")))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.replay_window == 0 {
            return Err(Error::InvalidConfig("replay window must be at least 1".into()));
        }
        if self.hop_dwell.is_zero() {
            return Err(Error::InvalidConfig("hop dwell must be non-zero".into()));
        }
        if self.challenge_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "challenge timeout must be non-zero".into(),
            ));
        }
        if self.discovery_capacity == 0 {
            return Err(Error::InvalidConfig(
                "discovery capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn challenge_timeout_us(&self) -> u64 {
        self.challenge_timeout.as_micros() as u64
    }

    pub(crate) fn session_lifetime_us(&self) -> u64 {
        self.session_lifetime.as_micros() as u64
    }

    pub(crate) fn hop_dwell_us(&self) -> u64 {
        self.hop_dwell.as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, Mode::OneWay);
        assert_eq!(config.replay_window, 100);
        assert_eq!(config.challenge_timeout, Duration::from_secs(5));
        assert_eq!(config.hop_dwell, Duration::from_micros(2_700));
        assert_eq!(config.discovery_capacity, 32);
        assert!(!config.fhss_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            mode = "twoway"
            fhss_enabled = true
            challenge_timeout = "2s"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::TwoWay);
        assert!(config.fhss_enabled);
        assert_eq!(config.challenge_timeout, Duration::from_secs(2));
        // Unspecified fields take defaults
        assert_eq!(config.replay_window, 100);
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let config = EngineConfig {
            replay_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_dwell() {
        let config = EngineConfig {
            hop_dwell: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let config = EngineConfig {
            mode: Mode::TwoWay,
            fhss_enabled: true,
            replay_window: 64,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.mode, Mode::TwoWay);
        assert_eq!(loaded.replay_window, 64);
        assert!(loaded.fhss_enabled);
    }
}
