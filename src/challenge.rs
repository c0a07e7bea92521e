//! Challenge-response authentication for 2W sessions.
//!
//! Per-peer state machine:
//!
//! ```text
//! Idle ──generate_challenge──▶ ChallengeSent
//! ChallengeSent ──valid response within T──▶ Authenticated
//! ChallengeSent ──elapsed > T or invalid──▶ Idle
//! Authenticated ──reset / session end──▶ Idle
//! ```
//!
//! At most one outstanding challenge per peer; minting a new one
//! implicitly abandons the previous. Responders never store a received
//! challenge, they echo it straight back with a bound tag.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::frame::{Ctrl1Flags, Frame};
use crate::hal::RandomSource;
use crate::types::{Challenge, Command, Mode, NodeId, SystemKey};

/// Default response timeout T.
pub const DEFAULT_CHALLENGE_TIMEOUT_US: u64 = 5_000_000;

/// Default lifetime of an authenticated session.
pub const DEFAULT_SESSION_LIFETIME_US: u64 = 60_000_000;

/// Authentication state for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ChallengeSent {
        challenge: Challenge,
        started_at: u64,
    },
    /// The challenge is retained so subsequent sends can bind to it.
    Authenticated {
        challenge: Challenge,
        until: u64,
    },
}

/// Tracks challenge-response sessions across peers.
#[derive(Debug)]
pub struct ChallengeManager {
    timeout_us: u64,
    session_lifetime_us: u64,
    sessions: HashMap<NodeId, SessionState>,
}

impl ChallengeManager {
    pub fn new(timeout_us: u64, session_lifetime_us: u64) -> Self {
        Self {
            timeout_us,
            session_lifetime_us,
            sessions: HashMap::new(),
        }
    }

    /// Mint a fresh 6-byte challenge for `peer` and move it to
    /// `ChallengeSent`. The returned value becomes the params of a
    /// challenge-request frame.
    pub fn generate_challenge(
        &mut self,
        peer: NodeId,
        rng: &mut dyn RandomSource,
        now_us: u64,
    ) -> Challenge {
        let mut bytes = [0u8; 6];
        rng.fill(&mut bytes);
        let challenge = Challenge::new(bytes);

        self.sessions.insert(
            peer,
            SessionState::ChallengeSent {
                challenge,
                started_at: now_us,
            },
        );
        debug!(peer = %peer, "challenge issued");
        challenge
    }

    /// Validate a challenge-response frame from `peer`.
    ///
    /// Requires an outstanding challenge, a `0x3D` command, arrival
    /// within T, and a tag bound to the stored challenge. Success moves
    /// the session to `Authenticated`; a timeout or an invalid tag drops
    /// it back to `Idle`.
    pub fn verify_response(
        &mut self,
        peer: NodeId,
        frame: &Frame,
        key: &SystemKey,
        now_us: u64,
    ) -> Result<()> {
        let SessionState::ChallengeSent {
            challenge,
            started_at,
        } = self.state(peer)
        else {
            return Err(AuthError::WrongState.into());
        };

        if now_us.saturating_sub(started_at) > self.timeout_us {
            warn!(peer = %peer, "challenge timed out");
            self.sessions.insert(peer, SessionState::Idle);
            return Err(AuthError::SessionExpired.into());
        }

        if frame.cmd != Command::CHALLENGE_RESPONSE {
            return Err(AuthError::WrongState.into());
        }

        if let Err(e) = frame.validate(Some(key), Some(challenge)) {
            self.sessions.insert(peer, SessionState::Idle);
            return Err(e);
        }

        self.sessions.insert(
            peer,
            SessionState::Authenticated {
                challenge,
                until: now_us + self.session_lifetime_us,
            },
        );
        debug!(peer = %peer, "peer authenticated");
        Ok(())
    }

    /// The binding for a 2W transmit to `peer`: the challenge of its
    /// live authenticated session.
    ///
    /// `WrongState` without a session, `SessionExpired` when the session
    /// has lapsed (the session is dropped to `Idle`).
    pub fn session_binding(&mut self, peer: NodeId, now_us: u64) -> Result<Challenge> {
        match self.state(peer) {
            SessionState::Authenticated { challenge, until } => {
                if now_us > until {
                    self.sessions.insert(peer, SessionState::Idle);
                    Err(AuthError::SessionExpired.into())
                } else {
                    Ok(challenge)
                }
            }
            _ => Err(AuthError::WrongState.into()),
        }
    }

    /// The challenge currently associated with `peer`, in any live state.
    pub fn current_challenge(&self, peer: NodeId) -> Option<Challenge> {
        match self.state(peer) {
            SessionState::ChallengeSent { challenge, .. }
            | SessionState::Authenticated { challenge, .. } => Some(challenge),
            SessionState::Idle => None,
        }
    }

    /// Current state for `peer`.
    pub fn state(&self, peer: NodeId) -> SessionState {
        self.sessions
            .get(&peer)
            .copied()
            .unwrap_or(SessionState::Idle)
    }

    /// Drop `peer` back to `Idle`. Never an error.
    pub fn reset(&mut self, peer: NodeId) {
        self.sessions.insert(peer, SessionState::Idle);
    }

    /// Expire outstanding challenges and lapsed sessions.
    pub fn tick(&mut self, now_us: u64) {
        for (peer, state) in self.sessions.iter_mut() {
            match *state {
                SessionState::ChallengeSent { started_at, .. }
                    if now_us.saturating_sub(started_at) > self.timeout_us =>
                {
                    debug!(peer = %peer, "challenge expired");
                    *state = SessionState::Idle;
                }
                SessionState::Authenticated { until, .. } if now_us > until => {
                    debug!(peer = %peer, "session expired");
                    *state = SessionState::Idle;
                }
                _ => {}
            }
        }
    }

    /// Build the responder-side echo for a received challenge request.
    ///
    /// The response carries the received challenge as params and a tag
    /// bound to that same challenge; the responder stores nothing.
    pub fn build_response(own: NodeId, request: &Frame, key: &SystemKey) -> Result<Frame> {
        let challenge =
            Challenge::from_slice(&request.params).ok_or(AuthError::MissingChallenge)?;

        let mut response = Frame::build(
            Mode::TwoWay,
            request.src,
            own,
            Ctrl1Flags::NONE.with_version(request.ctrl1.version()),
            Command::CHALLENGE_RESPONSE,
            challenge.as_bytes(),
        )?;
        response.finalize(key, Some(challenge))?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedRandom(u8);
    impl RandomSource for FixedRandom {
        fn fill(&mut self, buf: &mut [u8]) {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self.0.wrapping_add(i as u8);
            }
        }
    }

    fn key() -> SystemKey {
        SystemKey::new([0x42; 16])
    }

    fn peer() -> NodeId {
        NodeId::new([0xAB, 0xCD, 0xEF])
    }

    fn own() -> NodeId {
        NodeId::new([0x01, 0x02, 0x03])
    }

    fn manager() -> ChallengeManager {
        ChallengeManager::new(DEFAULT_CHALLENGE_TIMEOUT_US, DEFAULT_SESSION_LIFETIME_US)
    }

    fn response_for(challenge: Challenge) -> Frame {
        let mut frame = Frame::build(
            Mode::TwoWay,
            own(),
            peer(),
            Ctrl1Flags::NONE,
            Command::CHALLENGE_RESPONSE,
            challenge.as_bytes(),
        )
        .unwrap();
        frame.finalize(&key(), Some(challenge)).unwrap();
        frame
    }

    #[test]
    fn test_round_trip_authenticates() {
        let mut manager = manager();
        let challenge = manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);

        let response = response_for(challenge);
        assert!(manager.verify_response(peer(), &response, &key(), 1_000).is_ok());
        assert!(matches!(
            manager.state(peer()),
            SessionState::Authenticated { .. }
        ));
        assert_eq!(manager.session_binding(peer(), 2_000).unwrap(), challenge);
    }

    #[test]
    fn test_response_at_timeout_boundary() {
        let mut manager = manager();
        let challenge = manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);
        let response = response_for(challenge);

        // Exactly T after issue is still valid
        assert!(manager
            .verify_response(peer(), &response, &key(), DEFAULT_CHALLENGE_TIMEOUT_US)
            .is_ok());
    }

    #[test]
    fn test_late_response_rejected() {
        let mut manager = manager();
        let challenge = manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);
        let response = response_for(challenge);

        assert!(matches!(
            manager.verify_response(
                peer(),
                &response,
                &key(),
                DEFAULT_CHALLENGE_TIMEOUT_US + 1
            ),
            Err(Error::Auth(AuthError::SessionExpired))
        ));
        assert_eq!(manager.state(peer()), SessionState::Idle);
    }

    #[test]
    fn test_response_without_challenge_rejected() {
        let mut manager = manager();
        let response = response_for(Challenge::new([1, 2, 3, 4, 5, 6]));
        assert!(matches!(
            manager.verify_response(peer(), &response, &key(), 0),
            Err(Error::Auth(AuthError::WrongState))
        ));
    }

    #[test]
    fn test_stale_challenge_rejected() {
        // A response bound to a previous challenge fails after a new one
        // is minted.
        let mut manager = manager();
        let old = manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);
        let response = response_for(old);

        let _new = manager.generate_challenge(peer(), &mut FixedRandom(0x99), 100);
        assert!(matches!(
            manager.verify_response(peer(), &response, &key(), 200),
            Err(Error::Auth(AuthError::InvalidTag))
        ));
        // An invalid response cancels the outstanding challenge
        assert_eq!(manager.state(peer()), SessionState::Idle);
    }

    #[test]
    fn test_wrong_command_rejected() {
        let mut manager = manager();
        let challenge = manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);

        let mut wrong = Frame::build(
            Mode::TwoWay,
            own(),
            peer(),
            Ctrl1Flags::NONE,
            Command::PING,
            challenge.as_bytes(),
        )
        .unwrap();
        wrong.finalize(&key(), Some(challenge)).unwrap();

        assert!(matches!(
            manager.verify_response(peer(), &wrong, &key(), 100),
            Err(Error::Auth(AuthError::WrongState))
        ));
    }

    #[test]
    fn test_session_expiry() {
        let mut manager = ChallengeManager::new(DEFAULT_CHALLENGE_TIMEOUT_US, 1_000);
        let challenge = manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);
        let response = response_for(challenge);
        manager.verify_response(peer(), &response, &key(), 100).unwrap();

        // Session lives until 1_100
        assert!(manager.session_binding(peer(), 1_100).is_ok());
        assert!(matches!(
            manager.session_binding(peer(), 1_101),
            Err(Error::Auth(AuthError::SessionExpired))
        ));
        assert_eq!(manager.state(peer()), SessionState::Idle);
    }

    #[test]
    fn test_tick_expires_challenges_and_sessions() {
        let mut manager = ChallengeManager::new(1_000, 2_000);
        let a = NodeId::new([0xA, 0, 0]);
        let b = NodeId::new([0xB, 0, 0]);

        manager.generate_challenge(a, &mut FixedRandom(1), 0);
        manager.generate_challenge(b, &mut FixedRandom(2), 500);

        manager.tick(1_200);
        assert_eq!(manager.state(a), SessionState::Idle);
        assert!(matches!(
            manager.state(b),
            SessionState::ChallengeSent { .. }
        ));
    }

    #[test]
    fn test_reset() {
        let mut manager = manager();
        manager.generate_challenge(peer(), &mut FixedRandom(0x10), 0);
        manager.reset(peer());
        assert_eq!(manager.state(peer()), SessionState::Idle);
    }

    #[test]
    fn test_responder_echo() {
        let challenge = Challenge::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let mut request = Frame::build(
            Mode::TwoWay,
            peer(),
            own(),
            Ctrl1Flags::NONE,
            Command::CHALLENGE_REQUEST,
            challenge.as_bytes(),
        )
        .unwrap();
        request.finalize(&key(), Some(challenge)).unwrap();

        let response = ChallengeManager::build_response(peer(), &request, &key()).unwrap();
        assert_eq!(response.cmd, Command::CHALLENGE_RESPONSE);
        assert_eq!(response.dest, own());
        assert_eq!(response.src, peer());
        assert_eq!(response.params, challenge.as_bytes());
        assert!(response.validate(Some(&key()), Some(challenge)).is_ok());
    }

    #[test]
    fn test_malformed_request_params() {
        let request = Frame::build(
            Mode::TwoWay,
            peer(),
            own(),
            Ctrl1Flags::NONE,
            Command::CHALLENGE_REQUEST,
            &[1, 2, 3], // not 6 bytes
        )
        .unwrap();

        assert!(matches!(
            ChallengeManager::build_response(peer(), &request, &key()),
            Err(Error::Auth(AuthError::MissingChallenge))
        ));
    }
}
