//! Controller facade.
//!
//! Composes the frame codec, rolling-code manager, challenge manager,
//! channel hopper, beacon tracker and discovery manager behind a single
//! engine object. All collaborators are injected as capability objects;
//! events are returned as values, never pushed through callbacks.
//!
//! The engine is single-threaded and cooperative: every operation
//! returns promptly, long-running work is a state machine advanced by
//! [`Controller::tick`]. Hosts with threads wrap the whole controller in
//! a mutex.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::beacon::{BeaconObservation, BeaconTracker};
use crate::challenge::{ChallengeManager, SessionState};
use crate::config::EngineConfig;
use crate::discovery::{DiscoveredPeer, DiscoveryFilter, DiscoveryManager, DiscoveryState};
use crate::error::{AuthError, Error, ReplayVerdict, Result};
use crate::frame::{self, Ctrl1Flags, Frame};
use crate::hal::{
    air_time_us, KeyVault, MonotonicClock, RadioSink, RadioSource, RandomSource, Received,
};
use crate::hopper::ChannelHopper;
use crate::rolling::RollingCodeManager;
use crate::types::{Challenge, Channel, Command, LinkStats, Mode, NodeId, SystemKey};

/// One received engine event.
#[derive(Debug, Clone)]
pub enum Event {
    /// A validated application frame.
    Frame {
        frame: Frame,
        rssi: i16,
        snr: f32,
    },
    /// A beacon observation.
    Beacon(BeaconObservation),
    /// A discovery response that created a new peer entry.
    DiscoveryResponse(DiscoveredPeer),
    /// A challenge response validated; the peer is authenticated.
    ChallengeAccepted { peer: NodeId },
}

/// The iohc protocol engine.
pub struct Controller {
    config: EngineConfig,
    own_id: NodeId,
    key: SystemKey,

    radio_tx: Box<dyn RadioSink>,
    radio_rx: Box<dyn RadioSource>,
    clock: Box<dyn MonotonicClock>,
    rng: Box<dyn RandomSource>,
    vault: Box<dyn KeyVault>,

    rolling: RollingCodeManager,
    challenges: ChallengeManager,
    hopper: ChannelHopper,
    beacons: BeaconTracker,
    discovery: DiscoveryManager,

    stats: LinkStats,
    // Serializes transmit paths: rolling codes must hit the air in
    // allocation order and a transmit must stay inside its dwell slot.
    send_lock: Mutex<()>,
}

impl Controller {
    /// Build an engine over its collaborators.
    ///
    /// Reads the system key from the vault once; the vault stays
    /// read-only afterwards except for rolling-counter flushes.
    pub fn new(
        config: EngineConfig,
        own_id: NodeId,
        radio_tx: Box<dyn RadioSink>,
        radio_rx: Box<dyn RadioSource>,
        clock: Box<dyn MonotonicClock>,
        rng: Box<dyn RandomSource>,
        vault: Box<dyn KeyVault>,
    ) -> Result<Self> {
        config.validate()?;
        let key = vault.system_key()?;

        let mut hopper = ChannelHopper::new(config.hop_dwell_us());
        if config.fhss_enabled {
            hopper.enable(clock.now_us());
        }

        Ok(Self {
            rolling: RollingCodeManager::new(config.replay_window),
            challenges: ChallengeManager::new(
                config.challenge_timeout_us(),
                config.session_lifetime_us(),
            ),
            hopper,
            beacons: BeaconTracker::new(),
            discovery: DiscoveryManager::new(config.discovery_capacity),
            stats: LinkStats::default(),
            send_lock: Mutex::new(()),
            config,
            own_id,
            key,
            radio_tx,
            radio_rx,
            clock,
            rng,
            vault,
        })
    }

    pub fn own_id(&self) -> NodeId {
        self.own_id
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// The channel the engine currently expects the radio to sit on.
    pub fn current_channel(&self) -> Channel {
        self.hopper.current()
    }

    pub fn session_state(&self, peer: NodeId) -> SessionState {
        self.challenges.state(peer)
    }

    pub fn discovery_state(&self) -> DiscoveryState {
        self.discovery.state()
    }

    /// Copies of the discovered peers.
    pub fn discovered_peers(&self) -> Vec<DiscoveredPeer> {
        self.discovery.peers().to_vec()
    }

    pub fn beacons(&self) -> &BeaconTracker {
        &self.beacons
    }

    // ------------------------------------------------------------------
    // Transmit
    // ------------------------------------------------------------------

    /// Send a command in the configured mode.
    ///
    /// 1W allocates and persists a rolling code before anything is
    /// emitted. 2W requires a live authenticated session with `dest`;
    /// use [`Controller::send_command_bound`] to supply a challenge
    /// explicitly.
    pub fn send_command(&mut self, dest: NodeId, cmd: Command, params: &[u8]) -> Result<()> {
        match self.config.mode {
            Mode::OneWay => {
                let frame = Frame::build(
                    Mode::OneWay,
                    dest,
                    self.own_id,
                    Ctrl1Flags::NONE,
                    cmd,
                    params,
                )?;
                self.send_one_way(frame)
            }
            Mode::TwoWay => {
                if dest.is_broadcast() {
                    return Err(AuthError::BroadcastNotAllowed.into());
                }
                let now = self.clock.now_us();
                let challenge = self.challenges.session_binding(dest, now)?;
                self.send_two_way(dest, cmd, params, challenge)
            }
        }
    }

    /// Send a 2W command bound to an explicit challenge, bypassing the
    /// session lookup.
    pub fn send_command_bound(
        &mut self,
        dest: NodeId,
        cmd: Command,
        params: &[u8],
        challenge: Challenge,
    ) -> Result<()> {
        if dest.is_broadcast() {
            return Err(AuthError::BroadcastNotAllowed.into());
        }
        self.send_two_way(dest, cmd, params, challenge)
    }

    /// Move an actuator to `pct` percent open.
    pub fn set_position(&mut self, dest: NodeId, pct: u8) -> Result<()> {
        self.send_command(dest, Command::SET_POSITION, &[pct, 0x00])
    }

    /// Fully open an actuator.
    pub fn open(&mut self, dest: NodeId) -> Result<()> {
        self.set_position(dest, 100)
    }

    /// Fully close an actuator.
    pub fn close(&mut self, dest: NodeId) -> Result<()> {
        self.set_position(dest, 0)
    }

    /// Halt actuator movement.
    pub fn stop(&mut self, dest: NodeId) -> Result<()> {
        self.send_command(dest, Command::STOP, &[0x00])
    }

    /// Service ping.
    pub fn ping(&mut self, dest: NodeId) -> Result<()> {
        self.send_command(dest, Command::PING, &[])
    }

    fn send_one_way(&mut self, mut frame: Frame) -> Result<()> {
        let code = self.rolling.allocate(frame.dest, &mut *self.vault)?;
        frame.set_rolling_code(code);
        frame.finalize(&self.key, None)?;
        self.transmit_frame(&frame)
    }

    fn send_two_way(
        &mut self,
        dest: NodeId,
        cmd: Command,
        params: &[u8],
        challenge: Challenge,
    ) -> Result<()> {
        let mut frame = Frame::build(
            Mode::TwoWay,
            dest,
            self.own_id,
            Ctrl1Flags::NONE,
            cmd,
            params,
        )?;
        frame.finalize(&self.key, Some(challenge))?;
        self.transmit_frame(&frame)
    }

    /// Serialize and hand a finalized frame to the radio.
    ///
    /// 1W traffic always goes out on Ch2; 2W traffic claims a dwell slot
    /// wide enough for the frame's air time, hopping early if the current
    /// dwell cannot fit it.
    fn transmit_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.serialize();
        let now = self.clock.now_us();

        let _slot = self.send_lock.lock();
        let channel = if frame.mode.is_one_way() {
            Channel::Ch2
        } else {
            self.hopper.acquire_transmit_slot(now, air_time_us(bytes.len()))
        };

        self.radio_tx.set_frequency(channel.frequency_mhz())?;
        self.radio_tx.transmit(&bytes)?;
        self.stats.frames_tx += 1;
        debug!(frame = %frame, channel = %channel, "transmitted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------

    /// Pull at most one event from the radio. Never blocks.
    ///
    /// Structural and integrity faults are absorbed: the frame is
    /// dropped, a counter is bumped, `Ok(None)` comes back. Collaborator
    /// failures surface.
    pub fn receive_once(&mut self) -> Result<Option<Event>> {
        let Some(received) = self.radio_rx.try_receive() else {
            return Ok(None);
        };
        let now = self.clock.now_us();

        match self.process_received(&received, now) {
            Ok(event) => Ok(event),
            Err(Error::CapacityExceeded(_)) => {
                self.stats.discovery_overflow += 1;
                Ok(None)
            }
            Err(e) if e.is_recoverable_on_receive() => {
                self.count_drop(&e);
                debug!(error = %e, "frame dropped");
                Ok(None)
            }
            Err(e) if matches!(
                e,
                Error::Auth(AuthError::WrongState | AuthError::SessionExpired)
            ) =>
            {
                // Unsolicited or late challenge traffic is not the
                // caller's problem
                self.stats.dropped_session += 1;
                debug!(error = %e, "session frame dropped");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "receive failed");
                Err(e)
            }
        }
    }

    fn process_received(&mut self, rx: &Received, now: u64) -> Result<Option<Event>> {
        let frame = frame::parse(&rx.bytes)?;

        // CRC gates everything else
        frame.validate(None, None)?;

        // Beacons: 1W beacons authenticate like any 1W frame; 2W beacons
        // carry no verifiable binding before a session exists, so the CRC
        // is all there is.
        if frame.is_beacon() {
            if frame.mode.is_one_way() {
                frame.validate(Some(&self.key), None)?;
                if self.gate_one_way(&frame)? == ReplayVerdict::Duplicate {
                    self.stats.duplicates += 1;
                    return Ok(None);
                }
            }
            let Some(observation) = self.beacons.observe(&frame, rx.rssi, rx.snr, now) else {
                return Ok(None);
            };
            self.stats.frames_rx += 1;
            return Ok(Some(Event::Beacon(observation)));
        }

        // Discovery responses arrive from devices that do not share our
        // system key yet; the open session window plus CRC is the gate.
        if self.discovery.is_discovering() && frame.cmd.is_discovery() {
            let peer = self.discovery.ingest(&frame, rx.rssi, now)?;
            self.stats.frames_rx += 1;
            return Ok(peer.map(Event::DiscoveryResponse));
        }

        match frame.mode {
            Mode::OneWay => {
                frame.validate(Some(&self.key), None)?;
                if self.gate_one_way(&frame)? == ReplayVerdict::Duplicate {
                    self.stats.duplicates += 1;
                    return Ok(None);
                }
            }
            Mode::TwoWay => {
                if frame.cmd == Command::CHALLENGE_REQUEST {
                    // The request's tag binds to the challenge it carries
                    let challenge = Challenge::from_slice(&frame.params)
                        .ok_or(AuthError::MissingChallenge)?;
                    frame.validate(Some(&self.key), Some(challenge))?;
                } else if frame.cmd == Command::CHALLENGE_RESPONSE {
                    self.challenges
                        .verify_response(frame.src, &frame, &self.key, now)?;
                    self.stats.frames_rx += 1;
                    return Ok(Some(Event::ChallengeAccepted { peer: frame.src }));
                } else {
                    let challenge = self
                        .challenges
                        .current_challenge(frame.src)
                        .ok_or(AuthError::MissingChallenge)?;
                    frame.validate(Some(&self.key), Some(challenge))?;
                }
            }
        }

        self.stats.frames_rx += 1;
        Ok(Some(Event::Frame {
            frame,
            rssi: rx.rssi,
            snr: rx.snr,
        }))
    }

    /// Replay-window check for a validated 1W frame.
    ///
    /// Broadcast frames are checked but never advance the per-source
    /// counter.
    fn gate_one_way(&mut self, frame: &Frame) -> Result<ReplayVerdict> {
        if frame.is_broadcast() {
            self.rolling.check(frame.src, frame.rolling_code)
        } else {
            self.rolling.check_and_update(frame.src, frame.rolling_code)
        }
    }

    fn count_drop(&mut self, e: &Error) {
        match e {
            Error::Frame(_) => self.stats.dropped_parse += 1,
            Error::Auth(AuthError::CrcMismatch) => self.stats.dropped_crc += 1,
            Error::Auth(AuthError::InvalidTag) => self.stats.dropped_tag += 1,
            Error::Auth(AuthError::MissingChallenge) => {
                self.stats.dropped_missing_challenge += 1;
            }
            Error::Auth(AuthError::ReplayOrOutOfWindow) => self.stats.dropped_replay += 1,
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Session and discovery lifecycle
    // ------------------------------------------------------------------

    /// Initiate challenge-response authentication with `peer`.
    ///
    /// Emits the challenge-request frame and leaves the session in
    /// `ChallengeSent` until the response arrives or T expires.
    pub fn authenticate(&mut self, peer: NodeId) -> Result<Challenge> {
        if peer.is_broadcast() {
            return Err(AuthError::BroadcastNotAllowed.into());
        }
        let now = self.clock.now_us();
        let challenge = self
            .challenges
            .generate_challenge(peer, &mut *self.rng, now);

        let mut frame = Frame::build(
            Mode::TwoWay,
            peer,
            self.own_id,
            Ctrl1Flags::NONE,
            Command::CHALLENGE_REQUEST,
            challenge.as_bytes(),
        )?;
        frame.finalize(&self.key, Some(challenge))?;
        self.transmit_frame(&frame)?;
        Ok(challenge)
    }

    /// Responder side: echo a received challenge request.
    pub fn respond_to_challenge(&mut self, request: &Frame) -> Result<()> {
        let response = ChallengeManager::build_response(self.own_id, request, &self.key)?;
        self.transmit_frame(&response)
    }

    /// Drop the session with `peer` back to idle.
    pub fn reset_session(&mut self, peer: NodeId) {
        self.challenges.reset(peer);
    }

    /// Open a discovery session and broadcast the probe.
    pub fn discover(&mut self, filter: DiscoveryFilter, timeout_us: u64) -> Result<()> {
        let now = self.clock.now_us();
        let probe = self
            .discovery
            .start(self.own_id, filter, timeout_us, now)?;
        self.send_one_way(probe)
    }

    /// Close the discovery session, keeping its results.
    pub fn stop_discovery(&mut self) {
        self.discovery.stop();
    }

    /// Clear discovery results.
    pub fn reset_discovery(&mut self) {
        self.discovery.reset();
    }

    /// Transfer the system key to a discovered peer.
    ///
    /// 1W wraps the key against the peer's address. 2W binds the
    /// envelope and the frame tag to the peer's live challenge, so a
    /// challenge exchange must be in flight or authenticated.
    pub fn pair(&mut self, peer: NodeId, mode: Mode) -> Result<()> {
        match mode {
            Mode::OneWay => {
                let frame = self.discovery.pair_1w(self.own_id, peer, &self.key)?;
                self.send_one_way(frame)
            }
            Mode::TwoWay => {
                let challenge = self
                    .challenges
                    .current_challenge(peer)
                    .ok_or(AuthError::WrongState)?;
                let mut frame =
                    self.discovery
                        .pair_2w(self.own_id, peer, &self.key, challenge)?;
                frame.finalize(&self.key, Some(challenge))?;
                self.transmit_frame(&frame)
            }
        }
    }

    /// Advance time-driven state: the hop schedule, challenge timeouts
    /// and the discovery window.
    pub fn tick(&mut self, now_us: u64) {
        if self.hopper.tick(now_us) {
            // Keep the receiver tuned to the schedule
            let mhz = self.hopper.current().frequency_mhz();
            if let Err(e) = self.radio_tx.set_frequency(mhz) {
                warn!(error = %e, "frequency change failed");
            }
        }
        self.challenges.tick(now_us);
        self.discovery.tick(now_us);
    }

    /// Microseconds until the next hop is due, for precise scheduling of
    /// the next `tick`.
    pub fn time_until_next_hop_us(&self, now_us: u64) -> u64 {
        self.hopper.time_until_next_hop_us(now_us)
    }
}
