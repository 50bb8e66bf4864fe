//! Client Session
//!
//! One transport to the host. Inputs are captured, applied locally at once,
//! and sent; snapshots from the host correct the local prediction and feed
//! the interpolation buffer used to render everybody else.
//!
//! Loss of the host is fatal: a `HostQuit`, a closed transport, or ten
//! seconds of silence during a round all tear the session down.

use std::collections::BTreeMap;

use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::client::{
    ClockSync, Correction, InputCapture, InputThrottle, InterpolatedPose, InterpolationBuffer,
    ReconcileStats, Reconciler,
};
use crate::config::SyncConfig;
use crate::core::clock::FixedStep;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::network::codec::encode_input;
use crate::network::message::{BallState, InputAction, SlotId, WorldSnapshot};
use crate::network::protocol::{
    decode_frame, ControlMessage, GameEvent, Inbound, ParticipantId, RoundMode,
};
use crate::network::transport::{Frame, Transport};
use crate::network::watchdog::Watchdog;
use crate::session::identity::IdentityMap;
use crate::session::{DecodeFaultLog, SessionError};
use crate::sim::entity::{AuthoritativeState, PredictedEntity};
use crate::sim::motion::{MotionModel, Pose};

/// Client lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Transport open, join not sent.
    Connecting,
    /// Join sent, waiting for the accept.
    Joining,
    /// Slot assigned.
    Joined,
    /// Torn down; every further call fails.
    Closed,
}

/// Something the embedding game should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Our join was accepted.
    Joined {
        /// Assigned slot.
        slot: SlotId,
    },
    /// The identity map was replaced.
    RosterChanged,
    /// A round began.
    RoundStarted {
        /// Round number.
        round: u32,
        /// Round mode.
        mode: RoundMode,
    },
    /// A round ended.
    RoundEnded {
        /// Round number.
        round: u32,
        /// Winning slot.
        winner: Option<SlotId>,
    },
    /// Scores and carrier were replaced by the host's current view.
    Synced {
        /// Round number.
        round: u32,
        /// How far into the round the host was (ms).
        round_elapsed_ms: f64,
    },
    /// Gameplay event from the host.
    Game(GameEvent),
    /// Chat line.
    Chat {
        /// Author slot.
        slot: SlotId,
        /// Body.
        text: String,
    },
}

/// Client counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Snapshots received.
    pub snapshots: u64,
    /// Snapshots the interpolation buffer rejected as too old.
    pub stale_snapshots: u64,
    /// Snapshot entities dropped for unknown slots.
    pub entities_dropped: u64,
    /// Inputs sent.
    pub inputs_sent: u64,
    /// Frames that failed to decode.
    pub decode_errors: u64,
}

/// Predicting, interpolating participant.
pub struct ClientSession {
    transport: Box<dyn Transport>,
    name: String,
    state: ClientState,
    session_id: Option<Uuid>,
    participant: Option<ParticipantId>,
    slot: Option<SlotId>,
    identity: IdentityMap,
    model: MotionModel,
    local: Option<PredictedEntity>,
    own_latency_ms: u16,
    capture: InputCapture,
    throttle: InputThrottle,
    reconciler: Reconciler,
    last_correction: Option<Correction>,
    interpolation: InterpolationBuffer,
    clock_sync: ClockSync,
    watchdog: Watchdog,
    step: FixedStep,
    rng: DeterministicRng,
    round: Option<(u32, RoundMode)>,
    round_active: bool,
    scores: BTreeMap<SlotId, u32>,
    carrier: Option<SlotId>,
    events: Vec<ClientEvent>,
    faults: DecodeFaultLog,
    stats: ClientStats,
}

impl ClientSession {
    /// Wrap an open transport to the host.
    pub fn new(config: SyncConfig, transport: Box<dyn Transport>, name: impl Into<String>) -> Self {
        Self::with_model(config, transport, name, MotionModel::default())
    }

    /// Like [`ClientSession::new`], predicting with a custom motion model.
    /// The model must match the host simulation's.
    pub fn with_model(
        config: SyncConfig,
        transport: Box<dyn Transport>,
        name: impl Into<String>,
        model: MotionModel,
    ) -> Self {
        let timing = &config.timing;
        Self {
            transport,
            name: name.into(),
            state: ClientState::Connecting,
            session_id: None,
            participant: None,
            slot: None,
            identity: IdentityMap::new(),
            model,
            local: None,
            own_latency_ms: 0,
            capture: InputCapture::new(config.replay.capacity),
            throttle: InputThrottle::new(timing.input_interval_ms),
            reconciler: Reconciler::new(config.reconcile.clone()),
            last_correction: None,
            interpolation: InterpolationBuffer::new(config.interpolation.clone()),
            clock_sync: ClockSync::new(),
            watchdog: Watchdog::new(timing.watchdog_timeout_ms, 0.0),
            step: FixedStep::new(
                timing.tick_rate,
                timing.max_steps_per_frame,
                timing.max_frame_ms / 1_000.0,
            ),
            rng: DeterministicRng::default(),
            round: None,
            round_active: false,
            scores: BTreeMap::new(),
            carrier: None,
            events: Vec::new(),
            faults: DecodeFaultLog::default(),
            stats: ClientStats::default(),
        }
    }

    /// Ask the host for a slot.
    pub fn join(&mut self) -> Result<(), SessionError> {
        match self.state {
            ClientState::Closed => return Err(SessionError::Closed),
            ClientState::Connecting => {}
            _ => return Ok(()),
        }
        let request = ControlMessage::JoinRequest {
            name: self.name.clone(),
            client_version: crate::VERSION.to_string(),
        };
        self.transport.send(request.to_frame()?)?;
        self.state = ClientState::Joining;
        Ok(())
    }

    /// Run one frame: handle everything received, check liveness, and
    /// advance the local prediction by the fixed steps due.
    pub fn poll(&mut self, now: f64, frame_secs: f64) -> Result<(), SessionError> {
        if self.state == ClientState::Closed {
            return Err(SessionError::Closed);
        }

        for frame in self.transport.drain() {
            self.watchdog.feed(now);
            let handled = match decode_frame(&frame) {
                Ok(Inbound::Snapshot(snapshot)) => {
                    self.on_snapshot(snapshot);
                    Ok(())
                }
                Ok(Inbound::Control(msg)) => self.on_control(msg, now),
                Ok(Inbound::Input(_)) => {
                    debug!("input frame from host ignored");
                    Ok(())
                }
                Err(e) => {
                    self.stats.decode_errors += 1;
                    self.faults.record("host", &e);
                    Ok(())
                }
            };
            if let Err(e) = handled {
                self.teardown();
                return Err(e);
            }
        }

        if !self.transport.is_open() {
            self.teardown();
            return Err(SessionError::Transport(crate::network::transport::TransportError::Closed));
        }
        if self.watchdog.is_expired(now) {
            let silent_ms = self.watchdog.silence_ms(now);
            self.teardown();
            return Err(SessionError::WatchdogTimeout { silent_ms });
        }

        let steps = self.step.advance(frame_secs);
        let dt = self.step.dt() as f32;
        if let Some(local) = self.local.as_mut() {
            for _ in 0..steps {
                local.step(&self.model, dt);
            }
        }
        Ok(())
    }

    fn on_snapshot(&mut self, mut snapshot: WorldSnapshot) {
        self.stats.snapshots += 1;

        let own = self.slot;
        let identity = &self.identity;
        let before = snapshot.entities.len();
        snapshot
            .entities
            .retain(|e| Some(e.slot) == own || identity.contains_slot(e.slot));
        let dropped = before - snapshot.entities.len();
        if dropped > 0 {
            self.stats.entities_dropped += dropped as u64;
            debug!(dropped, "entities for unknown slots dropped");
        }

        if let Some(slot) = own {
            self.reconcile_local(&snapshot, slot);
        }
        if !self.interpolation.push(snapshot) {
            self.stats.stale_snapshots += 1;
        }
    }

    fn reconcile_local(&mut self, snapshot: &WorldSnapshot, slot: SlotId) {
        let Some(state) = snapshot.entity(slot) else {
            return;
        };
        self.own_latency_ms = state.latency_ms;

        if self.local.is_none() {
            let mut entity = PredictedEntity::new(slot, state.pos(), state.radius);
            entity.body.pose.vel = state.vel();
            self.local = Some(entity);
            debug!(slot, "local entity created from snapshot");
            return;
        }

        let auth = AuthoritativeState::from_snapshot(snapshot, slot);
        let (Some(local), Some(auth)) = (self.local.as_mut(), auth) else {
            return;
        };
        let model = &self.model;
        let dt = self.step.dt() as f32;
        let replay = self.capture.buffer_mut();
        let correction = self.reconciler.reconcile(local, &auth, replay, |entity, action| {
            entity.apply(model, action);
            entity.step(model, dt);
        });
        trace!(
            kind = ?correction.kind,
            error = correction.error,
            replayed = correction.replayed,
            "reconciled"
        );
        self.last_correction = Some(correction);
    }

    fn on_control(&mut self, msg: ControlMessage, now: f64) -> Result<(), SessionError> {
        match msg {
            ControlMessage::JoinAccept { session_id, participant, slot } => {
                self.session_id = Some(session_id);
                self.participant = Some(participant);
                self.slot = Some(slot);
                self.state = ClientState::Joined;
                info!(%session_id, slot, "joined session");
                self.events.push(ClientEvent::Joined { slot });
            }
            ControlMessage::Roster { entries } => {
                self.identity.replace_from_roster(&entries);
                self.events.push(ClientEvent::RosterChanged);
            }
            ControlMessage::RoundStart { round, seed, mode } => {
                self.rng.reseed(seed);
                self.round = Some((round, mode));
                self.round_active = true;
                self.reconciler.reset();
                self.interpolation.clear();
                self.scores.clear();
                self.carrier = None;
                self.watchdog.arm(now);
                info!(round, seed, ?mode, "round started");
                self.events.push(ClientEvent::RoundStarted { round, mode });
            }
            ControlMessage::RoundEnd { round, winner } => {
                self.round_active = false;
                self.watchdog.disarm();
                info!(round, ?winner, "round ended");
                self.events.push(ClientEvent::RoundEnded { round, winner });
            }
            ControlMessage::FullSync { round, mode, scores, carrier, round_elapsed_ms } => {
                if self.round.map(|(r, _)| r) != Some(round) {
                    debug!(round, "full sync for a round we never started");
                    self.round = Some((round, mode));
                }
                self.scores = scores.iter().map(|e| (e.slot, e.score)).collect();
                self.carrier = carrier;
                debug!(round, ?carrier, round_elapsed_ms, "round state synced");
                self.events.push(ClientEvent::Synced { round, round_elapsed_ms });
            }
            ControlMessage::GameEvent(event) => {
                match &event {
                    GameEvent::Score { slot, score } => {
                        self.scores.insert(*slot, *score);
                    }
                    GameEvent::ObjectPassed { to, .. } => self.carrier = Some(*to),
                    GameEvent::PlayerLeft { slot } => {
                        self.scores.remove(slot);
                    }
                    _ => {}
                }
                self.events.push(ClientEvent::Game(event));
            }
            ControlMessage::Chat { slot, text } => {
                self.events.push(ClientEvent::Chat { slot, text });
            }
            ControlMessage::Ping { seq, sent_at, host_time } => {
                self.clock_sync.observe(host_time, now, self.own_latency_ms as f64);
                let pong = ControlMessage::Pong { seq, sent_at }.to_frame()?;
                if let Err(e) = self.transport.send(pong) {
                    trace!(error = %e, "pong not sent");
                }
            }
            ControlMessage::HostQuit => {
                info!("host quit");
                return Err(SessionError::HostQuit);
            }
            other => debug!(kind = other.kind(), "unexpected control message"),
        }
        Ok(())
    }

    fn teardown(&mut self) {
        self.transport.close();
        self.state = ClientState::Closed;
        self.round_active = false;
        self.watchdog.disarm();
    }

    /// Capture one input: apply it to the local entity and send it.
    ///
    /// Returns the assigned sequence, or `None` when the input was not
    /// captured (no round, no local entity yet, or throttled).
    pub fn capture_input(
        &mut self,
        action: InputAction,
        cursor: Vec2,
        now: f64,
    ) -> Result<Option<u32>, SessionError> {
        if self.state == ClientState::Closed {
            return Err(SessionError::Closed);
        }
        if !self.round_active {
            return Ok(None);
        }
        let Some(local) = self.local.as_mut() else {
            return Ok(None);
        };
        if !self.throttle.admit(&action, now) {
            return Ok(None);
        }

        let model = &self.model;
        let cmd = self
            .capture
            .capture(action, cursor, now, local, |entity, action| entity.apply(model, action));
        self.transport.send(Frame::Binary(encode_input(&cmd)))?;
        self.stats.inputs_sent += 1;
        Ok(Some(cmd.sequence))
    }

    /// Send a chat line. The host stamps our slot on it.
    pub fn send_chat(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.state == ClientState::Closed {
            return Err(SessionError::Closed);
        }
        let msg = ControlMessage::Chat {
            slot: self.slot.unwrap_or_default(),
            text: text.into(),
        };
        self.transport.send(msg.to_frame()?)?;
        Ok(())
    }

    /// Leave the session.
    pub fn leave(&mut self) {
        if self.state != ClientState::Closed {
            info!("leaving session");
            self.teardown();
        }
    }

    /// Remote entities at the current render time, our own excluded.
    pub fn remote_poses(&self, now: f64) -> Vec<InterpolatedPose> {
        let render_time = self.interpolation.render_time(self.clock_sync.host_now(now));
        self.interpolation
            .sample_all(render_time)
            .into_iter()
            .filter(|pose| Some(pose.slot) != self.slot)
            .collect()
    }

    /// Ball at the current render time.
    pub fn ball(&self, now: f64) -> Option<BallState> {
        let render_time = self.interpolation.render_time(self.clock_sync.host_now(now));
        self.interpolation.sample_ball_at(render_time)
    }

    /// Predicted pose of our own entity.
    pub fn local_pose(&self) -> Option<Pose> {
        self.local.as_ref().map(PredictedEntity::pose)
    }

    /// Take events received since the last call.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }

    /// Lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Our slot, once joined.
    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    /// Our participant id, once joined.
    pub fn participant(&self) -> Option<ParticipantId> {
        self.participant
    }

    /// Session id, once joined.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Replica of the host's identity map.
    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    /// Current round and mode.
    pub fn round(&self) -> Option<(u32, RoundMode)> {
        self.round
    }

    /// Whether a round is running.
    pub fn is_round_active(&self) -> bool {
        self.round_active
    }

    /// Scores this round, by slot.
    pub fn scores(&self) -> &BTreeMap<SlotId, u32> {
        &self.scores
    }

    /// Hot potato carrier.
    pub fn carrier(&self) -> Option<SlotId> {
        self.carrier
    }

    /// Shared round RNG, seeded by the host at round start.
    pub fn rng(&self) -> &DeterministicRng {
        &self.rng
    }

    /// Shared round RNG, mutably. Draw from it only in the same order on
    /// every participant.
    pub fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Host clock estimate.
    pub fn clock_sync(&self) -> &ClockSync {
        &self.clock_sync
    }

    /// Most recent reconcile outcome.
    pub fn last_correction(&self) -> Option<Correction> {
        self.last_correction
    }

    /// Reconcile totals.
    pub fn reconcile_stats(&self) -> ReconcileStats {
        self.reconciler.stats()
    }

    /// Inputs captured but not yet acknowledged.
    pub fn pending_inputs(&self) -> usize {
        self.capture.buffer().len()
    }

    /// Counters.
    pub fn stats(&self) -> ClientStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::encode_snapshot;
    use crate::network::message::EntityState;
    use crate::network::protocol::{RosterEntry, ScoreEntry};
    use crate::network::transport::ChannelTransport;

    fn entity(slot: SlotId, x: f32) -> EntityState {
        EntityState {
            slot,
            x,
            y: 500.0,
            dx: 0.0,
            dy: 0.0,
            radius: 30.0,
            latency_ms: 40,
        }
    }

    fn send_control(host: &mut ChannelTransport, msg: ControlMessage) {
        host.send(msg.to_frame().unwrap()).unwrap();
    }

    fn send_snapshot(host: &mut ChannelTransport, ts: f64, ack: u32, entities: Vec<EntityState>) {
        let snapshot = WorldSnapshot {
            sequence_ack: 0,
            timestamp: ts,
            entities,
            ball: None,
        };
        host.send(Frame::Binary(encode_snapshot(&snapshot, ack).unwrap())).unwrap();
    }

    /// A client joined as slot 1 with a roster of slots 0 and 1, in a round.
    fn joined_client() -> (ClientSession, ChannelTransport) {
        let (mut host, near) = ChannelTransport::pair();
        let mut client = ClientSession::new(SyncConfig::default(), Box::new(near), "alice");
        client.join().unwrap();

        let accept = ControlMessage::JoinAccept {
            session_id: Uuid::new_v4(),
            participant: Uuid::new_v4(),
            slot: 1,
        };
        send_control(&mut host, accept);
        let entries = (0..2)
            .map(|slot| RosterEntry {
                slot,
                participant: Uuid::new_v4(),
                name: format!("p{slot}"),
            })
            .collect();
        send_control(&mut host, ControlMessage::Roster { entries });
        let start = ControlMessage::RoundStart { round: 1, seed: 99, mode: RoundMode::Arena };
        send_control(&mut host, start);
        client.poll(0.0, 0.0).unwrap();
        (client, host)
    }

    #[test]
    fn test_join_request_sent() {
        let (mut host, near) = ChannelTransport::pair();
        let mut client = ClientSession::new(SyncConfig::default(), Box::new(near), "alice");
        assert_eq!(client.state(), ClientState::Connecting);
        client.join().unwrap();
        assert_eq!(client.state(), ClientState::Joining);

        let Some(Frame::Text(text)) = host.try_recv() else {
            panic!("expected a text frame");
        };
        assert!(matches!(
            ControlMessage::from_json(&text).unwrap(),
            ControlMessage::JoinRequest { name, .. } if name == "alice"
        ));
    }

    #[test]
    fn test_unknown_slots_dropped() {
        let (mut client, mut host) = joined_client();
        let entities = vec![entity(0, 100.0), entity(1, 200.0), entity(7, 300.0)];
        send_snapshot(&mut host, 100.0, 0, entities);
        client.poll(10.0, 0.0).unwrap();

        assert_eq!(client.stats().entities_dropped, 1);
        assert_eq!(client.local_pose().unwrap().pos.x, 200.0);
        let slots: Vec<_> = client.remote_poses(250.0).iter().map(|p| p.slot).collect();
        assert_eq!(slots, vec![0]);
    }

    #[test]
    fn test_ball_interpolated() {
        let (mut client, mut host) = joined_client();
        for (ts, x) in [(100.0, 0.0), (200.0, 100.0)] {
            let snapshot = WorldSnapshot {
                sequence_ack: 0,
                timestamp: ts,
                entities: vec![entity(0, 10.0)],
                ball: Some(BallState { x, y: 0.0, dx: x, dy: 0.0 }),
            };
            host.send(Frame::Binary(encode_snapshot(&snapshot, 0).unwrap())).unwrap();
        }
        client.poll(10.0, 0.0).unwrap();

        // Render time 300 - 150 = 150, halfway between the samples
        let ball = client.ball(300.0).unwrap();
        assert_eq!(ball.x, 50.0);
        assert_eq!(ball.dx, 0.0);
    }

    #[test]
    fn test_local_entity_snaps_to_host() {
        let (mut client, mut host) = joined_client();
        send_snapshot(&mut host, 100.0, 0, vec![entity(1, 200.0)]);
        client.poll(10.0, 0.0).unwrap();

        send_snapshot(&mut host, 150.0, 0, vec![entity(1, 400.0)]);
        client.poll(20.0, 0.0).unwrap();

        assert_eq!(client.local_pose().unwrap().pos.x, 400.0);
        assert_eq!(client.reconcile_stats().snaps, 1);
    }

    #[test]
    fn test_acknowledged_inputs_pruned() {
        let (mut client, mut host) = joined_client();
        send_snapshot(&mut host, 100.0, 0, vec![entity(1, 200.0)]);
        client.poll(10.0, 0.0).unwrap();

        for i in 0..4 {
            let seq = client
                .capture_input(InputAction::movement(1.0, 0.0), Vec2::ZERO, 100.0 * i as f64)
                .unwrap();
            assert_eq!(seq, Some(i + 1));
        }
        assert_eq!(client.pending_inputs(), 4);
        assert_eq!(host.drain().len(), 4 + 1);

        send_snapshot(&mut host, 150.0, 3, vec![entity(1, 200.0)]);
        client.poll(20.0, 0.0).unwrap();
        assert_eq!(client.pending_inputs(), 1);
    }

    #[test]
    fn test_round_start_reseeds_and_arms_watchdog() {
        let (mut client, _host) = joined_client();
        assert_eq!(client.rng().seed(), 99);
        assert_eq!(client.round(), Some((1, RoundMode::Arena)));

        let events = client.drain_events();
        assert!(events.contains(&ClientEvent::Joined { slot: 1 }));
        assert!(events.contains(&ClientEvent::RoundStarted { round: 1, mode: RoundMode::Arena }));

        assert!(matches!(
            client.poll(10_001.0, 0.0),
            Err(SessionError::WatchdogTimeout { .. })
        ));
    }

    #[test]
    fn test_full_sync_restores_round_state() {
        let (mut client, mut host) = joined_client();
        let sync = ControlMessage::FullSync {
            round: 1,
            mode: RoundMode::HotPotato,
            scores: vec![ScoreEntry { slot: 0, score: 2 }, ScoreEntry { slot: 1, score: 5 }],
            carrier: Some(0),
            round_elapsed_ms: 4_000.0,
        };
        send_control(&mut host, sync);
        client.poll(1.0, 0.0).unwrap();

        assert_eq!(client.carrier(), Some(0));
        assert_eq!(client.scores().get(&1), Some(&5));
        assert!(client
            .drain_events()
            .contains(&ClientEvent::Synced { round: 1, round_elapsed_ms: 4_000.0 }));

        // Later events keep it current
        for event in [
            GameEvent::Score { slot: 0, score: 3 },
            GameEvent::ObjectPassed { from: 0, to: 1 },
            GameEvent::PlayerLeft { slot: 1 },
        ] {
            send_control(&mut host, ControlMessage::GameEvent(event));
        }
        client.poll(2.0, 0.0).unwrap();
        assert_eq!(client.carrier(), Some(1));
        assert_eq!(client.scores().len(), 1);
        assert_eq!(client.scores().get(&0), Some(&3));

        let start = ControlMessage::RoundStart { round: 2, seed: 7, mode: RoundMode::Arena };
        send_control(&mut host, start);
        client.poll(3.0, 0.0).unwrap();
        assert!(client.scores().is_empty());
        assert_eq!(client.carrier(), None);
    }

    #[test]
    fn test_watchdog_idle_between_rounds() {
        let (mut client, mut host) = joined_client();
        send_control(&mut host, ControlMessage::RoundEnd { round: 1, winner: Some(1) });
        client.poll(1.0, 0.0).unwrap();
        client.poll(60_000.0, 0.0).unwrap();
        assert!(!client.is_round_active());
    }

    #[test]
    fn test_ping_answered_and_clock_synced() {
        let (mut client, mut host) = joined_client();
        host.drain();

        let ping = ControlMessage::Ping { seq: 3, sent_at: 5_000.0, host_time: 5_000.0 };
        send_control(&mut host, ping);
        client.poll(1_000.0, 0.0).unwrap();

        assert_eq!(client.clock_sync().offset_ms(), Some(4_000.0));
        let Some(Frame::Text(text)) = host.try_recv() else {
            panic!("expected a pong");
        };
        assert_eq!(
            ControlMessage::from_json(&text).unwrap(),
            ControlMessage::Pong { seq: 3, sent_at: 5_000.0 }
        );
    }

    #[test]
    fn test_transport_loss_is_fatal() {
        let (mut client, host) = joined_client();
        drop(host);
        assert_eq!(
            client.poll(1.0, 0.0),
            Err(SessionError::Transport(crate::network::transport::TransportError::Closed))
        );
        assert_eq!(
            client.capture_input(InputAction::movement(1.0, 0.0), Vec2::ZERO, 2.0),
            Err(SessionError::Closed)
        );
    }
}
