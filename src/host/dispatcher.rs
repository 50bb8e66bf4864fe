//! Host Authority Dispatcher
//!
//! Tracks every participant's lifecycle and is the only path by which client
//! inputs reach the simulation. Inputs are applied strictly in sequence order
//! per participant; anything at or below the last applied sequence is stale
//! and dropped.
//!
//! ```text
//! Connecting ──join──▶ Joined ──round start──▶ Active
//!      │                  │                      │
//!      └──────────────────┴──────────────────────┴──▶ Disconnected
//! ```

use std::collections::BTreeMap;

use tracing::{debug, info, trace};

use crate::network::message::{InputCommand, SlotId};
use crate::network::protocol::{ParticipantId, RosterEntry};
use crate::network::watchdog::Watchdog;
use crate::session::identity::{IdentityError, IdentityMap};
use crate::sim::Simulation;

/// Participant lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantState {
    /// Transport open, no join request yet.
    Connecting,
    /// Slot assigned, waiting for a round.
    Joined,
    /// Inputs are applied.
    Active,
    /// Gone; the slot is retired.
    Disconnected,
}

impl ParticipantState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ParticipantState) -> bool {
        use ParticipantState::*;
        matches!(
            (self, next),
            (Connecting, Joined) | (Joined, Active) | (Connecting | Joined | Active, Disconnected)
        )
    }
}

/// Dispatcher errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// No participant with this id.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// Lifecycle transition not allowed.
    #[error("Invalid transition for {participant}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Participant.
        participant: ParticipantId,
        /// Current state.
        from: ParticipantState,
        /// Requested state.
        to: ParticipantState,
    },

    /// Participant limit reached.
    #[error("Session full ({0} participants)")]
    SessionFull(usize),

    /// No slot left to assign.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Result of routing one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Applied to the simulation.
    Applied,
    /// At or below the last applied sequence; dropped.
    Stale,
    /// Sender is not active; dropped.
    NotActive,
}

/// Host-side view of one connected participant.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Stable identity.
    pub id: ParticipantId,
    /// Display name, once joined.
    pub name: String,
    /// Assigned slot, once joined.
    pub slot: Option<SlotId>,
    /// Lifecycle state.
    pub state: ParticipantState,
    /// Highest input sequence applied (0 before the first).
    pub last_seen: u32,
    /// Silence detector.
    pub watchdog: Watchdog,
}

/// Lifecycle bookkeeping and input routing.
#[derive(Debug)]
pub struct Dispatcher {
    participants: BTreeMap<ParticipantId, Participant>,
    identity: IdentityMap,
    max_participants: usize,
    watchdog_timeout_ms: f64,
}

impl Dispatcher {
    /// Create a dispatcher with the host already in slot 0.
    pub fn new(
        host: ParticipantId,
        host_name: &str,
        max_participants: usize,
        watchdog_timeout_ms: f64,
    ) -> Self {
        Self {
            participants: BTreeMap::new(),
            identity: IdentityMap::with_host(host, host_name),
            max_participants,
            watchdog_timeout_ms,
        }
    }

    fn get_mut(&mut self, id: &ParticipantId) -> Result<&mut Participant, DispatchError> {
        self.participants
            .get_mut(id)
            .ok_or(DispatchError::UnknownParticipant(*id))
    }

    fn transition(
        &mut self,
        id: &ParticipantId,
        to: ParticipantState,
    ) -> Result<&mut Participant, DispatchError> {
        let participant = self.get_mut(id)?;
        if !participant.state.can_transition_to(to) {
            return Err(DispatchError::InvalidTransition {
                participant: *id,
                from: participant.state,
                to,
            });
        }
        participant.state = to;
        Ok(participant)
    }

    /// Register an opened transport. The watchdog stays disarmed until the
    /// participant is active in a round.
    pub fn connect(&mut self, id: ParticipantId, now: f64) -> Result<(), DispatchError> {
        // The host occupies one seat
        if self.live_count() + 1 >= self.max_participants {
            return Err(DispatchError::SessionFull(self.max_participants));
        }
        if let Some(existing) = self.participants.get(&id) {
            return Err(DispatchError::InvalidTransition {
                participant: id,
                from: existing.state,
                to: ParticipantState::Connecting,
            });
        }

        let watchdog = Watchdog::new(self.watchdog_timeout_ms, now);
        self.participants.insert(
            id,
            Participant {
                id,
                name: String::new(),
                slot: None,
                state: ParticipantState::Connecting,
                last_seen: 0,
                watchdog,
            },
        );
        debug!(%id, "participant connecting");
        Ok(())
    }

    /// Handle a join request: assign a slot and move to `Joined`.
    pub fn join(&mut self, id: &ParticipantId, name: &str) -> Result<SlotId, DispatchError> {
        let current = self.get_mut(id)?.state;
        if !current.can_transition_to(ParticipantState::Joined) {
            return Err(DispatchError::InvalidTransition {
                participant: *id,
                from: current,
                to: ParticipantState::Joined,
            });
        }
        let slot = self.identity.assign(*id, name)?;

        let participant = self.transition(id, ParticipantState::Joined)?;
        participant.slot = Some(slot);
        participant.name = name.to_string();
        info!(%id, slot, name, "participant joined");
        Ok(slot)
    }

    /// Move one joined participant to `Active` and arm its watchdog.
    /// Already active only re-arms.
    pub fn activate(&mut self, id: &ParticipantId, now: f64) -> Result<(), DispatchError> {
        let participant = if self.get_mut(id)?.state == ParticipantState::Active {
            self.get_mut(id)?
        } else {
            self.transition(id, ParticipantState::Active)?
        };
        participant.watchdog.arm(now);
        Ok(())
    }

    /// Round start: activate every joined participant and arm every active
    /// watchdog. Returns the ids newly activated.
    pub fn activate_joined(&mut self, now: f64) -> Vec<ParticipantId> {
        let mut activated = Vec::new();
        for participant in self.participants.values_mut() {
            match participant.state {
                ParticipantState::Joined => {
                    participant.state = ParticipantState::Active;
                    activated.push(participant.id);
                }
                ParticipantState::Active => {}
                _ => continue,
            }
            participant.watchdog.arm(now);
        }
        activated
    }

    /// Round end: stop enforcing liveness until the next round.
    pub fn disarm_watchdogs(&mut self) {
        for participant in self.participants.values_mut() {
            participant.watchdog.disarm();
        }
    }

    /// Mark a participant gone and retire its slot.
    pub fn disconnect(&mut self, id: &ParticipantId) -> Result<Option<SlotId>, DispatchError> {
        let participant = self.transition(id, ParticipantState::Disconnected)?;
        participant.watchdog.disarm();
        let slot = participant.slot;
        self.identity.release(id);
        info!(%id, ?slot, "participant disconnected");
        Ok(slot)
    }

    /// Route one input into `sim`.
    ///
    /// Only `Active` participants reach the simulation, and only with a
    /// sequence above the last one applied for them.
    pub fn handle_input<S: Simulation + ?Sized>(
        &mut self,
        id: &ParticipantId,
        cmd: &InputCommand,
        sim: &mut S,
    ) -> Result<DispatchOutcome, DispatchError> {
        let participant = self.get_mut(id)?;
        let slot = match (participant.state, participant.slot) {
            (ParticipantState::Active, Some(slot)) => slot,
            (state, _) => {
                trace!(%id, ?state, seq = cmd.sequence, "input from inactive participant");
                return Ok(DispatchOutcome::NotActive);
            }
        };

        if cmd.sequence <= participant.last_seen {
            trace!(
                %id,
                seq = cmd.sequence,
                last_seen = participant.last_seen,
                "stale input dropped"
            );
            return Ok(DispatchOutcome::Stale);
        }

        participant.last_seen = cmd.sequence;
        sim.apply_input(slot, cmd);
        Ok(DispatchOutcome::Applied)
    }

    /// Record traffic from a participant.
    pub fn feed(&mut self, id: &ParticipantId, now: f64) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.watchdog.feed(now);
        }
    }

    /// Live participants silent past the watchdog timeout.
    pub fn expired(&self, now: f64) -> Vec<ParticipantId> {
        self.participants
            .values()
            .filter(|p| p.state != ParticipantState::Disconnected && p.watchdog.is_expired(now))
            .map(|p| p.id)
            .collect()
    }

    /// Participant by id.
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Current state of a participant.
    pub fn state(&self, id: &ParticipantId) -> Option<ParticipantState> {
        self.participants.get(id).map(|p| p.state)
    }

    /// Last applied sequence of a participant.
    pub fn last_seen(&self, id: &ParticipantId) -> Option<u32> {
        self.participants.get(id).map(|p| p.last_seen)
    }

    /// Participants in the given state.
    pub fn in_state(&self, state: ParticipantState) -> impl Iterator<Item = &Participant> {
        self.participants.values().filter(move |p| p.state == state)
    }

    /// Participants that receive snapshots and control broadcasts.
    pub fn joined_or_active(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .values()
            .filter(|p| matches!(p.state, ParticipantState::Joined | ParticipantState::Active))
    }

    /// Participants not yet disconnected.
    pub fn live_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.state != ParticipantState::Disconnected)
            .count()
    }

    /// Slot mapping.
    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    /// Current roster.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.identity.roster()
    }

    /// Forget disconnected participants. Their slots stay retired.
    pub fn prune(&mut self) -> usize {
        let before = self.participants.len();
        self.participants
            .retain(|_, p| p.state != ParticipantState::Disconnected);
        before - self.participants.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::network::message::InputAction;
    use crate::sim::ArenaSimulation;
    use uuid::Uuid;

    fn cmd(sequence: u32) -> InputCommand {
        InputCommand {
            sequence,
            action: InputAction::movement(1.0, 0.0),
            timestamp: 0.0,
        }
    }

    fn active_participant() -> (Dispatcher, ParticipantId, ArenaSimulation) {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 8, 10_000.0);
        let id = Uuid::new_v4();
        dispatcher.connect(id, 0.0).unwrap();
        let slot = dispatcher.join(&id, "alice").unwrap();
        dispatcher.activate(&id, 0.0).unwrap();

        let mut sim = ArenaSimulation::default();
        sim.spawn(slot, &mut DeterministicRng::new(1));
        (dispatcher, id, sim)
    }

    #[test]
    fn test_transitions() {
        use ParticipantState::*;
        assert!(Connecting.can_transition_to(Joined));
        assert!(Joined.can_transition_to(Active));
        assert!(Active.can_transition_to(Disconnected));
        assert!(Connecting.can_transition_to(Disconnected));

        assert!(!Connecting.can_transition_to(Active));
        assert!(!Active.can_transition_to(Joined));
        assert!(!Disconnected.can_transition_to(Connecting));
        assert!(!Disconnected.can_transition_to(Disconnected));
    }

    #[test]
    fn test_lifecycle() {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 8, 10_000.0);
        let id = Uuid::new_v4();

        dispatcher.connect(id, 0.0).unwrap();
        assert_eq!(dispatcher.state(&id), Some(ParticipantState::Connecting));

        let slot = dispatcher.join(&id, "alice").unwrap();
        assert_eq!(slot, 1);
        assert_eq!(dispatcher.identity().slot_of(&id), Some(1));
        assert_eq!(dispatcher.roster().len(), 2);

        assert_eq!(dispatcher.activate_joined(0.0), vec![id]);
        assert_eq!(dispatcher.state(&id), Some(ParticipantState::Active));

        assert_eq!(dispatcher.disconnect(&id).unwrap(), Some(1));
        assert_eq!(dispatcher.state(&id), Some(ParticipantState::Disconnected));
        assert!(!dispatcher.identity().contains_slot(1));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 8, 10_000.0);
        let id = Uuid::new_v4();
        dispatcher.connect(id, 0.0).unwrap();

        // Cannot activate before joining
        assert!(matches!(
            dispatcher.activate(&id, 0.0),
            Err(DispatchError::InvalidTransition { from: ParticipantState::Connecting, .. })
        ));

        dispatcher.join(&id, "a").unwrap();
        assert!(matches!(dispatcher.join(&id, "a"), Err(DispatchError::InvalidTransition { .. })));

        dispatcher.disconnect(&id).unwrap();
        assert!(dispatcher.disconnect(&id).is_err());
        assert!(dispatcher.connect(id, 0.0).is_err());
    }

    #[test]
    fn test_unknown_participant() {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 8, 10_000.0);
        let mut sim = ArenaSimulation::default();
        let ghost = Uuid::new_v4();
        assert_eq!(
            dispatcher.handle_input(&ghost, &cmd(1), &mut sim),
            Err(DispatchError::UnknownParticipant(ghost))
        );
    }

    #[test]
    fn test_session_full() {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 2, 10_000.0);
        dispatcher.connect(Uuid::new_v4(), 0.0).unwrap();
        assert_eq!(
            dispatcher.connect(Uuid::new_v4(), 0.0),
            Err(DispatchError::SessionFull(2))
        );
    }

    #[test]
    fn test_inputs_applied_in_order() {
        let (mut dispatcher, id, mut sim) = active_participant();
        let before = sim.entity(1).unwrap().body.pose.vel;

        assert_eq!(dispatcher.handle_input(&id, &cmd(1), &mut sim), Ok(DispatchOutcome::Applied));
        assert_eq!(dispatcher.handle_input(&id, &cmd(3), &mut sim), Ok(DispatchOutcome::Applied));
        assert_eq!(dispatcher.last_seen(&id), Some(3));
        assert_ne!(sim.entity(1).unwrap().body.pose.vel, before);
    }

    #[test]
    fn test_stale_inputs_dropped() {
        let (mut dispatcher, id, mut sim) = active_participant();
        dispatcher.handle_input(&id, &cmd(5), &mut sim).unwrap();
        let vel = sim.entity(1).unwrap().body.pose.vel;

        assert_eq!(dispatcher.handle_input(&id, &cmd(5), &mut sim), Ok(DispatchOutcome::Stale));
        assert_eq!(dispatcher.handle_input(&id, &cmd(2), &mut sim), Ok(DispatchOutcome::Stale));
        assert_eq!(sim.entity(1).unwrap().body.pose.vel, vel);
        assert_eq!(dispatcher.last_seen(&id), Some(5));
    }

    #[test]
    fn test_inactive_inputs_dropped() {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 8, 10_000.0);
        let mut sim = ArenaSimulation::default();
        let id = Uuid::new_v4();
        dispatcher.connect(id, 0.0).unwrap();
        dispatcher.join(&id, "a").unwrap();

        assert_eq!(dispatcher.handle_input(&id, &cmd(1), &mut sim), Ok(DispatchOutcome::NotActive));
        assert_eq!(dispatcher.last_seen(&id), Some(0));
    }

    #[test]
    fn test_watchdog_expiry() {
        let (mut dispatcher, id, _) = active_participant();
        assert!(dispatcher.expired(9_000.0).is_empty());

        dispatcher.feed(&id, 5_000.0);
        assert!(dispatcher.expired(14_000.0).is_empty());
        assert_eq!(dispatcher.expired(15_500.0), vec![id]);

        dispatcher.disconnect(&id).unwrap();
        assert!(dispatcher.expired(60_000.0).is_empty());
        assert_eq!(dispatcher.prune(), 1);
    }

    #[test]
    fn test_lobby_participant_not_expired() {
        let mut dispatcher = Dispatcher::new(Uuid::new_v4(), "host", 8, 10_000.0);
        let id = Uuid::new_v4();
        dispatcher.connect(id, 0.0).unwrap();
        dispatcher.join(&id, "alice").unwrap();
        assert!(dispatcher.expired(30_000.0).is_empty());

        // Armed at round start, counted from then
        dispatcher.activate_joined(30_000.0);
        assert!(dispatcher.expired(39_000.0).is_empty());
        assert_eq!(dispatcher.expired(41_000.0), vec![id]);

        dispatcher.disarm_watchdogs();
        assert!(dispatcher.expired(90_000.0).is_empty());

        // Next round re-arms participants that are already active
        assert!(dispatcher.activate_joined(90_000.0).is_empty());
        assert_eq!(dispatcher.expired(100_500.0), vec![id]);
    }
}
