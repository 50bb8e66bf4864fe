//! Host Role
//!
//! The host is authoritative: it owns the simulation, validates and orders
//! client inputs, and broadcasts per-recipient snapshots.

pub mod broadcast;
pub mod dispatcher;
pub mod link;

pub use broadcast::{encode_per_recipient, BroadcastSchedule};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher, Participant, ParticipantState};
pub use link::LinkStats;
