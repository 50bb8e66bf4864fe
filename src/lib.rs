//! # Peer Sync
//!
//! State synchronization core for peer-hosted multiplayer sessions: one
//! participant hosts and is authoritative, everyone else predicts locally and
//! is corrected by the host's snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         PEER SYNC                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/              - Deterministic primitives              │
//! │  ├── rng.rs         - Park-Miller LCG, round seed derivation│
//! │  ├── vec2.rs        - 2D float vector                       │
//! │  └── clock.rs       - Wall clock and fixed timestep         │
//! │                                                              │
//! │  network/           - Moving bytes                          │
//! │  ├── schema.rs      - Fixed-layout wire records             │
//! │  ├── message.rs     - Snapshot and input types              │
//! │  ├── codec.rs       - Snapshot and input packets            │
//! │  ├── protocol.rs    - JSON control messages, frame decode   │
//! │  ├── transport.rs   - Transport trait, channels, conditioner│
//! │  ├── ws.rs          - WebSocket adapter                     │
//! │  └── watchdog.rs    - Silence detection                     │
//! │                                                              │
//! │  client/            - Prediction side                       │
//! │  ├── input.rs       - Capture, throttle, replay buffer      │
//! │  ├── reconcile.rs   - Snap / blend / replay                 │
//! │  ├── interpolation.rs - Delayed remote rendering            │
//! │  └── clock_sync.rs  - Host clock estimate                   │
//! │                                                              │
//! │  host/              - Authority side                        │
//! │  ├── dispatcher.rs  - Participant lifecycle, input ordering │
//! │  ├── broadcast.rs   - Per-recipient snapshot encoding       │
//! │  └── link.rs        - Ping, RTT and loss per link           │
//! │                                                              │
//! │  session/           - Role wiring                           │
//! │  ├── host.rs        - HostSession                           │
//! │  ├── client.rs      - ClientSession                         │
//! │  └── identity.rs    - Slot <-> participant map              │
//! │                                                              │
//! │  sim/               - Simulation boundary                   │
//! │  ├── motion.rs      - Movement model shared with prediction │
//! │  ├── entity.rs      - Authoritative and predicted entities  │
//! │  └── arena.rs       - Reference arena simulation            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Every participant seeds [`DeterministicRng`] with the seed the host sends
//! at round start, and draws from it in the same order. Gameplay state that
//! must agree everywhere is either derived from that RNG or received from the
//! host; nothing else is trusted to match.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod host;
pub mod network;
pub mod session;
pub mod sim;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::core::vec2::Vec2;
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use network::{
    ControlMessage, Frame, InputAction, InputCommand, SlotId, Transport, WorldSnapshot,
};
pub use session::{ClientSession, HostSession, SessionError};
pub use sim::{ArenaSimulation, Simulation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
