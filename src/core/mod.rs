//! Core primitives.
//!
//! Deterministic RNG, vector math and timing shared by the host and client roles.

pub mod clock;
pub mod rng;
pub mod vec2;

// Re-export core types
pub use clock::{now_ms, FixedStep};
pub use rng::{derive_round_seed, DeterministicRng};
pub use vec2::Vec2;
