//! Deterministic Random Number Generator
//!
//! Park-Miller minimal standard generator (multiplicative LCG, modulus 2^31-1,
//! multiplier 48271). State updates are integer-only, so every participant that
//! reseeds with the same round seed draws the same sequence on any platform.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Modulus 2^31 - 1 (a Mersenne prime).
pub const LCG_MODULUS: u64 = 2_147_483_647;

/// Multiplier from the revised minimal standard.
pub const LCG_MULTIPLIER: u64 = 48_271;

/// Deterministic PRNG shared by host and clients.
///
/// # Determinism Guarantee
///
/// Given the same seed and the same call order, this RNG produces the exact same
/// sequence on every participant. It must only be advanced from tick-driven
/// simulation logic, never from rendering.
///
/// # Example
///
/// ```
/// use peer_sync::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u31();
/// assert_eq!(value, 595_905_495); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    seed: u64,
    state: u64,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(12345)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// The seed is reduced modulo 2^31-1; a zero state would be absorbing,
    /// so it is replaced by 1.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            state: initial_state(seed),
        }
    }

    /// Restart the sequence from a new round seed.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.state = initial_state(seed);
    }

    /// Restart the sequence from the current seed.
    pub fn reset(&mut self) {
        self.state = initial_state(self.seed);
    }

    /// Advance the generator and return the raw state in `[1, 2^31-2]`.
    #[inline]
    pub fn next_u31(&mut self) -> u32 {
        self.state = (self.state * LCG_MULTIPLIER) % LCG_MODULUS;
        self.state as u32
    }

    /// Random float in `[0, 1)`.
    #[inline]
    pub fn next_float01(&mut self) -> f64 {
        self.next_u31() as f64 / LCG_MODULUS as f64
    }

    /// Random integer in `[min, max)`.
    ///
    /// Scales the raw state with integer arithmetic (`state * span / M`), so the
    /// result never depends on float rounding. Returns `min` when the range is empty.
    #[inline]
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max as i128 - min as i128) as u128;
        let raw = self.next_u31() as u128;
        (min as i128 + ((raw * span) / LCG_MODULUS as u128) as i128) as i64
    }

    /// Random float in `[min, max)`.
    #[inline]
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_float01() * (max - min)
    }

    /// Random boolean that is true with the given probability.
    #[inline]
    pub fn next_bool(&mut self, probability: f64) -> bool {
        self.next_float01() < probability
    }

    /// Select a random element from a slice.
    pub fn choice<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(0, slice.len() as i64) as usize;
            Some(&slice[idx])
        }
    }

    /// Shuffle a slice in place using Fisher-Yates.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_int(0, (i + 1) as i64) as usize;
            slice.swap(i, j);
        }
    }

    /// Seed this generator was last (re)seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Get current state (for checkpointing and sync verification).
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u64) {
        self.state = initial_state(state);
    }
}

#[inline]
fn initial_state(seed: u64) -> u64 {
    match seed % LCG_MODULUS {
        0 => 1,
        s => s,
    }
}

/// Derive a round seed on the host.
///
/// The host mixes the session identifier, the round number and local entropy
/// (wall clock) so seeds differ between rounds and sessions. The result is
/// transmitted in the round-start message; clients never derive it themselves.
pub fn derive_round_seed(session_id: &[u8; 16], round: u32, entropy: u64) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"PEER_SYNC_ROUND_SEED_V1");
    hasher.update(session_id);
    hasher.update(round.to_le_bytes());
    hasher.update(entropy.to_le_bytes());

    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
