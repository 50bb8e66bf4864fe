//! Client Role
//!
//! Prediction of the local entity, replay against host corrections, and
//! delayed interpolation of everyone else.

pub mod clock_sync;
pub mod input;
pub mod interpolation;
pub mod reconcile;

pub use clock_sync::ClockSync;
pub use input::{InputCapture, InputThrottle, ReplayBuffer};
pub use interpolation::{InterpolatedPose, InterpolationBuffer};
pub use reconcile::{Correction, CorrectionKind, ReconcileStats, Reconciler};
