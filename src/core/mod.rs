//! Core deterministic primitives.
//!
//! All types in this module are pure and side-effect free. They form the
//! foundation the simulation's determinism rests on.

pub mod hex;
pub mod noise;
pub mod rng;

// Re-export core types
pub use hex::{Hex, Layout, Orientation};
pub use noise::NoiseField;
pub use rng::DeterministicRng;
