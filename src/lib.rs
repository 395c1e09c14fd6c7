//! # Hexhold Game Server
//!
//! Authoritative simulation server for Hexhold, a real-time multiplayer
//! strategy game on a hexagonal map.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     HEXHOLD SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── hex.rs      - Cube-coordinate hex geometry              │
//! │  ├── noise.rs    - Seeded coherent value noise               │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │                                                              │
//! │  game/           - Simulation (single mutation path)         │
//! │  ├── tile.rs     - Tiles, biomes, resources                  │
//! │  ├── entities.rs - Units, groups, buildings, battles         │
//! │  ├── world.rs    - World aggregate and player relations      │
//! │  ├── worldgen.rs - Procedural map generation                 │
//! │  ├── path.rs     - Weighted A* over the tile graph           │
//! │  ├── visibility.rs - Fog-of-war recomputation                │
//! │  ├── commands.rs - Validated player command handlers         │
//! │  ├── battle.rs   - Battle detection and resolution           │
//! │  └── tick.rs     - Fixed-rate simulation step                │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server and game-loop task       │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── sync.rs     - Per-player filtered snapshots             │
//! │  └── auth.rs     - External credential validation            │
//! │                                                              │
//! │  store.rs        - World save/load as a JSON document        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency Guarantee
//!
//! World state is mutated from exactly one logical task: the game loop
//! drains queued commands and then advances the simulation, so commands
//! never race a tick or each other.
//!
//! - No HashMap in game state (BTreeMap for sorted iteration)
//! - All simulation randomness from the seeded Xorshift128+ stream
//! - Given the same seed string, world generation produces the identical
//!   tile map on any platform

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod store;

// Re-export commonly used types
pub use crate::core::hex::{Hex, Layout, Orientation};
pub use crate::core::rng::DeterministicRng;
pub use game::world::{PlayerId, World};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 10;

/// Snapshot broadcast rate (Hz); must divide the tick rate
pub const BROADCAST_RATE: u32 = 2;

/// Movement progress at which a group advances one hex
pub const MOVE_STEP: f64 = 100.0;
