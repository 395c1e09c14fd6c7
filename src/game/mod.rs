//! Game Logic Module
//!
//! All world simulation code. Mutated from a single logical task only.
//!
//! ## Module Structure
//!
//! - `tile`: Tiles, biomes, resource kinds
//! - `entities`: Units, groups, buildings, battles
//! - `world`: The authoritative world aggregate
//! - `worldgen`: Seeded procedural map generation
//! - `path`: Weighted A* over the tile graph
//! - `visibility`: Fog-of-war recomputation
//! - `commands`: Validated player command handlers
//! - `battle`: Battle detection and resolution
//! - `tick`: Fixed-rate simulation step

pub mod battle;
pub mod commands;
pub mod entities;
pub mod path;
pub mod tick;
pub mod tile;
pub mod visibility;
pub mod world;
pub mod worldgen;

// Re-export key types
pub use commands::{Command, CommandReply};
pub use entities::{Battle, Building, Group, Unit};
pub use tick::TickResult;
pub use tile::{Biome, Resource, Tile};
pub use world::{PlayerId, Relation, World};
