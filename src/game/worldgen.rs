//! Seeded Procedural World Generation
//!
//! Generates the full tile map for a hex region in ordered passes:
//!
//! 1. Stub every tile.
//! 2. Height and temperature; ocean/shore classified immediately.
//! 3. Rivers (own RNG stream) and precipitation.
//! 4. Biome classification by fixed priority.
//! 5. Initial resource stocks per biome.
//!
//! Every pass draws from its own named RNG/noise stream derived from the
//! seed string, so adding a draw to one pass never shifts another. The
//! whole pipeline is a pure function of the config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::hex::Hex;
use crate::core::noise::{NoiseField, NoiseParams};
use crate::core::rng::{derive_seed, DeterministicRng};
use crate::game::path::{astar, CostMode};
use crate::game::tile::{Biome, Resource, Tile};
use crate::game::world::World;

/// World generation parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenConfig {
    /// Player-facing seed string.
    pub seed: String,
    /// Map radius in hexes.
    pub radius: i32,
    /// Noise shaping the height field.
    pub height: NoiseParams,
    /// Noise shaping the precipitation field.
    pub precipitation: NoiseParams,
    /// Height below which a tile is deep ocean.
    pub ocean_level: f64,
    /// Height below which a tile is shallow shore.
    pub shore_level: f64,
    /// Equator temperature in degrees Celsius.
    pub equator_temp: f64,
    /// Temperature lost per unit of height above the shore level.
    pub altitude_penalty: f64,
    /// Per-tile chance that a river originates on a qualifying tile.
    pub river_chance: f64,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            seed: "default".into(),
            radius: 20,
            height: NoiseParams::default(),
            precipitation: NoiseParams {
                frequency: 0.08,
                ..Default::default()
            },
            ocean_level: 0.25,
            shore_level: 0.32,
            equator_temp: 32.0,
            altitude_penalty: 40.0,
            river_chance: 0.04,
        }
    }
}

/// Generate a complete world from the config. Deterministic for a fixed
/// config.
pub fn generate(config: &GenConfig) -> World {
    info!(seed = %config.seed, radius = config.radius, "generating world");

    let hexes = Hex::ZERO.range(config.radius);
    let mut tiles: BTreeMap<Hex, Tile> = hexes
        .iter()
        .map(|hex| (*hex, Tile::stub()))
        .collect();

    height_and_temperature(config, &mut tiles);
    rivers(config, &mut tiles);
    precipitation(config, &mut tiles);
    biomes(&mut tiles);
    seed_resources(config, &mut tiles);

    debug!(tiles = tiles.len(), "generation complete");
    World::from_tiles(config.seed.clone(), config.radius, tiles)
}

// -----------------------------------------------------------------------------
// Pass 2: height and temperature
// -----------------------------------------------------------------------------

fn height_and_temperature(config: &GenConfig, tiles: &mut BTreeMap<Hex, Tile>) {
    let field = NoiseField::new(derive_seed(&config.seed, "height"), config.height);
    let radius = config.radius.max(1) as f64;

    for (hex, tile) in tiles.iter_mut() {
        tile.height = field.sample(hex.q as f64, hex.r as f64);
        tile.temperature = temperature_at(config, *hex, tile.height, radius);

        // Water is classified immediately so later passes can route to it
        if tile.height < config.ocean_level {
            tile.biome = Biome::Ocean;
        } else if tile.height < config.shore_level {
            tile.biome = Biome::Shore;
        }
    }
}

/// Gaussian latitude falloff from the equator row, minus an altitude
/// penalty for land above the shore level.
fn temperature_at(config: &GenConfig, hex: Hex, height: f64, radius: f64) -> f64 {
    let latitude = hex.r as f64 / radius;
    let base = config.equator_temp * (-latitude * latitude / 0.18).exp() - 8.0;
    let altitude = (height - config.shore_level).max(0.0);
    base - altitude * config.altitude_penalty
}

// -----------------------------------------------------------------------------
// Pass 3: rivers
// -----------------------------------------------------------------------------

fn rivers(config: &GenConfig, tiles: &mut BTreeMap<Hex, Tile>) {
    let mut rng = DeterministicRng::from_seed_str(&config.seed, "rivers");

    // Candidate sources: high, unfrozen land. Collected first so mutation
    // during growth cannot disturb iteration order.
    let sources: Vec<Hex> = tiles
        .iter()
        .filter(|(_, t)| t.biome == Biome::None && t.height > 0.6 && t.temperature > -5.0)
        .map(|(hex, _)| *hex)
        .collect();

    for source in sources {
        if !rng.chance(config.river_chance) {
            continue;
        }
        if tiles
            .get(&source)
            .is_none_or(|t| t.biome != Biome::None)
        {
            continue;
        }
        grow_river(tiles, source);
    }
}

/// Grow one river from `source`: walk to the lowest uncommitted neighbor
/// until a local minimum, then connect the end to the nearest body of water
/// via uniform-cost pathfinding, or flood a small lake if no water exists.
fn grow_river(tiles: &mut BTreeMap<Hex, Tile>, source: Hex) {
    let mut current = source;
    loop {
        if let Some(tile) = tiles.get_mut(&current) {
            if tile.biome.is_water() {
                return; // reached water, done
            }
            tile.biome = Biome::River;
        }

        let next = current
            .neighbors()
            .into_iter()
            .filter(|n| {
                tiles
                    .get(n)
                    .is_some_and(|t| t.biome == Biome::None || t.biome.is_water())
            })
            .min_by(|a, b| tiles[a].height.total_cmp(&tiles[b].height));

        match next {
            Some(n) if tiles[&n].height <= tiles[&current].height => current = n,
            _ => break, // local minimum
        }
    }

    // Connect the dead end to the nearest existing water
    let nearest_water = tiles
        .iter()
        .filter(|(_, t)| t.biome.is_water() && !matches!(t.biome, Biome::River))
        .map(|(hex, _)| *hex)
        .min_by_key(|hex| current.distance(*hex));

    if let Some(water) = nearest_water {
        if let Some(path) = astar(tiles, current, water, CostMode::Uniform) {
            for hex in path {
                if let Some(tile) = tiles.get_mut(&hex) {
                    if !tile.biome.is_water() {
                        tile.biome = Biome::River;
                    }
                }
            }
            return;
        }
    }

    // No reachable water: flood the immediate neighbors into a lake
    for neighbor in current.neighbors() {
        if let Some(tile) = tiles.get_mut(&neighbor) {
            if tile.biome == Biome::None {
                tile.biome = Biome::Shore;
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Pass 3b: precipitation
// -----------------------------------------------------------------------------

fn precipitation(config: &GenConfig, tiles: &mut BTreeMap<Hex, Tile>) {
    let field = NoiseField::new(
        derive_seed(&config.seed, "precipitation"),
        config.precipitation,
    );
    let radius = config.radius.max(1) as f64;

    let near_water: Vec<Hex> = tiles
        .iter()
        .filter(|(hex, t)| {
            t.biome.is_water()
                || hex
                    .neighbors()
                    .iter()
                    .any(|n| tiles.get(n).is_some_and(|nt| nt.biome.is_water()))
        })
        .map(|(hex, _)| *hex)
        .collect();

    for (hex, tile) in tiles.iter_mut() {
        let mut precip = field.sample(hex.q as f64, hex.r as f64);

        // Subtropical dry band on both sides of the equator
        let latitude = (hex.r as f64 / radius).abs();
        let band = (-(latitude - 0.4).powi(2) / 0.02).exp();
        precip *= 1.0 - 0.7 * band;

        tile.precipitation = precip.clamp(0.0, 1.0);
    }

    for hex in near_water {
        if let Some(tile) = tiles.get_mut(&hex) {
            tile.precipitation = 1.0;
        }
    }
}

// -----------------------------------------------------------------------------
// Pass 4: biomes
// -----------------------------------------------------------------------------

fn biomes(tiles: &mut BTreeMap<Hex, Tile>) {
    // Beach needs a neighbor census before mutation
    let beach_candidates: Vec<Hex> = tiles
        .iter()
        .filter(|(hex, t)| {
            t.biome == Biome::None
                && t.temperature > 16.0
                && hex
                    .neighbors()
                    .iter()
                    .filter(|n| tiles.get(n).is_some_and(|nt| nt.biome == Biome::Shore))
                    .count()
                    >= 2
        })
        .map(|(hex, _)| *hex)
        .collect();

    for hex in beach_candidates {
        if let Some(tile) = tiles.get_mut(&hex) {
            tile.biome = Biome::Beach;
        }
    }

    for tile in tiles.values_mut() {
        if tile.biome != Biome::None {
            continue;
        }
        tile.biome = classify(tile);
    }
}

/// Fixed priority order for unclassified land.
fn classify(tile: &Tile) -> Biome {
    let t = tile.temperature;
    let h = tile.height;
    let p = tile.precipitation;

    if t < -12.0 {
        Biome::Ice
    } else if h > 0.9 {
        Biome::Peaks
    } else if h > 0.8 {
        Biome::Mountain
    } else if h > 0.72 {
        Biome::Treeline
    } else if t > 26.0 && p < 0.3 {
        Biome::Desert
    } else if t > 22.0 && p >= 0.5 {
        Biome::Tropical
    } else if t < 0.0 {
        Biome::Tundra
    } else if t < 8.0 && p >= 0.35 {
        Biome::Boreal
    } else if p >= 0.5 {
        Biome::Temperate
    } else {
        Biome::Grassland
    }
}

// -----------------------------------------------------------------------------
// Pass 5: initial resources
// -----------------------------------------------------------------------------

fn seed_resources(config: &GenConfig, tiles: &mut BTreeMap<Hex, Tile>) {
    let mut rng = DeterministicRng::from_seed_str(&config.seed, "resources");

    for tile in tiles.values_mut() {
        let stock: &[(Resource, f64)] = match tile.biome {
            Biome::Boreal | Biome::Temperate | Biome::Tropical | Biome::Treeline => {
                &[(Resource::Wood, 40.0), (Resource::Food, 10.0)]
            }
            Biome::Grassland | Biome::Beach => &[(Resource::Food, 30.0), (Resource::Wood, 5.0)],
            Biome::Mountain => &[(Resource::Stone, 35.0), (Resource::Iron, 8.0)],
            Biome::Peaks => &[(Resource::Stone, 15.0)],
            Biome::Desert => &[(Resource::Gold, 3.0)],
            Biome::Tundra | Biome::Ice => &[(Resource::Food, 5.0)],
            _ => &[],
        };

        for (resource, base) in stock {
            let amount = base * rng.next_f64_range(0.6, 1.4);
            tile.adjust_stock(*resource, amount);
        }
    }
}
