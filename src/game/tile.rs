//! Tiles, Biomes, and Resources
//!
//! A [`Tile`] is created once at world-generation time and never destroyed
//! during a session. Its resource stock is the only part that mutates, via
//! building production and transfer commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::entities::Unit;

/// Resource kinds that can exist in tile stocks and group carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Basic food supply.
    Food,
    /// Timber for construction.
    Wood,
    /// Quarried stone for construction and upgrades.
    Stone,
    /// Smelted iron for higher-tier buildings.
    Iron,
    /// Coin for hiring and upgrades.
    Gold,
}

/// Terrain classification, assigned once by the generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    /// Not yet classified (only during generation passes).
    #[default]
    None,
    /// Polar ice sheet.
    Ice,
    /// Cold treeless plain.
    Tundra,
    /// Northern conifer forest.
    Boreal,
    /// Temperate broadleaf forest.
    Temperate,
    /// Tropical rainforest.
    Tropical,
    /// Open grassland.
    Grassland,
    /// Hot sand desert.
    Desert,
    /// Deep water.
    Ocean,
    /// Shallow coastal water.
    Shore,
    /// High-altitude sparse forest.
    Treeline,
    /// Rocky mountainside.
    Mountain,
    /// Warm coastal sand.
    Beach,
    /// Impassably steep summits.
    Peaks,
    /// Flowing river tile.
    River,
}

impl Biome {
    /// Per-tile movement multiplier in (0, 1]. Lower is slower terrain.
    ///
    /// Never zero: the pathfinder takes the inverse as edge cost.
    pub fn movement_factor(self) -> f64 {
        match self {
            Biome::None => 0.5,
            Biome::Ice => 0.4,
            Biome::Tundra => 0.6,
            Biome::Boreal => 0.55,
            Biome::Temperate => 0.65,
            Biome::Tropical => 0.4,
            Biome::Grassland => 1.0,
            Biome::Desert => 0.5,
            Biome::Ocean => 0.1,
            Biome::Shore => 0.3,
            Biome::Treeline => 0.45,
            Biome::Mountain => 0.25,
            Biome::Beach => 0.8,
            Biome::Peaks => 0.1,
            Biome::River => 0.35,
        }
    }

    /// Whether water covers this tile (used by river routing and beaches).
    pub fn is_water(self) -> bool {
        matches!(self, Biome::Ocean | Biome::Shore | Biome::River)
    }
}

/// One hex cell of the map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain height in [0, 1].
    pub height: f64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Precipitation in [0, 1].
    pub precipitation: f64,
    /// Terrain classification.
    pub biome: Biome,
    /// Resource stock on the tile. Partial map: absent means zero.
    pub resources: BTreeMap<Resource, f64>,
    /// Units on this tile that belong to no group.
    #[serde(default)]
    pub pool: Vec<Unit>,
}

impl Tile {
    /// A pre-generation stub with default values.
    pub fn stub() -> Self {
        Self {
            height: 0.0,
            temperature: 0.0,
            precipitation: 0.0,
            biome: Biome::None,
            resources: BTreeMap::new(),
            pool: Vec::new(),
        }
    }

    /// Current movement multiplier for this tile.
    #[inline]
    pub fn movement_factor(&self) -> f64 {
        self.biome.movement_factor()
    }

    /// Current stock of one resource (zero if absent).
    pub fn stock(&self, resource: Resource) -> f64 {
        self.resources.get(&resource).copied().unwrap_or(0.0)
    }

    /// Add `amount` (may be negative) to a resource stock.
    ///
    /// Callers must check affordability first; this clamps at zero only to
    /// absorb float dust, not to hide overdrafts.
    pub fn adjust_stock(&mut self, resource: Resource, amount: f64) {
        let entry = self.resources.entry(resource).or_insert(0.0);
        *entry = (*entry + amount).max(0.0);
    }

    /// Whether the stock covers every entry of `cost`.
    pub fn can_afford(&self, cost: &BTreeMap<Resource, f64>) -> bool {
        cost.iter().all(|(res, amount)| self.stock(*res) >= *amount)
    }

    /// Deduct a whole cost map. Caller must have verified affordability.
    pub fn deduct(&mut self, cost: &BTreeMap<Resource, f64>) {
        for (res, amount) in cost {
            self.adjust_stock(*res, -amount);
        }
    }
}
