//! Units, Groups, Buildings, and Battles
//!
//! Entity state types owned by the [`World`](crate::game::world::World)
//! aggregate. Entities reference each other by id only; the world's maps
//! are the single source of truth.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::hex::Hex;
use crate::game::tile::Resource;
use crate::game::world::PlayerId;

/// Monotonic entity identifier, allocated by the world.
pub type EntityId = u32;
/// Identifier of a [`Group`].
pub type GroupId = EntityId;
/// Identifier of a [`Building`].
pub type BuildingId = EntityId;
/// Identifier of a [`Battle`].
pub type BattleId = EntityId;
/// Identifier of a [`Unit`].
pub type UnitId = EntityId;

// =============================================================================
// UNITS
// =============================================================================

/// Lasting injury carried by a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Injury {
    /// Minor, mostly cosmetic.
    Bruised,
    /// Reduces effectiveness until healed.
    Wounded,
    /// Permanent impairment.
    Maimed,
}

/// A single character. Never exists outside a group roster or a tile's
/// unassigned pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    /// Unique unit id.
    pub id: UnitId,
    /// Fighting spirit in [0, 1].
    pub morale: f64,
    /// Offensive combat skill.
    pub attack: f64,
    /// Defensive combat skill.
    pub defense: f64,
    /// Current hit points.
    pub hp: f64,
    /// Hit point ceiling.
    pub max_hp: f64,
    /// Accumulated experience.
    pub experience: u32,
    /// Injuries sustained so far.
    pub injuries: Vec<Injury>,
}

impl Unit {
    /// A fresh recruit with baseline stats.
    pub fn recruit(id: UnitId) -> Self {
        Self {
            id,
            morale: 0.8,
            attack: 5.0,
            defense: 3.0,
            hp: 20.0,
            max_hp: 20.0,
            experience: 0,
            injuries: Vec::new(),
        }
    }

    /// Whether the unit is still able to fight.
    #[inline]
    pub fn alive(&self) -> bool {
        self.hp > 0.0
    }
}

// =============================================================================
// GROUPS
// =============================================================================

/// A mobile party of units.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    /// Unique group id.
    pub id: GroupId,
    /// Owning player.
    pub owner: PlayerId,
    /// Current hex position.
    pub pos: Hex,
    /// Remaining path; front is the next hex to step onto.
    pub path: VecDeque<Hex>,
    /// Movement progress toward the next hex, in [0, 100).
    pub progress: f64,
    /// Base movement speed in progress units per second.
    pub speed: f64,
    /// Number of hex rings this group can see.
    pub spotting: i32,
    /// Resources the group carries.
    pub carry: BTreeMap<Resource, f64>,
    /// Member units.
    pub units: Vec<Unit>,
}

impl Group {
    /// Default spotting radius for a fresh group.
    pub const DEFAULT_SPOTTING: i32 = 2;
    /// Default movement speed.
    pub const DEFAULT_SPEED: f64 = 40.0;

    /// Create an empty group at `pos`.
    pub fn new(id: GroupId, owner: PlayerId, pos: Hex) -> Self {
        Self {
            id,
            owner,
            pos,
            path: VecDeque::new(),
            progress: 0.0,
            speed: Self::DEFAULT_SPEED,
            spotting: Self::DEFAULT_SPOTTING,
            carry: BTreeMap::new(),
            units: Vec::new(),
        }
    }

    /// Whether the group has any living unit.
    pub fn has_living_units(&self) -> bool {
        self.units.iter().any(Unit::alive)
    }

    /// Aggregate attack strength of living units, scaled by morale.
    pub fn strength(&self) -> f64 {
        self.units
            .iter()
            .filter(|u| u.alive())
            .map(|u| u.attack * u.morale.max(0.1))
            .sum()
    }

    /// Carried amount of one resource (zero if absent).
    pub fn carried(&self, resource: Resource) -> f64 {
        self.carry.get(&resource).copied().unwrap_or(0.0)
    }

    /// Add `amount` (may be negative) to the carry.
    pub fn adjust_carry(&mut self, resource: Resource, amount: f64) {
        let entry = self.carry.entry(resource).or_insert(0.0);
        *entry = (*entry + amount).max(0.0);
    }

    /// Replace the current path and restart movement progress.
    pub fn set_path(&mut self, path: Vec<Hex>) {
        self.path = path.into();
        self.progress = 0.0;
    }

    /// Drop dead units from the roster, returning how many were removed.
    pub fn bury_dead(&mut self) -> usize {
        let before = self.units.len();
        self.units.retain(Unit::alive);
        before - self.units.len()
    }
}

// =============================================================================
// BUILDINGS
// =============================================================================

/// Building type key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// Wood production, modest spotting.
    LumberCamp,
    /// Stone production.
    Quarry,
    /// Food production, gathering slots.
    Farm,
    /// Iron production at higher levels.
    Mine,
    /// No production; wide spotting radius.
    Watchtower,
}

/// Per-level template: production rates, spotting, slots, and the cost to
/// reach this level (base cost for level 1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildingLevel {
    /// Production per second, accrued into the tile stock.
    pub production: BTreeMap<Resource, f64>,
    /// Spotting radius at this level.
    pub spotting: i32,
    /// Number of gathering slots at this level.
    pub slots: usize,
    /// Resource cost to construct (level 1) or upgrade to this level.
    pub cost: BTreeMap<Resource, f64>,
}

fn rates(entries: &[(Resource, f64)]) -> BTreeMap<Resource, f64> {
    entries.iter().copied().collect()
}

impl BuildingKind {
    /// Level templates for this kind, index 0 = level 1.
    pub fn levels(self) -> Vec<BuildingLevel> {
        match self {
            BuildingKind::LumberCamp => vec![
                BuildingLevel {
                    production: rates(&[(Resource::Wood, 0.5)]),
                    spotting: 1,
                    slots: 1,
                    cost: rates(&[(Resource::Wood, 10.0)]),
                },
                BuildingLevel {
                    production: rates(&[(Resource::Wood, 1.2)]),
                    spotting: 1,
                    slots: 2,
                    cost: rates(&[(Resource::Wood, 25.0), (Resource::Stone, 10.0)]),
                },
            ],
            BuildingKind::Quarry => vec![
                BuildingLevel {
                    production: rates(&[(Resource::Stone, 0.4)]),
                    spotting: 1,
                    slots: 1,
                    cost: rates(&[(Resource::Wood, 15.0)]),
                },
                BuildingLevel {
                    production: rates(&[(Resource::Stone, 1.0)]),
                    spotting: 1,
                    slots: 2,
                    cost: rates(&[(Resource::Wood, 20.0), (Resource::Stone, 15.0)]),
                },
            ],
            BuildingKind::Farm => vec![
                BuildingLevel {
                    production: rates(&[(Resource::Food, 0.8)]),
                    spotting: 1,
                    slots: 2,
                    cost: rates(&[(Resource::Wood, 12.0)]),
                },
                BuildingLevel {
                    production: rates(&[(Resource::Food, 2.0)]),
                    spotting: 1,
                    slots: 3,
                    cost: rates(&[(Resource::Wood, 30.0), (Resource::Stone, 10.0)]),
                },
            ],
            BuildingKind::Mine => vec![
                BuildingLevel {
                    production: rates(&[(Resource::Stone, 0.2), (Resource::Iron, 0.1)]),
                    spotting: 1,
                    slots: 1,
                    cost: rates(&[(Resource::Wood, 25.0), (Resource::Stone, 20.0)]),
                },
                BuildingLevel {
                    production: rates(&[(Resource::Iron, 0.5), (Resource::Gold, 0.05)]),
                    spotting: 1,
                    slots: 2,
                    cost: rates(&[(Resource::Wood, 40.0), (Resource::Iron, 10.0)]),
                },
            ],
            BuildingKind::Watchtower => vec![
                BuildingLevel {
                    production: BTreeMap::new(),
                    spotting: 4,
                    slots: 0,
                    cost: rates(&[(Resource::Wood, 20.0), (Resource::Stone, 10.0)]),
                },
                BuildingLevel {
                    production: BTreeMap::new(),
                    spotting: 6,
                    slots: 0,
                    cost: rates(&[(Resource::Stone, 30.0), (Resource::Iron, 5.0)]),
                },
            ],
        }
    }

    /// Template for a 1-based level, if defined.
    pub fn level(self, level: u32) -> Option<BuildingLevel> {
        if level == 0 {
            return None;
        }
        self.levels().into_iter().nth(level as usize - 1)
    }

    /// Highest defined level for this kind.
    pub fn max_level(self) -> u32 {
        self.levels().len() as u32
    }
}

/// A resource-gathering slot on a building.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatherSlot {
    /// Group assigned to work this slot, if any.
    pub group: Option<GroupId>,
    /// Specific unit working the slot, if any.
    pub unit: Option<UnitId>,
    /// Work efficiency multiplier in [0, 1].
    pub efficiency: f64,
}

/// A stationary player-owned structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Building {
    /// Unique building id.
    pub id: BuildingId,
    /// Owning player.
    pub owner: PlayerId,
    /// Hex position.
    pub pos: Hex,
    /// Type key.
    pub kind: BuildingKind,
    /// Current level (1-based).
    pub level: u32,
    /// Production per second at the current level.
    pub production: BTreeMap<Resource, f64>,
    /// Spotting radius at the current level.
    pub spotting: i32,
    /// Gathering slots at the current level.
    pub slots: Vec<GatherSlot>,
}

impl Building {
    /// Construct a level-1 building. Returns `None` for kinds without a
    /// level-1 template (none currently, but the contract is total).
    pub fn construct(id: BuildingId, owner: PlayerId, pos: Hex, kind: BuildingKind) -> Option<Self> {
        let template = kind.level(1)?;
        Some(Self {
            id,
            owner,
            pos,
            kind,
            level: 1,
            production: template.production,
            spotting: template.spotting,
            slots: vec![GatherSlot::default(); template.slots],
        })
    }

    /// Apply the next level's template atomically. Returns false when
    /// already at max level.
    pub fn apply_upgrade(&mut self) -> bool {
        let next = self.level + 1;
        let Some(template) = self.kind.level(next) else {
            return false;
        };
        self.level = next;
        self.production = template.production;
        self.spotting = template.spotting;
        // Existing assignments survive where slots remain
        self.slots.resize_with(template.slots, GatherSlot::default);
        true
    }
}

// =============================================================================
// BATTLES
// =============================================================================

/// An ongoing fight between two co-located hostile groups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Battle {
    /// Unique battle id.
    pub id: BattleId,
    /// Group that arrived second.
    pub attacker: GroupId,
    /// Group that held the hex.
    pub defender: GroupId,
    /// Contested hex.
    pub pos: Hex,
}
