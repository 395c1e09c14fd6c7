//! Authoritative World State
//!
//! The [`World`] aggregate owns every tile, group, building, battle, player,
//! and relation by id/hash map. It is mutated only from the game-loop task:
//! command handlers and the tick both run there, never concurrently.
//!
//! All collections are `BTreeMap`/`BTreeSet` so iteration order is
//! deterministic and identical across platforms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::hex::Hex;
use crate::game::entities::{
    Battle, BattleId, Building, BuildingId, EntityId, Group, GroupId, Unit,
};
use crate::game::tile::Tile;

// =============================================================================
// PLAYER IDENTITY
// =============================================================================

/// Unique player identifier, stable across reconnects.
///
/// Serializes as a 32-character hex string so it can key JSON maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Hex-encoded form, used as the wire and storage key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex-encoded form.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Create from a UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(*uuid.as_bytes())
    }

    /// Generate a random player ID (for tests and local play).
    pub fn random() -> Self {
        Self::from_uuid(uuid::Uuid::new_v4())
    }

    /// Get as UUID for display.
    pub fn as_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes(self.0)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_uuid())
    }
}

impl Serialize for PlayerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PlayerId::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid player id: {s}")))
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Diplomatic stance between two players.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// No agreement either way.
    Neutral,
    /// Allied; co-location never starts a battle.
    Friendly,
    /// At war. The default for strangers.
    #[default]
    Hostile,
}

/// Canonical unordered player pair: the lower id always comes first, so
/// `key(a, b) == key(b, a)`.
///
/// Serializes as `"<hex a>:<hex b>"` so it can key JSON maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelationKey(PlayerId, PlayerId);

impl RelationKey {
    /// Build the canonical key for an unordered pair.
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// The pair in canonical order.
    pub fn pair(&self) -> (PlayerId, PlayerId) {
        (self.0, self.1)
    }
}

impl Serialize for RelationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}:{}", self.0.to_hex(), self.1.to_hex()))
    }
}

impl<'de> Deserialize<'de> for RelationKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let parse = || {
            let (a, b) = s.split_once(':')?;
            Some(RelationKey::new(PlayerId::from_hex(a)?, PlayerId::from_hex(b)?))
        };
        parse().ok_or_else(|| serde::de::Error::custom(format!("invalid relation key: {s}")))
    }
}

// =============================================================================
// PLAYERS
// =============================================================================

/// Per-player session state tracked by the world.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Stable player identity.
    pub uid: PlayerId,
    /// Set once the player has a starting group and an initial snapshot.
    pub initialized: bool,
    /// Every hex this player has ever seen. Never shrinks.
    pub discovered: BTreeSet<Hex>,
    /// Hexes currently in range of the player's live entities.
    pub visible: BTreeSet<Hex>,
}

impl Player {
    fn new(uid: PlayerId) -> Self {
        Self {
            uid,
            initialized: false,
            discovered: BTreeSet::new(),
            visible: BTreeSet::new(),
        }
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// The authoritative aggregate of all game state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    /// Player-facing seed string the map was generated from.
    pub seed: String,
    /// Map radius in hexes.
    pub radius: i32,
    /// All tiles, keyed by hex.
    pub tiles: BTreeMap<Hex, Tile>,
    /// All mobile groups.
    pub groups: BTreeMap<GroupId, Group>,
    /// All buildings.
    pub buildings: BTreeMap<BuildingId, Building>,
    /// All ongoing battles.
    pub battles: BTreeMap<BattleId, Battle>,
    /// All players ever seen this session.
    pub players: BTreeMap<PlayerId, Player>,
    /// Diplomatic relations, lazily created.
    pub relations: BTreeMap<RelationKey, Relation>,
    /// Monotonic id allocator for all entity kinds.
    next_id: EntityId,
}

impl World {
    /// Wrap a generated tile map into an empty world.
    pub fn from_tiles(seed: String, radius: i32, tiles: BTreeMap<Hex, Tile>) -> Self {
        Self {
            seed,
            radius,
            tiles,
            groups: BTreeMap::new(),
            buildings: BTreeMap::new(),
            battles: BTreeMap::new(),
            players: BTreeMap::new(),
            relations: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Allocate the next entity id.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Tile at `hex`, if inside the map.
    pub fn tile(&self, hex: Hex) -> Option<&Tile> {
        self.tiles.get(&hex)
    }

    /// Mutable tile at `hex`.
    pub fn tile_mut(&mut self, hex: Hex) -> Option<&mut Tile> {
        self.tiles.get_mut(&hex)
    }

    /// Ids of all groups standing on `hex`.
    pub fn groups_at(&self, hex: Hex) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|g| g.pos == hex)
            .map(|g| g.id)
            .collect()
    }

    /// Whether a building of any kind stands on `hex`.
    pub fn building_at(&self, hex: Hex) -> Option<BuildingId> {
        self.buildings.values().find(|b| b.pos == hex).map(|b| b.id)
    }

    /// Whether `player` has a group or building on `hex`.
    pub fn has_presence(&self, player: PlayerId, hex: Hex) -> bool {
        self.groups
            .values()
            .any(|g| g.owner == player && g.pos == hex)
            || self
                .buildings
                .values()
                .any(|b| b.owner == player && b.pos == hex)
    }

    // -------------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------------

    /// Fetch or create the player record for `uid`.
    pub fn ensure_player(&mut self, uid: PlayerId) -> &mut Player {
        self.players.entry(uid).or_insert_with(|| Player::new(uid))
    }

    /// Spawn a starting group for a player who has none, on the most central
    /// walkable land tile. Returns the new group id, or `None` when no land
    /// exists (degenerate all-water maps).
    pub fn spawn_starting_group(&mut self, uid: PlayerId, units: usize) -> Option<GroupId> {
        // Deterministic scan outward from the center
        let spawn = (0..=self.radius)
            .flat_map(|r| Hex::ZERO.ring(r))
            .find(|hex| {
                self.tiles
                    .get(hex)
                    .is_some_and(|t| !t.biome.is_water() && t.movement_factor() >= 0.25)
                    && self.groups_at(*hex).is_empty()
            })?;

        let id = self.allocate_id();
        let mut group = Group::new(id, uid, spawn);
        for _ in 0..units {
            let unit_id = self.next_id;
            self.next_id += 1;
            group.units.push(Unit::recruit(unit_id));
        }
        self.groups.insert(id, group);
        self.ensure_player(uid).initialized = true;

        info!(player = %uid, group = id, pos = %spawn.key(), "spawned starting group");
        Some(id)
    }

    // -------------------------------------------------------------------------
    // Relations
    // -------------------------------------------------------------------------

    /// Look up, lazily creating (default hostile), the relation between two
    /// players. Argument order does not matter.
    pub fn relation(&mut self, a: PlayerId, b: PlayerId) -> Relation {
        if a == b {
            return Relation::Friendly;
        }
        *self
            .relations
            .entry(RelationKey::new(a, b))
            .or_default()
    }

    /// Set the relation between two players.
    pub fn set_relation(&mut self, a: PlayerId, b: PlayerId, relation: Relation) {
        if a == b {
            return;
        }
        self.relations.insert(RelationKey::new(a, b), relation);
    }

    /// Whether two players are currently at war. Distinct players with no
    /// recorded relation are hostile by default.
    pub fn are_hostile(&mut self, a: PlayerId, b: PlayerId) -> bool {
        self.relation(a, b) == Relation::Hostile
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Remove a group and any battle that references it.
    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let group = self.groups.remove(&id)?;
        self.battles
            .retain(|_, b| b.attacker != id && b.defender != id);
        Some(group)
    }

    /// Remove a building.
    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        self.buildings.remove(&id)
    }
}
