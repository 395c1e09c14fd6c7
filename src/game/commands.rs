//! Player Command Handlers
//!
//! Every inbound intent is validated here before it touches the world.
//! Failure policy: ownership violations, referential misses, and
//! affordability failures are all dropped without effect; a warning or
//! debug log is the only trace. Handlers never panic and never leave the
//! world partially mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::hex::Hex;
use crate::game::entities::{Building, BuildingId, BuildingKind, GroupId, UnitId};
use crate::game::path::{astar, CostMode};
use crate::game::tile::{Resource, Tile};
use crate::game::visibility;
use crate::game::world::{PlayerId, Relation, World};

/// A validated player intent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Path a group toward a target hex.
    Move {
        /// Group to move.
        group: GroupId,
        /// Destination hex.
        target: Hex,
    },
    /// Construct a level-1 building.
    Construct {
        /// Target hex.
        pos: Hex,
        /// Building type to construct.
        kind: BuildingKind,
    },
    /// Upgrade a building one level.
    Upgrade {
        /// Building to upgrade.
        building: BuildingId,
    },
    /// Remove a building.
    Demolish {
        /// Building to remove.
        building: BuildingId,
    },
    /// Remove a group; its units return to the tile pool.
    Disband {
        /// Group to disband.
        group: GroupId,
    },
    /// Move resources between a group's carry and its tile's stock.
    /// Positive amounts go tile to group.
    Transfer {
        /// Group involved.
        group: GroupId,
        /// Resource kind.
        resource: Resource,
        /// Signed amount; positive loads the group.
        amount: f64,
    },
    /// Move a unit from the tile's unassigned pool into a group.
    UnitAdd {
        /// Receiving group.
        group: GroupId,
        /// Unit to add.
        unit: UnitId,
    },
    /// Move a unit from a group into the tile's unassigned pool.
    UnitRemove {
        /// Source group.
        group: GroupId,
        /// Unit to remove.
        unit: UnitId,
    },
    /// Set the caller's relation to another player.
    SetRelation {
        /// The other player.
        other: PlayerId,
        /// New stance.
        relation: Relation,
    },
    /// Query the relation between two players.
    QueryRelation {
        /// First player.
        a: PlayerId,
        /// Second player.
        b: PlayerId,
    },
    /// Request tile data for specific hexes the caller has discovered.
    RequestTiles {
        /// Hexes of interest.
        hexes: Vec<Hex>,
    },
}

/// Direct replies to query-style commands. Mutating commands reply with
/// nothing; their effect shows up in the next snapshot.
#[derive(Clone, Debug)]
pub enum CommandReply {
    /// Answer to [`Command::QueryRelation`].
    Relation {
        /// First player of the queried pair.
        a: PlayerId,
        /// Second player of the queried pair.
        b: PlayerId,
        /// Current stance.
        relation: Relation,
    },
    /// Answer to [`Command::RequestTiles`]: only hexes the caller has
    /// discovered.
    Tiles(BTreeMap<Hex, Tile>),
}

/// Validate and apply one command from `caller`. Returns a reply only for
/// query commands.
pub fn apply(world: &mut World, caller: PlayerId, command: Command) -> Option<CommandReply> {
    match command {
        Command::Move { group, target } => {
            handle_move(world, caller, group, target);
            None
        }
        Command::Construct { pos, kind } => {
            handle_construct(world, caller, pos, kind);
            None
        }
        Command::Upgrade { building } => {
            handle_upgrade(world, caller, building);
            None
        }
        Command::Demolish { building } => {
            handle_demolish(world, caller, building);
            None
        }
        Command::Disband { group } => {
            handle_disband(world, caller, group);
            None
        }
        Command::Transfer {
            group,
            resource,
            amount,
        } => {
            handle_transfer(world, caller, group, resource, amount);
            None
        }
        Command::UnitAdd { group, unit } => {
            handle_unit_add(world, caller, group, unit);
            None
        }
        Command::UnitRemove { group, unit } => {
            handle_unit_remove(world, caller, group, unit);
            None
        }
        Command::SetRelation { other, relation } => {
            if other != caller {
                world.set_relation(caller, other, relation);
            }
            None
        }
        Command::QueryRelation { a, b } => {
            let relation = world.relation(a, b);
            Some(CommandReply::Relation { a, b, relation })
        }
        Command::RequestTiles { hexes } => {
            let discovered = world
                .players
                .get(&caller)
                .map(|p| p.discovered.clone())
                .unwrap_or_default();
            let tiles = hexes
                .into_iter()
                .filter(|hex| discovered.contains(hex))
                .filter_map(|hex| world.tile(hex).map(|t| (hex, t.clone())))
                .collect();
            Some(CommandReply::Tiles(tiles))
        }
    }
}

fn handle_move(world: &mut World, caller: PlayerId, group_id: GroupId, target: Hex) {
    let Some(group) = world.groups.get(&group_id) else {
        debug!(group = group_id, "move: no such group");
        return;
    };
    if group.owner != caller {
        warn!(player = %caller, group = group_id, "move: not the owner");
        return;
    }
    if !world.tiles.contains_key(&target) {
        debug!(target = %target.key(), "move: target outside the map");
        return;
    }

    let Some(path) = astar(&world.tiles, group.pos, target, CostMode::Weighted) else {
        debug!(group = group_id, target = %target.key(), "move: unreachable");
        return;
    };

    if let Some(group) = world.groups.get_mut(&group_id) {
        group.set_path(path);
    }
}

fn handle_construct(world: &mut World, caller: PlayerId, pos: Hex, kind: BuildingKind) {
    if !world.has_presence(caller, pos) {
        warn!(player = %caller, pos = %pos.key(), "construct: no presence on tile");
        return;
    }
    let Some(template) = kind.level(1) else {
        return;
    };
    let Some(tile) = world.tiles.get(&pos) else {
        return;
    };
    if world.building_at(pos).is_some() {
        debug!(pos = %pos.key(), "construct: tile already built");
        return;
    }
    if !tile.can_afford(&template.cost) {
        debug!(player = %caller, pos = %pos.key(), "construct: unaffordable");
        return;
    }

    let id = world.allocate_id();
    let Some(building) = Building::construct(id, caller, pos, kind) else {
        return;
    };
    if let Some(tile) = world.tile_mut(pos) {
        tile.deduct(&template.cost);
    }
    world.buildings.insert(id, building);
    visibility::recompute(world, caller);
}

fn handle_upgrade(world: &mut World, caller: PlayerId, building_id: BuildingId) {
    let Some(building) = world.buildings.get(&building_id) else {
        debug!(building = building_id, "upgrade: no such building");
        return;
    };
    if building.owner != caller {
        warn!(player = %caller, building = building_id, "upgrade: not the owner");
        return;
    }
    let Some(template) = building.kind.level(building.level + 1) else {
        debug!(building = building_id, "upgrade: already at max level");
        return;
    };
    let pos = building.pos;
    let affordable = world
        .tile(pos)
        .is_some_and(|t| t.can_afford(&template.cost));
    if !affordable {
        debug!(building = building_id, "upgrade: unaffordable");
        return;
    }

    if let Some(tile) = world.tile_mut(pos) {
        tile.deduct(&template.cost);
    }
    if let Some(building) = world.buildings.get_mut(&building_id) {
        building.apply_upgrade();
    }
    visibility::recompute(world, caller);
}

fn handle_demolish(world: &mut World, caller: PlayerId, building_id: BuildingId) {
    let owned = world
        .buildings
        .get(&building_id)
        .is_some_and(|b| b.owner == caller);
    if !owned {
        warn!(player = %caller, building = building_id, "demolish: not the owner");
        return;
    }
    world.remove_building(building_id);
    visibility::recompute(world, caller);
}

fn handle_disband(world: &mut World, caller: PlayerId, group_id: GroupId) {
    let owned = world
        .groups
        .get(&group_id)
        .is_some_and(|g| g.owner == caller);
    if !owned {
        warn!(player = %caller, group = group_id, "disband: not the owner");
        return;
    }
    if let Some(group) = world.remove_group(group_id) {
        // Units return to the tile pool, carry spills onto the tile
        if let Some(tile) = world.tile_mut(group.pos) {
            tile.pool.extend(group.units);
            for (resource, amount) in group.carry {
                tile.adjust_stock(resource, amount);
            }
        }
    }
    visibility::recompute(world, caller);
}

fn handle_transfer(
    world: &mut World,
    caller: PlayerId,
    group_id: GroupId,
    resource: Resource,
    amount: f64,
) {
    if !amount.is_finite() {
        return;
    }
    let Some(group) = world.groups.get(&group_id) else {
        return;
    };
    if group.owner != caller {
        warn!(player = %caller, group = group_id, "transfer: not the owner");
        return;
    }
    let pos = group.pos;

    // Positive loads the group from the tile; reject if either side would
    // go negative. No partial mutation on rejection.
    let tile_stock = match world.tile(pos) {
        Some(tile) => tile.stock(resource),
        None => return,
    };
    let carried = group.carried(resource);
    if amount > 0.0 && tile_stock < amount {
        debug!(group = group_id, "transfer: tile stock too low");
        return;
    }
    if amount < 0.0 && carried < -amount {
        debug!(group = group_id, "transfer: carry too low");
        return;
    }

    if let Some(tile) = world.tile_mut(pos) {
        tile.adjust_stock(resource, -amount);
    }
    if let Some(group) = world.groups.get_mut(&group_id) {
        group.adjust_carry(resource, amount);
    }
}

fn handle_unit_add(world: &mut World, caller: PlayerId, group_id: GroupId, unit_id: UnitId) {
    let Some(group) = world.groups.get(&group_id) else {
        return;
    };
    if group.owner != caller {
        warn!(player = %caller, group = group_id, "unit add: not the owner");
        return;
    }
    let pos = group.pos;

    let unit = match world.tile_mut(pos) {
        Some(tile) => {
            let idx = tile.pool.iter().position(|u| u.id == unit_id);
            idx.map(|i| tile.pool.remove(i))
        }
        None => None,
    };
    let Some(unit) = unit else {
        debug!(unit = unit_id, "unit add: not in tile pool");
        return;
    };
    if let Some(group) = world.groups.get_mut(&group_id) {
        group.units.push(unit);
    }
}

fn handle_unit_remove(world: &mut World, caller: PlayerId, group_id: GroupId, unit_id: UnitId) {
    let Some(group) = world.groups.get_mut(&group_id) else {
        return;
    };
    if group.owner != caller {
        warn!(player = %caller, group = group_id, "unit remove: not the owner");
        return;
    }
    let pos = group.pos;
    let Some(idx) = group.units.iter().position(|u| u.id == unit_id) else {
        debug!(unit = unit_id, "unit remove: not in roster");
        return;
    };
    let unit = group.units.remove(idx);
    if let Some(tile) = world.tile_mut(pos) {
        tile.pool.push(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Group, Unit};
    use crate::game::tile::Biome;

    fn flat_world(radius: i32) -> World {
        let tiles = Hex::ZERO
            .range(radius)
            .into_iter()
            .map(|hex| {
                let mut tile = Tile::stub();
                tile.biome = Biome::Grassland;
                (hex, tile)
            })
            .collect();
        World::from_tiles("test".into(), radius, tiles)
    }

    fn world_with_group(radius: i32) -> (World, PlayerId, GroupId) {
        let mut world = flat_world(radius);
        let player = PlayerId::new([1; 16]);
        let id = world.allocate_id();
        world.groups.insert(id, Group::new(id, player, Hex::ZERO));
        (world, player, id)
    }

    #[test]
    fn test_move_sets_path() {
        let (mut world, player, group) = world_with_group(3);
        apply(
            &mut world,
            player,
            Command::Move {
                group,
                target: Hex::axial(2, 0),
            },
        );

        let g = &world.groups[&group];
        assert_eq!(g.path.len(), 2);
        assert_eq!(*g.path.back().unwrap(), Hex::axial(2, 0));
        assert_eq!(g.progress, 0.0);
    }

    #[test]
    fn test_move_rejects_wrong_owner() {
        let (mut world, _, group) = world_with_group(3);
        let intruder = PlayerId::new([9; 16]);
        apply(
            &mut world,
            intruder,
            Command::Move {
                group,
                target: Hex::axial(2, 0),
            },
        );
        assert!(world.groups[&group].path.is_empty());
    }

    #[test]
    fn test_move_supersedes_previous_order() {
        let (mut world, player, group) = world_with_group(3);
        apply(
            &mut world,
            player,
            Command::Move {
                group,
                target: Hex::axial(3, 0),
            },
        );
        world.groups.get_mut(&group).unwrap().progress = 60.0;

        apply(
            &mut world,
            player,
            Command::Move {
                group,
                target: Hex::axial(0, 2),
            },
        );
        let g = &world.groups[&group];
        assert_eq!(*g.path.back().unwrap(), Hex::axial(0, 2));
        assert_eq!(g.progress, 0.0);
    }

    #[test]
    fn test_construct_requires_presence_and_funds() {
        let (mut world, player, _) = world_with_group(2);
        let pos = Hex::ZERO;

        // No funds yet
        apply(
            &mut world,
            player,
            Command::Construct {
                pos,
                kind: BuildingKind::Farm,
            },
        );
        assert!(world.buildings.is_empty());
        assert_eq!(world.tile(pos).unwrap().stock(Resource::Wood), 0.0);

        // Fund the tile
        world.tile_mut(pos).unwrap().adjust_stock(Resource::Wood, 50.0);
        apply(
            &mut world,
            player,
            Command::Construct {
                pos,
                kind: BuildingKind::Farm,
            },
        );
        assert_eq!(world.buildings.len(), 1);
        assert_eq!(world.tile(pos).unwrap().stock(Resource::Wood), 38.0);

        // No presence elsewhere
        let far = Hex::axial(2, 0);
        world.tile_mut(far).unwrap().adjust_stock(Resource::Wood, 50.0);
        apply(
            &mut world,
            player,
            Command::Construct {
                pos: far,
                kind: BuildingKind::Farm,
            },
        );
        assert_eq!(world.buildings.len(), 1);
    }

    #[test]
    fn test_upgrade_applies_next_level() {
        let (mut world, player, _) = world_with_group(2);
        let pos = Hex::ZERO;
        world.tile_mut(pos).unwrap().adjust_stock(Resource::Wood, 100.0);
        world.tile_mut(pos).unwrap().adjust_stock(Resource::Stone, 100.0);

        apply(
            &mut world,
            player,
            Command::Construct {
                pos,
                kind: BuildingKind::Farm,
            },
        );
        let id = *world.buildings.keys().next().unwrap();

        apply(&mut world, player, Command::Upgrade { building: id });
        assert_eq!(world.buildings[&id].level, 2);
        assert_eq!(world.buildings[&id].slots.len(), 3);
    }

    #[test]
    fn test_transfer_rejects_overdraft_unchanged() {
        let (mut world, player, group) = world_with_group(2);
        world
            .tile_mut(Hex::ZERO)
            .unwrap()
            .adjust_stock(Resource::Food, 5.0);

        // Ask for more than the tile holds
        apply(
            &mut world,
            player,
            Command::Transfer {
                group,
                resource: Resource::Food,
                amount: 10.0,
            },
        );
        assert_eq!(world.tile(Hex::ZERO).unwrap().stock(Resource::Food), 5.0);
        assert_eq!(world.groups[&group].carried(Resource::Food), 0.0);

        // Unload more than carried
        apply(
            &mut world,
            player,
            Command::Transfer {
                group,
                resource: Resource::Food,
                amount: -1.0,
            },
        );
        assert_eq!(world.tile(Hex::ZERO).unwrap().stock(Resource::Food), 5.0);
        assert_eq!(world.groups[&group].carried(Resource::Food), 0.0);

        // A legal transfer works
        apply(
            &mut world,
            player,
            Command::Transfer {
                group,
                resource: Resource::Food,
                amount: 3.0,
            },
        );
        assert_eq!(world.tile(Hex::ZERO).unwrap().stock(Resource::Food), 2.0);
        assert_eq!(world.groups[&group].carried(Resource::Food), 3.0);
    }

    #[test]
    fn test_unit_add_remove_roundtrip() {
        let (mut world, player, group) = world_with_group(2);
        let unit_id = world.allocate_id();
        world.groups.get_mut(&group).unwrap().units.push(Unit::recruit(unit_id));

        apply(&mut world, player, Command::UnitRemove { group, unit: unit_id });
        assert!(world.groups[&group].units.is_empty());
        assert_eq!(world.tile(Hex::ZERO).unwrap().pool.len(), 1);

        apply(&mut world, player, Command::UnitAdd { group, unit: unit_id });
        assert_eq!(world.groups[&group].units.len(), 1);
        assert!(world.tile(Hex::ZERO).unwrap().pool.is_empty());
    }

    #[test]
    fn test_disband_returns_units_and_carry() {
        let (mut world, player, group) = world_with_group(2);
        {
            let g = world.groups.get_mut(&group).unwrap();
            g.units.push(Unit::recruit(99));
            g.adjust_carry(Resource::Wood, 7.0);
        }

        apply(&mut world, player, Command::Disband { group });
        assert!(world.groups.is_empty());
        let tile = world.tile(Hex::ZERO).unwrap();
        assert_eq!(tile.pool.len(), 1);
        assert_eq!(tile.stock(Resource::Wood), 7.0);
    }

    #[test]
    fn test_relation_query_creates_default() {
        let (mut world, player, _) = world_with_group(1);
        let other = PlayerId::new([5; 16]);

        let reply = apply(&mut world, player, Command::QueryRelation { a: player, b: other });
        let Some(CommandReply::Relation { relation, .. }) = reply else {
            panic!("expected relation reply");
        };
        assert_eq!(relation, Relation::Hostile);
    }

    #[test]
    fn test_request_tiles_filtered_by_discovery() {
        let (mut world, player, _) = world_with_group(3);
        visibility::recompute(&mut world, player);

        let near = Hex::axial(1, 0);
        let far = Hex::axial(3, 0);
        let reply = apply(
            &mut world,
            player,
            Command::RequestTiles {
                hexes: vec![near, far],
            },
        );
        let Some(CommandReply::Tiles(tiles)) = reply else {
            panic!("expected tiles reply");
        };
        assert!(tiles.contains_key(&near));
        assert!(!tiles.contains_key(&far));
    }
}
