//! Fog-of-War Visibility
//!
//! A player's visible set is the union of spotting ranges of every group and
//! building they own, intersected with the tiles that actually exist. The
//! discovered set accumulates every visible set ever computed and only grows.
//!
//! Recompute triggers: group arrival at a new hex, construction, demolition,
//! upgrade, disband, battle resolution, and world load.

use std::collections::BTreeSet;

use crate::core::hex::Hex;
use crate::game::world::{PlayerId, World};

/// Recompute one player's visible set and fold it into their discovered set.
pub fn recompute(world: &mut World, player: PlayerId) {
    let mut visible: BTreeSet<Hex> = BTreeSet::new();

    for group in world.groups.values().filter(|g| g.owner == player) {
        extend_range(&mut visible, world, group.pos, group.spotting);
    }
    for building in world.buildings.values().filter(|b| b.owner == player) {
        extend_range(&mut visible, world, building.pos, building.spotting);
    }

    let record = world.ensure_player(player);
    record.discovered.extend(visible.iter().copied());
    record.visible = visible;
}

/// Recompute every known player. Used after world load.
pub fn recompute_all(world: &mut World) {
    let players: Vec<PlayerId> = world.players.keys().copied().collect();
    for player in players {
        recompute(world, player);
    }
}

fn extend_range(out: &mut BTreeSet<Hex>, world: &World, center: Hex, radius: i32) {
    for hex in center.range(radius.max(0)) {
        if world.tiles.contains_key(&hex) {
            out.insert(hex);
        }
    }
}
