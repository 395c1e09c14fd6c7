//! Per-Player Snapshot Filtering
//!
//! Builds the outbound `gamestate_*` messages for one player. Filtering
//! policy: buildings are shown on every discovered hex (map memory);
//! tiles, groups, and battles only inside the currently visible set (live
//! intel). A (re)connecting player additionally gets their discovered
//! tile map once. Each map is a full replacement, never a delta.

use std::collections::BTreeMap;

use crate::game::world::{PlayerId, World};
use crate::network::protocol::ServerMessage;

/// Build the regular snapshot batch for one player. Uninitialized or
/// unknown players get nothing.
pub fn snapshot(world: &World, player: PlayerId) -> Vec<ServerMessage> {
    let Some(record) = world.players.get(&player) else {
        return Vec::new();
    };
    if !record.initialized {
        return Vec::new();
    }

    let tiles: BTreeMap<_, _> = record
        .visible
        .iter()
        .filter_map(|hex| world.tile(*hex).map(|t| (*hex, t.clone())))
        .collect();

    let groups: BTreeMap<_, _> = world
        .groups
        .iter()
        .filter(|(_, g)| record.visible.contains(&g.pos))
        .map(|(id, g)| (*id, g.clone()))
        .collect();

    let buildings: BTreeMap<_, _> = world
        .buildings
        .iter()
        .filter(|(_, b)| record.discovered.contains(&b.pos))
        .map(|(id, b)| (*id, b.clone()))
        .collect();

    let battles: BTreeMap<_, _> = world
        .battles
        .iter()
        .filter(|(_, b)| record.visible.contains(&b.pos))
        .map(|(id, b)| (*id, b.clone()))
        .collect();

    vec![
        ServerMessage::GamestateTiles { tiles },
        ServerMessage::GamestateGroups { groups },
        ServerMessage::GamestateBuildings { buildings },
        ServerMessage::GamestateBattles { battles },
    ]
}

/// The full discovered-tile map, sent once when a player (re)connects so
/// the client can repaint its map memory before snapshots resume.
pub fn discovered_tiles(world: &World, player: PlayerId) -> Option<ServerMessage> {
    let record = world.players.get(&player)?;
    let tiles: BTreeMap<_, _> = record
        .discovered
        .iter()
        .filter_map(|hex| world.tile(*hex).map(|t| (*hex, t.clone())))
        .collect();
    Some(ServerMessage::GamestateTiles { tiles })
}
