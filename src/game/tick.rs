//! Fixed-Rate Simulation Step
//!
//! One call advances the whole world by `dt` seconds: group movement,
//! building production, battle detection over every contested hex, then
//! battle stepping. Deterministic for a given world, RNG state, and dt,
//! because every collection iterates in BTreeMap order.
//!
//! A processing failure on one entity skips that entity and continues; the
//! tick never aborts as a whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::hex::Hex;
use crate::core::rng::DeterministicRng;
use crate::game::battle::{self, DamageFn};
use crate::game::entities::GroupId;
use crate::game::visibility;
use crate::game::world::World;
use crate::MOVE_STEP;

/// Simulation tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TickConfig {
    /// Global multiplier on group movement speed.
    pub movement_scale: f64,
    /// Global multiplier on building production.
    pub production_scale: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            movement_scale: 1.0,
            production_scale: 1.0,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Groups that stepped onto a new hex this tick.
    pub arrivals: Vec<GroupId>,
    /// Number of battles resolved or dissolved this tick.
    pub battles_closed: usize,
}

/// Advance the world by `dt` seconds.
pub fn advance(
    world: &mut World,
    rng: &mut DeterministicRng,
    config: &TickConfig,
    damage: DamageFn,
    dt: f64,
) -> TickResult {
    let mut result = TickResult::default();
    if !dt.is_finite() || dt <= 0.0 {
        return result;
    }

    advance_movement(world, config, dt, &mut result);
    accrue_production(world, config, dt);
    detect_contacts(world);

    let battles_before = world.battles.len();
    battle::step_all(world, rng, damage);
    result.battles_closed = battles_before.saturating_sub(world.battles.len());

    result
}

/// Movement: progress grows by speed × tile factor × dt; crossing
/// [`MOVE_STEP`] steps the group onto the next path hex exactly once and
/// resets progress to zero. No remainder carries over, so slow terrain
/// cannot bank progress against fast terrain.
fn advance_movement(world: &mut World, config: &TickConfig, dt: f64, result: &mut TickResult) {
    let ids: Vec<GroupId> = world.groups.keys().copied().collect();

    for id in ids {
        let arrival = {
            let Some(group) = world.groups.get(&id) else {
                continue;
            };
            if group.path.is_empty() {
                continue;
            }
            let Some(tile) = world.tiles.get(&group.pos) else {
                debug!(group = id, "movement: group on a missing tile, skipped");
                continue;
            };

            let gain = group.speed * tile.movement_factor() * config.movement_scale * dt;
            let Some(group) = world.groups.get_mut(&id) else {
                continue;
            };
            group.progress += gain;

            if group.progress >= MOVE_STEP {
                group.progress = 0.0;
                group.path.pop_front().map(|next| {
                    group.pos = next;
                    group.owner
                })
            } else {
                None
            }
        };

        if let Some(owner) = arrival {
            result.arrivals.push(id);
            visibility::recompute(world, owner);
        }
    }
}

/// Recheck every hex holding two or more groups. Battles must start
/// whenever hostile groups share a hex, including groups that never moved:
/// spawned together, or turned hostile in place.
fn detect_contacts(world: &mut World) {
    let mut occupancy: BTreeMap<Hex, u32> = BTreeMap::new();
    for group in world.groups.values() {
        *occupancy.entry(group.pos).or_insert(0) += 1;
    }
    for (hex, count) in occupancy {
        if count >= 2 {
            battle::detect_at(world, hex);
        }
    }
}

/// Production: each building accrues its per-second rates into its own
/// tile's stock, scaled by dt.
fn accrue_production(world: &mut World, config: &TickConfig, dt: f64) {
    let deltas: Vec<_> = world
        .buildings
        .values()
        .flat_map(|b| {
            b.production
                .iter()
                .map(move |(res, rate)| (b.pos, *res, rate * config.production_scale * dt))
        })
        .collect();

    for (pos, resource, amount) in deltas {
        if let Some(tile) = world.tiles.get_mut(&pos) {
            tile.adjust_stock(resource, amount);
        }
    }
}
