//! Battle Detection and Resolution
//!
//! A battle exists iff two distinct, mutually hostile groups share a hex.
//! Both directions are rechecked every tick: the tick sweeps every hex
//! holding two or more groups through [`detect_at`], and every existing
//! battle is re-verified, so if the groups are gone, separated, or no
//! longer hostile, the battle dissolves with no victor.
//!
//! The damage formula is a policy, not a contract. It is pluggable through
//! [`DamageFn`]; the default gives higher attack a higher expected damage
//! and always terminates because damage is bounded away from zero.

use tracing::{debug, info};

use crate::core::hex::Hex;
use crate::core::rng::DeterministicRng;
use crate::game::entities::{Battle, BattleId, GroupId};
use crate::game::visibility;
use crate::game::world::World;

/// Damage dealt per tick given the striking side's aggregate strength.
pub type DamageFn = fn(strength: f64, rng: &mut DeterministicRng) -> f64;

/// Default policy: strength scaled by a randomized factor in [0.75, 1.25).
pub fn default_damage(strength: f64, rng: &mut DeterministicRng) -> f64 {
    strength * (0.75 + 0.5 * rng.next_f64())
}

/// Scan the groups on `hex` and open battles between hostile pairs that are
/// not already fighting. The tick calls this for every contested hex.
pub fn detect_at(world: &mut World, hex: Hex) {
    let ids = world.groups_at(hex);
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (a, b) = (ids[i], ids[j]);
            let (owner_a, owner_b) = match (world.groups.get(&a), world.groups.get(&b)) {
                (Some(ga), Some(gb)) => (ga.owner, gb.owner),
                _ => continue,
            };
            if owner_a == owner_b || !world.are_hostile(owner_a, owner_b) {
                continue;
            }
            if battle_between(world, a, b).is_some() {
                continue;
            }

            let id = world.allocate_id();
            // The later-arriving group carries the higher id
            let (attacker, defender) = if a > b { (a, b) } else { (b, a) };
            world.battles.insert(
                id,
                Battle {
                    id,
                    attacker,
                    defender,
                    pos: hex,
                },
            );
            info!(battle = id, attacker, defender, pos = %hex.key(), "battle started");
        }
    }
}

fn battle_between(world: &World, a: GroupId, b: GroupId) -> Option<BattleId> {
    world
        .battles
        .values()
        .find(|battle| {
            (battle.attacker == a && battle.defender == b)
                || (battle.attacker == b && battle.defender == a)
        })
        .map(|battle| battle.id)
}

/// Step every battle once: re-verify preconditions, exchange damage, and
/// resolve when either side has no living units left.
pub fn step_all(world: &mut World, rng: &mut DeterministicRng, damage: DamageFn) {
    let ids: Vec<BattleId> = world.battles.keys().copied().collect();
    for id in ids {
        step_one(world, rng, damage, id);
    }
}

fn step_one(world: &mut World, rng: &mut DeterministicRng, damage: DamageFn, id: BattleId) {
    let Some(battle) = world.battles.get(&id) else {
        return;
    };
    let (attacker_id, defender_id, pos) = (battle.attacker, battle.defender, battle.pos);

    // Re-verify: both groups alive, co-located, still hostile
    let sides = match (world.groups.get(&attacker_id), world.groups.get(&defender_id)) {
        (Some(a), Some(d)) if a.pos == pos && d.pos == pos => Some((a.owner, d.owner)),
        _ => None,
    };
    let valid = match sides {
        Some((oa, od)) => world.are_hostile(oa, od),
        None => false,
    };
    if !valid {
        debug!(battle = id, "battle dissolved");
        world.battles.remove(&id);
        return;
    }

    let attacker_strength = world.groups[&attacker_id].strength();
    let defender_strength = world.groups[&defender_id].strength();

    // Both sides strike within the same tick
    let to_defender = damage(attacker_strength, rng);
    let to_attacker = damage(defender_strength, rng);
    deal_damage(world, defender_id, to_defender, rng);
    deal_damage(world, attacker_id, to_attacker, rng);

    let attacker_dead = !world.groups[&attacker_id].has_living_units();
    let defender_dead = !world.groups[&defender_id].has_living_units();
    if !attacker_dead && !defender_dead {
        return;
    }

    world.battles.remove(&id);

    // Mutual annihilation removes both sides
    for (loser, victor) in [
        (attacker_dead.then_some(attacker_id), defender_id),
        (defender_dead.then_some(defender_id), attacker_id),
    ] {
        let Some(loser) = loser else { continue };
        if let Some(group) = world.remove_group(loser) {
            info!(battle = id, loser = group.id, "battle resolved");
            visibility::recompute(world, group.owner);
        }
        if let Some(victor_group) = world.groups.get(&victor) {
            let owner = victor_group.owner;
            visibility::recompute(world, owner);
        }
    }
}

/// Spread damage across the living units of a group, weakest-first so kills
/// concentrate instead of leaving a roster of near-dead units.
fn deal_damage(world: &mut World, group_id: GroupId, mut amount: f64, rng: &mut DeterministicRng) {
    let Some(group) = world.groups.get_mut(&group_id) else {
        return;
    };

    let mut order: Vec<usize> = (0..group.units.len())
        .filter(|&i| group.units[i].alive())
        .collect();
    order.sort_by(|&a, &b| group.units[a].hp.total_cmp(&group.units[b].hp));

    for idx in order {
        if amount <= 0.0 {
            break;
        }
        let unit = &mut group.units[idx];
        // Defense absorbs part of the hit
        let mitigated = (amount - unit.defense * 0.2).max(amount * 0.25);
        let dealt = mitigated.min(unit.hp);
        unit.hp -= dealt;
        amount -= dealt;

        if unit.hp <= 0.0 {
            unit.hp = 0.0;
        } else if rng.chance(0.1) {
            unit.injuries.push(crate::game::entities::Injury::Wounded);
            unit.morale = (unit.morale - 0.05).max(0.0);
        }
    }

    group.bury_dead();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hex::Hex;
    use crate::game::entities::{Group, Unit};
    use crate::game::tile::{Biome, Tile};
    use crate::game::world::{PlayerId, Relation};

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

    fn group_with_units(world: &mut World, owner: PlayerId, pos: Hex, count: usize) -> GroupId {
        let id = world.allocate_id();
        let mut group = Group::new(id, owner, pos);
        for _ in 0..count {
            let unit_id = world.allocate_id();
            group.units.push(Unit::recruit(unit_id));
        }
        world.groups.insert(id, group);
        id
    }

    #[test]
    fn test_hostile_colocation_starts_battle() {
        let mut world = flat_world(2);
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        group_with_units(&mut world, a, Hex::ZERO, 2);
        group_with_units(&mut world, b, Hex::ZERO, 2);

        detect_at(&mut world, Hex::ZERO);
        assert_eq!(world.battles.len(), 1);

        // Detection is idempotent
        detect_at(&mut world, Hex::ZERO);
        assert_eq!(world.battles.len(), 1);
    }

    #[test]
    fn test_friendly_colocation_is_peaceful() {
        let mut world = flat_world(2);
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        world.set_relation(a, b, Relation::Friendly);
        group_with_units(&mut world, a, Hex::ZERO, 2);
        group_with_units(&mut world, b, Hex::ZERO, 2);

        detect_at(&mut world, Hex::ZERO);
        assert!(world.battles.is_empty());
    }

    #[test]
    fn test_battle_runs_to_elimination() {
        let mut world = flat_world(2);
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        let strong = group_with_units(&mut world, a, Hex::ZERO, 5);
        let weak = group_with_units(&mut world, b, Hex::ZERO, 1);

        detect_at(&mut world, Hex::ZERO);
        let mut rng = DeterministicRng::new(7);

        let mut ticks = 0;
        while !world.battles.is_empty() && ticks < 1000 {
            step_all(&mut world, &mut rng, default_damage);
            ticks += 1;
        }

        assert!(world.battles.is_empty(), "battle never resolved");
        assert!(!world.groups.contains_key(&weak));
        assert!(world.groups.contains_key(&strong));
    }

    #[test]
    fn test_stale_battle_dissolves_without_victor() {
        let mut world = flat_world(2);
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        let g1 = group_with_units(&mut world, a, Hex::ZERO, 2);
        let g2 = group_with_units(&mut world, b, Hex::ZERO, 2);

        detect_at(&mut world, Hex::ZERO);
        assert_eq!(world.battles.len(), 1);

        // Peace breaks out mid-battle
        world.set_relation(a, b, Relation::Neutral);
        let mut rng = DeterministicRng::new(7);
        step_all(&mut world, &mut rng, default_damage);

        assert!(world.battles.is_empty());
        assert!(world.groups.contains_key(&g1));
        assert!(world.groups.contains_key(&g2));
    }

    #[test]
    fn test_default_damage_scales_with_attack() {
        let mut rng = DeterministicRng::new(1);
        let mut weak_total = 0.0;
        let mut strong_total = 0.0;
        for _ in 0..100 {
            weak_total += default_damage(5.0, &mut rng);
            strong_total += default_damage(15.0, &mut rng);
        }
        assert!(strong_total > weak_total);
    }
}
