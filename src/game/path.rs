//! Weighted A* Pathfinding
//!
//! Searches the tile adjacency graph. The edge cost of stepping onto a tile
//! is the inverse of that tile's movement factor, so slow terrain costs more.
//! Hex distance is an admissible heuristic because every factor is at most 1,
//! so no edge costs less than 1.
//!
//! Frontier ordering uses `f64::total_cmp` on the f-score with an insertion
//! counter as the tie-break, which makes expansion order (and therefore the
//! returned path) fully deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::core::hex::Hex;
use crate::game::tile::Tile;

/// How edge costs are derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostMode {
    /// Inverse movement factor of the destination tile.
    Weighted,
    /// Every edge costs 1. Used by river routing.
    Uniform,
}

/// Frontier entry: min-heap on f-score, then on insertion order.
struct Frontier {
    f_score: f64,
    seq: u64,
    hex: Hex,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the lowest f-score
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find the cheapest path from `start` to `goal` over `tiles`.
///
/// The returned path excludes `start` and includes `goal`. Returns `None`
/// when the goal is missing from the map or unreachable, and an empty path
/// when `start == goal`.
pub fn astar(
    tiles: &BTreeMap<Hex, Tile>,
    start: Hex,
    goal: Hex,
    mode: CostMode,
) -> Option<Vec<Hex>> {
    if !tiles.contains_key(&start) || !tiles.contains_key(&goal) {
        return None;
    }
    if start == goal {
        return Some(Vec::new());
    }

    let mut frontier = BinaryHeap::new();
    let mut came_from: BTreeMap<Hex, Hex> = BTreeMap::new();
    let mut g_score: BTreeMap<Hex, f64> = BTreeMap::new();
    let mut seq: u64 = 0;

    g_score.insert(start, 0.0);
    frontier.push(Frontier {
        f_score: start.distance(goal) as f64,
        seq,
        hex: start,
    });

    while let Some(Frontier { hex: current, .. }) = frontier.pop() {
        if current == goal {
            return Some(reconstruct(&came_from, current));
        }

        let current_g = g_score.get(&current).copied().unwrap_or(f64::INFINITY);

        for neighbor in current.neighbors() {
            let Some(tile) = tiles.get(&neighbor) else {
                continue;
            };
            let step = match mode {
                CostMode::Weighted => 1.0 / tile.movement_factor(),
                CostMode::Uniform => 1.0,
            };
            let tentative = current_g + step;
            let best = g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY);
            if tentative < best {
                came_from.insert(neighbor, current);
                g_score.insert(neighbor, tentative);
                seq += 1;
                frontier.push(Frontier {
                    f_score: tentative + neighbor.distance(goal) as f64,
                    seq,
                    hex: neighbor,
                });
            }
        }
    }

    None
}

fn reconstruct(came_from: &BTreeMap<Hex, Hex>, goal: Hex) -> Vec<Hex> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if !came_from.contains_key(&prev) {
            // prev is the start hex, which the path excludes
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tile::Biome;

    fn open_grid(radius: i32, biome: Biome) -> BTreeMap<Hex, Tile> {
        Hex::ZERO
            .range(radius)
            .into_iter()
            .map(|hex| {
                let mut tile = Tile::stub();
                tile.biome = biome;
                (hex, tile)
            })
            .collect()
    }

    #[test]
    fn test_uniform_path_length_equals_distance() {
        let tiles = open_grid(4, Biome::Grassland);
        let start = Hex::axial(-3, 1);
        let goal = Hex::axial(3, -2);

        let path = astar(&tiles, start, goal, CostMode::Uniform).unwrap();
        assert_eq!(path.len() as i32, start.distance(goal));
        assert_eq!(*path.last().unwrap(), goal);
        assert!(!path.contains(&start));
    }

    #[test]
    fn test_weighted_matches_uniform_on_flat_terrain() {
        let tiles = open_grid(4, Biome::Grassland);
        let start = Hex::ZERO;
        let goal = Hex::axial(4, 0);

        let path = astar(&tiles, start, goal, CostMode::Weighted).unwrap();
        assert_eq!(path.len() as i32, start.distance(goal));
    }

    #[test]
    fn test_routes_around_removed_tile() {
        let mut tiles = open_grid(3, Biome::Grassland);
        let start = Hex::axial(-2, 0);
        let goal = Hex::axial(2, 0);

        // Wall across the middle column, one gap at the top
        for r in -1..=3 {
            let hex = Hex::axial(0, r);
            tiles.remove(&hex);
        }

        let path = astar(&tiles, start, goal, CostMode::Uniform).unwrap();
        assert_eq!(*path.last().unwrap(), goal);
        assert!(path.len() as i32 > start.distance(goal));
        for hex in &path {
            assert!(tiles.contains_key(hex));
        }
    }

    #[test]
    fn test_unreachable_goal_is_none() {
        let mut tiles = open_grid(2, Biome::Grassland);
        let goal = Hex::axial(2, 0);

        // Cut the goal off entirely
        for neighbor in goal.neighbors() {
            tiles.remove(&neighbor);
        }

        assert!(astar(&tiles, Hex::ZERO, goal, CostMode::Uniform).is_none());
    }

    #[test]
    fn test_start_equals_goal_is_empty() {
        let tiles = open_grid(1, Biome::Grassland);
        let path = astar(&tiles, Hex::ZERO, Hex::ZERO, CostMode::Weighted).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn test_weighted_avoids_slow_terrain() {
        // A straight line through mountains vs. a detour over grassland
        let mut tiles = open_grid(2, Biome::Grassland);
        for r in [-1, 0, 1] {
            if let Some(tile) = tiles.get_mut(&Hex::axial(0, r)) {
                tile.biome = Biome::Mountain;
            }
        }

        let start = Hex::axial(-2, 0);
        let goal = Hex::axial(2, 0);
        let path = astar(&tiles, start, goal, CostMode::Weighted).unwrap();

        // Grassland costs 1 per step, mountain costs 4. A two-step detour
        // beats crossing even a single mountain tile.
        let crosses_mountain = path
            .iter()
            .any(|h| tiles[h].biome == Biome::Mountain);
        assert!(!crosses_mountain, "path {path:?} crosses mountains");
    }
}
