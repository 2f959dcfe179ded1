//! Tile map: terrain, ownership, build capabilities, pathfinding

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::types::{ImmovableId, PlayerId, ResourceId};
use crate::map::coords::{Coords, Direction};

/// Build capability bitmask of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCaps(pub u8);

impl BuildCaps {
    pub const NONE: BuildCaps = BuildCaps(0);
    pub const SIZEMASK: u8 = 0x03;
    pub const SMALL: u8 = 1;
    pub const MEDIUM: u8 = 2;
    pub const BIG: u8 = 3;
    pub const FLAG: u8 = 0x04;
    pub const MINE: u8 = 0x08;

    /// Largest building size buildable here (0 = none, 1..=3)
    pub fn size_cap(self) -> u8 {
        self.0 & Self::SIZEMASK
    }

    pub fn allows_flag(self) -> bool {
        self.0 & Self::FLAG != 0
    }

    pub fn allows_mine(self) -> bool {
        self.0 & Self::MINE != 0
    }
}

/// Terrain of a tile, deciding walkability and base build capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    /// Open land, big buildings possible
    Meadow,
    /// Uneven land, only small huts
    Rough,
    /// Walkable but nothing can be built, not even a flag
    Swamp,
    Mountain,
    Water,
}

impl Terrain {
    pub fn base_caps(self) -> BuildCaps {
        match self {
            Terrain::Meadow => BuildCaps(BuildCaps::FLAG | BuildCaps::BIG),
            Terrain::Rough => BuildCaps(BuildCaps::FLAG | BuildCaps::SMALL),
            Terrain::Swamp => BuildCaps::NONE,
            Terrain::Mountain => BuildCaps(BuildCaps::FLAG | BuildCaps::MINE),
            Terrain::Water => BuildCaps::NONE,
        }
    }

    pub fn walkable(self) -> bool {
        !matches!(self, Terrain::Water)
    }
}

/// One map tile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub owner: Option<PlayerId>,
    pub resource: Option<(ResourceId, u8)>,
    pub immovable: Option<ImmovableId>,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            owner: None,
            resource: None,
            immovable: None,
        }
    }

    pub fn resource_amount(&self) -> u8 {
        self.resource.map(|(_, amount)| amount).unwrap_or(0)
    }
}

/// Bounded tile map
#[derive(Debug, Clone)]
pub struct TileMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileMap {
    pub fn new(width: i32, height: i32, terrain: Terrain) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::new(terrain); (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, c: Coords) -> bool {
        c.x >= 0 && c.x < self.width && c.y >= 0 && c.y < self.height
    }

    pub fn tile(&self, c: Coords) -> Option<&Tile> {
        if self.contains(c) {
            Some(&self.tiles[(c.y * self.width + c.x) as usize])
        } else {
            None
        }
    }

    pub fn tile_mut(&mut self, c: Coords) -> Option<&mut Tile> {
        if self.contains(c) {
            Some(&mut self.tiles[(c.y * self.width + c.x) as usize])
        } else {
            None
        }
    }

    /// All in-bounds coordinates, row by row
    pub fn all_coords(&self) -> impl Iterator<Item = Coords> + '_ {
        let w = self.width;
        (0..self.height).flat_map(move |y| (0..w).map(move |x| Coords::new(x, y)))
    }

    /// Player-agnostic build capability of a node.
    ///
    /// A tile occupied by a road keeps its flag capability (a flag may be
    /// planted onto a road); any other immovable blocks building entirely.
    pub fn nodecaps(&self, c: Coords, is_road: impl Fn(ImmovableId) -> bool) -> BuildCaps {
        let Some(tile) = self.tile(c) else {
            return BuildCaps::NONE;
        };
        let base = tile.terrain.base_caps();
        match tile.immovable {
            None => base,
            Some(id) if is_road(id) => BuildCaps(base.0 & BuildCaps::FLAG),
            Some(_) => BuildCaps::NONE,
        }
    }

    /// Count/collect fields within a radius satisfying a predicate
    pub fn find_fields(&self, center: Coords, radius: u32, pred: impl Fn(&Tile) -> bool) -> Vec<Coords> {
        center
            .region(radius)
            .into_iter()
            .filter(|c| self.tile(*c).map(&pred).unwrap_or(false))
            .collect()
    }

    /// Immovables within a radius, deduplicated (roads span several tiles).
    ///
    /// Each immovable is reported at the first tile of the scan order it
    /// occupies, which keeps iteration deterministic.
    pub fn find_immovables(&self, center: Coords, radius: u32) -> Vec<(ImmovableId, Coords)> {
        let mut seen: AHashSet<ImmovableId> = AHashSet::new();
        let mut out = Vec::new();
        for c in center.region(radius) {
            if let Some(tile) = self.tile(c) {
                if let Some(id) = tile.immovable {
                    if seen.insert(id) {
                        out.push((id, c));
                    }
                }
            }
        }
        out
    }

    /// Fields reachable on foot from `center` within `radius`, BFS over the
    /// step checker, filtered by `pred`. The center itself is not reported.
    pub fn find_reachable_fields(
        &self,
        center: Coords,
        radius: u32,
        step_ok: impl Fn(Coords, Coords) -> bool,
        pred: impl Fn(Coords, &Tile) -> bool,
    ) -> Vec<Coords> {
        let mut visited: AHashSet<Coords> = AHashSet::new();
        let mut queue = std::collections::VecDeque::new();
        let mut out = Vec::new();
        visited.insert(center);
        queue.push_back(center);
        while let Some(cur) = queue.pop_front() {
            for dir in Direction::ALL {
                let next = cur.neighbor(dir);
                if visited.contains(&next) || !self.contains(next) {
                    continue;
                }
                if center.distance(&next) > radius || !step_ok(cur, next) {
                    continue;
                }
                visited.insert(next);
                if pred(next, self.tile(next).unwrap()) {
                    out.push(next);
                }
                queue.push_back(next);
            }
        }
        out
    }

    /// A* path search from `from` to `to` over the step checker.
    ///
    /// Returns the full coordinate path including both endpoints, or None.
    pub fn findpath(
        &self,
        from: Coords,
        to: Coords,
        step_ok: impl Fn(Coords, Coords) -> bool,
    ) -> Option<Vec<Coords>> {
        if from == to {
            return Some(vec![from]);
        }

        struct Node {
            coord: Coords,
            f_cost: u32,
        }
        impl PartialEq for Node {
            fn eq(&self, other: &Self) -> bool {
                self.coord == other.coord
            }
        }
        impl Eq for Node {}
        impl Ord for Node {
            fn cmp(&self, other: &Self) -> Ordering {
                // Reverse order for min-heap
                other.f_cost.cmp(&self.f_cost)
            }
        }
        impl PartialOrd for Node {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: AHashMap<Coords, Coords> = AHashMap::new();
        let mut g_score: AHashMap<Coords, u32> = AHashMap::new();

        g_score.insert(from, 0);
        open_set.push(Node {
            coord: from,
            f_cost: from.distance(&to),
        });

        while let Some(current) = open_set.pop() {
            if current.coord == to {
                let mut path = vec![to];
                let mut cur = to;
                while let Some(&prev) = came_from.get(&cur) {
                    path.push(prev);
                    cur = prev;
                }
                path.reverse();
                return Some(path);
            }

            let current_g = *g_score.get(&current.coord).unwrap_or(&u32::MAX);

            for dir in Direction::ALL {
                let next = current.coord.neighbor(dir);
                if !self.contains(next) || !step_ok(current.coord, next) {
                    continue;
                }
                let tentative_g = current_g + 1;
                if tentative_g < *g_score.get(&next).unwrap_or(&u32::MAX) {
                    came_from.insert(next, current.coord);
                    g_score.insert(next, tentative_g);
                    open_set.push(Node {
                        coord: next,
                        f_cost: tentative_g + next.distance(&to),
                    });
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walkable_map() -> TileMap {
        TileMap::new(12, 12, Terrain::Meadow)
    }

    #[test]
    fn test_caps_masks() {
        let caps = Terrain::Meadow.base_caps();
        assert_eq!(caps.size_cap(), BuildCaps::BIG);
        assert!(caps.allows_flag());
        assert!(!caps.allows_mine());

        let mine = Terrain::Mountain.base_caps();
        assert_eq!(mine.size_cap(), 0);
        assert!(mine.allows_mine());

        assert_eq!(Terrain::Swamp.base_caps(), BuildCaps::NONE);
    }

    #[test]
    fn test_findpath_straight() {
        let map = walkable_map();
        let path = map
            .findpath(Coords::new(0, 0), Coords::new(5, 0), |_, _| true)
            .unwrap();
        assert_eq!(path.first(), Some(&Coords::new(0, 0)));
        assert_eq!(path.last(), Some(&Coords::new(5, 0)));
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_findpath_blocked() {
        let map = walkable_map();
        let goal = Coords::new(6, 6);
        // forbid every step into the goal's neighborhood
        let path = map.findpath(Coords::new(0, 0), goal, |_, to| goal.distance(&to) > 1);
        assert!(path.is_none());
    }

    #[test]
    fn test_findpath_same_tile() {
        let map = walkable_map();
        let c = Coords::new(3, 3);
        assert_eq!(map.findpath(c, c, |_, _| true), Some(vec![c]));
    }

    #[test]
    fn test_find_reachable_fields_respects_radius() {
        let map = walkable_map();
        let center = Coords::new(5, 5);
        let found = map.find_reachable_fields(center, 2, |_, _| true, |_, _| true);
        assert!(!found.is_empty());
        for c in &found {
            assert!(center.distance(c) <= 2);
            assert_ne!(*c, center);
        }
    }

    #[test]
    fn test_find_immovables_dedups() {
        let mut map = walkable_map();
        let id = ImmovableId(7);
        map.tile_mut(Coords::new(2, 2)).unwrap().immovable = Some(id);
        map.tile_mut(Coords::new(3, 2)).unwrap().immovable = Some(id);
        let found = map.find_immovables(Coords::new(2, 2), 3);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, id);
    }

    #[test]
    fn test_nodecaps_road_keeps_flag() {
        let mut map = walkable_map();
        let road = ImmovableId(1);
        map.tile_mut(Coords::new(4, 4)).unwrap().immovable = Some(road);
        let caps = map.nodecaps(Coords::new(4, 4), |id| id == road);
        assert!(caps.allows_flag());
        assert_eq!(caps.size_cap(), 0);

        let blocked = map.nodecaps(Coords::new(4, 4), |_| false);
        assert_eq!(blocked, BuildCaps::NONE);
    }
}
