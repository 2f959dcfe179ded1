//! Road network optimizer
//!
//! Splits overlong roads, removes redundant ones, and connects lonely
//! flags to economies that have a warehouse. An economy that stays without
//! a warehouse for too long gets its stranded building bulldozed, with a
//! backoff that grows with economy size.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashSet;

use crate::core::types::{FlagId, GameTime, RoadId};
use crate::game::commands::Command;
use crate::game::immovable::Immovable;
use crate::game::world::World;
use crate::map::coords::Coords;

use super::fields::BlockedField;
use super::AiPlayer;

/// Radius of the redundant-road walk
const DISPENSABLE_CHECK_RADIUS: u32 = 8;

/// A flag reachable from the source, with assumed and crow-flies distance
#[derive(Debug, Clone, Copy)]
struct NearFlag {
    flag: FlagId,
    /// Assumed road distance; virtual until the road walk proves better
    cost: i32,
    /// Distance as the crow flies
    distance: i32,
}

/// Queue item of the walk over existing roads, ordered as a min-heap by
/// cost with the flag id as stable tie-break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WalkItem {
    flag: FlagId,
    cost: i32,
}

impl Ord for WalkItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then(other.flag.0.cmp(&self.flag.0))
    }
}

impl PartialOrd for WalkItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AiPlayer {
    /// One road-improvement pass. Returns true when a change was ordered
    /// that should end the tick.
    pub(crate) fn improve_roads(
        &mut self,
        world: &World,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        // force a split on roads longer than 3 steps, unless spots are scarce
        if self.spots >= 20 && !self.roads.is_empty() {
            let front_rid = *self.roads.front().unwrap();
            if world.road_exists(front_rid) {
                let road = world.road(front_rid);
                if road.nsteps() > 3 {
                    let path = &road.path;
                    let mut i = path.len() - 2;
                    let mut j = 1;
                    let mut split = false;
                    while i >= j {
                        if world.nodecaps(path[i]).allows_flag() {
                            out.push(Command::BuildFlag {
                                player: self.player,
                                pos: path[i],
                            });
                            split = true;
                            break;
                        }
                        if world.nodecaps(path[j]).allows_flag() {
                            out.push(Command::BuildFlag {
                                player: self.player,
                                pos: path[j],
                            });
                            split = true;
                            break;
                        }
                        i -= 1;
                        j += 1;
                    }
                    if split {
                        return true;
                    }
                    // no split point anywhere, the road was laid badly
                    out.push(Command::Bulldoze { immovable: road.imm });
                }
            }

            self.roads.rotate_left(1);

            // occasionally test whether the front road is redundant
            if gametime % 25 == 0 {
                let rid = *self.roads.front().unwrap();
                if world.road_exists(rid) && self.dispensable_road_test(world, rid) {
                    out.push(Command::Bulldoze {
                        immovable: world.road(rid).imm,
                    });
                    return true;
                }
            }
        }

        if self.inhibit_road_building >= gametime {
            return false;
        }

        // rotate economies and flags to pick the flag to work on
        if self.economies.is_empty() {
            return self.check_economies(world);
        }
        if self.economies.len() >= 2 {
            self.economies.rotate_left(1);
        }
        if self.economies.front().unwrap().flags.is_empty() {
            return self.check_economies(world);
        }
        if self.economies.front().unwrap().flags.len() > 1 {
            self.economies.front_mut().unwrap().flags.rotate_left(1);
        }
        let fid = *self.economies.front().unwrap().flags.front().unwrap();
        if !world.flag_exists(fid) {
            return self.check_economies(world);
        }

        let flag = world.flag(fid);

        // dead ends carrying nothing are just clutter
        if flag.is_dead_end() && flag.wares_pending == 0 {
            out.push(Command::Bulldoze { immovable: flag.imm });
            self.economies.front_mut().unwrap().flags.pop_front();
            return true;
        }

        if flag.nr_of_roads() <= 1 || gametime % 200 == 0 {
            self.create_shortcut_road(world, fid, 13, 20, gametime, out);
            self.inhibit_road_building = gametime + 800;
        } else if flag.wares_pending > 6 && gametime % 10 == 0 {
            self.create_shortcut_road(world, fid, 9, 0, gametime, out);
            self.inhibit_road_building = gametime + 400;
        }

        false
    }

    /// A road is dispensable when its end flags idle and a second route
    /// between them exists within a small radius
    pub(crate) fn dispensable_road_test(&self, world: &World, rid: RoadId) -> bool {
        let road = world.road(rid);
        let start = road.flags[0];
        let end = road.flags[1];
        if world.flag(start).wares_pending > 0 || world.flag(end).wares_pending > 0 {
            return false;
        }

        let start_pos = world.flag(start).pos;
        let mut queue = BinaryHeap::new();
        let mut visited: Vec<FlagId> = Vec::new();
        let mut pathcounts = 0u8;
        queue.push(WalkItem { flag: start, cost: 0 });

        while let Some(item) = queue.pop() {
            if item.flag == end {
                pathcounts += 1;
                if pathcounts > 1 {
                    return true;
                }
                continue;
            }
            if visited.contains(&item.flag) {
                continue;
            }
            visited.push(item.flag);

            let roads = world.flag(item.flag).roads;
            for near_rid in roads.into_iter().flatten() {
                let other = world.road(near_rid).other_end(item.flag);
                let dist = start_pos.distance(&world.flag(other).pos);
                if dist > DISPENSABLE_CHECK_RADIUS {
                    continue;
                }
                queue.push(WalkItem { flag: other, cost: 0 });
            }
        }
        false
    }

    /// Try to connect `flag` to a warehouse-bearing economy with a road
    /// that shortens transport by at least `minred` steps.
    ///
    /// Returns true when a road was ordered or the stranded-economy
    /// escalation fired.
    pub(crate) fn create_shortcut_road(
        &mut self,
        world: &World,
        fid: FlagId,
        checkradius: u32,
        minred: i32,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        let flag = world.flag(fid);
        let has_warehouse = world
            .economy(flag.economy)
            .map(|e| !e.warehouses.is_empty())
            .unwrap_or(false);

        // the counter doubles as "time this economy sits without warehouse"
        let eco_id = flag.economy;
        {
            let obs = self.economy_observer(eco_id);
            if has_warehouse {
                obs.failed_connection_tries = 0;
            } else {
                obs.failed_connection_tries += 1;
            }
        }
        let (tries, nr_flags) = {
            let obs = self.economy_observer(eco_id);
            (obs.failed_connection_tries, obs.flags.len() as u32)
        };

        // a lone building disconnects fast, a grown economy gets more time
        if tries > 3 + nr_flags * nr_flags {
            if let Some(building) = flag.building {
                if let Some(b) = world.building(building) {
                    self.blocked_fields.push(BlockedField {
                        coords: b.pos,
                        blocked_until: gametime + 15 * 60 * 1000,
                    });
                }
                let obs = self.economy_observer(eco_id);
                if let Some(pos) = obs.flags.iter().position(|f| *f == fid) {
                    obs.flags.remove(pos);
                }
                out.push(Command::Bulldoze { immovable: flag.imm });
            }
            return true;
        }

        let player = self.player;
        let walk_ok = |_from: Coords, to: Coords| {
            world
                .map
                .tile(to)
                .map(|t| t.terrain.walkable() && t.owner == Some(player))
                .unwrap_or(false)
        };

        let reachable = world.map.find_reachable_fields(
            flag.pos,
            checkradius,
            walk_ok,
            |_, t| t.immovable.is_some(),
        );
        if reachable.is_empty() {
            return false;
        }

        let mut nearflags: Vec<NearFlag> = Vec::new();
        let mut lookuptable: AHashSet<(i32, i32)> = AHashSet::new();

        for pos in reachable {
            let Some(id) = world.map.tile(pos).and_then(|t| t.immovable) else {
                continue;
            };
            match world.immovables.get(id) {
                // a reachable road is an opportunity: put a flag on it, it
                // becomes a candidate on a later pass
                Some(Immovable::Road(_)) => {
                    out.push(Command::BuildFlag { player, pos });
                }
                Some(Immovable::Flag(fid2)) => {
                    let f2 = world.flag(*fid2);
                    // connecting to an economy without warehouse helps nobody
                    let target_has_wh = world
                        .economy(f2.economy)
                        .map(|e| !e.warehouses.is_empty())
                        .unwrap_or(false);
                    if !target_has_wh {
                        continue;
                    }
                    if !lookuptable.insert((pos.x, pos.y)) {
                        continue;
                    }
                    let road_step = |_from: Coords, to: Coords| {
                        if to == pos {
                            return true;
                        }
                        world
                            .map
                            .tile(to)
                            .map(|t| {
                                t.terrain.walkable()
                                    && t.owner == Some(player)
                                    && t.immovable.is_none()
                            })
                            .unwrap_or(false)
                    };
                    if world.map.findpath(flag.pos, pos, road_step).is_some() {
                        let virtual_distance = if f2.economy == flag.economy { 50 } else { 100 };
                        nearflags.push(NearFlag {
                            flag: *fid2,
                            cost: virtual_distance,
                            distance: flag.pos.distance(&pos) as i32,
                        });
                    }
                }
                _ => {}
            }
        }

        // walk over existing roads; wherever we arrive cheaper than the
        // virtual assumption, the assumption is replaced
        let mut queue = BinaryHeap::new();
        let mut walked: Vec<(FlagId, i32)> = Vec::new();
        queue.push(WalkItem { flag: fid, cost: 0 });
        while let Some(item) = queue.pop() {
            if walked.iter().any(|(f, _)| *f == item.flag) {
                continue;
            }
            walked.push((item.flag, item.cost));

            let roads = world.flag(item.flag).roads;
            for near_rid in roads.into_iter().flatten() {
                let road = world.road(near_rid);
                let other = road.other_end(item.flag);
                let dist = flag.pos.distance(&world.flag(other).pos);
                if dist > checkradius {
                    continue;
                }
                queue.push(WalkItem {
                    flag: other,
                    cost: item.cost + road.nsteps() as i32,
                });
            }
        }
        for (walked_flag, cost) in walked {
            for nf in nearflags.iter_mut() {
                if nf.flag == walked_flag && nf.cost > cost {
                    nf.cost = cost;
                }
            }
        }

        // greatest shortening first; the sort is stable, so identical
        // inputs always probe in the same order
        nearflags.sort_by(|a, b| (b.cost - b.distance).cmp(&(a.cost - a.distance)));

        for nf in nearflags.iter().take(10) {
            if nf.cost - nf.distance < minred {
                return false;
            }
            if nf.distance >= 2 && nf.distance < checkradius as i32 - 2 {
                let target_pos = world.flag(nf.flag).pos;
                let road_step = |_from: Coords, to: Coords| {
                    if to == target_pos {
                        return true;
                    }
                    world
                        .map
                        .tile(to)
                        .map(|t| {
                            t.terrain.walkable()
                                && t.owner == Some(player)
                                && t.immovable.is_none()
                        })
                        .unwrap_or(false)
                };
                if let Some(path) = world.map.findpath(flag.pos, target_pos, road_step) {
                    let nsteps = path.len() as i32 - 1;
                    if nf.cost - nsteps > minred {
                        out.push(Command::BuildRoad { player, path });
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiProfile;
    use crate::core::types::PlayerId;
    use crate::map::grid::Terrain;

    fn setup(width: i32, height: i32) -> (World, AiPlayer) {
        let mut world = World::flat(width, height, 1);
        world.conquer(PlayerId(1), Coords::new(width / 2, height / 2), (width / 2) as u32);
        world.take_notes();
        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::default());
        let mut out = Vec::new();
        ai.think(&world, 0, &mut out);
        (world, ai)
    }

    fn pump(world: &mut World, ai: &mut AiPlayer, gametime: i64) {
        for note in world.take_notes() {
            ai.handle_note(world, &note, gametime);
        }
    }

    #[test]
    fn test_long_road_split_inserts_flag() {
        let (mut world, mut ai) = setup(24, 24);
        world.place_flag(PlayerId(1), Coords::new(4, 10)).unwrap();
        world.place_flag(PlayerId(1), Coords::new(9, 10)).unwrap();
        let path: Vec<Coords> = (4..=9).map(|x| Coords::new(x, 10)).collect();
        world.place_road(PlayerId(1), path).unwrap();
        pump(&mut world, &mut ai, 1_000);
        ai.spots = 20;

        let mut out = Vec::new();
        assert!(ai.improve_roads(&world, 1_001, &mut out));
        // walking from the far end inward, the first road tile can take a flag
        assert_eq!(
            out,
            vec![Command::BuildFlag {
                player: PlayerId(1),
                pos: Coords::new(8, 10)
            }]
        );
    }

    #[test]
    fn test_unsplittable_road_bulldozed() {
        let (mut world, mut ai) = setup(24, 24);
        world.place_flag(PlayerId(1), Coords::new(4, 10)).unwrap();
        world.place_flag(PlayerId(1), Coords::new(9, 10)).unwrap();
        let path: Vec<Coords> = (4..=9).map(|x| Coords::new(x, 10)).collect();
        let rid = world.place_road(PlayerId(1), path).unwrap();
        // swamp takes no flags, so no split point exists
        for x in 5..=8 {
            world.map.tile_mut(Coords::new(x, 10)).unwrap().terrain = Terrain::Swamp;
        }
        pump(&mut world, &mut ai, 1_000);
        ai.spots = 20;

        let mut out = Vec::new();
        ai.improve_roads(&world, 1_001, &mut out);
        let imm = world.road(rid).imm;
        assert!(out.contains(&Command::Bulldoze { immovable: imm }));
    }

    #[test]
    fn test_dead_end_flag_bulldozed() {
        let (mut world, mut ai) = setup(24, 24);
        let fid = world.place_flag(PlayerId(1), Coords::new(8, 8)).unwrap();
        pump(&mut world, &mut ai, 1_000);
        ai.check_economies(&world);

        let mut out = Vec::new();
        assert!(ai.improve_roads(&world, 1_001, &mut out));
        let imm = world.flag(fid).imm;
        assert_eq!(out, vec![Command::Bulldoze { immovable: imm }]);
    }

    #[test]
    fn test_dispensable_road_detected() {
        let (mut world, mut ai) = setup(24, 24);
        let a = Coords::new(5, 5);
        let b = Coords::new(9, 5);
        let c = Coords::new(7, 7);
        world.place_flag(PlayerId(1), a).unwrap();
        world.place_flag(PlayerId(1), b).unwrap();
        world.place_flag(PlayerId(1), c).unwrap();
        let direct: Vec<Coords> = (5..=9).map(|x| Coords::new(x, 5)).collect();
        let rid = world.place_road(PlayerId(1), direct).unwrap();
        let leg1 = world
            .map
            .findpath(a, c, |_, to| {
                world.map.tile(to).map(|t| t.immovable.is_none() || to == c).unwrap_or(false)
            })
            .unwrap();
        world.place_road(PlayerId(1), leg1).unwrap();
        let leg2 = world
            .map
            .findpath(c, b, |_, to| {
                world.map.tile(to).map(|t| t.immovable.is_none() || to == b).unwrap_or(false)
            })
            .unwrap();
        world.place_road(PlayerId(1), leg2).unwrap();
        pump(&mut world, &mut ai, 1_000);

        assert!(ai.dispensable_road_test(&world, rid));
    }

    #[test]
    fn test_sole_road_is_not_dispensable() {
        let (mut world, mut ai) = setup(24, 24);
        world.place_flag(PlayerId(1), Coords::new(5, 5)).unwrap();
        world.place_flag(PlayerId(1), Coords::new(9, 5)).unwrap();
        let path: Vec<Coords> = (5..=9).map(|x| Coords::new(x, 5)).collect();
        let rid = world.place_road(PlayerId(1), path).unwrap();
        pump(&mut world, &mut ai, 1_000);

        assert!(!ai.dispensable_road_test(&world, rid));
    }

    #[test]
    fn test_shortcut_connects_to_warehouse_economy() {
        let (mut world, mut ai) = setup(32, 32);
        let hq = world.tribe.building_index("headquarters").unwrap();
        world.place_building(PlayerId(1), Coords::new(16, 16), hq, true);
        let lone = world.place_flag(PlayerId(1), Coords::new(12, 17)).unwrap();
        pump(&mut world, &mut ai, 1_000);
        ai.check_economies(&world);

        let mut out = Vec::new();
        ai.create_shortcut_road(&world, lone, 13, 20, 5_000, &mut out);
        let built = out.iter().any(|c| {
            matches!(c, Command::BuildRoad { path, .. }
                if path.first() == Some(&Coords::new(12, 17))
                    && path.last() == Some(&Coords::new(16, 17)))
        });
        assert!(built, "expected a road to the warehouse flag, got {:?}", out);
    }

    #[test]
    fn test_stranded_economy_escalates() {
        let (mut world, mut ai) = setup(32, 32);
        let lj = world.tribe.building_index("lumberjacks_hut").unwrap();
        let site = world.place_building(PlayerId(1), Coords::new(10, 10), lj, true);
        let fid = world.base_flag(site).unwrap();
        pump(&mut world, &mut ai, 1_000);
        ai.check_economies(&world);

        // one flag in the economy: escalation after 3 + 1 failed tries
        let mut fired = false;
        for round in 0..6 {
            let mut out = Vec::new();
            fired = ai.create_shortcut_road(&world, fid, 13, 20, 10_000 + round, &mut out);
            if fired {
                let imm = world.flag(fid).imm;
                assert!(out.contains(&Command::Bulldoze { immovable: imm }));
                break;
            }
        }
        assert!(fired);
        assert!(ai
            .blocked_fields()
            .iter()
            .any(|b| b.coords == Coords::new(10, 10) && b.blocked_until >= 10_000 + 15 * 60 * 1000));
    }
}
