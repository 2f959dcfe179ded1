//! Spatial index over owned territory
//!
//! Every owned tile sits in exactly one of three queues: unusable,
//! buildable or mineable. Sweeps process a bounded number of due items per
//! call and rotate them to the back, so no single tick stalls on a large
//! territory.

use crate::core::types::GameTime;
use crate::game::immovable::Immovable;
use crate::game::world::World;
use crate::map::coords::{Coords, Direction};
use crate::map::grid::Terrain;

use super::observers::{BuildingObserver, SiteKind};
use super::{AiPlayer, FIELD_SCAN_RANGE};

/// Per-sweep item caps
const MAX_BUILDABLE_UPDATES: usize = 25;
const MAX_MINEABLE_UPDATES: usize = 40;
const MAX_UNUSABLE_UPDATES: usize = 50;

/// Feature vector of a tile a regular building could go on
#[derive(Debug, Clone)]
pub struct BuildableField {
    pub coords: Coords,
    pub next_update_due: GameTime,

    pub preferred: bool,
    pub enemy_nearby: bool,
    pub near_border: bool,

    pub unowned_land_nearby: u32,
    pub unowned_mines_potential_nearby: u32,
    pub trees_nearby: u32,
    /// Stones are non-renewable; recounted only while the last count was
    /// positive, so the value never recovers once it hits zero
    pub stones_nearby: u32,
    /// -1 until first computed
    pub water_nearby: i32,
    pub distant_water: u32,
    /// -1 until first computed
    pub fish_nearby: i32,
    pub critters_nearby: i32,
    /// Non-increasing resource level under the tile
    pub ground_water: u8,
    pub space_consumers_nearby: u32,

    pub military_capacity: i32,
    /// 1000 = completely alone, shrinks with every military site nearby
    pub military_loneliness: u32,
    pub military_presence: u32,
    pub military_stationed: u32,
    pub military_in_constr_nearby: u32,

    pub producers_nearby: Vec<u32>,
    pub consumers_nearby: Vec<u32>,
}

impl BuildableField {
    pub fn new(world: &World, coords: Coords) -> Self {
        let nr_wares = world.tribe.wares.len();
        let ground_water = world
            .map
            .tile(coords)
            .map(|t| t.resource_amount())
            .unwrap_or(0);
        Self {
            coords,
            next_update_due: 0,
            preferred: false,
            enemy_nearby: false,
            near_border: false,
            unowned_land_nearby: 0,
            unowned_mines_potential_nearby: 0,
            trees_nearby: 0,
            stones_nearby: 1,
            water_nearby: -1,
            distant_water: 0,
            fish_nearby: -1,
            critters_nearby: 0,
            ground_water,
            space_consumers_nearby: 0,
            military_capacity: 0,
            military_loneliness: 1000,
            military_presence: 0,
            military_stationed: 0,
            military_in_constr_nearby: 0,
            producers_nearby: vec![0; nr_wares],
            consumers_nearby: vec![0; nr_wares],
        }
    }
}

/// A tile a mine could go on
#[derive(Debug, Clone)]
pub struct MineableField {
    pub coords: Coords,
    pub next_update_due: GameTime,
    pub preferred: bool,
    pub mines_nearby: u32,
}

impl MineableField {
    pub fn new(coords: Coords) -> Self {
        Self {
            coords,
            next_update_due: 0,
            preferred: false,
            mines_nearby: 1,
        }
    }
}

/// Temporary reservation of a tile against reconsideration
#[derive(Debug, Clone, Copy)]
pub struct BlockedField {
    pub coords: Coords,
    pub blocked_until: GameTime,
}

/// Production influence of a site onto a nearby field
fn consider_productionsite_influence(
    field: &mut BuildableField,
    site_pos: Coords,
    bo: &BuildingObserver,
) {
    if bo.space_consumer && !bo.plants_trees && site_pos.distance(&field.coords) < 8 {
        field.space_consumers_nearby += 1;
    }
    for ware in &bo.inputs {
        field.consumers_nearby[ware.0 as usize] += 1;
    }
    for ware in &bo.outputs {
        field.producers_nearby[ware.0 as usize] += 1;
    }
}

impl AiPlayer {
    /// Refresh due buildable fields, dropping lost ones and demoting tiles
    /// whose build capability fell away
    pub(crate) fn update_all_buildable_fields(&mut self, world: &World, gametime: GameTime) {
        let mut i = 0;
        while i < MAX_BUILDABLE_UPDATES {
            match self.buildable_fields.front() {
                Some(bf) if bf.next_update_due <= gametime => {}
                _ => break,
            }
            let mut bf = self.buildable_fields.pop_front().unwrap();

            let owned = world
                .map
                .tile(bf.coords)
                .map(|t| t.owner == Some(self.player))
                .unwrap_or(false);
            if !owned {
                continue;
            }
            if world.player_buildcaps(self.player, bf.coords).size_cap() == 0 {
                self.unusable_fields.push_back(bf.coords);
                continue;
            }

            self.update_buildable_field(world, &mut bf, FIELD_SCAN_RANGE, false, gametime);
            bf.next_update_due = gametime + self.profile.field_update_interval;
            self.buildable_fields.push_back(bf);
            i += 1;
        }
    }

    /// Same for mineable fields
    pub(crate) fn update_all_mineable_fields(&mut self, world: &World, gametime: GameTime) {
        let mut i = 0;
        while i < MAX_MINEABLE_UPDATES {
            match self.mineable_fields.front() {
                Some(mf) if mf.next_update_due <= gametime => {}
                _ => break,
            }
            let mut mf = self.mineable_fields.pop_front().unwrap();

            let owned = world
                .map
                .tile(mf.coords)
                .map(|t| t.owner == Some(self.player))
                .unwrap_or(false);
            if !owned {
                continue;
            }
            if !world.player_buildcaps(self.player, mf.coords).allows_mine() {
                self.unusable_fields.push_back(mf.coords);
                continue;
            }

            self.update_mineable_field(world, &mut mf);
            mf.next_update_due = gametime + self.profile.field_update_interval;
            self.mineable_fields.push_back(mf);
            i += 1;
        }
    }

    /// Promote unusable tiles whose build capability appeared
    pub(crate) fn update_all_not_buildable_fields(&mut self, world: &World, gametime: GameTime) {
        let maxchecks = self.unusable_fields.len().min(MAX_UNUSABLE_UPDATES);
        for _ in 0..maxchecks {
            let coords = *self.unusable_fields.front().unwrap();
            let owned = world
                .map
                .tile(coords)
                .map(|t| t.owner == Some(self.player))
                .unwrap_or(false);
            if !owned {
                self.unusable_fields.pop_front();
                continue;
            }

            let caps = world.player_buildcaps(self.player, coords);
            if caps.size_cap() > 0 {
                self.unusable_fields.pop_front();
                let mut bf = BuildableField::new(world, coords);
                self.update_buildable_field(world, &mut bf, FIELD_SCAN_RANGE, false, gametime);
                self.buildable_fields.push_back(bf);
                continue;
            }
            if caps.allows_mine() {
                self.unusable_fields.pop_front();
                let mut mf = MineableField::new(coords);
                self.update_mineable_field(world, &mut mf);
                self.mineable_fields.push_back(mf);
                continue;
            }

            self.unusable_fields.rotate_left(1);
        }
    }

    /// Recompute one buildable field's feature vector.
    ///
    /// With `military_only` set, just the military metrics are refreshed
    /// (used when scoring an existing military site for demolition).
    pub(crate) fn update_buildable_field(
        &mut self,
        world: &World,
        field: &mut BuildableField,
        range: u32,
        military_only: bool,
        gametime: GameTime,
    ) {
        field.unowned_land_nearby = world
            .map
            .find_fields(field.coords, range, |t| t.owner.is_none())
            .len() as u32;

        field.near_border = field.unowned_land_nearby > 0
            && !world
                .map
                .find_fields(field.coords, 4, |t| t.owner.is_none())
                .is_empty();

        // unowned mine spots are expensive to count; skip most of the time
        // once a reasonable mining base exists
        if (self.mines.len() > 8 && gametime % 3 > 0) || field.unowned_land_nearby == 0 {
            field.unowned_mines_potential_nearby = 0;
        } else {
            let mine_spot =
                |t: &crate::map::grid::Tile| t.owner.is_none() && t.terrain.base_caps().allows_mine();
            let close = world.map.find_fields(field.coords, 4, mine_spot).len() as u32;
            let wide_radius = (range + 6).max(12);
            let distant =
                world.map.find_fields(field.coords, wide_radius, mine_spot).len() as u32 - close;
            field.unowned_mines_potential_nearby = 3 * close + distant / 2;
            if distant > 0 {
                field.unowned_mines_potential_nearby += 15;
            }
        }

        let immovables = world.find_immovables(field.coords, range);

        if !military_only {
            field.preferred = false;
            field.enemy_nearby = false;
            field.trees_nearby = 0;
            field.space_consumers_nearby = 0;
            field.producers_nearby = vec![0; self.wares.len()];
            field.consumers_nearby = vec![0; self.wares.len()];

            if field.water_nearby == -1 {
                field.water_nearby = world
                    .map
                    .find_fields(field.coords, 5, |t| t.terrain == Terrain::Water)
                    .len() as i32;
                if self.resource_necessity_water_needed {
                    let wide = world
                        .map
                        .find_fields(field.coords, 14, |t| t.terrain == Terrain::Water)
                        .len() as i32;
                    field.distant_water = (wide - field.water_nearby) as u32;
                }
            }

            // fish and critters change slowly, recount only periodically
            if field.water_nearby > 0 && (field.fish_nearby == -1 || gametime % 10 == 0) {
                if let Ok(fish) = world.tribe.resource_index("fish") {
                    field.fish_nearby = world
                        .map
                        .find_fields(field.coords, 6, |t| {
                            matches!(t.resource, Some((res, amount)) if res == fish && amount > 0)
                        })
                        .len() as i32;
                }
            }
            if gametime % 10 == 0 {
                field.critters_nearby = world.find_bobs(field.coords, 6) as i32;
            }

            let fse = field.coords.neighbor(Direction::SE);
            if let Some(id) = world.map.tile(fse).and_then(|t| t.immovable) {
                match world.immovables.get(id) {
                    Some(Immovable::Flag(_)) => field.preferred = true,
                    Some(Immovable::Road(_)) if world.nodecaps(fse).allows_flag() => {
                        field.preferred = true;
                    }
                    _ => {}
                }
            }

            for (id, pos) in &immovables {
                match world.immovables.get(*id) {
                    Some(Immovable::Building(b)) => {
                        if b.player != self.player {
                            if world.is_hostile(self.player, b.player) {
                                field.enemy_nearby = true;
                            }
                            self.enemy_last_seen = gametime;
                            continue;
                        }
                        let bo_idx = match b.target {
                            Some(target) => target.0 as usize,
                            None => b.type_id.0 as usize,
                        };
                        let bo = &self.buildings[bo_idx];
                        if matches!(bo.kind, SiteKind::ProductionSite | SiteKind::Mine) {
                            consider_productionsite_influence(field, *pos, bo);
                        }
                    }
                    Some(Immovable::Flag(fid)) => {
                        let flag = world.flag(*fid);
                        if flag.player != self.player {
                            if world.is_hostile(self.player, flag.player) {
                                field.enemy_nearby = true;
                            }
                            self.enemy_last_seen = gametime;
                        }
                    }
                    Some(Immovable::Road(rid)) => {
                        let road = world.road(*rid);
                        if road.player != self.player {
                            if world.is_hostile(self.player, road.player) {
                                field.enemy_nearby = true;
                            }
                            self.enemy_last_seen = gametime;
                        }
                    }
                    Some(Immovable::Tree) => field.trees_nearby += 1,
                    _ => {}
                }
            }

            if field.stones_nearby > 0 {
                field.stones_nearby = immovables
                    .iter()
                    .filter(|(id, _)| {
                        matches!(world.immovables.get(*id), Some(Immovable::Stone { .. }))
                    })
                    .count() as u32;
            }

            if field.ground_water > 0 {
                field.ground_water = world
                    .map
                    .tile(field.coords)
                    .map(|t| t.resource_amount())
                    .unwrap_or(0);
            }
        }

        // military metrics always use at least radius 10
        let military_immovables = world.find_immovables(field.coords, range.max(10));
        field.military_capacity = 0;
        field.military_loneliness = 1000;
        field.military_presence = 0;
        field.military_stationed = 0;
        field.military_in_constr_nearby = 0;

        for (id, pos) in &military_immovables {
            let Some(Immovable::Building(b)) = world.immovables.get(*id) else {
                continue;
            };
            if b.player != self.player {
                if world.is_hostile(self.player, b.player) {
                    field.enemy_nearby = true;
                }
                continue;
            }

            if let Some(target) = b.target {
                let descr = world.tribe.building(target);
                if self.buildings[target.0 as usize].kind == SiteKind::MilitarySite {
                    let dist = field.coords.distance(pos) as i32;
                    let radius = descr.conquers as i32 + 4;
                    if radius - dist > 0 {
                        field.military_capacity += descr.max_soldiers as i32 / 2 + 1;
                        field.military_loneliness =
                            (field.military_loneliness as i64 * dist as i64 / radius as i64) as u32;
                        field.military_in_constr_nearby += 1;
                    }
                }
            } else if self.buildings[b.type_id.0 as usize].kind == SiteKind::MilitarySite {
                let descr = world.tribe.building(b.type_id);
                let dist = field.coords.distance(pos) as i32;
                let radius = descr.conquers as i32 + 4;
                if radius - dist > 0 && dist > 0 {
                    let stationed = b.military.as_ref().map(|m| m.stationed).unwrap_or(0);
                    field.military_capacity += descr.max_soldiers as i32;
                    field.military_presence += stationed;
                    if stationed > 0 {
                        field.military_stationed += 1;
                    } else {
                        field.military_in_constr_nearby += 1;
                    }
                    field.military_loneliness =
                        (field.military_loneliness as i64 * dist as i64 / radius as i64) as u32;
                }
            }
        }
    }

    /// Recompute one mineable field
    pub(crate) fn update_mineable_field(&mut self, world: &World, field: &mut MineableField) {
        let immovables = world.find_immovables(field.coords, 5);
        field.preferred = false;
        field.mines_nearby = 1;

        let fse = field.coords.neighbor(Direction::SE);
        if let Some(id) = world.map.tile(fse).and_then(|t| t.immovable) {
            match world.immovables.get(id) {
                Some(Immovable::Flag(_)) => field.preferred = true,
                Some(Immovable::Road(_)) if world.nodecaps(fse).allows_flag() => {
                    field.preferred = true;
                }
                _ => {}
            }
        }

        for (id, _) in &immovables {
            if let Some(Immovable::Building(b)) = world.immovables.get(*id) {
                let type_id = b.target.unwrap_or(b.type_id);
                if world.tribe.building(type_id).is_mine {
                    field.mines_nearby += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiProfile;
    use crate::core::types::PlayerId;
    use crate::game::world::World;

    fn ready_ai(world: &World) -> AiPlayer {
        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::default());
        let mut out = Vec::new();
        ai.think(world, 0, &mut out);
        ai
    }

    #[test]
    fn test_trees_and_stones_counted() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 6);
        world.place_tree(Coords::new(11, 10));
        world.place_tree(Coords::new(12, 10));
        world.place_stone(Coords::new(9, 10), 5);
        world.take_notes();

        let mut ai = ready_ai(&world);
        let mut bf = BuildableField::new(&world, Coords::new(10, 10));
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 0);

        assert_eq!(bf.trees_nearby, 2);
        assert_eq!(bf.stones_nearby, 1);
    }

    #[test]
    fn test_stones_never_recover_from_zero() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 6);
        let mut ai = ready_ai(&world);

        let mut bf = BuildableField::new(&world, Coords::new(10, 10));
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 0);
        assert_eq!(bf.stones_nearby, 0);

        // stones appearing later are not picked up again
        world.place_stone(Coords::new(11, 10), 5);
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 0);
        assert_eq!(bf.stones_nearby, 0);
    }

    #[test]
    fn test_military_loneliness_bounds() {
        let mut world = World::flat(32, 32, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 8);
        world.take_notes();
        let mut ai = ready_ai(&world);

        let mut bf = BuildableField::new(&world, Coords::new(10, 10));
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 0);
        assert_eq!(bf.military_loneliness, 1000);

        let sentry = world.tribe.building_index("sentry").unwrap();
        world.place_building(PlayerId(1), Coords::new(13, 10), sentry, true);
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 0);
        assert!(bf.military_loneliness < 1000);
        assert!(bf.military_loneliness <= 1000);
    }

    #[test]
    fn test_enemy_sets_flag_and_timestamp() {
        let mut world = World::flat(24, 24, 2);
        world.players[0].hostile = vec![PlayerId(2)];
        world.players[1].hostile = vec![PlayerId(1)];
        world.conquer(PlayerId(1), Coords::new(10, 10), 4);
        world.conquer(PlayerId(2), Coords::new(16, 10), 3);
        let sentry = world.tribe.building_index("sentry").unwrap();
        world.place_building(PlayerId(2), Coords::new(16, 10), sentry, true);
        world.take_notes();

        let mut ai = ready_ai(&world);
        let mut bf = BuildableField::new(&world, Coords::new(10, 10));
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 5_000);
        assert!(bf.enemy_nearby);
        assert_eq!(ai.enemy_last_seen, 5_000);
    }

    #[test]
    fn test_unusable_promotes_to_buildable_and_mineable() {
        let mut world = World::flat(24, 24, 1);
        for x in 0..4 {
            world.map.tile_mut(Coords::new(x, 0)).unwrap().terrain = Terrain::Mountain;
        }
        world.conquer(PlayerId(1), Coords::new(2, 2), 6);
        world.take_notes();

        let mut ai = ready_ai(&world);
        for _ in 0..40 {
            ai.update_all_not_buildable_fields(&world, 0);
        }
        let (_, buildable, mineable) = ai.field_counts();
        assert!(buildable > 0);
        assert!(mineable > 0);
    }

    #[test]
    fn test_preferred_se_flag() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 6);
        world.place_flag(PlayerId(1), Coords::new(10, 11)).unwrap();
        world.take_notes();

        let mut ai = ready_ai(&world);
        let mut bf = BuildableField::new(&world, Coords::new(10, 10));
        ai.update_buildable_field(&world, &mut bf, FIELD_SCAN_RANGE, false, 0);
        assert!(bf.preferred);
    }
}
