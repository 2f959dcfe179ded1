//! Mutable bookkeeping over the player's holdings
//!
//! One building observer per tribe building type, one ware observer per
//! ware, one economy observer per live economy, and one site observer per
//! standing production/mine/military site. Event hooks keep every counter
//! in lockstep with the notifications the host raises.

use crate::core::types::{EconomyId, FlagId, GameTime, ImmovableId, PlayerId};
use crate::game::descriptor::{BuildingDescr, DescrKind};
use crate::game::immovable::Immovable;
use crate::game::notes::{LostImmovable, Note, Ownership};
use crate::game::world::World;

use super::AiPlayer;

/// Observer-level classification of a building type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    ProductionSite,
    Mine,
    MilitarySite,
    Warehouse,
    TrainingSite,
    ConstructionSite,
    /// Nothing the engine actively manages
    Boring,
}

/// Per-building-type statistics and static hints
#[derive(Debug, Clone)]
pub struct BuildingObserver {
    pub name: String,
    pub id: crate::core::types::BuildingTypeId,
    pub kind: SiteKind,

    pub cnt_built: i32,
    pub cnt_under_construction: i32,
    pub cnt_target: i32,
    pub unoccupied: bool,
    pub current_stats: u32,
    pub stocklevel: u32,
    pub stocklevel_time: GameTime,
    pub construction_decision_time: GameTime,
    pub last_dismantle_time: GameTime,

    pub is_buildable: bool,
    pub need_trees: bool,
    pub need_stones: bool,
    pub need_water: bool,
    pub mines_water: bool,
    pub is_hunter: bool,
    pub is_fisher: bool,
    pub plants_trees: bool,
    pub space_consumer: bool,
    pub recruitment: bool,
    pub expansion_type: bool,
    pub fighting_type: bool,
    pub mountain_conqueror: bool,
    pub prohibited_till: GameTime,
    pub forced_after: Option<GameTime>,
    pub production_hint: Option<crate::core::types::WareId>,
    pub mines: Option<crate::core::types::ResourceId>,
    pub mines_percent: u8,

    pub inputs: Vec<crate::core::types::WareId>,
    pub outputs: Vec<crate::core::types::WareId>,
}

impl BuildingObserver {
    pub fn total_count(&self) -> i32 {
        self.cnt_built + self.cnt_under_construction
    }

    pub fn buildable(&self, world: &World, player: PlayerId) -> bool {
        self.is_buildable && world.building_type_allowed(player, self.id)
    }

    pub(crate) fn from_descr(world: &World, index: usize, descr: &BuildingDescr) -> Self {
        let tribe = &world.tribe;
        let kind = match descr.kind {
            DescrKind::ProductionSite if descr.is_mine => SiteKind::Mine,
            DescrKind::ProductionSite => SiteKind::ProductionSite,
            DescrKind::MilitarySite => SiteKind::MilitarySite,
            DescrKind::Warehouse => SiteKind::Warehouse,
            DescrKind::TrainingSite => SiteKind::TrainingSite,
            DescrKind::ConstructionSite => SiteKind::ConstructionSite,
        };
        let production_hint = descr.hints.renews_resource;
        let plants_trees = production_hint.is_some()
            && tribe.ware_index("log").is_some()
            && production_hint == tribe.ware_index("log");
        let single_output = |ware: &str| {
            descr.outputs.len() == 1 && tribe.ware_index(ware) == Some(descr.outputs[0])
        };

        Self {
            name: descr.name.clone(),
            id: crate::core::types::BuildingTypeId(index as u16),
            kind,
            cnt_built: 0,
            cnt_under_construction: 0,
            cnt_target: 1,
            unoccupied: false,
            current_stats: 0,
            stocklevel: 0,
            stocklevel_time: 0,
            // otherwise nothing would be built in the first 25 s
            construction_decision_time: -60 * 60 * 1000,
            last_dismantle_time: 0,
            is_buildable: descr.buildable,
            need_trees: descr.hints.log_producer,
            need_stones: descr.hints.stone_producer,
            need_water: descr.hints.needs_water,
            mines_water: descr.hints.mines_water,
            is_hunter: single_output("meat"),
            is_fisher: single_output("fish"),
            plants_trees,
            space_consumer: descr.hints.space_consumer,
            recruitment: descr.hints.for_recruitment,
            expansion_type: descr.hints.expansion_type,
            fighting_type: descr.hints.fighting_type,
            mountain_conqueror: descr.hints.mountain_conqueror,
            prohibited_till: descr.hints.prohibited_till,
            forced_after: descr.hints.forced_after,
            production_hint,
            mines: descr.hints.mines,
            mines_percent: descr.hints.mines_percent,
            inputs: descr.inputs.clone(),
            outputs: descr.outputs.clone(),
        }
    }
}

/// Per-ware production balance
#[derive(Debug, Clone)]
pub struct WareObserver {
    pub producers: i32,
    pub consumers: i32,
    pub preciousness: u8,
}

/// One standing production site or mine
#[derive(Debug, Clone, Copy)]
pub struct SiteObserver {
    pub site: ImmovableId,
    /// Index into the building observer table
    pub bo: usize,
    pub built_time: GameTime,
    pub unoccupied_till: GameTime,
    pub stats_zero: u32,
    pub no_resources_count: u32,
}

/// One standing military site
#[derive(Debug, Clone, Copy)]
pub struct MilitarySiteObserver {
    pub site: ImmovableId,
    pub bo: usize,
    pub checks: u8,
    pub enemies_nearby: bool,
}

/// Flags of one economy, plus the orphan escalation counter
#[derive(Debug, Clone)]
pub struct EconomyObserver {
    pub economy: EconomyId,
    pub flags: std::collections::VecDeque<FlagId>,
    pub failed_connection_tries: u32,
}

impl AiPlayer {
    /// Route one host notification into the hooks; foreign notes are ignored
    pub fn handle_note(&mut self, world: &World, note: &Note, gametime: GameTime) {
        if !self.initialized {
            self.late_initialization(world);
        }
        match note {
            Note::FieldPossession { player, pos, ownership } => {
                if *player == self.player && *ownership == Ownership::Gained {
                    self.unusable_fields.push_back(*pos);
                }
            }
            Note::ImmovableGained { player, id } => {
                if *player == self.player {
                    self.gain_immovable(world, *id, gametime);
                }
            }
            Note::ImmovableLost { player, what, id } => {
                if *player == self.player {
                    self.lose_immovable(*id, what);
                }
            }
            Note::ProductionSiteOutOfResources { player, site } => {
                if *player == self.player {
                    self.out_of_resources_site(*site);
                }
            }
        }
    }

    pub(crate) fn gain_immovable(&mut self, world: &World, id: ImmovableId, gametime: GameTime) {
        match world.immovables.get(id) {
            Some(Immovable::Building(_)) => self.gain_building(world, id, gametime),
            Some(Immovable::Flag(fid)) => self.new_flags.push_back(*fid),
            Some(Immovable::Road(rid)) => self.roads.push_front(*rid),
            _ => {}
        }
    }

    pub(crate) fn lose_immovable(&mut self, id: ImmovableId, what: &LostImmovable) {
        match what {
            LostImmovable::Building { type_id, target, .. } => {
                self.lose_building(id, *type_id, *target);
            }
            LostImmovable::Flag(fid) => {
                for eco in self.economies.iter_mut() {
                    if let Some(pos) = eco.flags.iter().position(|f| f == fid) {
                        eco.flags.remove(pos);
                        return;
                    }
                }
                if let Some(pos) = self.new_flags.iter().position(|f| f == fid) {
                    self.new_flags.remove(pos);
                }
            }
            LostImmovable::Road(rid) => {
                if let Some(pos) = self.roads.iter().position(|r| r == rid) {
                    self.roads.remove(pos);
                }
            }
        }
    }

    fn gain_building(&mut self, world: &World, id: ImmovableId, gametime: GameTime) {
        let Some(b) = world.building(id) else { return };

        if let Some(target) = b.target {
            let target_idx = target.0 as usize;
            self.buildings[target_idx].cnt_under_construction += 1;
            self.num_constructionsites += 1;
            match self.buildings[target_idx].kind {
                SiteKind::ProductionSite | SiteKind::Mine => self.num_prod_constructionsites += 1,
                SiteKind::MilitarySite => self.num_milit_constructionsites += 1,
                _ => {}
            }
            // try to connect the fresh construction site right away
            self.next_road_due = gametime;
            return;
        }

        let bo_idx = b.type_id.0 as usize;
        self.buildings[bo_idx].cnt_built += 1;
        match self.buildings[bo_idx].kind {
            SiteKind::ProductionSite => {
                self.productionsites.push_back(SiteObserver {
                    site: id,
                    bo: bo_idx,
                    built_time: gametime,
                    unoccupied_till: gametime,
                    stats_zero: 0,
                    no_resources_count: 0,
                });
                for ware in &self.buildings[bo_idx].outputs.clone() {
                    self.wares[ware.0 as usize].producers += 1;
                }
                for ware in &self.buildings[bo_idx].inputs.clone() {
                    self.wares[ware.0 as usize].consumers += 1;
                }
            }
            SiteKind::Mine => {
                self.mines.push_back(SiteObserver {
                    site: id,
                    bo: bo_idx,
                    built_time: gametime,
                    unoccupied_till: gametime,
                    stats_zero: 0,
                    no_resources_count: 0,
                });
                for ware in &self.buildings[bo_idx].outputs.clone() {
                    self.wares[ware.0 as usize].producers += 1;
                }
                for ware in &self.buildings[bo_idx].inputs.clone() {
                    self.wares[ware.0 as usize].consumers += 1;
                }
            }
            SiteKind::MilitarySite => {
                let checks = world.tribe.building(b.type_id).size.cap_value();
                self.militarysites.push_back(MilitarySiteObserver {
                    site: id,
                    bo: bo_idx,
                    checks,
                    enemies_nearby: true,
                });
            }
            SiteKind::Warehouse => self.numof_warehouses += 1,
            _ => {}
        }
    }

    fn lose_building(
        &mut self,
        id: ImmovableId,
        type_id: crate::core::types::BuildingTypeId,
        target: Option<crate::core::types::BuildingTypeId>,
    ) {
        if let Some(target) = target {
            let target_idx = target.0 as usize;
            self.buildings[target_idx].cnt_under_construction -= 1;
            self.num_constructionsites -= 1;
            match self.buildings[target_idx].kind {
                SiteKind::ProductionSite | SiteKind::Mine => self.num_prod_constructionsites -= 1,
                SiteKind::MilitarySite => self.num_milit_constructionsites -= 1,
                _ => {}
            }
        } else {
            let bo_idx = type_id.0 as usize;
            self.buildings[bo_idx].cnt_built -= 1;
            match self.buildings[bo_idx].kind {
                SiteKind::ProductionSite => {
                    if let Some(pos) = self.productionsites.iter().position(|s| s.site == id) {
                        self.productionsites.remove(pos);
                    }
                    for ware in &self.buildings[bo_idx].outputs.clone() {
                        self.wares[ware.0 as usize].producers -= 1;
                    }
                    for ware in &self.buildings[bo_idx].inputs.clone() {
                        self.wares[ware.0 as usize].consumers -= 1;
                    }
                }
                SiteKind::Mine => {
                    if let Some(pos) = self.mines.iter().position(|s| s.site == id) {
                        self.mines.remove(pos);
                    }
                    for ware in &self.buildings[bo_idx].outputs.clone() {
                        self.wares[ware.0 as usize].producers -= 1;
                    }
                    for ware in &self.buildings[bo_idx].inputs.clone() {
                        self.wares[ware.0 as usize].consumers -= 1;
                    }
                }
                SiteKind::MilitarySite => {
                    if let Some(pos) = self.militarysites.iter().position(|s| s.site == id) {
                        self.militarysites.remove(pos);
                    }
                }
                SiteKind::Warehouse => {
                    debug_assert!(self.numof_warehouses > 0);
                    self.numof_warehouses -= 1;
                }
                _ => {}
            }
        }

        self.buildable_changed = true;
        self.mineable_changed = true;
    }

    /// A mine reported an empty vein
    pub(crate) fn out_of_resources_site(&mut self, site: ImmovableId) {
        for so in self.mines.iter_mut() {
            if so.site == site {
                so.no_resources_count += 1;
                return;
            }
        }
        for so in self.productionsites.iter_mut() {
            if so.site == site {
                so.no_resources_count += 1;
                return;
            }
        }
    }

    /// Absorb new flags, follow flags whose economy changed, and drop
    /// observers of vanished economies. Returns true when something moved.
    pub(crate) fn check_economies(&mut self, world: &World) -> bool {
        while let Some(fid) = self.new_flags.pop_front() {
            if !world.flag_exists(fid) {
                continue;
            }
            let eco = world.flag(fid).economy;
            self.economy_observer(eco).flags.push_back(fid);
        }

        for obs_idx in 0..self.economies.len() {
            let mut moved = Vec::new();
            {
                let obs = &mut self.economies[obs_idx];
                let home = obs.economy;
                let mut kept = std::collections::VecDeque::new();
                while let Some(fid) = obs.flags.pop_front() {
                    if !world.flag_exists(fid) {
                        continue;
                    }
                    let current = world.flag(fid).economy;
                    if current != home {
                        moved.push((fid, current));
                    } else {
                        kept.push_back(fid);
                    }
                }
                obs.flags = kept;
            }
            for (fid, eco) in moved {
                self.economy_observer(eco).flags.push_back(fid);
            }
        }

        if let Some(pos) = self.economies.iter().position(|o| o.flags.is_empty()) {
            self.economies.remove(pos);
            return true;
        }
        false
    }

    /// Find or create the observer of an economy
    pub(crate) fn economy_observer(&mut self, economy: EconomyId) -> &mut EconomyObserver {
        if let Some(pos) = self.economies.iter().position(|o| o.economy == economy) {
            return &mut self.economies[pos];
        }
        self.economies.push_front(EconomyObserver {
            economy,
            flags: std::collections::VecDeque::new(),
            failed_connection_tries: 0,
        });
        self.economies.front_mut().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiProfile;
    use crate::map::coords::Coords;

    fn world_with_ai() -> (World, AiPlayer) {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(12, 12), 8);
        world.take_notes();
        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::default());
        let mut out = Vec::new();
        ai.think(&world, 0, &mut out);
        (world, ai)
    }

    fn pump_notes(world: &mut World, ai: &mut AiPlayer, gametime: GameTime) {
        for note in world.take_notes() {
            ai.handle_note(world, &note, gametime);
        }
    }

    #[test]
    fn test_gain_lose_building_restores_counts() {
        let (mut world, mut ai) = world_with_ai();
        let lj = world.tribe.building_index("lumberjacks_hut").unwrap();
        let lj_idx = lj.0 as usize;

        let id = world.place_building(PlayerId(1), Coords::new(12, 12), lj, false);
        pump_notes(&mut world, &mut ai, 1_000);
        assert_eq!(ai.buildings[lj_idx].cnt_under_construction, 1);
        assert_eq!(ai.num_prod_constructionsites, 1);

        world.finish_construction(id);
        pump_notes(&mut world, &mut ai, 2_000);
        assert_eq!(ai.buildings[lj_idx].cnt_under_construction, 0);
        assert_eq!(ai.buildings[lj_idx].cnt_built, 1);
        assert_eq!(ai.productionsites.len(), 1);

        let log = world.tribe.ware_index("log").unwrap();
        assert_eq!(ai.wares[log.0 as usize].producers, 1);

        world.remove_building(id);
        pump_notes(&mut world, &mut ai, 3_000);
        assert_eq!(ai.buildings[lj_idx].cnt_built, 0);
        assert_eq!(ai.productionsites.len(), 0);
        assert_eq!(ai.wares[log.0 as usize].producers, 0);
    }

    #[test]
    fn test_out_of_resources_counter() {
        let (mut world, mut ai) = world_with_ai();
        for x in 10..14 {
            world.map.tile_mut(Coords::new(x, 12)).unwrap().terrain =
                crate::map::grid::Terrain::Mountain;
        }
        let mine = world.tribe.building_index("coal_mine").unwrap();
        let id = world.place_building(PlayerId(1), Coords::new(12, 12), mine, true);
        pump_notes(&mut world, &mut ai, 1_000);
        assert_eq!(ai.mines.len(), 1);

        ai.out_of_resources_site(id);
        ai.out_of_resources_site(id);
        assert_eq!(ai.mines[0].no_resources_count, 2);
    }

    #[test]
    fn test_economy_observer_tracks_flags() {
        let (mut world, mut ai) = world_with_ai();
        let fid = world.place_flag(PlayerId(1), Coords::new(10, 10)).unwrap();
        pump_notes(&mut world, &mut ai, 1_000);

        assert!(ai.check_economies(&world) == false);
        let eco = world.flag(fid).economy;
        let obs = ai.economies.iter().find(|o| o.economy == eco).unwrap();
        assert!(obs.flags.contains(&fid));

        // losing the flag empties the observer which is then removed
        world.remove_flag(fid);
        pump_notes(&mut world, &mut ai, 2_000);
        assert!(ai.check_economies(&world));
        assert!(ai.economies.iter().all(|o| o.economy != eco));
    }

    #[test]
    fn test_military_gain_creates_observer() {
        let (mut world, mut ai) = world_with_ai();
        let sentry = world.tribe.building_index("sentry").unwrap();
        world.place_building(PlayerId(1), Coords::new(12, 12), sentry, true);
        pump_notes(&mut world, &mut ai, 1_000);
        assert_eq!(ai.militarysites.len(), 1);
        assert!(ai.militarysites[0].enemies_nearby);
    }
}
