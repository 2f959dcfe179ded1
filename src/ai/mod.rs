//! The computer opponent decision engine
//!
//! One [`AiPlayer`] per computer-controlled player. The host calls
//! [`AiPlayer::think`] once per simulation tick and delivers notifications
//! through [`AiPlayer::handle_note`]; the engine answers with commands.
//!
//! All decisions are reproducible: every input is game state plus the game
//! clock, tie-breaks follow queue insertion order, and pseudo-randomness is
//! derived from game time alone.

pub mod attack;
pub mod construction;
pub mod fields;
pub mod observers;
pub mod personality;
pub mod roads;
pub mod supervision;

use std::collections::VecDeque;

use crate::core::error::{EngineError, Result};
use crate::core::types::{GameTime, PlayerId};
use crate::game::commands::Command;
use crate::game::world::World;

use fields::{BlockedField, BuildableField, MineableField};
use observers::{
    BuildingObserver, EconomyObserver, MilitarySiteObserver, SiteObserver, WareObserver,
};
pub use personality::{AiProfile, Personality};

use crate::map::coords::Coords;

/// Compensates kinds that must live near borders and would otherwise
/// score below zero
pub(crate) const DEFAULT_PRIO_BOOST: i32 = 12;

/// General scan radius used when refreshing a buildable field
pub(crate) const FIELD_SCAN_RANGE: u32 = 7;

/// Deterministic tick-driven controller for one player
pub struct AiPlayer {
    pub(crate) player: PlayerId,
    pub(crate) profile: AiProfile,

    pub(crate) initialized: bool,
    pub(crate) buildable_changed: bool,
    pub(crate) mineable_changed: bool,

    pub(crate) wares: Vec<WareObserver>,
    pub(crate) buildings: Vec<BuildingObserver>,

    pub(crate) unusable_fields: VecDeque<Coords>,
    pub(crate) buildable_fields: VecDeque<BuildableField>,
    pub(crate) mineable_fields: VecDeque<MineableField>,
    pub(crate) blocked_fields: Vec<BlockedField>,

    pub(crate) economies: VecDeque<EconomyObserver>,
    pub(crate) new_flags: VecDeque<crate::core::types::FlagId>,
    pub(crate) roads: VecDeque<crate::core::types::RoadId>,

    pub(crate) productionsites: VecDeque<SiteObserver>,
    pub(crate) mines: VecDeque<SiteObserver>,
    pub(crate) militarysites: VecDeque<MilitarySiteObserver>,

    pub(crate) num_constructionsites: u32,
    pub(crate) num_milit_constructionsites: u32,
    pub(crate) num_prod_constructionsites: u32,
    pub(crate) numof_warehouses: u32,
    pub(crate) unstationed_milit_buildings: u32,
    /// Free small+medium+big spots, refreshed by the construction phase
    pub(crate) spots: i32,

    pub(crate) next_bf_check_due: GameTime,
    pub(crate) next_road_due: GameTime,
    pub(crate) next_stats_update_due: GameTime,
    pub(crate) next_construction_due: GameTime,
    pub(crate) next_mine_construction_due: GameTime,
    pub(crate) next_productionsite_check_due: GameTime,
    pub(crate) next_mine_check_due: GameTime,
    pub(crate) next_militarysite_check_due: GameTime,
    pub(crate) next_attack_consideration_due: GameTime,
    pub(crate) next_helpersites_check_due: GameTime,

    pub(crate) inhibit_road_building: GameTime,
    pub(crate) time_of_last_construction: GameTime,
    pub(crate) enemy_last_seen: GameTime,
    pub(crate) new_buildings_stop: bool,
    pub(crate) resource_necessity_territory: u8,
    pub(crate) resource_necessity_mines: u8,
    pub(crate) resource_necessity_water: u8,
    pub(crate) resource_necessity_water_needed: bool,
    pub(crate) military_last_dismantle: GameTime,
    pub(crate) military_last_build: GameTime,
}

impl AiPlayer {
    pub fn new(player: PlayerId, profile: AiProfile) -> Self {
        Self {
            player,
            profile,
            initialized: false,
            buildable_changed: true,
            mineable_changed: true,
            wares: Vec::new(),
            buildings: Vec::new(),
            unusable_fields: VecDeque::new(),
            buildable_fields: VecDeque::new(),
            mineable_fields: VecDeque::new(),
            blocked_fields: Vec::new(),
            economies: VecDeque::new(),
            new_flags: VecDeque::new(),
            roads: VecDeque::new(),
            productionsites: VecDeque::new(),
            mines: VecDeque::new(),
            militarysites: VecDeque::new(),
            num_constructionsites: 0,
            num_milit_constructionsites: 0,
            num_prod_constructionsites: 0,
            numof_warehouses: 0,
            unstationed_milit_buildings: 0,
            spots: 0,
            next_bf_check_due: 1_000,
            next_road_due: 2_000,
            next_stats_update_due: 30_000,
            next_construction_due: 1_000,
            next_mine_construction_due: 0,
            next_productionsite_check_due: 0,
            next_mine_check_due: 0,
            next_militarysite_check_due: 0,
            next_attack_consideration_due: 300_000,
            next_helpersites_check_due: 180_000,
            inhibit_road_building: 0,
            time_of_last_construction: 0,
            enemy_last_seen: -2 * 60 * 1000,
            new_buildings_stop: false,
            resource_necessity_territory: 255,
            resource_necessity_mines: 255,
            resource_necessity_water: 0,
            resource_necessity_water_needed: false,
            military_last_dismantle: 0,
            military_last_build: -60 * 1000,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn observers(&self) -> &[BuildingObserver] {
        &self.buildings
    }

    pub fn blocked_fields(&self) -> &[BlockedField] {
        &self.blocked_fields
    }

    /// (unusable, buildable, mineable) queue sizes
    pub fn field_counts(&self) -> (usize, usize, usize) {
        (
            self.unusable_fields.len(),
            self.buildable_fields.len(),
            self.mineable_fields.len(),
        )
    }

    pub fn unusable_coords(&self) -> impl Iterator<Item = Coords> + '_ {
        self.unusable_fields.iter().copied()
    }

    pub fn buildable_coords(&self) -> impl Iterator<Item = Coords> + '_ {
        self.buildable_fields.iter().map(|f| f.coords)
    }

    pub fn mineable_coords(&self) -> impl Iterator<Item = Coords> + '_ {
        self.mineable_fields.iter().map(|f| f.coords)
    }

    /// Observer lookup by building name.
    ///
    /// Asking for a name the tribe does not know is a programmer error and
    /// surfaces as [`EngineError::UnknownBuilding`].
    pub fn get_building_observer(&self, name: &str) -> Result<&BuildingObserver> {
        self.buildings
            .iter()
            .find(|bo| bo.name == name)
            .ok_or_else(|| EngineError::UnknownBuilding(name.to_string()))
    }

    /// One scheduler pass. Sub-phases run in fixed order by due time; the
    /// first phase that emits significant work ends the pass, which caps
    /// per-tick cost at roughly one command.
    pub fn think(&mut self, world: &World, gametime: GameTime, out: &mut Vec<Command>) {
        if !self.initialized {
            self.late_initialization(world);
        }

        if self.buildable_changed || self.next_bf_check_due < gametime {
            self.update_all_buildable_fields(world, gametime);
            self.next_bf_check_due = gametime + self.profile.min_field_sweep_interval;
        }
        self.buildable_changed = false;

        // roads are improved perpetually; everything below runs at most
        // once per road cadence
        if self.next_road_due <= gametime {
            self.next_road_due = gametime + self.profile.road_check_interval;
            if self.improve_roads(world, gametime, out) {
                self.buildable_changed = true;
                return;
            }
        } else {
            return;
        }

        self.update_all_not_buildable_fields(world, gametime);

        if self.next_attack_consideration_due <= gametime {
            self.consider_attack(world, gametime, out);
        }

        // reconcile economies before placing anything new
        if self.check_economies(world) {
            return;
        }

        if self.next_stats_update_due <= gametime {
            self.update_productionsite_stats(world, gametime);
        }

        if self.next_construction_due <= gametime {
            self.next_construction_due = gametime + self.profile.construction_interval;
            if self.construct_building(world, gametime, out) {
                self.time_of_last_construction = gametime;
                self.buildable_changed = true;
                return;
            }
        }

        if self.check_productionsites(world, gametime, out) {
            return;
        }

        if self.check_mines(world, gametime, out) {
            return;
        }

        if self.check_militarysites(world, gametime, out) {
            return;
        }

        if self.next_helpersites_check_due <= gametime {
            self.check_helpersites(world, gametime);
        }

        if self.improve_roads(world, gametime, out) {
            self.buildable_changed = true;
            self.mineable_changed = true;
        }
    }

    /// First-think setup: build observer tables from the tribe and absorb
    /// everything the player already owns.
    fn late_initialization(&mut self, world: &World) {
        self.initialized = true;
        self.wares = world
            .tribe
            .wares
            .iter()
            .map(|w| WareObserver {
                producers: 0,
                consumers: 0,
                preciousness: w.preciousness,
            })
            .collect();
        self.buildings = world
            .tribe
            .buildings
            .iter()
            .enumerate()
            .map(|(i, descr)| BuildingObserver::from_descr(world, i, descr))
            .collect();

        self.num_constructionsites = 0;
        self.num_milit_constructionsites = 0;
        self.num_prod_constructionsites = 0;
        self.next_construction_due = 0;
        self.next_road_due = 1_000;
        self.next_productionsite_check_due = 0;
        self.inhibit_road_building = 0;
        self.resource_necessity_water_needed = world.tribe.needs_water_resource;

        // absorb fields and immovables already owned at startup
        let mut seen = ahash::AHashSet::new();
        for c in world.map.all_coords() {
            let tile = world.map.tile(c).unwrap();
            if tile.owner != Some(self.player) {
                continue;
            }
            self.unusable_fields.push_back(c);
            if let Some(id) = tile.immovable {
                if seen.insert(id) {
                    self.gain_immovable(world, id, 0);
                }
            }
        }
    }

    /// Refresh per-type utilization statistics; every 10 s is plenty
    pub(crate) fn update_productionsite_stats(&mut self, world: &World, gametime: GameTime) {
        self.next_stats_update_due = gametime + self.profile.stats_update_interval;
        let mut fishers_count = 0u32;

        for bo in self.buildings.iter_mut() {
            bo.current_stats = 0;
            bo.unoccupied = false;
        }

        for _ in 0..self.productionsites.len() {
            let so = *self.productionsites.front().unwrap();
            if let Some(b) = world.building(so.site) {
                if let Some(prod) = &b.prod {
                    let bo = &mut self.buildings[so.bo];
                    bo.current_stats += prod.crude_statistics as u32;
                    if bo.is_fisher {
                        fishers_count += 1;
                    }
                    bo.unoccupied |= !prod.can_start_working;
                }
            }
            self.productionsites.rotate_left(1);
        }

        if self.resource_necessity_water_needed {
            self.resource_necessity_water = match fishers_count {
                0 => 255,
                1 => 150,
                _ => 18,
            };
        }

        for _ in 0..self.mines.len() {
            let so = *self.mines.front().unwrap();
            if let Some(b) = world.building(so.site) {
                if let Some(prod) = &b.prod {
                    let bo = &mut self.buildings[so.bo];
                    bo.current_stats += prod.statistics_percent as u32;
                    bo.unoccupied |= !prod.can_start_working;
                }
            }
            self.mines.rotate_left(1);
        }

        for bo in self.buildings.iter_mut() {
            if bo.cnt_built > 0 {
                bo.current_stats /= bo.cnt_built as u32;
            }
        }
    }

    /// Re-derive targets and stock caches of supporting buildings so the
    /// supervisor never dismantles against stale numbers
    pub(crate) fn check_helpersites(&mut self, world: &World, gametime: GameTime) {
        self.next_helpersites_check_due = gametime + self.profile.helpersites_check_interval;
        let sites = (self.mines.len() + self.productionsites.len()) as i32;
        for idx in 0..self.buildings.len() {
            let Some(hint) = self.buildings[idx].production_hint else {
                continue;
            };
            self.buildings[idx].cnt_target = if self.buildings[idx].plants_trees {
                2 + sites / 15
            } else {
                1 + sites / 20
            };
            let level = self.get_stocklevel_by_ware(world, hint);
            self.buildings[idx].stocklevel = level;
            self.buildings[idx].stocklevel_time = gametime;
        }
    }

    /// Stock of a building's own outputs across warehouse economies;
    /// with several outputs the scarcest one counts
    pub(crate) fn get_stocklevel(&self, world: &World, bo_idx: usize) -> u32 {
        let bo = &self.buildings[bo_idx];
        let mut count = u32::MAX;
        if bo.outputs.is_empty() {
            return count;
        }
        for obs in &self.economies {
            let Some(eco) = world.economy(obs.economy) else {
                continue;
            };
            if eco.warehouses.is_empty() {
                continue;
            }
            for ware in &bo.outputs {
                count = count.min(eco.stock_ware(*ware));
            }
        }
        count
    }

    /// Total stock of one ware across warehouse economies
    pub(crate) fn get_stocklevel_by_ware(
        &self,
        world: &World,
        ware: crate::core::types::WareId,
    ) -> u32 {
        let mut count = 0;
        for obs in &self.economies {
            let Some(eco) = world.economy(obs.economy) else {
                continue;
            };
            if eco.warehouses.is_empty() {
                continue;
            }
            count += eco.stock_ware(ware);
        }
        count
    }

    /// Is any output of this building needed, and how precious is it?
    /// Returns (needed, max_preciousness, max_needed_preciousness).
    pub(crate) fn check_ware_necessity(&self, world: &World, bo_idx: usize) -> (bool, i32, i32) {
        let bo = &self.buildings[bo_idx];
        let mut output_is_needed = false;
        let mut max_preciousness = 0i32;
        let mut max_needed_preciousness = 0i32;

        for obs in &self.economies {
            let Some(eco) = world.economy(obs.economy) else {
                continue;
            };
            if eco.warehouses.is_empty() {
                continue;
            }
            for ware in &bo.outputs {
                let preciousness = self.wares[ware.0 as usize].preciousness as i32;
                if eco.needs_ware(*ware) {
                    output_is_needed = true;
                    max_needed_preciousness = max_needed_preciousness.max(preciousness);
                }
                max_preciousness = max_preciousness.max(preciousness);
            }
        }
        (output_is_needed, max_preciousness, max_needed_preciousness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::World;

    #[test]
    fn test_unknown_building_observer_is_error() {
        let world = World::flat(8, 8, 1);
        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::default());
        let mut out = Vec::new();
        ai.think(&world, 0, &mut out);
        assert!(ai.get_building_observer("quarry").is_ok());
        assert!(matches!(
            ai.get_building_observer("palace"),
            Err(EngineError::UnknownBuilding(_))
        ));
    }

    #[test]
    fn test_think_twice_same_tick_is_idempotent() {
        let mut world = World::flat(24, 24, 1);
        let hq = world.tribe.building_index("headquarters").unwrap();
        world.place_building(PlayerId(1), Coords::new(12, 12), hq, true);
        world.take_notes();

        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::default());
        let mut first = Vec::new();
        ai.think(&world, 2_000, &mut first);
        let mut second = Vec::new();
        ai.think(&world, 2_000, &mut second);
        // due times advanced, the second pass has nothing left to do
        assert!(second.is_empty());
    }
}
