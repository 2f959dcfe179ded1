//! Construction planner
//!
//! Once per construction cadence every (buildable field x building type)
//! pair is scored and the single best positive candidate is built. Mines
//! run through the same selection with their own cadence and a
//! mineral-matching score.

use crate::core::types::{BuildingTypeId, GameTime};
use crate::game::commands::Command;
use crate::game::world::World;
use crate::map::coords::Coords;

use super::fields::{BlockedField, BuildableField};
use super::observers::SiteKind;
use super::{AiPlayer, DEFAULT_PRIO_BOOST};

/// How aggressively new military sites may be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    PushExpansion,
    ResourcesOrDefense,
    DefenseOnly,
    NoNewMilitary,
}

/// Inputs of the per-attempt strategic assessment
#[derive(Debug, Clone, Copy)]
pub struct RegimeInputs {
    /// Free spots by size class (index = size capability 1..=3)
    pub spots_avail: [i32; 4],
    pub productionsites: usize,
    pub mines: usize,
    pub mineable_fields: usize,
    pub militarysites: usize,
    pub num_prod_constructionsites: u32,
    pub num_milit_constructionsites: u32,
    pub unstationed_milit_buildings: u32,
    pub enemy_last_seen: GameTime,
    pub gametime: GameTime,
}

/// Strategic regime recomputed for every construction attempt
#[derive(Debug, Clone, Copy)]
pub struct StrategicRegime {
    pub spots: i32,
    pub new_buildings_stop: bool,
    pub expansion_mode: ExpansionMode,
    pub mines_necessity: u8,
    pub territory_necessity: u8,
}

impl StrategicRegime {
    pub fn compute(input: &RegimeInputs) -> Self {
        let spots = input.spots_avail[1] + input.spots_avail[2] + input.spots_avail[3];

        // several reasons to stop building production sites, and one
        // override: a recently seen enemy cancels the stop
        let mut new_buildings_stop = false;
        if input.num_prod_constructionsites as usize > input.productionsites / 7 + 2 {
            new_buildings_stop = true;
        }
        if spots * 3 / 2 + 5 < input.productionsites as i32 {
            new_buildings_stop = true;
        }
        if input.num_prod_constructionsites as usize + input.productionsites
            > (input.num_milit_constructionsites as usize + input.militarysites) * 3
        {
            new_buildings_stop = true;
        }
        if input.mines < 3 {
            new_buildings_stop = true;
        }
        if new_buildings_stop && input.enemy_last_seen + 2 * 60 * 1000 > input.gametime {
            new_buildings_stop = false;
        }

        let threshold = (input.militarysites / 40 + 2) as u32;
        let pending = input.unstationed_milit_buildings + input.num_milit_constructionsites;
        let expansion_mode = if pending > 3 * threshold {
            ExpansionMode::NoNewMilitary
        } else if pending > 2 * threshold {
            ExpansionMode::DefenseOnly
        } else if pending >= 1 {
            ExpansionMode::ResourcesOrDefense
        } else {
            ExpansionMode::PushExpansion
        };

        // mine spots count as virtual mines, they will become mines anyway
        let virtual_mines = (input.mines + input.mineable_fields / 10) as i32;
        let mines_necessity = if virtual_mines <= 5 {
            255
        } else if virtual_mines > 14 {
            0
        } else {
            (((16 - virtual_mines) * 255) / 12).min(255) as u8
        };

        // below 6 virtual mines the economy is still being bootstrapped,
        // afterwards expansion speed is regulated by free spots
        let territory_necessity = if virtual_mines <= 5 {
            if input.spots_avail[3] <= 4 {
                255
            } else {
                0
            }
        } else if spots == 0 {
            255
        } else {
            (255 * 4 * input.productionsites as i64 / spots as i64).min(255) as u8
        };

        Self {
            spots,
            new_buildings_stop,
            expansion_mode,
            mines_necessity,
            territory_necessity,
        }
    }
}

impl AiPlayer {
    /// Prefer inner land for buildings that do not have to sit at borders
    pub(crate) fn recalc_with_border_range(&self, bf: &BuildableField, prio: i32) -> i32 {
        let mut prio = prio;
        if bf.unowned_land_nearby > 15 {
            prio -= bf.unowned_land_nearby as i32 - 15;
        }
        if bf.enemy_nearby && prio > 0 {
            prio /= 3 + self.profile.personality.border_divisor_bonus();
        }
        prio
    }

    fn refresh_stocklevel(&mut self, world: &World, j: usize, gametime: GameTime, max_age: GameTime) {
        if self.buildings[j].stocklevel_time < gametime - max_age {
            let level = self.get_stocklevel(world, j);
            self.buildings[j].stocklevel = level;
            self.buildings[j].stocklevel_time = gametime;
        }
    }

    fn refresh_stocklevel_by_hint(
        &mut self,
        world: &World,
        j: usize,
        gametime: GameTime,
        max_age: GameTime,
    ) {
        if self.buildings[j].stocklevel_time < gametime - max_age {
            let Some(hint) = self.buildings[j].production_hint else {
                return;
            };
            let level = self.get_stocklevel_by_ware(world, hint);
            self.buildings[j].stocklevel = level;
            self.buildings[j].stocklevel_time = gametime;
        }
    }

    /// Score all (field x building) candidates and build the winner.
    /// Returns true when a build command was emitted.
    pub(crate) fn construct_building(
        &mut self,
        world: &World,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        let mut spots_avail = [0i32; 4];
        for bf in &self.buildable_fields {
            let cap = world.player_buildcaps(self.player, bf.coords).size_cap();
            spots_avail[cap as usize] += 1;
        }

        let regime = StrategicRegime::compute(&RegimeInputs {
            spots_avail,
            productionsites: self.productionsites.len(),
            mines: self.mines.len(),
            mineable_fields: self.mineable_fields.len(),
            militarysites: self.militarysites.len(),
            num_prod_constructionsites: self.num_prod_constructionsites,
            num_milit_constructionsites: self.num_milit_constructionsites,
            unstationed_milit_buildings: self.unstationed_milit_buildings,
            enemy_last_seen: self.enemy_last_seen,
            gametime,
        });
        self.spots = regime.spots;
        self.new_buildings_stop = regime.new_buildings_stop;
        self.resource_necessity_mines = regime.mines_necessity;
        self.resource_necessity_territory = regime.territory_necessity;
        let expansion_mode = regime.expansion_mode;

        // expired reservations are removed before any scan sees them
        self.blocked_fields.retain(|b| b.blocked_until >= gametime);

        let mut best: Option<(usize, Coords)> = None;
        let mut proposed_priority = 0i32;
        let mut mine = false;

        let sites = (self.mines.len() + self.productionsites.len()) as i32;

        for fi in 0..self.buildable_fields.len() {
            let bf = self.buildable_fields[fi].clone();

            // data older than a full update interval plus grace is stale
            if bf.next_update_due < gametime - 8_000 {
                continue;
            }
            if self.blocked_fields.iter().any(|b| b.coords == bf.coords) {
                continue;
            }

            let maxsize = world.player_buildcaps(self.player, bf.coords).size_cap() as i32;

            for j in 0..self.buildings.len() {
                if !self.buildings[j].buildable(world, self.player) {
                    continue;
                }
                if self.buildings[j].prohibited_till > gametime {
                    continue;
                }
                let descr = world.tribe.building(BuildingTypeId(j as u16));
                let bldsize = descr.size.cap_value() as i32;
                if bldsize > maxsize {
                    continue;
                }
                // deterministic jitter: every third second existing types rest
                if (gametime / 1000) % 3 == 0 && self.buildings[j].total_count() > 0 {
                    continue;
                }
                if self.buildings[j].kind == SiteKind::Mine {
                    continue;
                }
                // lumberjacks are exempt so a failed first attempt retries fast
                if gametime - self.buildings[j].construction_decision_time
                    < self.profile.building_min_interval
                    && !self.buildings[j].need_trees
                {
                    continue;
                }
                if self.buildings[j].unoccupied {
                    continue;
                }
                if self.buildings[j].kind != SiteKind::MilitarySite
                    && self.buildings[j].cnt_under_construction >= 2
                {
                    continue;
                }

                let (output_is_needed, _, max_needed_preciousness) =
                    self.check_ware_necessity(world, j);

                let mut prio: i32 = 0;

                match self.buildings[j].kind {
                    SiteKind::ProductionSite => {
                        // border spots are for resource collectors only
                        if bf.near_border
                            && !self.buildings[j].need_trees
                            && !self.buildings[j].need_stones
                            && !self.buildings[j].is_fisher
                        {
                            continue;
                        }

                        if self.buildings[j].mines_water {
                            // wells
                            if (bf.ground_water as i32) < 2 {
                                continue;
                            }
                            if self.buildings[j].cnt_under_construction > 0
                                || self.buildings[j].unoccupied
                            {
                                continue;
                            }
                            if self.buildings[j].total_count() == 0 {
                                prio = 200;
                            } else if self.new_buildings_stop {
                                continue;
                            }
                            self.buildings[j].cnt_target =
                                1 + self.productionsites.len() as i32 / 50;
                            self.refresh_stocklevel(world, j, gametime, 30_000);
                            if self.buildings[j].stocklevel > 40 {
                                continue;
                            }
                            prio += bf.ground_water as i32 - 2;
                            prio = self.recalc_with_border_range(&bf, prio);
                        } else if self.buildings[j].need_trees {
                            // lumberjacks
                            self.buildings[j].cnt_target = 3 + sites / 15;
                            let out0 = self.buildings[j].outputs[0].0 as usize;

                            if self.buildings[j].total_count() == 0 {
                                prio = 500 + bf.trees_nearby as i32;
                            } else if self.buildings[j].total_count() == 1 {
                                prio = 400 + bf.trees_nearby as i32;
                            } else if bf.trees_nearby < 2 {
                                continue;
                            } else {
                                prio = if self.buildings[j].total_count()
                                    < self.buildings[j].cnt_target
                                {
                                    75
                                } else {
                                    0
                                };
                                if bf.producers_nearby[out0] > 1 {
                                    continue;
                                }
                                prio += 2 * bf.trees_nearby as i32
                                    - 10
                                    - bf.producers_nearby[out0] as i32 * 5
                                    - self.new_buildings_stop as i32 * 15;
                                if bf.near_border {
                                    prio /= 2;
                                }
                            }
                        } else if self.buildings[j].need_stones {
                            // quarries go wherever stones are; stones block
                            // expansion regardless of demand
                            if self.buildings[j].cnt_under_construction > 0 {
                                continue;
                            }
                            prio = bf.stones_nearby as i32;
                            if prio <= 0 {
                                continue;
                            }
                            if self.buildings[j].total_count() == 0 {
                                prio += 150;
                            }
                            self.refresh_stocklevel(world, j, gametime, 5_000);
                            if self.buildings[j].stocklevel == 0 {
                                prio *= 2;
                            }
                            let out0 = self.buildings[j].outputs[0].0 as usize;
                            prio -= 50 * bf.producers_nearby[out0] as i32;
                            if bf.near_border {
                                prio /= 2;
                            }
                        } else if self.buildings[j].is_hunter {
                            if bf.critters_nearby < 5 {
                                continue;
                            }
                            if self.new_buildings_stop {
                                continue;
                            }
                            let out0 = self.buildings[j].outputs[0].0 as usize;
                            prio += bf.critters_nearby * 2 - 8 - 5 * bf.producers_nearby[out0] as i32;
                        } else if self.buildings[j].is_fisher {
                            if max_needed_preciousness == 0 {
                                continue;
                            }
                            if self.buildings[j].cnt_under_construction > 0
                                || self.buildings[j].unoccupied
                            {
                                continue;
                            }
                            if bf.water_nearby < 2 {
                                continue;
                            }
                            // preciousness lets water-bound tribes keep
                            // building fishers through a stop
                            if max_needed_preciousness < 4 && self.new_buildings_stop {
                                continue;
                            }
                            self.refresh_stocklevel(world, j, gametime, 5_000);
                            if self.buildings[j].stocklevel > 50 {
                                continue;
                            }
                            let out0 = self.buildings[j].outputs[0].0 as usize;
                            if bf.producers_nearby[out0] >= 1 {
                                continue;
                            }
                            prio = bf.fish_nearby
                                - self.new_buildings_stop as i32
                                    * 15
                                    * self.buildings[j].total_count();
                        } else if let Some(hint) = self.buildings[j].production_hint {
                            let hint_idx = hint.0 as usize;
                            self.buildings[j].cnt_target = if self.buildings[j].plants_trees {
                                2 + sites / 15
                            } else {
                                1 + sites / 20
                            };
                            if self.buildings[j].cnt_under_construction
                                + self.buildings[j].unoccupied as i32
                                > 1
                            {
                                continue;
                            }

                            if self.buildings[j].plants_trees {
                                // rangers: plant where trees are sparse
                                if bf.trees_nearby > 25 && self.buildings[j].total_count() >= 1 {
                                    continue;
                                }
                                // an all-forested territory must not absorb
                                // even more rangers
                                if self.buildable_fields.len() < 4 {
                                    continue;
                                }
                                self.refresh_stocklevel_by_hint(world, j, gametime, 5_000);
                                if self.buildings[j].total_count() == 0 {
                                    prio = 200;
                                }
                                if self.buildings[j].total_count()
                                    > 2 * self.buildings[j].cnt_target
                                {
                                    continue;
                                } else if self.buildings[j].total_count()
                                    >= self.buildings[j].cnt_target
                                    && self.buildings[j].stocklevel > 40
                                {
                                    continue;
                                }
                                prio += (30 - bf.trees_nearby as i32) * 2
                                    + bf.producers_nearby[hint_idx] as i32 * 5
                                    - self.new_buildings_stop as i32 * 15;
                                prio -= bf.space_consumers_nearby as i32 * 5;
                            } else {
                                // fish breeders and game keepers
                                if self.new_buildings_stop && self.buildings[j].total_count() > 0 {
                                    continue;
                                }
                                if self.buildings[j].need_water && bf.water_nearby < 2 {
                                    continue;
                                }
                                if self.buildings[j].need_water {
                                    prio += bf.water_nearby / 5;
                                }
                                if self.buildings[j].total_count() > self.buildings[j].cnt_target {
                                    continue;
                                }
                                self.refresh_stocklevel_by_hint(world, j, gametime, 5_000);
                                if self.buildings[j].stocklevel > 50 {
                                    continue;
                                }
                                if self.buildings[j].total_count() == 0 && gametime > 45_000 {
                                    prio += 100 + bf.producers_nearby[hint_idx] as i32 * 10;
                                } else if bf.producers_nearby[hint_idx] == 0 {
                                    continue;
                                } else {
                                    prio += bf.producers_nearby[hint_idx] as i32 * 10;
                                }
                                if bf.enemy_nearby {
                                    prio -= 10;
                                }
                            }
                        } else if self.buildings[j].recruitment {
                            if self.new_buildings_stop {
                                continue;
                            }
                            if sites / 30 > self.buildings[j].total_count()
                                && self.buildings[j].cnt_under_construction == 0
                            {
                                prio = 4 + DEFAULT_PRIO_BOOST;
                            }
                        } else {
                            // ordinary production sites
                            if self.buildings[j].cnt_under_construction > 0
                                || self.buildings[j].unoccupied
                            {
                                continue;
                            }
                            let forced = matches!(
                                self.buildings[j].forced_after,
                                Some(t) if t < gametime
                            );
                            if forced && self.buildings[j].total_count() == 0 {
                                prio += 150;
                            } else if self.buildings[j].cnt_built == 1
                                && gametime > 40 * 60 * 1000
                                && descr.enhancement.is_some()
                                && !self.mines.is_empty()
                            {
                                prio += 10;
                            } else if !output_is_needed {
                                continue;
                            } else if self.buildings[j].cnt_built == 0
                                && gametime > 40 * 60 * 1000
                            {
                                prio += DEFAULT_PRIO_BOOST;
                            } else if self.buildings[j].cnt_built > 1
                                && self.buildings[j].current_stats > 97
                            {
                                prio -= DEFAULT_PRIO_BOOST * self.new_buildings_stop as i32;
                            } else if self.new_buildings_stop {
                                continue;
                            }

                            if self.buildings[j].inputs.is_empty() {
                                prio += max_needed_preciousness + DEFAULT_PRIO_BOOST;
                                if self.buildings[j].space_consumer {
                                    prio += 20 - bf.trees_nearby as i32 / 3;
                                    // cluster space consumers together, away
                                    // from water and mine spots
                                    prio += bf.space_consumers_nearby as i32 * 2;
                                    if bf.water_nearby == 0 {
                                        prio += 1;
                                    }
                                    if bf.unowned_mines_potential_nearby == 0 {
                                        prio += 1;
                                    }
                                } else if let Some(out0) = self.buildings[j].outputs.first() {
                                    // keep some space between same producers
                                    prio -= bf.producers_nearby[out0.0 as usize] as i32 * 20;
                                }
                                prio -= bf.space_consumers_nearby as i32 * 3;
                            } else {
                                if self.buildings[j].total_count() == 0 {
                                    prio += max_needed_preciousness + DEFAULT_PRIO_BOOST;
                                }
                                if self.buildings[j].cnt_built > 0
                                    && self.buildings[j].current_stats > 70
                                {
                                    prio += max_needed_preciousness + DEFAULT_PRIO_BOOST - 3
                                        + (self.buildings[j].current_stats as i32 - 70) / 5;
                                }
                            }

                            if prio <= 0 {
                                continue;
                            }

                            let consumers_nearby_count: u32 = self.buildings[j]
                                .outputs
                                .iter()
                                .map(|w| bf.consumers_nearby[w.0 as usize])
                                .sum();
                            if consumers_nearby_count > 0 {
                                prio += 1;
                            }
                        }
                    }
                    SiteKind::MilitarySite => {
                        if bf.unowned_land_nearby == 0 {
                            continue;
                        }
                        if self.military_last_build > gametime - 10_000 {
                            continue;
                        }
                        if expansion_mode == ExpansionMode::NoNewMilitary {
                            continue;
                        }
                        if expansion_mode == ExpansionMode::DefenseOnly && !bf.enemy_nearby {
                            continue;
                        }

                        if bf.enemy_nearby && self.buildings[j].fighting_type {
                            // fine, fighters belong at the front
                        } else if bf.unowned_mines_potential_nearby > 2
                            && (self.buildings[j].mountain_conqueror
                                || self.buildings[j].expansion_type)
                        {
                            // fine, mine spots to grab
                        } else if self.buildings[j].expansion_type
                            && self.num_milit_constructionsites <= 1
                        {
                            // fine, any size while expansion has stalled
                        } else if self.buildings[j].expansion_type {
                            // bigger buildings expand rarely
                            if bldsize == 2 && gametime % 15 >= 1 {
                                continue;
                            }
                            if bldsize == 3 && gametime % 40 >= 1 {
                                continue;
                            }
                        } else {
                            continue;
                        }

                        if !bf.enemy_nearby && bf.military_in_constr_nearby > 0 {
                            continue;
                        }

                        let local_boost =
                            if expansion_mode == ExpansionMode::PushExpansion { 200 } else { 0 };

                        prio = bf.unowned_land_nearby as i32 * 2
                            * self.resource_necessity_territory as i32
                            / 255
                            + bf.unowned_mines_potential_nearby as i32
                                * self.resource_necessity_mines as i32
                                / 255
                            + bf.stones_nearby as i32 / 2
                            + bf.military_loneliness as i32 / 10
                            - 60
                            + local_boost
                            + bf.water_nearby.max(0) * self.resource_necessity_water as i32 / 255;

                        if self.resource_necessity_water_needed {
                            prio += bf.distant_water as i32
                                * self.resource_necessity_water as i32
                                / 255;
                        }

                        if bldsize < maxsize {
                            prio -= 5;
                        }

                        // understaffed frontier needs reinforcement badly
                        if bf.enemy_nearby && bf.military_capacity < 12 {
                            prio += 50 + (12 - bf.military_capacity) * 20;
                        }
                    }
                    SiteKind::Warehouse => {
                        if bf.near_border {
                            continue;
                        }
                        // roughly one warehouse per 35 production buildings
                        if (sites + 20) / 35 > self.numof_warehouses as i32
                            && self.buildings[j].cnt_under_construction == 0
                        {
                            prio = 20;
                        }
                        if bf.enemy_nearby {
                            prio /= 2;
                        }
                        if bf.unowned_land_nearby > 0 {
                            prio /= 2;
                        }
                    }
                    SiteKind::TrainingSite => {
                        if bf.near_border {
                            continue;
                        }
                        // first after 20 production sites, then every 50
                        if (self.productionsites.len() as i32 + 30) / 50
                            > self.buildings[j].total_count()
                            && self.buildings[j].cnt_under_construction == 0
                        {
                            prio = 4 + DEFAULT_PRIO_BOOST;
                        }
                        if bf.enemy_nearby {
                            prio /= 2;
                        }
                        if bf.unowned_land_nearby > 0 {
                            prio /= 2;
                        }
                    }
                    _ => continue,
                }

                // space consuming neighbors hurt everything
                prio -= bf.space_consumers_nearby as i32 * 10;

                if prio <= 0 {
                    continue;
                }

                if bf.preferred {
                    prio += 1;
                }
                // don't waste big spots on small huts
                prio -= (maxsize - bldsize) * 5;

                if prio > proposed_priority {
                    best = Some((j, bf.coords));
                    proposed_priority = prio;
                }
            }
        }

        // mines run on their own cadence, once the base economy stands
        if gametime > self.next_mine_construction_due {
            self.update_all_mineable_fields(world, gametime);
            self.next_mine_construction_due = gametime + self.profile.idle_mine_update_interval;

            if !self.mineable_fields.is_empty() && self.productionsites.len() > 8 {
                for j in 0..self.buildings.len() {
                    if !self.buildings[j].buildable(world, self.player)
                        || self.buildings[j].kind != SiteKind::Mine
                    {
                        continue;
                    }
                    if self.buildings[j].prohibited_till > gametime {
                        continue;
                    }
                    if gametime - self.buildings[j].construction_decision_time
                        < self.profile.building_min_interval
                    {
                        continue;
                    }
                    if self.buildings[j].cnt_under_construction > 0 || self.buildings[j].unoccupied
                    {
                        continue;
                    }
                    let (output_is_needed, _, _) = self.check_ware_necessity(world, j);
                    if !output_is_needed && self.buildings[j].total_count() > 0 {
                        continue;
                    }
                    if self.buildings[j].total_count() >= 1 && self.buildings[j].current_stats < 50
                    {
                        continue;
                    }

                    // crowding hurts only after the first mine of a kind
                    let nearness_penalty = if self.buildings[j].total_count() == 0 { 0 } else { 10 };

                    for mi in 0..self.mineable_fields.len() {
                        let mf = &self.mineable_fields[mi];
                        let Some(tile) = world.map.tile(mf.coords) else {
                            continue;
                        };
                        let matches_resource = match (tile.resource, self.buildings[j].mines) {
                            (Some((res, _)), Some(wanted)) => res == wanted,
                            _ => false,
                        };
                        if !matches_resource {
                            continue;
                        }

                        let mut prio =
                            tile.resource_amount() as i32 - mf.mines_nearby as i32 * nearness_penalty;
                        if prio < 2 {
                            continue;
                        }
                        if self.blocked_fields.iter().any(|b| b.coords == mf.coords) {
                            continue;
                        }
                        if mf.preferred {
                            prio += 1;
                        }

                        if prio > proposed_priority {
                            best = Some((j, mf.coords));
                            proposed_priority = prio;
                            mine = true;
                        }
                    }
                }
            }
        }

        let Some((j, coords)) = best else {
            return false;
        };

        out.push(Command::Build {
            player: self.player,
            pos: coords,
            building: BuildingTypeId(j as u16),
        });
        self.blocked_fields.push(BlockedField {
            coords,
            blocked_until: gametime + 120_000,
        });

        // space consumers keep their surroundings free for a long time,
        // military sites only briefly so field data can refresh
        let is_military = self.buildings[j].kind == SiteKind::MilitarySite;
        if (self.buildings[j].space_consumer && !self.buildings[j].plants_trees) || is_military {
            let (block_time, block_area) = if self.buildings[j].space_consumer {
                (45 * 60 * 1000, 3)
            } else {
                (25_000, 6)
            };
            for c in coords.region(block_area) {
                self.blocked_fields.push(BlockedField {
                    coords: c,
                    blocked_until: gametime + block_time,
                });
            }
        }

        if !is_military {
            self.buildings[j].construction_decision_time = gametime;
        } else {
            // backdated so the next military site may start sooner
            self.military_last_build = gametime;
            self.buildings[j].construction_decision_time =
                gametime - self.profile.building_min_interval / 2;
        }

        if mine {
            self.next_mine_construction_due = gametime + self.profile.busy_mine_update_interval;
        } else {
            self.buildable_changed = true;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regime_inputs() -> RegimeInputs {
        RegimeInputs {
            spots_avail: [0, 20, 20, 20],
            productionsites: 30,
            mines: 5,
            mineable_fields: 0,
            militarysites: 15,
            num_prod_constructionsites: 6,
            num_milit_constructionsites: 0,
            unstationed_milit_buildings: 0,
            enemy_last_seen: -120_000,
            gametime: 600_000,
        }
    }

    #[test]
    fn test_overbuild_boundary() {
        // 6 construction sites against 30/7+2 = 6: not over the line
        let mut input = regime_inputs();
        assert!(!StrategicRegime::compute(&input).new_buildings_stop);

        // 7 is
        input.num_prod_constructionsites = 7;
        assert!(StrategicRegime::compute(&input).new_buildings_stop);
    }

    #[test]
    fn test_mine_count_boundary_is_three() {
        let mut input = regime_inputs();
        input.mines = 2;
        assert!(StrategicRegime::compute(&input).new_buildings_stop);
        input.mines = 3;
        assert!(!StrategicRegime::compute(&input).new_buildings_stop);
    }

    #[test]
    fn test_enemy_lifts_stop() {
        let mut input = regime_inputs();
        input.num_prod_constructionsites = 10;
        assert!(StrategicRegime::compute(&input).new_buildings_stop);
        // enemy seen 90 s ago, inside the two-minute window
        input.enemy_last_seen = input.gametime - 90_000;
        assert!(!StrategicRegime::compute(&input).new_buildings_stop);
    }

    #[test]
    fn test_expansion_mode_ladder() {
        let mut input = regime_inputs();
        // threshold = 15/40 + 2 = 2
        input.unstationed_milit_buildings = 0;
        assert_eq!(
            StrategicRegime::compute(&input).expansion_mode,
            ExpansionMode::PushExpansion
        );
        input.unstationed_milit_buildings = 1;
        assert_eq!(
            StrategicRegime::compute(&input).expansion_mode,
            ExpansionMode::ResourcesOrDefense
        );
        input.unstationed_milit_buildings = 5;
        assert_eq!(
            StrategicRegime::compute(&input).expansion_mode,
            ExpansionMode::DefenseOnly
        );
        input.unstationed_milit_buildings = 7;
        assert_eq!(
            StrategicRegime::compute(&input).expansion_mode,
            ExpansionMode::NoNewMilitary
        );
    }

    #[test]
    fn test_mines_necessity_scale() {
        let mut input = regime_inputs();
        input.mines = 5;
        input.mineable_fields = 0;
        assert_eq!(StrategicRegime::compute(&input).mines_necessity, 255);
        input.mines = 15;
        assert_eq!(StrategicRegime::compute(&input).mines_necessity, 0);
        input.mines = 10;
        let mid = StrategicRegime::compute(&input).mines_necessity;
        assert!(mid > 0 && mid < 255);
        // ten mineable fields count as one virtual mine
        input.mines = 4;
        input.mineable_fields = 10;
        assert_eq!(StrategicRegime::compute(&input).mines_necessity, 255);
        input.mineable_fields = 20;
        assert!(StrategicRegime::compute(&input).mines_necessity < 255);
    }
}
