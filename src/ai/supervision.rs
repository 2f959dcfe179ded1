//! Site supervisor
//!
//! Rotating review of production sites, mines and military sites:
//! dismantle underperformers, upgrade where the enhanced type proved
//! itself, and keep garrisons matched to the threat picture.

use crate::core::types::GameTime;
use crate::game::commands::Command;
use crate::game::immovable::{Immovable, SoldierPreference};
use crate::game::world::World;

use super::fields::BuildableField;
use super::AiPlayer;

impl AiPlayer {
    /// Review the production site at the head of the queue.
    /// Returns true when a command was emitted.
    pub(crate) fn check_productionsites(
        &mut self,
        world: &World,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        if self.next_productionsite_check_due > gametime || self.productionsites.is_empty() {
            return false;
        }
        self.next_productionsite_check_due =
            gametime + self.profile.productionsite_check_interval;

        // reorder first, the branches below return all over the place
        self.productionsites.rotate_left(1);

        let so = *self.productionsites.front().unwrap();
        let Some(b) = world.building(so.site) else {
            return false;
        };
        let Some(prod) = b.prod.clone() else {
            return false;
        };

        if !prod.can_start_working {
            self.productionsites.front_mut().unwrap().unoccupied_till = gametime;
        }
        let so = *self.productionsites.front().unwrap();

        // give statistics time to settle between dismantles of one type
        if self.buildings[so.bo].last_dismantle_time > gametime - 30_000 {
            return false;
        }

        let descr = world.tribe.building(b.type_id);
        let radius = descr.workarea_radius;

        // upgrade when the enhanced type either does not exist yet or
        // demonstrably outperforms this one
        if let Some(enhancement) = descr.enhancement {
            if self.buildings[so.bo].cnt_built - self.buildings[so.bo].unoccupied as i32 > 1
                && world.building_type_allowed(self.player, enhancement)
            {
                let en = enhancement.0 as usize;
                if gametime - self.buildings[en].construction_decision_time
                    >= self.profile.building_min_interval
                    && self.buildings[en].cnt_under_construction == 0
                    && !self.buildings[en].unoccupied
                    && world.has_workers(self.player, enhancement)
                {
                    let force_first = self.buildings[en].cnt_built == 0 && !self.mines.is_empty();
                    let outperforms = self.buildings[en].current_stats as i32
                        - self.buildings[so.bo].current_stats as i32
                        > 20;
                    if force_first || outperforms {
                        out.push(Command::EnhanceBuilding {
                            site: so.site,
                            building: enhancement,
                        });
                        self.buildings[en].construction_decision_time = gametime;
                        return true;
                    }
                }
            }
        }

        // lumberjacks
        if self.buildings[so.bo].need_trees {
            if self.buildings[so.bo].cnt_built <= self.buildings[so.bo].cnt_target {
                return false;
            }
            if prod.statistics_percent > 20 {
                return false;
            }
            let remaining_trees = world
                .find_immovables(b.pos, radius)
                .iter()
                .filter(|(id, _)| matches!(world.immovables.get(*id), Some(Immovable::Tree)))
                .count();
            if remaining_trees > 5 {
                return false;
            }
            if self.buildings[so.bo].stocklevel_time < gametime - 10_000 {
                let level = self.get_stocklevel(world, so.bo);
                self.buildings[so.bo].stocklevel = level;
                self.buildings[so.bo].stocklevel_time = gametime;
            }
            if remaining_trees > 0 && self.buildings[so.bo].stocklevel <= 50 {
                return false;
            }
            self.buildings[so.bo].last_dismantle_time = gametime;
            out.push(Command::Dismantle { site: so.site });
            return true;
        }

        // wells
        if self.buildings[so.bo].mines_water {
            if so.unoccupied_till + 6 * 60 * 1000 < gametime && prod.statistics_percent == 0 {
                self.buildings[so.bo].last_dismantle_time = gametime;
                out.push(Command::Dismantle { site: so.site });
                return true;
            }
            if self.buildings[so.bo].last_dismantle_time + 90_000 > gametime {
                return false;
            }
            if self.buildings[so.bo].stocklevel_time < gametime - 5_000 {
                let level = self.get_stocklevel(world, so.bo);
                self.buildings[so.bo].stocklevel = level;
                self.buildings[so.bo].stocklevel_time = gametime;
            }
            if self.buildings[so.bo].stocklevel > 250 {
                self.buildings[so.bo].last_dismantle_time = gametime;
                out.push(Command::Dismantle { site: so.site });
                return true;
            }
            return false;
        }

        // quarries: gone granite means gone quarry, immediately
        if self.buildings[so.bo].need_stones {
            let remaining_stones = world
                .find_immovables(b.pos, radius)
                .iter()
                .filter(|(id, _)| {
                    matches!(world.immovables.get(*id), Some(Immovable::Stone { .. }))
                })
                .count();
            if remaining_stones == 0 {
                out.push(Command::Dismantle { site: so.site });
                return true;
            }
            if so.unoccupied_till + 6 * 60 * 1000 < gametime && prod.statistics_percent == 0 {
                self.buildings[so.bo].last_dismantle_time = gametime;
                out.push(Command::Dismantle { site: so.site });
                return true;
            }
            return false;
        }

        // space consumers without inputs, above target
        if self.buildings[so.bo].inputs.is_empty()
            && self.buildings[so.bo].production_hint.is_none()
            && so.unoccupied_till + 10 * 60 * 1000 < gametime
            && prod.can_start_working
            && self.buildings[so.bo].space_consumer
            && !self.buildings[so.bo].plants_trees
        {
            if self.buildings[so.bo].cnt_built > self.buildings[so.bo].cnt_target {
                if self.buildings[so.bo].stocklevel_time < gametime - 5_000 {
                    let level = self.get_stocklevel(world, so.bo);
                    self.buildings[so.bo].stocklevel = level;
                    self.buildings[so.bo].stocklevel_time = gametime;
                }
                if prod.statistics_percent < 30 && self.buildings[so.bo].stocklevel > 100 {
                    self.buildings[so.bo].last_dismantle_time = gametime;
                    out.push(Command::Dismantle { site: so.site });
                    return true;
                }
            }
            if prod.statistics_percent <= 10 && self.buildings[so.bo].cnt_built > 1 {
                out.push(Command::Dismantle { site: so.site });
                return true;
            }
            return false;
        }

        // sites with inputs, sustained low performance across the type
        if !self.buildings[so.bo].inputs.is_empty()
            && self.buildings[so.bo].cnt_built - self.buildings[so.bo].unoccupied as i32 >= 3
            && prod.can_start_working
            && prod.statistics_percent < 20
            && self.buildings[so.bo].current_stats < 30
            && gametime - so.unoccupied_till > 10 * 60 * 1000
        {
            self.buildings[so.bo].last_dismantle_time = gametime;
            out.push(Command::Dismantle { site: so.site });
            return true;
        }

        // remaining no-input sites (fishers, hunters)
        if self.buildings[so.bo].inputs.is_empty()
            && self.buildings[so.bo].production_hint.is_none()
            && prod.can_start_working
            && !self.buildings[so.bo].space_consumer
            && prod.statistics_percent < 10
            && gametime - so.built_time > 10 * 60 * 1000
        {
            self.buildings[so.bo].last_dismantle_time = gametime;
            out.push(Command::Dismantle { site: so.site });
            return true;
        }

        // supporting sites run in stocklevel bands
        if let Some(hint) = self.buildings[so.bo].production_hint {
            if self.buildings[so.bo].stocklevel_time < gametime - 5_000 {
                let level = self.get_stocklevel_by_ware(world, hint);
                self.buildings[so.bo].stocklevel = level;
                self.buildings[so.bo].stocklevel_time = gametime;
            }
            let score = self.buildings[so.bo].stocklevel;

            if score > 200 && self.buildings[so.bo].cnt_built > self.buildings[so.bo].cnt_target {
                self.buildings[so.bo].last_dismantle_time = gametime;
                out.push(Command::Dismantle { site: so.site });
                return true;
            }
            if score > 120 && !prod.stopped {
                out.push(Command::StartStopBuilding { site: so.site });
            }
            if score < 80 && prod.stopped {
                out.push(Command::StartStopBuilding { site: so.site });
            }
        }

        false
    }

    /// Review the mine at the head of the queue
    pub(crate) fn check_mines(
        &mut self,
        world: &World,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        if self.next_mine_check_due > gametime || self.mines.is_empty() {
            return false;
        }
        self.next_mine_check_due = gametime + self.profile.mine_check_interval;

        self.mines.rotate_left(1);
        let so = *self.mines.front().unwrap();
        let Some(b) = world.building(so.site) else {
            return false;
        };
        let Some(prod) = b.prod.clone() else {
            return false;
        };

        // workers missing for six minutes: release the building, the
        // worker (if any) is useful elsewhere
        if so.built_time + 6 * 60 * 1000 < gametime && !prod.can_start_working {
            out.push(Command::Dismantle { site: so.site });
            return true;
        }

        if so.no_resources_count < 4 {
            return false;
        }

        if so.no_resources_count > 12 {
            out.push(Command::Dismantle { site: so.site });
            self.buildings[so.bo].construction_decision_time = gametime;
            return true;
        }

        if self.buildings[so.bo].stocklevel_time < gametime - 5_000 {
            let level = self.get_stocklevel(world, so.bo);
            self.buildings[so.bo].stocklevel = level;
            self.buildings[so.bo].stocklevel_time = gametime;
        }
        // enough on stock, no point paying for an upgrade
        if self.buildings[so.bo].stocklevel > 150 {
            return false;
        }

        let Some(enhancement) = world.tribe.building(b.type_id).enhancement else {
            // will be dismantled once no_resources_count overflows
            return false;
        };

        let mut changed = false;
        if world.building_type_allowed(self.player, enhancement) {
            let en = enhancement.0 as usize;
            if gametime - self.buildings[en].construction_decision_time
                >= self.profile.building_min_interval
                && !self.buildings[en].unoccupied
                && self.buildings[en].cnt_under_construction == 0
                && world.has_workers(self.player, enhancement)
            {
                out.push(Command::EnhanceBuilding {
                    site: so.site,
                    building: enhancement,
                });
                self.buildings[en].construction_decision_time = gametime;
                changed = true;
            }
        }
        changed
    }

    /// Review the military site at the head of the queue
    pub(crate) fn check_militarysites(
        &mut self,
        world: &World,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        if self.next_militarysite_check_due > gametime {
            return false;
        }
        self.next_militarysite_check_due = gametime + self.profile.militarysite_check_interval;

        // refresh the unstationed count even when no site gets reviewed
        self.unstationed_milit_buildings = self
            .militarysites
            .iter()
            .filter(|mso| {
                world
                    .building(mso.site)
                    .and_then(|b| b.military.as_ref().map(|m| m.stationed == 0))
                    .unwrap_or(false)
            })
            .count() as u32;

        if self.militarysites.is_empty() {
            return false;
        }

        let mut changed = false;
        let mso = *self.militarysites.front().unwrap();
        if let Some(b) = world.building(mso.site).cloned() {
            let descr = world.tribe.building(b.type_id);
            let vision = descr.vision_range;
            let ms = b.military.clone().unwrap_or(crate::game::immovable::MilitaryState {
                capacity: 0,
                stationed: 0,
                preference: SoldierPreference::Rookies,
            });

            let enemy_buildings = world
                .find_immovables(b.pos, vision + 4)
                .iter()
                .filter(|(id, _)| {
                    world
                        .immovables
                        .get(*id)
                        .and_then(|imm| imm.as_building())
                        .map(|other| world.is_hostile(self.player, other.player))
                        .unwrap_or(false)
                })
                .count();

            if enemy_buildings == 0 {
                // secure area: shrink the garrison, but only while ejected
                // soldiers have a warehouse to go to
                let has_warehouse = world
                    .base_flag(mso.site)
                    .and_then(|fid| world.economy(world.flag(fid).economy))
                    .map(|eco| !eco.warehouses.is_empty())
                    .unwrap_or(false);
                if has_warehouse {
                    if ms.preference != SoldierPreference::Rookies {
                        out.push(Command::SetSoldierPreference {
                            site: mso.site,
                            preference: SoldierPreference::Rookies,
                        });
                    } else if ms.capacity > 1 {
                        out.push(Command::ChangeSoldierCapacity {
                            site: mso.site,
                            delta: -1,
                        });
                    } else {
                        // inner-land site: score it like a buildable field
                        // and demolish when enough signals agree
                        let mut bf = BuildableField::new(world, b.pos);
                        self.update_buildable_field(world, &mut bf, vision, true, gametime);
                        let size_penalty = descr.size.cap_value() as i32 - 1;

                        let mut score = 0i32;
                        score += (bf.military_capacity > 5) as i32;
                        score += (bf.military_presence > 3) as i32;
                        score += (bf.military_loneliness < 180) as i32;
                        score += (bf.military_stationed as i32 > 2 + size_penalty) as i32;
                        score -= (ms.capacity as i32 * 2 > bf.military_capacity) as i32;
                        score += (bf.unowned_land_nearby < 10) as i32;

                        if score >= 4 {
                            out.push(Command::Dismantle { site: mso.site });
                            self.military_last_dismantle = gametime;
                        }
                    }
                }
            } else {
                // enemy in sight: full garrison, seasoned soldiers
                let max = descr.max_soldiers;
                if max > ms.capacity {
                    out.push(Command::ChangeSoldierCapacity {
                        site: mso.site,
                        delta: (max - ms.capacity) as i32,
                    });
                    changed = true;
                }
                if ms.preference != SoldierPreference::Heroes {
                    out.push(Command::SetSoldierPreference {
                        site: mso.site,
                        preference: SoldierPreference::Heroes,
                    });
                    changed = true;
                }
            }
        }

        self.militarysites.rotate_left(1);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiProfile;
    use crate::core::types::PlayerId;
    use crate::map::coords::Coords;

    fn setup() -> (World, AiPlayer) {
        let mut world = World::flat(32, 32, 1);
        let hq = world.tribe.building_index("headquarters").unwrap();
        world.place_building(PlayerId(1), Coords::new(16, 16), hq, true);
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
    fn test_quarry_dismantled_without_granite() {
        let (mut world, mut ai) = setup();
        let quarry = world.tribe.building_index("quarry").unwrap();
        let site = world.place_building(PlayerId(1), Coords::new(12, 16), quarry, true);
        world.set_can_start_working(site, true);
        pump(&mut world, &mut ai, 1_000);

        let mut out = Vec::new();
        assert!(ai.check_productionsites(&world, 40_000, &mut out));
        assert_eq!(out, vec![Command::Dismantle { site }]);
    }

    #[test]
    fn test_quarry_kept_while_granite_remains() {
        let (mut world, mut ai) = setup();
        let quarry = world.tribe.building_index("quarry").unwrap();
        let site = world.place_building(PlayerId(1), Coords::new(12, 16), quarry, true);
        world.set_can_start_working(site, true);
        world.set_site_stats(site, 50, 50);
        world.place_stone(Coords::new(13, 16), 4);
        pump(&mut world, &mut ai, 1_000);

        let mut out = Vec::new();
        assert!(!ai.check_productionsites(&world, 40_000, &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn test_well_dismantled_on_full_stock() {
        let (mut world, mut ai) = setup();
        let well = world.tribe.building_index("well").unwrap();
        let site = world.place_building(PlayerId(1), Coords::new(14, 16), well, true);
        world.set_can_start_working(site, true);
        world.set_site_stats(site, 60, 60);
        // flood the warehouse with water and connect the economies
        let hq_flag = world.flag_at(Coords::new(16, 17)).unwrap();
        let well_flag = world.flag_at(Coords::new(14, 17)).unwrap();
        let path: Vec<Coords> = (14..=16).map(|x| Coords::new(x, 17)).collect();
        world.place_road(PlayerId(1), path).unwrap();
        assert_eq!(world.flag(hq_flag).economy, world.flag(well_flag).economy);
        let water = world.tribe.ware_index("water").unwrap();
        let hq_id = world.flag(hq_flag).building.unwrap();
        world.add_ware(hq_id, water, 251);
        pump(&mut world, &mut ai, 1_000);
        ai.check_economies(&world);

        let mut out = Vec::new();
        assert!(ai.check_productionsites(&world, 100_000, &mut out));
        assert_eq!(out, vec![Command::Dismantle { site }]);
    }

    #[test]
    fn test_mine_no_resources_escalation() {
        let (mut world, mut ai) = setup();
        for x in 10..14 {
            world.map.tile_mut(Coords::new(x, 20)).unwrap().terrain =
                crate::map::grid::Terrain::Mountain;
        }
        let mine = world.tribe.building_index("coal_mine").unwrap();
        let site = world.place_building(PlayerId(1), Coords::new(12, 20), mine, true);
        world.set_can_start_working(site, true);
        pump(&mut world, &mut ai, 1_000);

        // below four reports nothing happens
        for _ in 0..3 {
            ai.out_of_resources_site(site);
        }
        let mut out = Vec::new();
        assert!(!ai.check_mines(&world, 50_000, &mut out));

        // beyond twelve the mine goes
        for _ in 0..10 {
            ai.out_of_resources_site(site);
        }
        let mut out = Vec::new();
        assert!(ai.check_mines(&world, 60_000, &mut out));
        assert_eq!(out, vec![Command::Dismantle { site }]);
    }

    #[test]
    fn test_militarysite_relaxes_in_safe_area() {
        let (mut world, mut ai) = setup();
        let sentry = world.tribe.building_index("sentry").unwrap();
        let site = world.place_building(PlayerId(1), Coords::new(15, 15), sentry, true);
        world.set_stationed(site, 2);
        // connect the sentry flag to the warehouse economy
        let path = vec![Coords::new(15, 16), Coords::new(15, 17), Coords::new(16, 17)];
        world.place_road(PlayerId(1), path).unwrap();
        pump(&mut world, &mut ai, 1_000);

        // default preference is heroes, so the first review demands rookies
        let mut out = Vec::new();
        ai.check_militarysites(&world, 10_000, &mut out);
        assert!(out.iter().any(|c| matches!(
            c,
            Command::SetSoldierPreference {
                preference: SoldierPreference::Rookies,
                ..
            }
        )));
    }
}
