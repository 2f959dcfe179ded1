//! Attack planner
//!
//! Compares overall military strength against each opponent, probes a
//! deterministic sample of own military sites, and dispatches at most one
//! attack per consideration.

use crate::core::types::GameTime;
use crate::game::commands::Command;
use crate::game::descriptor::DescrKind;
use crate::game::immovable::Immovable;
use crate::game::world::World;

use super::AiPlayer;

impl AiPlayer {
    /// Returns true when an attack was ordered
    pub(crate) fn consider_attack(
        &mut self,
        world: &World,
        gametime: GameTime,
        out: &mut Vec<Command>,
    ) -> bool {
        if self.militarysites.is_empty() {
            return false;
        }

        let threshold_ratio = self.profile.personality.attack_threshold();
        let own_strength = world.stats.latest_military_strength(self.player);

        // who is weak enough to be attacked at all?
        let mut player_attackable = vec![false; world.players.len()];
        let mut any_attackable = false;
        for p in &world.players {
            if p.id == self.player {
                continue;
            }
            match (own_strength, world.stats.latest_military_strength(p.id)) {
                // an opponent without any military is free game
                (_, Some(0)) => {
                    player_attackable[p.id.index()] = true;
                    any_attackable = true;
                }
                (Some(own), Some(enemy)) => {
                    if own * 100 / enemy > threshold_ratio {
                        player_attackable[p.id.index()] = true;
                        any_attackable = true;
                    }
                }
                // missing samples mean: not attackable
                _ => {}
            }
        }

        if !any_attackable {
            self.next_attack_consideration_due = 120_000 + (gametime % 30 + 2) * 1000 + gametime;
            return false;
        }

        // probe a deterministic sample of own military sites
        let attempts = self.militarysites.len() / 6 + 1;
        let mut any_attacked = false;

        for i in 0..attempts {
            if any_attacked {
                break;
            }
            let position =
                ((gametime + 3 * i as GameTime) % self.militarysites.len() as GameTime) as usize;
            let mso = self.militarysites[position];
            let Some(ms) = world.building(mso.site) else {
                continue;
            };
            let vision = world.tribe.building(ms.type_id).vision_range;

            // sites that saw no enemies last time are mostly skipped
            if !mso.enemies_nearby && gametime % 8 > 0 {
                continue;
            }
            self.militarysites[position].enemies_nearby = false;

            let mut target = None;
            let mut chance: i32 = 0;
            let mut attackers: u32 = 0;
            let mut defenders: u32 = 0;
            let mut defend_ready_enemies: u32 = 0;

            for (id, _) in world.find_immovables(ms.pos, vision) {
                let Some(Immovable::Building(bld)) = world.immovables.get(id) else {
                    continue;
                };
                if bld.is_constructionsite() {
                    continue;
                }
                let kind = world.tribe.building(bld.type_id).kind;

                match kind {
                    DescrKind::MilitarySite => {
                        if !world.is_hostile(self.player, bld.player) {
                            continue;
                        }
                        self.militarysites[position].enemies_nearby = true;
                        if !player_attackable[bld.player.index()] {
                            continue;
                        }
                        let Some(flag) = world.base_flag(id) else {
                            continue;
                        };
                        let ta = world.find_attack_soldiers(self.player, flag) as i32;
                        if ta < 1 {
                            continue;
                        }
                        let present = bld.military.as_ref().map(|m| m.stationed).unwrap_or(0);
                        let tc = ta - present as i32;
                        if present > 1 {
                            defend_ready_enemies += present - 1;
                        }
                        if tc > chance {
                            target = Some(flag);
                            chance = tc;
                            attackers = ta as u32;
                            defenders = present;
                        }
                    }
                    DescrKind::Warehouse => {
                        if !world.is_hostile(self.player, bld.player) {
                            continue;
                        }
                        let Some(flag) = world.base_flag(id) else {
                            continue;
                        };
                        let ta = world.find_attack_soldiers(self.player, flag) as i32;
                        if ta < 1 {
                            continue;
                        }
                        // warehouses are assumed empty after long fights,
                        // so they get an extra push
                        let tc = ta * 2;
                        if tc > chance {
                            target = Some(flag);
                            chance = tc;
                            attackers = ta as u32;
                            defenders = 0;
                        }
                    }
                    _ => continue,
                }

                // soldiers in surrounding buildings will come to defend
                let penalty: i32 = if defend_ready_enemies > 0 {
                    (defenders as i32 * 100) / 5 * (defend_ready_enemies as i32 * 100) / 10 * 10
                        / 100
                } else {
                    0
                };

                if chance - penalty / 100 < 2 {
                    continue;
                }

                if let Some(flag) = target {
                    out.push(Command::EnemyFlagAction {
                        flag,
                        attacker: self.player,
                        attackers,
                    });
                    any_attacked = true;
                    break;
                }
            }
        }

        // returning soldiers must heal before the next raid
        if any_attacked {
            self.next_attack_consideration_due = (gametime % 40 + 10) * 1000 + gametime;
        } else {
            self.next_attack_consideration_due = (gametime % 80 + 10) * 1000 + gametime;
        }

        any_attacked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiProfile, Personality};
    use crate::core::types::PlayerId;
    use crate::map::coords::Coords;

    fn battle_world() -> World {
        let mut world = World::flat(32, 32, 2);
        world.players[0].hostile = vec![PlayerId(2)];
        world.players[1].hostile = vec![PlayerId(1)];
        world
    }

    fn ai_with_site(world: &mut World, stationed: u32) -> AiPlayer {
        let fortress = world.tribe.building_index("fortress").unwrap();
        let own = world.place_building(PlayerId(1), Coords::new(10, 10), fortress, true);
        world.set_stationed(own, stationed);
        world.take_notes();
        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::default());
        let mut out = Vec::new();
        ai.think(world, 0, &mut out);
        ai
    }

    #[test]
    fn test_equal_ratio_is_not_attackable() {
        let mut world = battle_world();
        let mut ai = ai_with_site(&mut world, 5);
        world.stats.record(PlayerId(1), 100, 0);
        world.stats.record(PlayerId(2), 100, 0);

        let mut out = Vec::new();
        // ratio is exactly 100, the normal threshold requires strictly more
        assert!(!ai.consider_attack(&world, 400_000, &mut out));
        assert!(out.is_empty());
        // rescheduled roughly two minutes ahead
        assert!(ai.next_attack_consideration_due > 400_000 + 120_000);
    }

    #[test]
    fn test_aggressive_attacks_earlier() {
        let mut world = battle_world();
        world.stats.record(PlayerId(1), 90, 0);
        world.stats.record(PlayerId(2), 100, 0);

        // 90 vs 100 is below the normal threshold
        let mut ai = ai_with_site(&mut world, 5);
        let enemy_site = {
            let barrier = world.tribe.building_index("barrier").unwrap();
            world.place_building(PlayerId(2), Coords::new(22, 10), barrier, true)
        };
        world.set_stationed(enemy_site, 1);
        world.take_notes();

        let mut out = Vec::new();
        assert!(!ai.consider_attack(&world, 400_000, &mut out));

        // an aggressive opponent needs only 80
        let mut ai = AiPlayer::new(PlayerId(1), AiProfile::aggressive());
        assert_eq!(ai.profile.personality, Personality::Aggressive);
        let mut out = Vec::new();
        ai.think(&world, 0, &mut out);
        for note in world.take_notes() {
            ai.handle_note(&world, &note, 0);
        }
        let mut out = Vec::new();
        assert!(ai.consider_attack(&world, 400_000, &mut out));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_zero_strength_opponent_is_attackable() {
        let mut world = battle_world();
        world.stats.record(PlayerId(1), 10, 0);
        world.stats.record(PlayerId(2), 0, 0);
        let mut ai = ai_with_site(&mut world, 5);
        let enemy_site = {
            let barrier = world.tribe.building_index("barrier").unwrap();
            world.place_building(PlayerId(2), Coords::new(16, 10), barrier, true)
        };
        world.set_stationed(enemy_site, 1);
        world.take_notes();

        let mut out = Vec::new();
        assert!(ai.consider_attack(&world, 400_000, &mut out));
    }

    #[test]
    fn test_missing_sample_not_attackable() {
        let mut world = battle_world();
        world.stats.record(PlayerId(1), 100, 0);
        // no sample at all for player 2
        let mut ai = ai_with_site(&mut world, 5);
        let mut out = Vec::new();
        assert!(!ai.consider_attack(&world, 400_000, &mut out));
    }
}
