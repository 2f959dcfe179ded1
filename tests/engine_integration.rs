//! End-to-end scenarios for the opponent engine
//!
//! Each test builds a small world, lets the engine think over a stretch of
//! game time with commands applied back into the world, and asserts on the
//! observable command stream.

use palisade::ai::{AiPlayer, AiProfile};
use palisade::core::types::PlayerId;
use palisade::game::commands::Command;
use palisade::game::world::{World, WorldConfig};
use palisade::map::coords::Coords;

const TICK_MS: i64 = 1_000;

fn allow_only(world: &mut World, player: PlayerId, names: &[&str]) {
    let allowed: Vec<bool> = world
        .tribe
        .buildings
        .iter()
        .map(|b| names.contains(&b.name.as_str()))
        .collect();
    world.players[player.index()].allowed_buildings = allowed;
}

/// Think from `from` to `until`, applying commands and delivering notes.
/// Returns every command the engine emitted, stamped with its game time.
fn drive(
    world: &mut World,
    ai: &mut AiPlayer,
    from: i64,
    until: i64,
) -> Vec<(i64, Command)> {
    let mut log = Vec::new();
    let mut gametime = from;
    while gametime <= until {
        let mut commands = Vec::new();
        ai.think(world, gametime, &mut commands);
        for cmd in commands {
            world.apply(&cmd);
            log.push((gametime, cmd));
        }
        for note in world.take_notes() {
            ai.handle_note(world, &note, gametime);
        }
        gametime += TICK_MS;
    }
    log
}

fn fresh_ai(world: &mut World) -> AiPlayer {
    world.take_notes();
    AiPlayer::new(PlayerId(1), AiProfile::default())
}

#[test]
fn first_lumberjack_is_forced() {
    let mut world = World::flat(32, 32, 1);
    let hq = world.tribe.building_index("headquarters").unwrap();
    world.place_building(PlayerId(1), Coords::new(16, 16), hq, true);
    for pos in [
        Coords::new(12, 16),
        Coords::new(12, 17),
        Coords::new(13, 15),
        Coords::new(11, 16),
    ] {
        world.place_tree(pos);
    }
    let lumberjack = world.tribe.building_index("lumberjacks_hut").unwrap();
    allow_only(&mut world, PlayerId(1), &["lumberjacks_hut"]);
    let mut ai = fresh_ai(&mut world);

    let log = drive(&mut world, &mut ai, 0, 20_000);
    let built = log.iter().find_map(|(_, cmd)| match cmd {
        Command::Build { building, pos, .. } if *building == lumberjack => Some(*pos),
        _ => None,
    });
    let pos = built.expect("first lumberjack should be forced");
    // built on owned land with capability for it
    assert!(world.building(world.map.tile(pos).unwrap().immovable.unwrap()).is_some());
}

#[test]
fn well_forced_first_then_dismantled_on_full_stock() {
    let mut world = World::flat(32, 32, 1);
    let hq_type = world.tribe.building_index("headquarters").unwrap();
    let hq = world.place_building(PlayerId(1), Coords::new(16, 16), hq_type, true);
    // a handful of spots with ground water
    for pos in [Coords::new(12, 16), Coords::new(12, 15), Coords::new(13, 16)] {
        world.set_resource(pos, "water", 5);
    }
    let well = world.tribe.building_index("well").unwrap();
    allow_only(&mut world, PlayerId(1), &["well"]);
    let mut ai = fresh_ai(&mut world);

    let log = drive(&mut world, &mut ai, 0, 10_000);
    let well_build = log.iter().find_map(|(_, cmd)| match cmd {
        Command::Build { building, pos, .. } if *building == well => Some(*pos),
        _ => None,
    });
    let well_pos = well_build.expect("first well should be forced");
    assert!([Coords::new(12, 16), Coords::new(12, 15), Coords::new(13, 16)]
        .contains(&well_pos));

    // finish it and flood the stores with water
    let site = world.map.tile(well_pos).unwrap().immovable.unwrap();
    world.finish_construction(site);
    world.set_can_start_working(site, true);
    world.set_site_stats(site, 60, 60);
    let water = world.tribe.ware_index("water").unwrap();
    world.add_ware(hq, water, 251);

    let log = drive(&mut world, &mut ai, 11_000, 130_000);
    assert!(
        log.iter()
            .any(|(t, cmd)| *t > 90_000 && *cmd == Command::Dismantle { site }),
        "well should be dismantled once stock exceeds 250"
    );
}

#[test]
fn overlong_road_is_split() {
    let mut world = World::flat(32, 32, 1);
    let hq = world.tribe.building_index("headquarters").unwrap();
    world.place_building(PlayerId(1), Coords::new(16, 16), hq, true);
    world.place_flag(PlayerId(1), Coords::new(10, 12)).unwrap();
    world.place_flag(PlayerId(1), Coords::new(15, 12)).unwrap();
    let path: Vec<Coords> = (10..=15).map(|x| Coords::new(x, 12)).collect();
    world.place_road(PlayerId(1), path.clone()).unwrap();
    allow_only(&mut world, PlayerId(1), &[]);
    let mut ai = fresh_ai(&mut world);

    let log = drive(&mut world, &mut ai, 0, 10_000);
    let split_flag = log.iter().find_map(|(_, cmd)| match cmd {
        Command::BuildFlag { pos, .. } if path[1..path.len() - 1].contains(pos) => Some(*pos),
        _ => None,
    });
    // walking both ends inward, the far end is probed first
    assert_eq!(split_flag, Some(Coords::new(14, 12)));
}

#[test]
fn favorable_attack_is_dispatched() {
    let mut world = World::flat(48, 48, 2);
    world.players[0].hostile = vec![PlayerId(2)];
    world.players[1].hostile = vec![PlayerId(1)];

    let fortress = world.tribe.building_index("fortress").unwrap();
    let own = world.place_building(PlayerId(1), Coords::new(10, 10), fortress, true);
    world.set_stationed(own, 9);

    let barrier = world.tribe.building_index("barrier").unwrap();
    let enemy = world.place_building(PlayerId(2), Coords::new(20, 10), barrier, true);
    world.set_stationed(enemy, 2);
    let enemy_flag = world.flag_at(Coords::new(20, 11)).unwrap();

    world.stats.record(PlayerId(1), 200, 0);
    world.stats.record(PlayerId(2), 150, 0);

    allow_only(&mut world, PlayerId(1), &[]);
    let mut ai = fresh_ai(&mut world);

    let log = drive(&mut world, &mut ai, 0, 305_000);
    let attack = log.iter().find_map(|(_, cmd)| match cmd {
        Command::EnemyFlagAction { flag, attackers, .. } => Some((*flag, *attackers)),
        _ => None,
    });
    // 8 attackers against 2 defenders clears the bar comfortably
    assert_eq!(attack, Some((enemy_flag, 8)));
}

#[test]
fn stranded_economy_is_bulldozed_and_blocked() {
    let mut world = World::flat(32, 32, 1);
    world.conquer(PlayerId(1), Coords::new(10, 10), 8);
    let lj = world.tribe.building_index("lumberjacks_hut").unwrap();
    let site = world.place_building(PlayerId(1), Coords::new(10, 10), lj, true);
    let flag_imm = {
        let fid = world.base_flag(site).unwrap();
        world.flag(fid).imm
    };
    allow_only(&mut world, PlayerId(1), &[]);
    let mut ai = fresh_ai(&mut world);

    let log = drive(&mut world, &mut ai, 0, 30_000);
    let bulldozed = log
        .iter()
        .find(|(_, cmd)| *cmd == Command::Bulldoze { immovable: flag_imm });
    let (when, _) = bulldozed.expect("stranded building should be bulldozed");

    // the building is gone and its tile is blocked for 15 minutes
    assert!(world.building(site).is_none());
    assert!(ai
        .blocked_fields()
        .iter()
        .any(|b| b.coords == Coords::new(10, 10)
            && b.blocked_until == when + 15 * 60 * 1000));
}

#[test]
fn owned_tiles_live_in_exactly_one_queue() {
    let mut world = World::flat(32, 32, 1);
    let hq = world.tribe.building_index("headquarters").unwrap();
    world.place_building(PlayerId(1), Coords::new(16, 16), hq, true);
    // a mountain strip gives the mineable queue something to hold
    for x in 12..20 {
        world.map.tile_mut(Coords::new(x, 20)).unwrap().terrain =
            palisade::map::grid::Terrain::Mountain;
    }
    world.conquer(PlayerId(1), Coords::new(16, 20), 4);
    allow_only(&mut world, PlayerId(1), &[]);
    let mut ai = fresh_ai(&mut world);

    drive(&mut world, &mut ai, 0, 60_000);

    let mut seen = std::collections::HashSet::new();
    for c in ai.unusable_coords() {
        assert!(seen.insert(c), "{c:?} appears twice in the field index");
    }
    for c in ai.buildable_coords() {
        assert!(seen.insert(c), "{c:?} appears twice in the field index");
    }
    for c in ai.mineable_coords() {
        assert!(seen.insert(c), "{c:?} appears twice in the field index");
    }
}

#[test]
fn identical_seeds_give_identical_command_streams() {
    let run = || {
        let config = WorldConfig {
            width: 32,
            height: 32,
            seed: 99,
            nr_players: 2,
            ..Default::default()
        };
        let mut world = World::generate(&config);
        let mut engines: Vec<AiPlayer> = (1..=2)
            .map(|i| AiPlayer::new(PlayerId(i), AiProfile::default()))
            .collect();
        let mut log = Vec::new();
        for tick in 0..240 {
            let gametime = tick * 1_000;
            for idx in 0..engines.len() {
                let mut commands = Vec::new();
                engines[idx].think(&world, gametime, &mut commands);
                for cmd in commands {
                    world.apply(&cmd);
                    log.push((gametime, cmd));
                }
                for note in world.take_notes() {
                    for engine in engines.iter_mut() {
                        engine.handle_note(&world, &note, gametime);
                    }
                }
            }
        }
        log
    };

    assert_eq!(run(), run());
}
