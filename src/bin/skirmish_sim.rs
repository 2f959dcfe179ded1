//! Headless skirmish: computer opponents on a generated map
//!
//! Runs a number of engine ticks, applies every command to the world, and
//! prints a JSON summary. Useful for eyeballing behavior and for verifying
//! that two runs with the same seed do the same thing.

use clap::Parser;
use serde::Serialize;

use palisade::ai::{AiPlayer, AiProfile};
use palisade::core::types::PlayerId;
use palisade::game::commands::Command;
use palisade::game::world::{World, WorldConfig};

#[derive(Parser, Debug)]
#[command(name = "skirmish_sim", about = "Run computer opponents on a generated map")]
struct Args {
    /// World seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Map edge length
    #[arg(long, default_value_t = 48)]
    size: i32,

    /// Number of players
    #[arg(long, default_value_t = 2)]
    players: u8,

    /// Simulated game ticks
    #[arg(long, default_value_t = 2000)]
    ticks: u32,

    /// Milliseconds of game time per tick
    #[arg(long, default_value_t = 250)]
    tick_ms: i64,
}

#[derive(Serialize)]
struct Summary {
    seed: u64,
    ticks: u32,
    commands_total: usize,
    builds: usize,
    dismantles: usize,
    roads: usize,
    flags: usize,
    attacks: usize,
    construction_sites_finished: usize,
}

fn main() {
    let args = Args::parse();

    let config = WorldConfig {
        width: args.size,
        height: args.size,
        seed: args.seed,
        nr_players: args.players,
        ..Default::default()
    };
    let mut world = World::generate(&config);

    let mut engines: Vec<AiPlayer> = (1..=args.players)
        .map(|i| AiPlayer::new(PlayerId(i), AiProfile::default()))
        .collect();

    let mut summary = Summary {
        seed: args.seed,
        ticks: args.ticks,
        commands_total: 0,
        builds: 0,
        dismantles: 0,
        roads: 0,
        flags: 0,
        attacks: 0,
        construction_sites_finished: 0,
    };

    for tick in 0..args.ticks {
        let gametime = tick as i64 * args.tick_ms;

        for idx in 0..engines.len() {
            let mut commands = Vec::new();
            engines[idx].think(&world, gametime, &mut commands);

            for cmd in &commands {
                summary.commands_total += 1;
                match cmd {
                    Command::Build { .. } => summary.builds += 1,
                    Command::Dismantle { .. } | Command::Bulldoze { .. } => {
                        summary.dismantles += 1
                    }
                    Command::BuildRoad { .. } => summary.roads += 1,
                    Command::BuildFlag { .. } => summary.flags += 1,
                    Command::EnemyFlagAction { .. } => summary.attacks += 1,
                    _ => {}
                }
                world.apply(cmd);
            }

            // hooks run synchronously: every engine sees the change before
            // the next one thinks
            for note in world.take_notes() {
                for engine in engines.iter_mut() {
                    engine.handle_note(&world, &note, gametime);
                }
            }
        }

        // stand in for the builders: construction sites finish after a while
        if tick % 40 == 39 {
            let finished = finish_one_constructionsite(&mut world);
            if finished {
                summary.construction_sites_finished += 1;
            }
        }

        // deliver pending notifications to all engines
        for note in world.take_notes() {
            for engine in engines.iter_mut() {
                engine.handle_note(&world, &note, gametime);
            }
        }

        // refresh statistics every simulated 10 s
        if gametime % 10_000 == 0 {
            for p in 1..=args.players {
                let player = PlayerId(p);
                let strength = military_strength(&world, player);
                let land = land_size(&world, player);
                world.stats.record(player, strength, land);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
}

fn finish_one_constructionsite(world: &mut World) -> bool {
    let mut target = None;
    for c in world.map.all_coords().collect::<Vec<_>>() {
        if let Some(id) = world.map.tile(c).and_then(|t| t.immovable) {
            if let Some(b) = world.building(id) {
                if b.is_constructionsite() {
                    target = Some(id);
                    break;
                }
            }
        }
    }
    match target {
        Some(id) => {
            world.finish_construction(id);
            true
        }
        None => false,
    }
}

fn military_strength(world: &World, player: PlayerId) -> u32 {
    let mut strength = 0;
    for c in world.map.all_coords().collect::<Vec<_>>() {
        if let Some(id) = world.map.tile(c).and_then(|t| t.immovable) {
            if let Some(b) = world.building(id) {
                if b.player == player {
                    if let Some(ms) = &b.military {
                        strength += ms.stationed;
                    }
                }
            }
        }
    }
    strength
}

fn land_size(world: &World, player: PlayerId) -> u32 {
    world
        .map
        .all_coords()
        .filter(|c| world.map.tile(*c).map(|t| t.owner == Some(player)).unwrap_or(false))
        .count() as u32
}
