//! In-memory game world: the host side of the engine's read/command interface
//!
//! The world owns the tile map, immovables, flags, roads, economies and
//! statistics. Engines read it, emit [`Command`]s, and the world applies
//! those commands, raising [`Note`]s that the engines consume as hooks.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::types::{
    BuildingTypeId, EconomyId, FlagId, ImmovableId, PlayerId, RoadId, WareId,
};
use crate::game::commands::Command;
use crate::game::descriptor::{DescrKind, TribeDescr};
use crate::game::economy::{Economy, Flag, Road};
use crate::game::immovable::{
    Building, Immovable, ImmovableStore, MilitaryState, ProductionState, SoldierPreference,
};
use crate::game::notes::{LostImmovable, Note, Ownership};
use crate::game::stats::GeneralStats;
use crate::map::coords::{Coords, Direction};
use crate::map::grid::{BuildCaps, Terrain, TileMap};

/// Radius around a target flag from which soldiers can join an attack
const ATTACK_GATHER_RADIUS: u32 = 15;

/// Per-player host state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub hostile: Vec<PlayerId>,
    pub allowed_buildings: Vec<bool>,
    /// Workers for enhanced buildings are available
    pub has_advanced_workers: bool,
}

impl PlayerState {
    fn new(id: PlayerId, tribe: &TribeDescr) -> Self {
        Self {
            id,
            hostile: Vec::new(),
            allowed_buildings: vec![true; tribe.buildings.len()],
            has_advanced_workers: true,
        }
    }
}

/// Parameters for [`World::generate`]
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub width: i32,
    pub height: i32,
    pub seed: u64,
    pub nr_players: u8,
    pub forest_frequency: f32,
    pub mountain_frequency: f32,
    pub water_frequency: f32,
    pub stone_frequency: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 48,
            height: 48,
            seed: 12345,
            nr_players: 2,
            forest_frequency: 0.18,
            mountain_frequency: 0.08,
            water_frequency: 0.06,
            stone_frequency: 0.03,
        }
    }
}

#[derive(Debug, Clone)]
pub struct World {
    pub tribe: TribeDescr,
    pub map: TileMap,
    pub immovables: ImmovableStore,
    flags: Vec<Option<Flag>>,
    roads: Vec<Option<Road>>,
    pub economies: Vec<Economy>,
    pub players: Vec<PlayerState>,
    pub stats: GeneralStats,
    /// Wandering game animals
    pub critters: Vec<Coords>,
    notes: Vec<Note>,
    /// Log of attack orders (combat resolution is out of scope)
    pub attacks: Vec<(FlagId, PlayerId, u32)>,
}

impl World {
    pub fn new(tribe: TribeDescr, map: TileMap, nr_players: u8) -> Self {
        let players = (1..=nr_players)
            .map(|i| PlayerState::new(PlayerId(i), &tribe))
            .collect();
        Self {
            tribe,
            map,
            immovables: ImmovableStore::new(),
            flags: Vec::new(),
            roads: Vec::new(),
            economies: Vec::new(),
            players,
            stats: GeneralStats::new(nr_players as usize),
            critters: Vec::new(),
            notes: Vec::new(),
            attacks: Vec::new(),
        }
    }

    /// All-meadow world, the usual test fixture
    pub fn flat(width: i32, height: i32, nr_players: u8) -> Self {
        Self::new(
            TribeDescr::standard(),
            TileMap::new(width, height, Terrain::Meadow),
            nr_players,
        )
    }

    /// Generate a varied world; deterministic for a given config
    pub fn generate(config: &WorldConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut map = TileMap::new(config.width, config.height, Terrain::Meadow);
        let tribe = TribeDescr::standard();
        let water_res = tribe.resource_index("water").unwrap();
        let fish_res = tribe.resource_index("fish").unwrap();
        let coal_res = tribe.resource_index("coal").unwrap();

        for y in 0..config.height {
            for x in 0..config.width {
                let c = Coords::new(x, y);
                let roll: f32 = rng.gen();
                let terrain = if roll < config.water_frequency {
                    Terrain::Water
                } else if roll < config.water_frequency + config.mountain_frequency {
                    Terrain::Mountain
                } else {
                    Terrain::Meadow
                };
                let tile = map.tile_mut(c).unwrap();
                tile.terrain = terrain;
                match terrain {
                    Terrain::Meadow => {
                        tile.resource = Some((water_res, rng.gen_range(0..8)));
                    }
                    Terrain::Mountain => {
                        tile.resource = Some((coal_res, rng.gen_range(2..16)));
                    }
                    Terrain::Water => {
                        tile.resource = Some((fish_res, rng.gen_range(1..6)));
                    }
                    _ => {}
                }
            }
        }

        let mut world = Self::new(tribe, map, config.nr_players);

        // scatter trees, stones and critters on open land
        for y in 0..config.height {
            for x in 0..config.width {
                let c = Coords::new(x, y);
                if world.map.tile(c).unwrap().terrain != Terrain::Meadow {
                    continue;
                }
                let roll: f32 = rng.gen();
                if roll < config.forest_frequency {
                    world.place_tree(c);
                } else if roll < config.forest_frequency + config.stone_frequency {
                    let amount = rng.gen_range(2..8);
                    world.place_stone(c, amount);
                } else if roll < config.forest_frequency + config.stone_frequency + 0.02 {
                    world.critters.push(c);
                }
            }
        }

        // everyone is everyone's enemy
        let ids: Vec<PlayerId> = world.players.iter().map(|p| p.id).collect();
        for p in world.players.iter_mut() {
            p.hostile = ids.iter().copied().filter(|id| *id != p.id).collect();
        }

        // starting positions spread along the map diagonal
        let hq = world.tribe.building_index("headquarters").unwrap();
        let log = world.tribe.ware_index("log").unwrap();
        let granite = world.tribe.ware_index("granite").unwrap();
        for (i, player) in ids.iter().enumerate() {
            let frac = (i as i32 + 1) * config.width / (config.nr_players as i32 + 1);
            let pos = Coords::new(frac, frac * config.height / config.width);
            // clear a landing zone so the warehouse always fits
            for c in pos.region(3) {
                if let Some(tile) = world.map.tile_mut(c) {
                    tile.terrain = Terrain::Meadow;
                    if let Some(id) = tile.immovable.take() {
                        world.immovables.remove(id);
                    }
                }
            }
            let wh = world.place_building(*player, pos, hq, true);
            world.add_ware(wh, log, 30);
            world.add_ware(wh, granite, 20);
            world.stats.record(*player, 0, 0);
        }

        world.notes.clear();
        world
    }

    // ------------------------------------------------------------------
    // reads

    pub fn flag(&self, id: FlagId) -> &Flag {
        self.flags[id.0 as usize].as_ref().expect("stale flag id")
    }

    pub fn flag_mut(&mut self, id: FlagId) -> &mut Flag {
        self.flags[id.0 as usize].as_mut().expect("stale flag id")
    }

    pub fn road(&self, id: RoadId) -> &Road {
        self.roads[id.0 as usize].as_ref().expect("stale road id")
    }

    pub fn flag_exists(&self, id: FlagId) -> bool {
        self.flags.get(id.0 as usize).map(|f| f.is_some()).unwrap_or(false)
    }

    pub fn road_exists(&self, id: RoadId) -> bool {
        self.roads.get(id.0 as usize).map(|r| r.is_some()).unwrap_or(false)
    }

    pub fn economy(&self, id: EconomyId) -> Option<&Economy> {
        self.economies.iter().find(|e| e.id == id)
    }

    pub fn flag_at(&self, pos: Coords) -> Option<FlagId> {
        let id = self.map.tile(pos)?.immovable?;
        match self.immovables.get(id)? {
            Immovable::Flag(fid) => Some(*fid),
            _ => None,
        }
    }

    pub fn building(&self, id: ImmovableId) -> Option<&Building> {
        self.immovables.get(id).and_then(|i| i.as_building())
    }

    pub fn building_mut(&mut self, id: ImmovableId) -> Option<&mut Building> {
        match self.immovables.get_mut(id) {
            Some(Immovable::Building(b)) => Some(b),
            _ => None,
        }
    }

    /// The flag serving a building's door (south-east neighbor)
    pub fn base_flag(&self, building: ImmovableId) -> Option<FlagId> {
        let b = self.building(building)?;
        self.flag_at(b.pos.neighbor(Direction::SE))
    }

    /// Player-agnostic node capability
    pub fn nodecaps(&self, c: Coords) -> BuildCaps {
        self.map.nodecaps(c, |id| self.immovables.is_road(id))
    }

    /// Capability as seen by one player: only own territory is buildable
    pub fn player_buildcaps(&self, player: PlayerId, c: Coords) -> BuildCaps {
        match self.map.tile(c) {
            Some(tile) if tile.owner == Some(player) => self.nodecaps(c),
            _ => BuildCaps::NONE,
        }
    }

    pub fn is_hostile(&self, a: PlayerId, b: PlayerId) -> bool {
        self.players[a.index()].hostile.contains(&b)
    }

    pub fn building_type_allowed(&self, player: PlayerId, id: BuildingTypeId) -> bool {
        self.players[player.index()].allowed_buildings[id.0 as usize]
    }

    pub fn has_workers(&self, player: PlayerId, _building: BuildingTypeId) -> bool {
        self.players[player.index()].has_advanced_workers
    }

    pub fn find_immovables(&self, center: Coords, radius: u32) -> Vec<(ImmovableId, Coords)> {
        self.map.find_immovables(center, radius)
    }

    /// Critters within the radius
    pub fn find_bobs(&self, center: Coords, radius: u32) -> usize {
        self.critters
            .iter()
            .filter(|c| center.distance(c) <= radius)
            .count()
    }

    /// Soldiers `player` could send against the given flag
    pub fn find_attack_soldiers(&self, player: PlayerId, target: FlagId) -> u32 {
        let target_pos = self.flag(target).pos;
        let mut soldiers = 0;
        for (id, _) in self.map.find_immovables(target_pos, ATTACK_GATHER_RADIUS) {
            if let Some(b) = self.building(id) {
                if b.player == player && !b.is_constructionsite() {
                    if let Some(ms) = &b.military {
                        // one soldier stays home
                        soldiers += ms.stationed.saturating_sub(1);
                    }
                }
            }
        }
        soldiers
    }

    pub fn take_notes(&mut self) -> Vec<Note> {
        std::mem::take(&mut self.notes)
    }

    // ------------------------------------------------------------------
    // command application

    pub fn apply(&mut self, cmd: &Command) {
        match cmd {
            Command::Build { player, pos, building } => {
                let descr = self.tribe.building(*building);
                let caps = self.player_buildcaps(*player, *pos);
                let fits = if descr.is_mine {
                    caps.allows_mine()
                } else {
                    TribeDescr::size_fits(descr.size, caps)
                };
                if fits {
                    self.place_building(*player, *pos, *building, false);
                }
            }
            Command::Dismantle { site } => {
                self.remove_building(*site);
                self.recompute_economies();
            }
            Command::Bulldoze { immovable } => {
                match self.immovables.get(*immovable).cloned() {
                    Some(Immovable::Building(_)) => self.remove_building(*immovable),
                    Some(Immovable::Flag(fid)) => self.remove_flag(fid),
                    Some(Immovable::Road(rid)) => self.remove_road(rid),
                    Some(_) => {
                        self.clear_tiles_of(*immovable);
                        self.immovables.remove(*immovable);
                    }
                    None => {}
                }
                self.recompute_economies();
            }
            Command::BuildFlag { player, pos } => {
                self.place_flag(*player, *pos);
            }
            Command::BuildRoad { player, path } => {
                self.place_road(*player, path.clone());
            }
            Command::EnhanceBuilding { site, building } => {
                self.enhance_building(*site, *building);
            }
            Command::StartStopBuilding { site } => {
                if let Some(b) = self.building_mut(*site) {
                    if let Some(prod) = &mut b.prod {
                        prod.stopped = !prod.stopped;
                    }
                }
            }
            Command::ChangeSoldierCapacity { site, delta } => {
                let max = self
                    .building(*site)
                    .map(|b| self.tribe.building(b.type_id).max_soldiers)
                    .unwrap_or(0);
                if let Some(b) = self.building_mut(*site) {
                    if let Some(ms) = &mut b.military {
                        let wanted = ms.capacity as i64 + *delta as i64;
                        ms.capacity = wanted.clamp(1, max as i64) as u32;
                    }
                }
            }
            Command::SetSoldierPreference { site, preference } => {
                if let Some(b) = self.building_mut(*site) {
                    if let Some(ms) = &mut b.military {
                        ms.preference = *preference;
                    }
                }
            }
            Command::EnemyFlagAction { flag, attacker, attackers } => {
                self.attacks.push((*flag, *attacker, *attackers));
            }
        }
    }

    // ------------------------------------------------------------------
    // mutation helpers (used by apply and by scenario setups)

    /// Give `player` every unowned or enemy tile within the radius
    pub fn conquer(&mut self, player: PlayerId, center: Coords, radius: u32) {
        for c in center.region(radius) {
            let Some(tile) = self.map.tile_mut(c) else { continue };
            match tile.owner {
                Some(p) if p == player => {}
                Some(p) => {
                    tile.owner = Some(player);
                    self.notes.push(Note::FieldPossession {
                        player: p,
                        pos: c,
                        ownership: Ownership::Lost,
                    });
                    self.notes.push(Note::FieldPossession {
                        player,
                        pos: c,
                        ownership: Ownership::Gained,
                    });
                }
                None => {
                    tile.owner = Some(player);
                    self.notes.push(Note::FieldPossession {
                        player,
                        pos: c,
                        ownership: Ownership::Gained,
                    });
                }
            }
        }
    }

    pub fn place_tree(&mut self, pos: Coords) -> ImmovableId {
        let id = self.immovables.insert(Immovable::Tree);
        self.map.tile_mut(pos).unwrap().immovable = Some(id);
        id
    }

    pub fn place_stone(&mut self, pos: Coords, amount: u8) -> ImmovableId {
        let id = self.immovables.insert(Immovable::Stone { amount });
        self.map.tile_mut(pos).unwrap().immovable = Some(id);
        id
    }

    pub fn set_resource(&mut self, pos: Coords, resource: &str, amount: u8) {
        let res = self.tribe.resource_index(resource).unwrap();
        self.map.tile_mut(pos).unwrap().resource = Some((res, amount));
    }

    /// Plant a flag; planting onto a road splits the road in two
    pub fn place_flag(&mut self, player: PlayerId, pos: Coords) -> Option<FlagId> {
        if !self.nodecaps(pos).allows_flag() {
            return None;
        }
        let split_road = match self.map.tile(pos).and_then(|t| t.immovable) {
            Some(id) => match self.immovables.get(id) {
                Some(Immovable::Road(rid)) => Some(*rid),
                _ => return None,
            },
            None => None,
        };

        let fid = FlagId(self.flags.len() as u32);
        let imm = self.immovables.insert(Immovable::Flag(fid));
        self.flags.push(Some(Flag {
            imm,
            pos,
            player,
            building: None,
            roads: [None; 6],
            wares_pending: 0,
            economy: EconomyId(fid.0),
        }));
        self.map.tile_mut(pos).unwrap().immovable = Some(imm);
        self.notes.push(Note::ImmovableGained { player, id: imm });

        if let Some(rid) = split_road {
            self.split_road(rid, fid);
        }
        self.recompute_economies();
        Some(fid)
    }

    fn split_road(&mut self, rid: RoadId, at: FlagId) {
        let road = self.roads[rid.0 as usize].clone().expect("stale road id");
        let pos = self.flag(at).pos;
        let cut = road.path.iter().position(|c| *c == pos).expect("flag not on road");

        let first_path: Vec<Coords> = road.path[..=cut].to_vec();
        let second_path: Vec<Coords> = road.path[cut..].to_vec();

        // first half keeps the road id, second half becomes a new road
        let far_flag = road.flags[1];
        {
            let r = self.roads[rid.0 as usize].as_mut().unwrap();
            r.path = first_path;
            r.flags = [road.flags[0], at];
        }
        self.flag_mut(far_flag).detach_road(rid);
        self.flag_mut(at).attach_road(rid);

        let new_rid = RoadId(self.roads.len() as u32);
        let new_imm = self.immovables.insert(Immovable::Road(new_rid));
        self.roads.push(Some(Road {
            imm: new_imm,
            player: road.player,
            flags: [at, far_flag],
            path: second_path.clone(),
        }));
        self.flag_mut(at).attach_road(new_rid);
        self.flag_mut(far_flag).attach_road(new_rid);
        for c in &second_path[1..second_path.len() - 1] {
            self.map.tile_mut(*c).unwrap().immovable = Some(new_imm);
        }
        self.notes.push(Note::ImmovableGained {
            player: road.player,
            id: new_imm,
        });
    }

    /// Lay a road along the given path; both endpoints must hold flags
    pub fn place_road(&mut self, player: PlayerId, path: Vec<Coords>) -> Option<RoadId> {
        if path.len() < 2 {
            return None;
        }
        let start = self.flag_at(*path.first().unwrap())?;
        let end = self.flag_at(*path.last().unwrap())?;
        for c in &path[1..path.len() - 1] {
            if self.map.tile(*c)?.immovable.is_some() {
                return None;
            }
        }

        let rid = RoadId(self.roads.len() as u32);
        let imm = self.immovables.insert(Immovable::Road(rid));
        for c in &path[1..path.len() - 1] {
            self.map.tile_mut(*c).unwrap().immovable = Some(imm);
        }
        self.roads.push(Some(Road {
            imm,
            player,
            flags: [start, end],
            path,
        }));
        self.flag_mut(start).attach_road(rid);
        self.flag_mut(end).attach_road(rid);
        self.notes.push(Note::ImmovableGained { player, id: imm });
        self.recompute_economies();
        Some(rid)
    }

    /// Place a building; `finished == false` creates a construction site.
    /// A flag is planted at the south-east neighbor when none is there yet.
    pub fn place_building(
        &mut self,
        player: PlayerId,
        pos: Coords,
        type_id: BuildingTypeId,
        finished: bool,
    ) -> ImmovableId {
        let building = if finished {
            self.finished_building(player, pos, type_id)
        } else {
            Building {
                type_id: self.tribe.constructionsite(),
                target: Some(type_id),
                player,
                pos,
                prod: None,
                military: None,
                stock: Default::default(),
            }
        };
        let id = self.immovables.insert(Immovable::Building(building));
        self.map.tile_mut(pos).unwrap().immovable = Some(id);

        let flag_pos = pos.neighbor(Direction::SE);
        let fid = match self.flag_at(flag_pos) {
            Some(f) => Some(f),
            None => self.place_flag(player, flag_pos),
        };
        if let Some(f) = fid {
            self.flag_mut(f).building = Some(id);
        }

        if finished {
            let conquers = self.tribe.building(type_id).conquers;
            if conquers > 0 {
                self.conquer(player, pos, conquers);
            }
        }
        self.notes.push(Note::ImmovableGained { player, id });
        self.recompute_economies();
        id
    }

    fn finished_building(&self, player: PlayerId, pos: Coords, type_id: BuildingTypeId) -> Building {
        let descr = self.tribe.building(type_id);
        let prod = matches!(descr.kind, DescrKind::ProductionSite | DescrKind::TrainingSite)
            .then(ProductionState::default);
        let military = (descr.kind == DescrKind::MilitarySite).then(|| MilitaryState {
            capacity: descr.max_soldiers,
            stationed: 0,
            preference: SoldierPreference::Heroes,
        });
        Building {
            type_id,
            target: None,
            player,
            pos,
            prod,
            military,
            stock: Default::default(),
        }
    }

    /// Turn a construction site into the finished building
    pub fn finish_construction(&mut self, id: ImmovableId) {
        let Some(b) = self.building(id) else { return };
        let Some(target) = b.target else { return };
        let (player, pos, old_type) = (b.player, b.pos, b.type_id);

        self.notes.push(Note::ImmovableLost {
            player,
            id,
            what: LostImmovable::Building {
                type_id: old_type,
                target: Some(target),
                pos,
            },
        });
        let finished = self.finished_building(player, pos, target);
        *self.immovables.get_mut(id).unwrap() = Immovable::Building(finished);
        let conquers = self.tribe.building(target).conquers;
        if conquers > 0 {
            self.conquer(player, pos, conquers);
        }
        self.notes.push(Note::ImmovableGained { player, id });
        self.recompute_economies();
    }

    fn enhance_building(&mut self, id: ImmovableId, building: BuildingTypeId) {
        let Some(b) = self.building(id) else { return };
        if b.is_constructionsite() {
            return;
        }
        let (player, pos, old_type) = (b.player, b.pos, b.type_id);
        self.notes.push(Note::ImmovableLost {
            player,
            id,
            what: LostImmovable::Building {
                type_id: old_type,
                target: None,
                pos,
            },
        });
        let site = Building {
            type_id: self.tribe.constructionsite(),
            target: Some(building),
            player,
            pos,
            prod: None,
            military: None,
            stock: Default::default(),
        };
        *self.immovables.get_mut(id).unwrap() = Immovable::Building(site);
        self.notes.push(Note::ImmovableGained { player, id });
        self.recompute_economies();
    }

    fn clear_tiles_of(&mut self, id: ImmovableId) {
        for c in self.map.all_coords().collect::<Vec<_>>() {
            let tile = self.map.tile_mut(c).unwrap();
            if tile.immovable == Some(id) {
                tile.immovable = None;
            }
        }
    }

    pub fn remove_building(&mut self, id: ImmovableId) {
        let Some(b) = self.building(id).cloned() else { return };
        self.clear_tiles_of(id);
        self.immovables.remove(id);
        if let Some(fid) = self.flag_at(b.pos.neighbor(Direction::SE)) {
            if self.flag(fid).building == Some(id) {
                self.flag_mut(fid).building = None;
            }
        }
        self.notes.push(Note::ImmovableLost {
            player: b.player,
            id,
            what: LostImmovable::Building {
                type_id: b.type_id,
                target: b.target,
                pos: b.pos,
            },
        });
    }

    /// Destroying a flag takes its building and all attached roads with it
    pub fn remove_flag(&mut self, fid: FlagId) {
        let Some(flag) = self.flags[fid.0 as usize].clone() else { return };
        if let Some(building) = flag.building {
            self.remove_building(building);
        }
        for rid in flag.roads.into_iter().flatten() {
            self.remove_road(rid);
        }
        self.clear_tiles_of(flag.imm);
        self.immovables.remove(flag.imm);
        self.flags[fid.0 as usize] = None;
        self.notes.push(Note::ImmovableLost {
            player: flag.player,
            id: flag.imm,
            what: LostImmovable::Flag(fid),
        });
    }

    pub fn remove_road(&mut self, rid: RoadId) {
        let Some(road) = self.roads[rid.0 as usize].clone() else { return };
        for fid in road.flags {
            if self.flag_exists(fid) {
                self.flag_mut(fid).detach_road(rid);
            }
        }
        self.clear_tiles_of(road.imm);
        self.immovables.remove(road.imm);
        self.roads[rid.0 as usize] = None;
        self.notes.push(Note::ImmovableLost {
            player: road.player,
            id: road.imm,
            what: LostImmovable::Road(rid),
        });
    }

    /// Put wares into a warehouse and refresh economy stock views
    pub fn add_ware(&mut self, warehouse: ImmovableId, ware: WareId, amount: u32) {
        if let Some(b) = self.building_mut(warehouse) {
            *b.stock.entry(ware).or_insert(0) += amount;
        }
        self.recompute_economies();
    }

    pub fn set_site_stats(&mut self, id: ImmovableId, statistics_percent: u8, crude: u8) {
        if let Some(b) = self.building_mut(id) {
            if let Some(prod) = &mut b.prod {
                prod.statistics_percent = statistics_percent;
                prod.crude_statistics = crude;
            }
        }
    }

    pub fn set_can_start_working(&mut self, id: ImmovableId, value: bool) {
        if let Some(b) = self.building_mut(id) {
            if let Some(prod) = &mut b.prod {
                prod.can_start_working = value;
            }
        }
    }

    pub fn set_stationed(&mut self, id: ImmovableId, soldiers: u32) {
        if let Some(b) = self.building_mut(id) {
            if let Some(ms) = &mut b.military {
                ms.stationed = soldiers;
            }
        }
    }

    // ------------------------------------------------------------------
    // economies

    /// Rebuild connected components of flags.
    ///
    /// Component ids equal the smallest member flag id, so the result is
    /// stable for identical road networks.
    pub fn recompute_economies(&mut self) {
        let mut assigned: Vec<Option<EconomyId>> = vec![None; self.flags.len()];
        let mut economies = Vec::new();

        for start in 0..self.flags.len() {
            if self.flags[start].is_none() || assigned[start].is_some() {
                continue;
            }
            let eco_id = EconomyId(start as u32);
            let mut members = Vec::new();
            let mut queue = vec![FlagId(start as u32)];
            assigned[start] = Some(eco_id);
            while let Some(fid) = queue.pop() {
                members.push(fid);
                let roads = self.flag(fid).roads;
                for rid in roads.into_iter().flatten() {
                    let other = self.road(rid).other_end(fid);
                    let idx = other.0 as usize;
                    if assigned[idx].is_none() {
                        assigned[idx] = Some(eco_id);
                        queue.push(other);
                    }
                }
            }
            members.sort_by_key(|f| f.0);

            let mut eco = Economy::new(eco_id, &self.tribe);
            for fid in &members {
                self.flags[fid.0 as usize].as_mut().unwrap().economy = eco_id;
                let building = self.flag(*fid).building;
                if let Some(bid) = building {
                    if let Some(b) = self.building(bid) {
                        if !b.is_constructionsite()
                            && self.tribe.building(b.type_id).kind == DescrKind::Warehouse
                        {
                            eco.warehouses.push(bid);
                            for (ware, amount) in &b.stock {
                                *eco.stock.entry(*ware).or_insert(0) += amount;
                            }
                        }
                    }
                }
            }
            eco.flags = members;
            economies.push(eco);
        }

        self.economies = economies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_world_and_conquer() {
        let mut world = World::flat(16, 16, 1);
        world.conquer(PlayerId(1), Coords::new(8, 8), 3);
        let notes = world.take_notes();
        assert!(!notes.is_empty());
        assert_eq!(
            world.map.tile(Coords::new(8, 8)).unwrap().owner,
            Some(PlayerId(1))
        );
        assert_eq!(world.map.tile(Coords::new(0, 0)).unwrap().owner, None);
    }

    #[test]
    fn test_place_building_creates_flag_and_conquers() {
        let mut world = World::flat(24, 24, 1);
        let hq = world.tribe.building_index("headquarters").unwrap();
        let id = world.place_building(PlayerId(1), Coords::new(10, 10), hq, true);

        let flag = world.base_flag(id).unwrap();
        assert_eq!(world.flag(flag).building, Some(id));
        assert_eq!(
            world.map.tile(Coords::new(10, 10)).unwrap().owner,
            Some(PlayerId(1))
        );
        // one economy containing the base flag
        assert_eq!(world.economies.len(), 1);
        assert_eq!(world.economies[0].warehouses, vec![id]);
    }

    #[test]
    fn test_construction_site_lifecycle() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 5);
        let lj = world.tribe.building_index("lumberjacks_hut").unwrap();
        let id = world.place_building(PlayerId(1), Coords::new(10, 10), lj, false);
        assert!(world.building(id).unwrap().is_constructionsite());

        world.finish_construction(id);
        let b = world.building(id).unwrap();
        assert!(!b.is_constructionsite());
        assert_eq!(b.type_id, lj);
        assert!(b.prod.is_some());
    }

    #[test]
    fn test_road_and_economy_merge() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 8);
        let a = world.place_flag(PlayerId(1), Coords::new(8, 10)).unwrap();
        let b = world.place_flag(PlayerId(1), Coords::new(12, 10)).unwrap();
        assert_eq!(world.economies.len(), 2);

        let path: Vec<Coords> = (8..=12).map(|x| Coords::new(x, 10)).collect();
        world.place_road(PlayerId(1), path).unwrap();
        assert_eq!(world.economies.len(), 1);
        assert_eq!(world.flag(a).economy, world.flag(b).economy);
    }

    #[test]
    fn test_flag_on_road_splits_it() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 8);
        world.place_flag(PlayerId(1), Coords::new(6, 10)).unwrap();
        world.place_flag(PlayerId(1), Coords::new(12, 10)).unwrap();
        let path: Vec<Coords> = (6..=12).map(|x| Coords::new(x, 10)).collect();
        let rid = world.place_road(PlayerId(1), path).unwrap();
        assert_eq!(world.road(rid).nsteps(), 6);

        let mid = world.place_flag(PlayerId(1), Coords::new(9, 10)).unwrap();
        assert_eq!(world.road(rid).nsteps(), 3);
        assert_eq!(world.flag(mid).nr_of_roads(), 2);
        // still one economy
        assert_eq!(world.economies.len(), 1);
    }

    #[test]
    fn test_bulldoze_flag_removes_building_and_roads() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 8);
        let lj = world.tribe.building_index("lumberjacks_hut").unwrap();
        let id = world.place_building(PlayerId(1), Coords::new(10, 10), lj, true);
        let fid = world.base_flag(id).unwrap();
        let imm = world.flag(fid).imm;

        world.apply(&Command::Bulldoze { immovable: imm });
        assert!(world.building(id).is_none());
        assert!(!world.flag_exists(fid));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let config = WorldConfig::default();
        let a = World::generate(&config);
        let b = World::generate(&config);
        for c in a.map.all_coords() {
            assert_eq!(a.map.tile(c).unwrap().terrain, b.map.tile(c).unwrap().terrain);
        }
        assert_eq!(a.economies.len(), b.economies.len());
    }

    #[test]
    fn test_soldier_capacity_clamped() {
        let mut world = World::flat(24, 24, 1);
        world.conquer(PlayerId(1), Coords::new(10, 10), 5);
        let sentry = world.tribe.building_index("sentry").unwrap();
        let id = world.place_building(PlayerId(1), Coords::new(10, 10), sentry, true);

        world.apply(&Command::ChangeSoldierCapacity { site: id, delta: -10 });
        assert_eq!(world.building(id).unwrap().military.as_ref().unwrap().capacity, 1);
        world.apply(&Command::ChangeSoldierCapacity { site: id, delta: 10 });
        assert_eq!(world.building(id).unwrap().military.as_ref().unwrap().capacity, 2);
    }
}
