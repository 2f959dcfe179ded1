//! Flags, roads and economies
//!
//! An economy is a connected component of flags joined by roads. Wares are
//! balanced inside it; demand is expressed through per-ware target
//! quantities held by the economy.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{EconomyId, FlagId, ImmovableId, PlayerId, RoadId, WareId};
use crate::game::descriptor::TribeDescr;
use crate::map::coords::Coords;

/// Transport graph node attached to buildings and road junctions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flag {
    pub imm: ImmovableId,
    pub pos: Coords,
    pub player: PlayerId,
    /// Building whose door this flag serves
    pub building: Option<ImmovableId>,
    /// Up to one road per walk direction
    pub roads: [Option<RoadId>; 6],
    /// Wares waiting on the flag for transport
    pub wares_pending: u32,
    pub economy: EconomyId,
}

impl Flag {
    pub fn nr_of_roads(&self) -> usize {
        self.roads.iter().filter(|r| r.is_some()).count()
    }

    /// A flag that serves no building and hangs off at most one road
    pub fn is_dead_end(&self) -> bool {
        self.building.is_none() && self.nr_of_roads() <= 1
    }

    pub fn attach_road(&mut self, road: RoadId) {
        for slot in self.roads.iter_mut() {
            if slot.is_none() {
                *slot = Some(road);
                return;
            }
        }
    }

    pub fn detach_road(&mut self, road: RoadId) {
        for slot in self.roads.iter_mut() {
            if *slot == Some(road) {
                *slot = None;
            }
        }
    }
}

/// A road section between exactly two flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Road {
    pub imm: ImmovableId,
    pub player: PlayerId,
    pub flags: [FlagId; 2],
    /// Full coordinate path including both flag positions
    pub path: Vec<Coords>,
}

impl Road {
    pub fn nsteps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn other_end(&self, flag: FlagId) -> FlagId {
        if self.flags[0] == flag {
            self.flags[1]
        } else {
            self.flags[0]
        }
    }
}

/// Demand level for one ware.
///
/// `temporary` is never below `permanent`; a raised temporary target decays
/// by one for each ware consumed until it settles back on the permanent one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetQuantity {
    pub permanent: u32,
    pub temporary: u32,
}

impl TargetQuantity {
    pub fn new(target: u32) -> Self {
        Self {
            permanent: target,
            temporary: target,
        }
    }

    pub fn raise_temporary(&mut self, by: u32) {
        self.temporary += by;
    }

    pub fn on_consumed(&mut self) {
        if self.temporary > self.permanent {
            self.temporary -= 1;
        }
    }
}

/// Connected component of flags with its stock view
#[derive(Debug, Clone)]
pub struct Economy {
    pub id: EconomyId,
    pub flags: Vec<FlagId>,
    pub warehouses: Vec<ImmovableId>,
    pub targets: AHashMap<WareId, TargetQuantity>,
    /// Total stock across member warehouses, filled in by the world
    pub stock: AHashMap<WareId, u32>,
}

impl Economy {
    pub fn new(id: EconomyId, tribe: &TribeDescr) -> Self {
        let targets = tribe
            .wares
            .iter()
            .enumerate()
            .map(|(i, w)| (WareId(i as u16), TargetQuantity::new(w.default_target)))
            .collect();
        Self {
            id,
            flags: Vec::new(),
            warehouses: Vec::new(),
            targets,
            stock: AHashMap::new(),
        }
    }

    pub fn stock_ware(&self, ware: WareId) -> u32 {
        self.stock.get(&ware).copied().unwrap_or(0)
    }

    /// A ware is needed while stock is below its temporary target
    pub fn needs_ware(&self, ware: WareId) -> bool {
        let target = self.targets.get(&ware).map(|t| t.temporary).unwrap_or(0);
        self.stock_ware(ware) < target
    }

    pub fn note_consumed(&mut self, ware: WareId) {
        if let Some(t) = self.targets.get_mut(&ware) {
            t.on_consumed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn economy() -> Economy {
        Economy::new(EconomyId(0), &TribeDescr::standard())
    }

    #[test]
    fn test_needs_ware_tracks_target() {
        let tribe = TribeDescr::standard();
        let log = tribe.ware_index("log").unwrap();
        let mut eco = economy();
        assert!(eco.needs_ware(log));

        eco.stock.insert(log, 40);
        assert!(!eco.needs_ware(log));

        eco.stock.insert(log, 39);
        assert!(eco.needs_ware(log));
    }

    #[test]
    fn test_temporary_target_decay() {
        let mut t = TargetQuantity::new(10);
        t.raise_temporary(2);
        assert_eq!(t.temporary, 12);
        t.on_consumed();
        t.on_consumed();
        assert_eq!(t.temporary, 10);
        // never below permanent
        t.on_consumed();
        assert_eq!(t.temporary, 10);
        assert!(t.temporary >= t.permanent);
    }

    #[test]
    fn test_flag_dead_end() {
        let mut flag = Flag {
            imm: ImmovableId(0),
            pos: Coords::new(0, 0),
            player: PlayerId(1),
            building: None,
            roads: [None; 6],
            wares_pending: 0,
            economy: EconomyId(0),
        };
        assert!(flag.is_dead_end());

        flag.attach_road(RoadId(0));
        assert!(flag.is_dead_end());
        flag.attach_road(RoadId(1));
        assert!(!flag.is_dead_end());

        flag.detach_road(RoadId(1));
        flag.building = Some(ImmovableId(3));
        assert!(!flag.is_dead_end());
    }

    #[test]
    fn test_road_other_end() {
        let road = Road {
            imm: ImmovableId(0),
            player: PlayerId(1),
            flags: [FlagId(4), FlagId(9)],
            path: vec![Coords::new(0, 0), Coords::new(1, 0), Coords::new(2, 0)],
        };
        assert_eq!(road.nsteps(), 2);
        assert_eq!(road.other_end(FlagId(4)), FlagId(9));
        assert_eq!(road.other_end(FlagId(9)), FlagId(4));
    }
}
