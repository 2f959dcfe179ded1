//! Long-lived map objects and their slot table

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{BuildingTypeId, FlagId, ImmovableId, PlayerId, RoadId, WareId};
use crate::map::coords::Coords;

/// Whether a garrison prefers fresh or seasoned soldiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoldierPreference {
    Rookies,
    Heroes,
}

/// Runtime state of a production site or mine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionState {
    /// All worker slots filled, ready to produce
    pub can_start_working: bool,
    pub stopped: bool,
    /// Smoothed success percentage shown in the UI
    pub statistics_percent: u8,
    /// Unsmoothed recent success percentage
    pub crude_statistics: u8,
}

impl Default for ProductionState {
    fn default() -> Self {
        Self {
            can_start_working: false,
            stopped: false,
            statistics_percent: 0,
            crude_statistics: 0,
        }
    }
}

/// Runtime state of a military site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilitaryState {
    pub capacity: u32,
    pub stationed: u32,
    pub preference: SoldierPreference,
}

/// One building on the map.
///
/// A construction site is a building whose descriptor is the tribe's
/// construction-site pseudo-type; `target` then names what is being built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub type_id: BuildingTypeId,
    pub target: Option<BuildingTypeId>,
    pub player: PlayerId,
    pub pos: Coords,
    pub prod: Option<ProductionState>,
    pub military: Option<MilitaryState>,
    /// Warehouse stock by ware
    pub stock: AHashMap<WareId, u32>,
}

impl Building {
    pub fn is_constructionsite(&self) -> bool {
        self.target.is_some()
    }
}

/// Any long-lived map object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Immovable {
    Tree,
    Stone { amount: u8 },
    Flag(FlagId),
    Road(RoadId),
    Building(Building),
}

impl Immovable {
    pub fn as_building(&self) -> Option<&Building> {
        match self {
            Immovable::Building(b) => Some(b),
            _ => None,
        }
    }
}

/// Slot table handing out stable [`ImmovableId`]s
#[derive(Debug, Clone, Default)]
pub struct ImmovableStore {
    slots: Vec<Option<Immovable>>,
}

impl ImmovableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, imm: Immovable) -> ImmovableId {
        // reuse the lowest free slot so ids stay dense and deterministic
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(imm);
                return ImmovableId(i as u32);
            }
        }
        self.slots.push(Some(imm));
        ImmovableId(self.slots.len() as u32 - 1)
    }

    pub fn get(&self, id: ImmovableId) -> Option<&Immovable> {
        self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: ImmovableId) -> Option<&mut Immovable> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.as_mut())
    }

    pub fn remove(&mut self, id: ImmovableId) -> Option<Immovable> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.take())
    }

    pub fn is_road(&self, id: ImmovableId) -> bool {
        matches!(self.get(id), Some(Immovable::Road(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_insert_get_remove() {
        let mut store = ImmovableStore::new();
        let a = store.insert(Immovable::Tree);
        let b = store.insert(Immovable::Stone { amount: 5 });
        assert_ne!(a, b);
        assert!(matches!(store.get(a), Some(Immovable::Tree)));

        store.remove(a);
        assert!(store.get(a).is_none());

        // freed slot is reused
        let c = store.insert(Immovable::Tree);
        assert_eq!(c, a);
    }

    #[test]
    fn test_is_road() {
        let mut store = ImmovableStore::new();
        let r = store.insert(Immovable::Road(RoadId(0)));
        let t = store.insert(Immovable::Tree);
        assert!(store.is_road(r));
        assert!(!store.is_road(t));
    }
}
