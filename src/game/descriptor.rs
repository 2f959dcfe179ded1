//! Static tribe data: ware and building descriptors
//!
//! Descriptor tables are loaded once and never change during a game; the
//! engine reads them to classify buildings and weigh ware demand.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::{BuildingTypeId, GameTime, ResourceId, WareId};
use crate::map::grid::BuildCaps;

/// Footprint of a building
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingSize {
    Small = 1,
    Medium = 2,
    Big = 3,
}

impl BuildingSize {
    /// Size value comparable against a tile's size capability
    pub fn cap_value(self) -> u8 {
        self as u8
    }
}

/// What a descriptor fundamentally is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescrKind {
    ProductionSite,
    MilitarySite,
    Warehouse,
    TrainingSite,
    ConstructionSite,
}

/// Static behavior hints attached to a building descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingHints {
    pub log_producer: bool,
    pub stone_producer: bool,
    pub needs_water: bool,
    pub mines_water: bool,
    pub space_consumer: bool,
    pub expansion_type: bool,
    pub fighting_type: bool,
    pub mountain_conqueror: bool,
    pub for_recruitment: bool,
    /// Ware whose map resource this building renews (foresters, breeders)
    pub renews_resource: Option<WareId>,
    /// Resource mined, for mines
    pub mines: Option<ResourceId>,
    pub mines_percent: u8,
    /// Not before this game time (ms)
    pub prohibited_till: GameTime,
    /// First one is forced once this game time passed (ms); None = never
    pub forced_after: Option<GameTime>,
}

/// One building type of the tribe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingDescr {
    pub name: String,
    pub kind: DescrKind,
    pub size: BuildingSize,
    pub is_mine: bool,
    /// Directly buildable by the player (enhanced types usually are not)
    pub buildable: bool,
    pub enhancement: Option<BuildingTypeId>,
    pub vision_range: u32,
    /// Territory radius conquered when completed
    pub conquers: u32,
    pub max_soldiers: u32,
    pub workarea_radius: u32,
    pub inputs: Vec<WareId>,
    pub outputs: Vec<WareId>,
    pub hints: BuildingHints,
}

/// One ware type of the tribe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WareDescr {
    pub name: String,
    /// Static demand tie-breaker
    pub preciousness: u8,
    /// Default economy target quantity
    pub default_target: u32,
}

/// All static data of one tribe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TribeDescr {
    pub name: String,
    pub wares: Vec<WareDescr>,
    pub buildings: Vec<BuildingDescr>,
    pub resources: Vec<String>,
    /// Tribe counts water as a strategic resource (fisher-dependent food chain)
    pub needs_water_resource: bool,
}

impl TribeDescr {
    pub fn ware_index(&self, name: &str) -> Option<WareId> {
        self.wares
            .iter()
            .position(|w| w.name == name)
            .map(|i| WareId(i as u16))
    }

    pub fn safe_ware_index(&self, name: &str) -> Result<WareId> {
        self.ware_index(name)
            .ok_or_else(|| EngineError::UnknownWare(name.to_string()))
    }

    pub fn building_index(&self, name: &str) -> Option<BuildingTypeId> {
        self.buildings
            .iter()
            .position(|b| b.name == name)
            .map(|i| BuildingTypeId(i as u16))
    }

    pub fn resource_index(&self, name: &str) -> Result<ResourceId> {
        self.resources
            .iter()
            .position(|r| r == name)
            .map(|i| ResourceId(i as u8))
            .ok_or_else(|| EngineError::UnknownResource(name.to_string()))
    }

    pub fn building(&self, id: BuildingTypeId) -> &BuildingDescr {
        &self.buildings[id.0 as usize]
    }

    pub fn ware(&self, id: WareId) -> &WareDescr {
        &self.wares[id.0 as usize]
    }

    /// The construction-site pseudo-building of this tribe
    pub fn constructionsite(&self) -> BuildingTypeId {
        let idx = self
            .buildings
            .iter()
            .position(|b| b.kind == DescrKind::ConstructionSite)
            .expect("tribe without constructionsite descriptor");
        BuildingTypeId(idx as u16)
    }

    /// Largest size buildable on the given capability
    pub fn size_fits(size: BuildingSize, caps: BuildCaps) -> bool {
        size.cap_value() <= caps.size_cap()
    }

    /// The built-in test/demo tribe
    pub fn standard() -> TribeDescr {
        let wares = vec![
            WareDescr { name: "log".into(), preciousness: 2, default_target: 40 },
            WareDescr { name: "granite".into(), preciousness: 5, default_target: 20 },
            WareDescr { name: "water".into(), preciousness: 4, default_target: 25 },
            WareDescr { name: "fish".into(), preciousness: 3, default_target: 20 },
            WareDescr { name: "meat".into(), preciousness: 2, default_target: 20 },
            WareDescr { name: "wheat".into(), preciousness: 7, default_target: 20 },
            WareDescr { name: "flour".into(), preciousness: 6, default_target: 20 },
            WareDescr { name: "coal".into(), preciousness: 10, default_target: 20 },
        ];
        let w = |name: &str| {
            WareId(wares.iter().position(|x: &WareDescr| x.name == name).unwrap() as u16)
        };

        let mut buildings = vec![
            BuildingDescr {
                name: "headquarters".into(),
                kind: DescrKind::Warehouse,
                size: BuildingSize::Big,
                is_mine: false,
                buildable: false,
                enhancement: None,
                vision_range: 12,
                conquers: 9,
                max_soldiers: 0,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints::default(),
            },
            BuildingDescr {
                name: "warehouse".into(),
                kind: DescrKind::Warehouse,
                size: BuildingSize::Medium,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 8,
                conquers: 7,
                max_soldiers: 0,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints::default(),
            },
            BuildingDescr {
                name: "lumberjacks_hut".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 10,
                inputs: vec![],
                outputs: vec![w("log")],
                hints: BuildingHints { log_producer: true, ..Default::default() },
            },
            BuildingDescr {
                name: "rangers_hut".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 5,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints {
                    renews_resource: Some(w("log")),
                    ..Default::default()
                },
            },
            BuildingDescr {
                name: "quarry".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 6,
                inputs: vec![],
                outputs: vec![w("granite")],
                hints: BuildingHints { stone_producer: true, ..Default::default() },
            },
            BuildingDescr {
                name: "well".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 2,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 1,
                inputs: vec![],
                outputs: vec![w("water")],
                hints: BuildingHints { mines_water: true, ..Default::default() },
            },
            BuildingDescr {
                name: "fishers_hut".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 7,
                inputs: vec![],
                outputs: vec![w("fish")],
                hints: BuildingHints { needs_water: true, ..Default::default() },
            },
            BuildingDescr {
                name: "fish_breeders_hut".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 7,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints {
                    needs_water: true,
                    renews_resource: Some(w("fish")),
                    ..Default::default()
                },
            },
            BuildingDescr {
                name: "hunters_hut".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 12,
                inputs: vec![],
                outputs: vec![w("meat")],
                hints: BuildingHints::default(),
            },
            BuildingDescr {
                name: "gamekeepers_hut".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 12,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints {
                    renews_resource: Some(w("meat")),
                    ..Default::default()
                },
            },
            BuildingDescr {
                name: "farm".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Big,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 2,
                inputs: vec![],
                outputs: vec![w("wheat")],
                hints: BuildingHints {
                    space_consumer: true,
                    forced_after: Some(10 * 60 * 1000),
                    ..Default::default()
                },
            },
            BuildingDescr {
                name: "mill".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Medium,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 0,
                inputs: vec![w("wheat")],
                outputs: vec![w("flour")],
                hints: BuildingHints::default(),
            },
            BuildingDescr {
                name: "barracks".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Medium,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints { for_recruitment: true, ..Default::default() },
            },
            BuildingDescr {
                name: "coal_mine".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: true,
                buildable: true,
                enhancement: None, // patched below
                vision_range: 2,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 2,
                inputs: vec![w("fish")],
                outputs: vec![w("coal")],
                hints: BuildingHints { mines_percent: 35, ..Default::default() },
            },
            BuildingDescr {
                name: "deep_coal_mine".into(),
                kind: DescrKind::ProductionSite,
                size: BuildingSize::Small,
                is_mine: true,
                buildable: false,
                enhancement: None,
                vision_range: 2,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 2,
                inputs: vec![w("fish"), w("meat")],
                outputs: vec![w("coal")],
                hints: BuildingHints { mines_percent: 100, ..Default::default() },
            },
            BuildingDescr {
                name: "sentry".into(),
                kind: DescrKind::MilitarySite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 8,
                conquers: 6,
                max_soldiers: 2,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints { expansion_type: true, ..Default::default() },
            },
            BuildingDescr {
                name: "barrier".into(),
                kind: DescrKind::MilitarySite,
                size: BuildingSize::Medium,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 10,
                conquers: 8,
                max_soldiers: 5,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints {
                    expansion_type: true,
                    fighting_type: true,
                    ..Default::default()
                },
            },
            BuildingDescr {
                name: "fortress".into(),
                kind: DescrKind::MilitarySite,
                size: BuildingSize::Big,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 12,
                conquers: 11,
                max_soldiers: 8,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints {
                    expansion_type: true,
                    mountain_conqueror: true,
                    ..Default::default()
                },
            },
            BuildingDescr {
                name: "battle_arena".into(),
                kind: DescrKind::TrainingSite,
                size: BuildingSize::Big,
                is_mine: false,
                buildable: true,
                enhancement: None,
                vision_range: 4,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 0,
                inputs: vec![w("fish"), w("meat")],
                outputs: vec![],
                hints: BuildingHints::default(),
            },
            BuildingDescr {
                name: "constructionsite".into(),
                kind: DescrKind::ConstructionSite,
                size: BuildingSize::Small,
                is_mine: false,
                buildable: false,
                enhancement: None,
                vision_range: 2,
                conquers: 0,
                max_soldiers: 0,
                workarea_radius: 0,
                inputs: vec![],
                outputs: vec![],
                hints: BuildingHints::default(),
            },
        ];

        let deep = buildings.iter().position(|b| b.name == "deep_coal_mine").unwrap();
        let coal = buildings.iter().position(|b| b.name == "coal_mine").unwrap();
        buildings[coal].enhancement = Some(BuildingTypeId(deep as u16));

        let mut tribe = TribeDescr {
            name: "rivermen".into(),
            wares,
            buildings,
            resources: vec!["water".into(), "fish".into(), "coal".into()],
            needs_water_resource: false,
        };
        let coal_res = tribe.resource_index("coal").unwrap();
        let coal_idx = tribe.building_index("coal_mine").unwrap();
        tribe.buildings[coal_idx.0 as usize].hints.mines = Some(coal_res);
        let deep_idx = tribe.building_index("deep_coal_mine").unwrap();
        tribe.buildings[deep_idx.0 as usize].hints.mines = Some(coal_res);
        tribe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tribe_lookups() {
        let tribe = TribeDescr::standard();
        assert!(tribe.ware_index("log").is_some());
        assert!(tribe.ware_index("gold").is_none());
        assert!(tribe.safe_ware_index("unobtainium").is_err());
        assert!(tribe.building_index("lumberjacks_hut").is_some());
        assert!(tribe.resource_index("coal").is_ok());
    }

    #[test]
    fn test_constructionsite_descriptor_exists() {
        let tribe = TribeDescr::standard();
        let cs = tribe.constructionsite();
        assert_eq!(tribe.building(cs).kind, DescrKind::ConstructionSite);
        assert!(!tribe.building(cs).buildable);
    }

    #[test]
    fn test_mine_enhancement_chain() {
        let tribe = TribeDescr::standard();
        let coal = tribe.building_index("coal_mine").unwrap();
        let deep = tribe.building(coal).enhancement.unwrap();
        assert_eq!(tribe.building(deep).name, "deep_coal_mine");
        assert!(!tribe.building(deep).buildable);
        assert_eq!(tribe.building(coal).hints.mines, tribe.building(deep).hints.mines);
    }

    #[test]
    fn test_size_fits() {
        use crate::map::grid::Terrain;
        let big = Terrain::Meadow.base_caps();
        assert!(TribeDescr::size_fits(BuildingSize::Big, big));
        assert!(TribeDescr::size_fits(BuildingSize::Small, big));
        let rough = Terrain::Rough.base_caps();
        assert!(!TribeDescr::size_fits(BuildingSize::Medium, rough));
        assert!(TribeDescr::size_fits(BuildingSize::Small, rough));
    }
}
