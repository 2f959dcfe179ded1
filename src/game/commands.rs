//! Commands the engine can place on the host's queue
//!
//! Fire and forget: there is no success feedback channel. The engine guards
//! against immediate re-attempts with its blocked-field list instead.

use serde::{Deserialize, Serialize};

use crate::core::types::{BuildingTypeId, FlagId, ImmovableId, PlayerId};
use crate::game::immovable::SoldierPreference;
use crate::map::coords::Coords;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Build {
        player: PlayerId,
        pos: Coords,
        building: BuildingTypeId,
    },
    Dismantle {
        site: ImmovableId,
    },
    Bulldoze {
        immovable: ImmovableId,
    },
    BuildFlag {
        player: PlayerId,
        pos: Coords,
    },
    BuildRoad {
        player: PlayerId,
        path: Vec<Coords>,
    },
    EnhanceBuilding {
        site: ImmovableId,
        building: BuildingTypeId,
    },
    StartStopBuilding {
        site: ImmovableId,
    },
    ChangeSoldierCapacity {
        site: ImmovableId,
        delta: i32,
    },
    SetSoldierPreference {
        site: ImmovableId,
        preference: SoldierPreference,
    },
    EnemyFlagAction {
        flag: FlagId,
        attacker: PlayerId,
        attackers: u32,
    },
}
