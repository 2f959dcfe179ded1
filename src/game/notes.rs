//! Notifications the host raises towards subscribed engines
//!
//! Hooks run synchronously; observer state is consistent before any
//! scheduler phase reads it.

use serde::{Deserialize, Serialize};

use crate::core::types::{BuildingTypeId, FlagId, ImmovableId, PlayerId, RoadId};
use crate::map::coords::Coords;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    Gained,
    Lost,
}

/// Payload describing a removed immovable; the object itself is gone by the
/// time the note is delivered, so the note carries what hooks need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LostImmovable {
    Building {
        type_id: BuildingTypeId,
        target: Option<BuildingTypeId>,
        pos: Coords,
    },
    Flag(FlagId),
    Road(RoadId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Note {
    FieldPossession {
        player: PlayerId,
        pos: Coords,
        ownership: Ownership,
    },
    ImmovableGained {
        player: PlayerId,
        id: ImmovableId,
    },
    ImmovableLost {
        player: PlayerId,
        id: ImmovableId,
        what: LostImmovable,
    },
    ProductionSiteOutOfResources {
        player: PlayerId,
        site: ImmovableId,
    },
}
