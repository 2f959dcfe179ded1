//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Game time in milliseconds since game start.
///
/// Signed because several engine timestamps start out negative (pre-game),
/// so early-game cooldown checks pass immediately.
pub type GameTime = i64;

/// Player identifier (1-based, like the lobby slots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Index into per-player tables
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

/// Index into the tribe's ware table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WareId(pub u16);

/// Index into the tribe's building table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u16);

/// Index into the world's resource table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u8);

/// Handle into the immovable slot table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImmovableId(pub u32);

/// Handle into the flag table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagId(pub u32);

/// Handle into the road table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoadId(pub u32);

/// Identifier of an economy (connected component of flags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EconomyId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_index() {
        assert_eq!(PlayerId(1).index(), 0);
        assert_eq!(PlayerId(4).index(), 3);
    }

    #[test]
    fn test_ids_are_distinct_values() {
        assert_ne!(WareId(0), WareId(1));
        assert_ne!(BuildingTypeId(2), BuildingTypeId(3));
    }
}
