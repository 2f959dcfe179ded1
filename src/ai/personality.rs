//! Opponent personality and tuning profile, loadable from TOML
//!
//! The personality shifts the attack threshold and how strongly border
//! fields are avoided. The profile carries the scheduler cadences so a
//! scenario can slow an opponent down without touching code.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::GameTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Personality {
    Aggressive,
    Normal,
    Defensive,
}

impl Default for Personality {
    fn default() -> Self {
        Personality::Normal
    }
}

impl Personality {
    /// Own/enemy strength ratio (percent) that must be exceeded to attack
    pub fn attack_threshold(self) -> u32 {
        match self {
            Personality::Aggressive => 80,
            Personality::Normal => 100,
            Personality::Defensive => 120,
        }
    }

    /// Added to the divisor when discounting fields near enemy borders;
    /// aggressive opponents discount harder because they will be fighting
    /// over those fields anyway
    pub fn border_divisor_bonus(self) -> i32 {
        match self {
            Personality::Aggressive => 2,
            Personality::Normal => 1,
            Personality::Defensive => 0,
        }
    }
}

/// Scheduler cadences and cooldowns, all in game-time milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProfile {
    pub personality: Personality,
    pub road_check_interval: GameTime,
    pub stats_update_interval: GameTime,
    pub construction_interval: GameTime,
    pub productionsite_check_interval: GameTime,
    pub mine_check_interval: GameTime,
    pub militarysite_check_interval: GameTime,
    pub helpersites_check_interval: GameTime,
    pub field_update_interval: GameTime,
    pub min_field_sweep_interval: GameTime,
    pub idle_mine_update_interval: GameTime,
    pub busy_mine_update_interval: GameTime,
    /// A building type is reconsidered at earliest this long after the
    /// previous decision for it
    pub building_min_interval: GameTime,
}

impl Default for AiProfile {
    fn default() -> Self {
        Self {
            personality: Personality::Normal,
            road_check_interval: 1_000,
            stats_update_interval: 10_000,
            construction_interval: 2_000,
            productionsite_check_interval: 4_000,
            mine_check_interval: 7_000,
            militarysite_check_interval: 5_000,
            helpersites_check_interval: 180_000,
            field_update_interval: 2_000,
            min_field_sweep_interval: 6_000,
            idle_mine_update_interval: 22_000,
            busy_mine_update_interval: 2_000,
            building_min_interval: 25_000,
        }
    }
}

impl AiProfile {
    pub fn aggressive() -> Self {
        Self {
            personality: Personality::Aggressive,
            ..Default::default()
        }
    }

    pub fn defensive() -> Self {
        Self {
            personality: Personality::Defensive,
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_thresholds() {
        assert_eq!(Personality::Aggressive.attack_threshold(), 80);
        assert_eq!(Personality::Normal.attack_threshold(), 100);
        assert_eq!(Personality::Defensive.attack_threshold(), 120);
    }

    #[test]
    fn test_profile_defaults() {
        let profile = AiProfile::default();
        assert_eq!(profile.road_check_interval, 1_000);
        assert_eq!(profile.construction_interval, 2_000);
        assert_eq!(profile.building_min_interval, 25_000);
        assert_eq!(profile.personality, Personality::Normal);
    }

    #[test]
    fn test_profile_from_toml_partial() {
        let profile = AiProfile::from_toml_str(
            r#"
            personality = "Aggressive"
            construction_interval = 4000
            "#,
        )
        .unwrap();
        assert_eq!(profile.personality, Personality::Aggressive);
        assert_eq!(profile.construction_interval, 4_000);
        // untouched fields keep their defaults
        assert_eq!(profile.mine_check_interval, 7_000);
    }

    #[test]
    fn test_profile_rejects_garbage() {
        assert!(AiProfile::from_toml_str("personality = 3").is_err());
    }
}
