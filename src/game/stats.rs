//! Per-player general statistics time series

use serde::{Deserialize, Serialize};

use crate::core::types::PlayerId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub military_strength: Vec<u32>,
    pub land_size: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralStats {
    pub players: Vec<PlayerStats>,
}

impl GeneralStats {
    pub fn new(nr_players: usize) -> Self {
        Self {
            players: vec![PlayerStats::default(); nr_players],
        }
    }

    pub fn record(&mut self, player: PlayerId, military_strength: u32, land_size: u32) {
        let entry = &mut self.players[player.index()];
        entry.military_strength.push(military_strength);
        entry.land_size.push(land_size);
    }

    /// Latest strength sample, None when the series is empty
    pub fn latest_military_strength(&self, player: PlayerId) -> Option<u32> {
        self.players
            .get(player.index())
            .and_then(|p| p.military_strength.last().copied())
    }
}
