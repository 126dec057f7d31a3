use serde::{Deserialize, Serialize};

/// Tunables for the game engine. Every field has a default so partial JSON works.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// Grid edge length; coordinates run over `0..grid_size` on both axes.
    pub grid_size: u32,
    pub max_health: u8,
    /// Probe ceiling for the random free-cell search. Raise it as the grid fills.
    pub claim_attempts: u32,
    /// Target re-selections after a lost health compare-and-set.
    pub attack_attempts: u32,
    pub claim_reward: i64,
    pub min_prompt_chars: usize,
    pub community_url_base: String,
    pub settlement_timeout_ms: u64,
    pub leaderboard_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: 100,
            max_health: 3,
            claim_attempts: 10,
            attack_attempts: 3,
            claim_reward: 10,
            min_prompt_chars: 3,
            community_url_base: "https://warpcast.com/~/channel/".to_string(),
            settlement_timeout_ms: 60_000,
            leaderboard_limit: 10,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_size == 0 {
            return Err("grid_size must be >= 1".to_string());
        }
        if self.max_health == 0 {
            return Err("max_health must be >= 1".to_string());
        }
        if self.claim_attempts == 0 || self.attack_attempts == 0 {
            return Err("claim_attempts and attack_attempts must be >= 1".to_string());
        }
        if self.claim_reward < 0 {
            return Err("claim_reward must not be negative".to_string());
        }
        Ok(())
    }

    pub fn grid_cells(&self) -> u64 {
        u64::from(self.grid_size) * u64::from(self.grid_size)
    }
}
