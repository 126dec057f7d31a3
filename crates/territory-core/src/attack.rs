//! Damage and capture of opponent tiles.
//!
//! A tile's health moves down by exactly one per successful attack. Reaching
//! zero hands the tile to the attacker at full health. Both writes are
//! conditional on the health that was read, so two concurrent attacks cannot
//! both land the same decrement.

use contracts::{GameConfig, SeasonId, Tile};
use rand::Rng;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::store::{StoreError, TileCapture, WorldStore};
use crate::{random_color, Actor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackOutcome {
    Hit { tile: Tile, remaining: u8 },
    Captured { tile: Tile },
}

impl AttackOutcome {
    pub fn tile(&self) -> &Tile {
        match self {
            Self::Hit { tile, .. } | Self::Captured { tile } => tile,
        }
    }
}

pub struct AttackResolver<'a> {
    store: &'a dyn WorldStore,
    config: &'a GameConfig,
}

impl<'a> AttackResolver<'a> {
    pub fn new(store: &'a dyn WorldStore, config: &'a GameConfig) -> Self {
        Self { store, config }
    }

    pub fn attack<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        season_id: SeasonId,
        attacker: &Actor<'_>,
    ) -> Result<AttackOutcome, EngineError> {
        self.config.validate().map_err(EngineError::validation)?;
        let max_attempts = self.config.attack_attempts.max(1);

        for attempt in 1..=max_attempts {
            let Some(target) = self
                .store
                .random_attackable_tile(season_id, attacker.caller_id)?
            else {
                return Err(EngineError::NoAttackableTarget);
            };

            match self.strike(&mut *rng, target, attacker) {
                Ok(outcome) => return Ok(outcome),
                Err(StoreError::Stale) => {
                    debug!(season_id, attempt, "attack.stale_target");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngineError::ContentionExhausted {
            attempts: max_attempts,
        })
    }

    fn strike<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        mut target: Tile,
        attacker: &Actor<'_>,
    ) -> Result<AttackOutcome, StoreError> {
        let before = target.health;
        let remaining = before.saturating_sub(1);

        if remaining > 0 {
            self.store
                .update_tile_health(target.tile_id, before, remaining)?;
            info!(
                x = target.x,
                y = target.y,
                remaining,
                caller_id = attacker.caller_id,
                "attack.hit"
            );
            target.health = remaining;
            return Ok(AttackOutcome::Hit {
                tile: target,
                remaining,
            });
        }

        let capture = TileCapture {
            owner_address: attacker.address.to_string(),
            owner_id: attacker.caller_id.to_string(),
            color: random_color(&mut *rng),
            health: self.config.max_health,
        };
        self.store.capture_tile(target.tile_id, before, &capture)?;
        info!(
            x = target.x,
            y = target.y,
            previous_owner = %target.owner_id,
            caller_id = attacker.caller_id,
            "attack.captured"
        );

        target.owner_address = capture.owner_address;
        target.owner_id = capture.owner_id;
        target.color = capture.color;
        target.health = capture.health;
        Ok(AttackOutcome::Captured { tile: target })
    }
}
