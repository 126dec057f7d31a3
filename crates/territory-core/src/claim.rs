//! Random free-cell allocation under contention.
//!
//! Coordinates are sampled uniformly and tried in turn; the store's uniqueness
//! constraint arbitrates racing claimants. This only stays cheap while most of
//! the grid is free: as occupancy grows the bounded search fails more often, so
//! `claim_attempts` is a scaling knob rather than a correctness one.

use std::time::Duration;

use contracts::{GameConfig, SeasonId, Tile};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::external::{ChainSettlement, Confirmation};
use crate::store::{NewTile, StoreError, WorldStore};
use crate::{now_ms, random_color, Actor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub tile: Tile,
    pub attempts: u32,
    pub settlement_tx: Option<String>,
    /// Set when the tile was recorded but the reward step failed.
    pub reward_warning: Option<String>,
}

pub struct ClaimResolver<'a> {
    store: &'a dyn WorldStore,
    settlement: Option<&'a dyn ChainSettlement>,
    config: &'a GameConfig,
}

impl<'a> ClaimResolver<'a> {
    pub fn new(store: &'a dyn WorldStore, config: &'a GameConfig) -> Self {
        Self {
            store,
            settlement: None,
            config,
        }
    }

    pub fn with_settlement(mut self, settlement: Option<&'a dyn ChainSettlement>) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn claim<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        season_id: SeasonId,
        claimant: &Actor<'_>,
    ) -> Result<ClaimOutcome, EngineError> {
        self.config.validate().map_err(EngineError::validation)?;
        let max_attempts = self.config.claim_attempts.max(1);

        for attempt in 1..=max_attempts {
            let x = rng.gen_range(0..self.config.grid_size);
            let y = rng.gen_range(0..self.config.grid_size);

            if self.store.tile_at(season_id, x, y)?.is_some() {
                debug!(season_id, x, y, attempt, "claim.cell_occupied");
                continue;
            }

            let settlement_tx = match self.settlement {
                Some(chain) => Some(self.settle(chain, claimant, x, y)?),
                None => None,
            };

            let new_tile = NewTile {
                season_id,
                x,
                y,
                owner_address: claimant.address.to_string(),
                owner_id: claimant.caller_id.to_string(),
                color: random_color(&mut *rng),
                health: self.config.max_health,
                created_at_ms: now_ms(),
            };

            let tile = match (self.store.insert_tile(new_tile), settlement_tx.as_deref()) {
                (Ok(tile), _) => tile,
                (Err(StoreError::Conflict), None) => {
                    debug!(season_id, x, y, attempt, "claim.lost_race");
                    continue;
                }
                (Err(source), Some(tx_ref)) => {
                    error!(
                        tx_ref,
                        x,
                        y,
                        season_id,
                        caller_id = claimant.caller_id,
                        error = %source,
                        "claim.reconciliation_needed"
                    );
                    return Err(EngineError::ReconciliationNeeded {
                        tx_ref: tx_ref.to_string(),
                        x,
                        y,
                        source,
                    });
                }
                (Err(other), None) => return Err(other.into()),
            };

            info!(
                season_id,
                x,
                y,
                attempt,
                caller_id = claimant.caller_id,
                "claim.committed"
            );
            let reward_warning = self.reward(claimant).err();
            return Ok(ClaimOutcome {
                tile,
                attempts: attempt,
                settlement_tx,
                reward_warning,
            });
        }

        Err(EngineError::NoAvailableCell {
            attempts: max_attempts,
        })
    }

    fn settle(
        &self,
        chain: &dyn ChainSettlement,
        claimant: &Actor<'_>,
        x: u32,
        y: u32,
    ) -> Result<String, EngineError> {
        let tx_ref = chain
            .submit_claim(claimant.address, x, y)
            .map_err(|err| EngineError::external("settlement", err.to_string()))?;

        let timeout = Duration::from_millis(self.config.settlement_timeout_ms);
        match chain.await_confirmation(&tx_ref, timeout) {
            Confirmation::Confirmed => Ok(tx_ref),
            Confirmation::Failed(reason) => {
                warn!(tx_ref, x, y, %reason, "claim.settlement_failed");
                Err(EngineError::external("settlement", reason))
            }
            Confirmation::Unknown => {
                warn!(tx_ref, x, y, "claim.settlement_unconfirmed");
                Err(EngineError::external(
                    "settlement",
                    format!("transaction {tx_ref} unconfirmed after {timeout:?}"),
                ))
            }
        }
    }

    /// Best effort: the tile is already authoritative, so failures only warn.
    fn reward(&self, claimant: &Actor<'_>) -> Result<(), String> {
        let result = self
            .store
            .upsert_player(claimant.caller_id, claimant.address)
            .and_then(|()| {
                self.store
                    .increment_player_balance(claimant.caller_id, self.config.claim_reward)
            });

        result.map_err(|err| {
            warn!(caller_id = claimant.caller_id, error = %err, "claim.reward_failed");
            format!("Reward could not be credited: {err}")
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::external::ExternalError;
    use crate::memory::MemoryWorldStore;
    use crate::testing::ScriptedStore;

    const ALICE: Actor<'static> = Actor {
        caller_id: "101",
        address: "0xaaa",
    };

    fn config() -> GameConfig {
        GameConfig {
            grid_size: 10,
            ..GameConfig::default()
        }
    }

    struct FakeChain {
        submitted: AtomicU32,
        submit_error: Option<ExternalError>,
        confirmation: Confirmation,
    }

    impl FakeChain {
        fn answering(confirmation: Confirmation) -> Self {
            Self {
                submitted: AtomicU32::new(0),
                submit_error: None,
                confirmation,
            }
        }

        fn rejecting(error: ExternalError) -> Self {
            Self {
                submit_error: Some(error),
                ..Self::answering(Confirmation::Confirmed)
            }
        }
    }

    impl ChainSettlement for FakeChain {
        fn submit_claim(&self, _address: &str, x: u32, y: u32) -> Result<String, ExternalError> {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            match &self.submit_error {
                Some(error) => Err(error.clone()),
                None => Ok(format!("0xtx{x}{y}")),
            }
        }

        fn await_confirmation(&self, _tx_ref: &str, _timeout: Duration) -> Confirmation {
            self.confirmation.clone()
        }
    }

    #[test]
    fn claim_records_full_health_tile_and_rewards() {
        let store = MemoryWorldStore::with_seed(1);
        let season = store.start_season("s1").expect("season");
        let config = config();
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = ClaimResolver::new(&store, &config)
            .claim(&mut rng, season.season_id, &ALICE)
            .expect("claim");

        assert_eq!(outcome.tile.health, config.max_health);
        assert_eq!(outcome.tile.owner_id, "101");
        assert!(outcome.tile.x < 10 && outcome.tile.y < 10);
        assert!(outcome.tile.color.starts_with('#') && outcome.tile.color.len() == 7);
        assert!(outcome.reward_warning.is_none());
        assert_eq!(store.player_balance("101").expect("balance"), Some(10));
    }

    #[test]
    fn lost_race_resamples_instead_of_double_claiming() {
        let store = ScriptedStore::new();
        store.race_next_insert("202");
        let season = store.inner.start_season("s1").expect("season");
        let config = config();
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = ClaimResolver::new(&store, &config)
            .claim(&mut rng, season.season_id, &ALICE)
            .expect("claim");

        assert!(outcome.attempts >= 2);
        let tiles = store.inner.tiles(season.season_id).expect("tiles");
        assert_eq!(tiles.len(), 2);
        let rival = tiles.iter().find(|t| t.owner_id == "202").expect("rival");
        assert_ne!(rival.coords(), outcome.tile.coords());
    }

    #[test]
    fn full_grid_exhausts_attempts() {
        let store = MemoryWorldStore::with_seed(1);
        let season = store.start_season("s1").expect("season");
        let config = GameConfig {
            grid_size: 1,
            claim_attempts: 4,
            ..GameConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let resolver = ClaimResolver::new(&store, &config);
        resolver
            .claim(&mut rng, season.season_id, &ALICE)
            .expect("only cell");

        let err = resolver
            .claim(&mut rng, season.season_id, &ALICE)
            .unwrap_err();
        assert!(matches!(err, EngineError::NoAvailableCell { attempts: 4 }));
    }

    #[test]
    fn reward_failure_is_a_warning_not_a_failed_claim() {
        let store = ScriptedStore::new();
        store.fail_player_writes();
        let season = store.inner.start_season("s1").expect("season");
        let config = config();
        let mut rng = StdRng::seed_from_u64(5);

        let outcome = ClaimResolver::new(&store, &config)
            .claim(&mut rng, season.season_id, &ALICE)
            .expect("claim still succeeds");

        assert!(outcome.reward_warning.is_some());
        assert_eq!(store.inner.tiles(season.season_id).expect("tiles").len(), 1);
    }

    #[test]
    fn unconfirmed_settlement_writes_nothing() {
        let store = MemoryWorldStore::with_seed(1);
        let season = store.start_season("s1").expect("season");
        let config = config();
        let chain = FakeChain::answering(Confirmation::Unknown);
        let mut rng = StdRng::seed_from_u64(5);

        let err = ClaimResolver::new(&store, &config)
            .with_settlement(Some(&chain))
            .claim(&mut rng, season.season_id, &ALICE)
            .unwrap_err();

        assert!(matches!(err, EngineError::External { service: "settlement", .. }));
        assert!(store.tiles(season.season_id).expect("tiles").is_empty());
    }

    #[test]
    fn failed_settlement_writes_nothing() {
        let store = MemoryWorldStore::with_seed(1);
        let season = store.start_season("s1").expect("season");
        let config = config();
        let chain = FakeChain::answering(Confirmation::Failed("reverted".to_string()));
        let mut rng = StdRng::seed_from_u64(5);

        let err = ClaimResolver::new(&store, &config)
            .with_settlement(Some(&chain))
            .claim(&mut rng, season.season_id, &ALICE)
            .unwrap_err();

        assert!(matches!(
            &err,
            EngineError::External { service: "settlement", message } if message == "reverted"
        ));
        assert!(store.tiles(season.season_id).expect("tiles").is_empty());
        assert_eq!(store.player_balance("101").expect("balance"), None);
    }

    #[test]
    fn rejected_submission_writes_nothing() {
        for error in [
            ExternalError::Timeout,
            ExternalError::Failed("nonce too low".to_string()),
        ] {
            let store = MemoryWorldStore::with_seed(1);
            let season = store.start_season("s1").expect("season");
            let config = config();
            let chain = FakeChain::rejecting(error);
            let mut rng = StdRng::seed_from_u64(5);

            let err = ClaimResolver::new(&store, &config)
                .with_settlement(Some(&chain))
                .claim(&mut rng, season.season_id, &ALICE)
                .unwrap_err();

            assert!(matches!(err, EngineError::External { service: "settlement", .. }));
            assert_eq!(chain.submitted.load(Ordering::SeqCst), 1);
            assert!(store.tiles(season.season_id).expect("tiles").is_empty());
        }
    }

    #[test]
    fn unusable_config_fails_validation_instead_of_panicking() {
        for config in [
            GameConfig {
                grid_size: 0,
                ..GameConfig::default()
            },
            GameConfig {
                max_health: 0,
                ..GameConfig::default()
            },
        ] {
            let store = MemoryWorldStore::with_seed(1);
            let season = store.start_season("s1").expect("season");
            let mut rng = StdRng::seed_from_u64(5);

            let err = ClaimResolver::new(&store, &config)
                .claim(&mut rng, season.season_id, &ALICE)
                .unwrap_err();

            assert!(matches!(err, EngineError::Validation(_)));
            assert!(store.tiles(season.season_id).expect("tiles").is_empty());
        }
    }

    #[test]
    fn store_failure_after_settlement_needs_reconciliation_and_is_not_retried() {
        let store = ScriptedStore::new();
        store.race_next_insert("202");
        let season = store.inner.start_season("s1").expect("season");
        let config = config();
        let chain = FakeChain::answering(Confirmation::Confirmed);
        let mut rng = StdRng::seed_from_u64(5);

        let err = ClaimResolver::new(&store, &config)
            .with_settlement(Some(&chain))
            .claim(&mut rng, season.season_id, &ALICE)
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::ReconciliationNeeded {
                source: StoreError::Conflict,
                ..
            }
        ));
        assert_eq!(chain.submitted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn confirmed_settlement_is_reported_on_the_outcome() {
        let store = MemoryWorldStore::with_seed(1);
        let season = store.start_season("s1").expect("season");
        let config = config();
        let chain = FakeChain::answering(Confirmation::Confirmed);
        let mut rng = StdRng::seed_from_u64(11);

        let outcome = ClaimResolver::new(&store, &config)
            .with_settlement(Some(&chain))
            .claim(&mut rng, season.season_id, &ALICE)
            .expect("claim");

        let (x, y) = outcome.tile.coords();
        assert_eq!(outcome.settlement_tx, Some(format!("0xtx{x}{y}")));
    }
}
