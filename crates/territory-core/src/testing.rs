//! A memory store with injectable races and faults for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use contracts::{CommunityId, Season, SeasonId, Tile, TileId};

use crate::memory::MemoryWorldStore;
use crate::store::{NewTile, StoreError, TileCapture, WorldStore};

#[derive(Debug, Default)]
pub(crate) struct ScriptedStore {
    pub(crate) inner: MemoryWorldStore,
    race_owner: Mutex<Option<String>>,
    fail_player_writes: AtomicBool,
    stale_writes: AtomicU32,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryWorldStore::with_seed(17),
            ..Self::default()
        }
    }

    /// The next insert finds its coordinate taken by `owner_id`.
    pub(crate) fn race_next_insert(&self, owner_id: &str) {
        if let Ok(mut slot) = self.race_owner.lock() {
            *slot = Some(owner_id.to_string());
        }
    }

    pub(crate) fn fail_player_writes(&self) {
        self.fail_player_writes.store(true, Ordering::SeqCst);
    }

    /// The next `count` health writes lose their compare-and-set.
    pub(crate) fn stale_next_writes(&self, count: u32) {
        self.stale_writes.store(count, Ordering::SeqCst);
    }

    fn take_stale(&self) -> bool {
        self.stale_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn player_write(&self) -> Result<(), StoreError> {
        if self.fail_player_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("players table unavailable".to_string()));
        }
        Ok(())
    }
}

impl WorldStore for ScriptedStore {
    fn active_season(&self) -> Result<Option<Season>, StoreError> {
        self.inner.active_season()
    }

    fn tile_at(&self, season_id: SeasonId, x: u32, y: u32) -> Result<Option<Tile>, StoreError> {
        self.inner.tile_at(season_id, x, y)
    }

    fn insert_tile(&self, tile: NewTile) -> Result<Tile, StoreError> {
        let rival = self
            .race_owner
            .lock()
            .map_err(|_| StoreError::Backend("poisoned".to_string()))?
            .take();
        if let Some(owner_id) = rival {
            self.inner.insert_tile(NewTile {
                owner_id: owner_id.clone(),
                owner_address: format!("0x{owner_id}"),
                ..tile.clone()
            })?;
        }
        self.inner.insert_tile(tile)
    }

    fn update_tile_health(
        &self,
        tile_id: TileId,
        expected_health: u8,
        new_health: u8,
    ) -> Result<(), StoreError> {
        if self.take_stale() {
            return Err(StoreError::Stale);
        }
        self.inner
            .update_tile_health(tile_id, expected_health, new_health)
    }

    fn capture_tile(
        &self,
        tile_id: TileId,
        expected_health: u8,
        capture: &TileCapture,
    ) -> Result<(), StoreError> {
        if self.take_stale() {
            return Err(StoreError::Stale);
        }
        self.inner.capture_tile(tile_id, expected_health, capture)
    }

    fn random_attackable_tile(
        &self,
        season_id: SeasonId,
        attacker_id: &str,
    ) -> Result<Option<Tile>, StoreError> {
        self.inner.random_attackable_tile(season_id, attacker_id)
    }

    fn latest_owned_tile(
        &self,
        season_id: SeasonId,
        owner_id: &str,
    ) -> Result<Option<Tile>, StoreError> {
        self.inner.latest_owned_tile(season_id, owner_id)
    }

    fn set_tile_image(&self, tile_id: TileId, image_url: &str) -> Result<(), StoreError> {
        self.inner.set_tile_image(tile_id, image_url)
    }

    fn upsert_player(&self, caller_id: &str, address: &str) -> Result<(), StoreError> {
        self.player_write()?;
        self.inner.upsert_player(caller_id, address)
    }

    fn increment_player_balance(&self, caller_id: &str, amount: i64) -> Result<(), StoreError> {
        self.player_write()?;
        self.inner.increment_player_balance(caller_id, amount)
    }

    fn find_or_create_community(
        &self,
        name: &str,
        reference_url: &str,
    ) -> Result<CommunityId, StoreError> {
        self.inner.find_or_create_community(name, reference_url)
    }

    fn upsert_membership(
        &self,
        caller_id: &str,
        community_id: CommunityId,
    ) -> Result<(), StoreError> {
        self.inner.upsert_membership(caller_id, community_id)
    }
}
