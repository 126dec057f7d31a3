//! In-process world store with the same constraint semantics as the SQL store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use contracts::{
    CommunityId, CommunityStanding, PlayerStanding, Season, SeasonId, Tile, TileId, TileView,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::store::{NewTile, StoreError, TileCapture, WorldReader, WorldStore};

#[derive(Debug, Clone, Default)]
struct PlayerRow {
    address: Option<String>,
    balance: i64,
}

#[derive(Debug, Clone)]
struct CommunityRow {
    name: String,
    reference_url: String,
}

#[derive(Debug)]
struct MemoryInner {
    seasons: Vec<Season>,
    tiles: BTreeMap<TileId, Tile>,
    tile_by_coord: HashMap<(SeasonId, u32, u32), TileId>,
    players: BTreeMap<String, PlayerRow>,
    communities: BTreeMap<CommunityId, CommunityRow>,
    community_by_name: HashMap<String, CommunityId>,
    memberships: BTreeMap<String, CommunityId>,
    next_tile_id: TileId,
    rng: StdRng,
}

#[derive(Debug)]
pub struct MemoryWorldStore {
    inner: Mutex<MemoryInner>,
}

impl Default for MemoryWorldStore {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl MemoryWorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds target selection so attack tests are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                seasons: Vec::new(),
                tiles: BTreeMap::new(),
                tile_by_coord: HashMap::new(),
                players: BTreeMap::new(),
                communities: BTreeMap::new(),
                community_by_name: HashMap::new(),
                memberships: BTreeMap::new(),
                next_tile_id: 1,
                rng,
            }),
        }
    }

    /// Deactivates every season and activates a fresh one.
    pub fn start_season(&self, label: &str) -> Result<Season, StoreError> {
        let mut inner = self.lock()?;
        for season in &mut inner.seasons {
            season.is_active = false;
        }
        let season = Season {
            season_id: inner.seasons.len() as SeasonId + 1,
            label: label.to_string(),
            is_active: true,
        };
        inner.seasons.push(season.clone());
        Ok(season)
    }

    pub fn tiles(&self, season_id: SeasonId) -> Result<Vec<Tile>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tiles
            .values()
            .filter(|tile| tile.season_id == season_id)
            .cloned()
            .collect())
    }

    pub fn player_balance(&self, caller_id: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.players.get(caller_id).map(|player| player.balance))
    }

    pub fn membership(&self, caller_id: &str) -> Result<Option<(CommunityId, String)>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.memberships.get(caller_id).and_then(|id| {
            inner
                .communities
                .get(id)
                .map(|community| (*id, community.name.clone()))
        }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl WorldStore for MemoryWorldStore {
    fn active_season(&self) -> Result<Option<Season>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.seasons.iter().find(|season| season.is_active).cloned())
    }

    fn tile_at(&self, season_id: SeasonId, x: u32, y: u32) -> Result<Option<Tile>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tile_by_coord
            .get(&(season_id, x, y))
            .and_then(|id| inner.tiles.get(id))
            .cloned())
    }

    fn insert_tile(&self, tile: NewTile) -> Result<Tile, StoreError> {
        let mut inner = self.lock()?;
        let key = (tile.season_id, tile.x, tile.y);
        if inner.tile_by_coord.contains_key(&key) {
            return Err(StoreError::Conflict);
        }

        let tile_id = inner.next_tile_id;
        inner.next_tile_id += 1;
        let stored = Tile {
            tile_id,
            season_id: tile.season_id,
            x: tile.x,
            y: tile.y,
            owner_address: tile.owner_address,
            owner_id: tile.owner_id,
            color: tile.color,
            health: tile.health,
            image_url: None,
            created_at_ms: tile.created_at_ms,
        };
        inner.tile_by_coord.insert(key, tile_id);
        inner.tiles.insert(tile_id, stored.clone());
        Ok(stored)
    }

    fn update_tile_health(
        &self,
        tile_id: TileId,
        expected_health: u8,
        new_health: u8,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let tile = inner.tiles.get_mut(&tile_id).ok_or(StoreError::NotFound)?;
        if tile.health != expected_health {
            return Err(StoreError::Stale);
        }
        tile.health = new_health;
        Ok(())
    }

    fn capture_tile(
        &self,
        tile_id: TileId,
        expected_health: u8,
        capture: &TileCapture,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let tile = inner.tiles.get_mut(&tile_id).ok_or(StoreError::NotFound)?;
        if tile.health != expected_health {
            return Err(StoreError::Stale);
        }
        tile.owner_address = capture.owner_address.clone();
        tile.owner_id = capture.owner_id.clone();
        tile.color = capture.color.clone();
        tile.health = capture.health;
        Ok(())
    }

    fn random_attackable_tile(
        &self,
        season_id: SeasonId,
        attacker_id: &str,
    ) -> Result<Option<Tile>, StoreError> {
        let mut inner = self.lock()?;
        let eligible: Vec<TileId> = inner
            .tiles
            .values()
            .filter(|tile| tile.season_id == season_id && tile.owner_id != attacker_id)
            .map(|tile| tile.tile_id)
            .collect();
        let picked = eligible.choose(&mut inner.rng).copied();
        Ok(picked.and_then(|id| inner.tiles.get(&id).cloned()))
    }

    fn latest_owned_tile(
        &self,
        season_id: SeasonId,
        owner_id: &str,
    ) -> Result<Option<Tile>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tiles
            .values()
            .filter(|tile| tile.season_id == season_id && tile.owner_id == owner_id)
            .max_by_key(|tile| (tile.created_at_ms, tile.tile_id))
            .cloned())
    }

    fn set_tile_image(&self, tile_id: TileId, image_url: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let tile = inner.tiles.get_mut(&tile_id).ok_or(StoreError::NotFound)?;
        tile.image_url = Some(image_url.to_string());
        Ok(())
    }

    fn upsert_player(&self, caller_id: &str, address: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .players
            .entry(caller_id.to_string())
            .or_default()
            .address = Some(address.to_string());
        Ok(())
    }

    fn increment_player_balance(&self, caller_id: &str, amount: i64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let player = inner.players.entry(caller_id.to_string()).or_default();
        player.balance = player.balance.saturating_add(amount);
        Ok(())
    }

    fn find_or_create_community(
        &self,
        name: &str,
        reference_url: &str,
    ) -> Result<CommunityId, StoreError> {
        let mut inner = self.lock()?;
        if let Some(id) = inner.community_by_name.get(name) {
            return Ok(*id);
        }
        let id = inner.communities.len() as CommunityId + 1;
        inner.communities.insert(
            id,
            CommunityRow {
                name: name.to_string(),
                reference_url: reference_url.to_string(),
            },
        );
        inner.community_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    fn upsert_membership(
        &self,
        caller_id: &str,
        community_id: CommunityId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.communities.contains_key(&community_id) {
            return Err(StoreError::NotFound);
        }
        inner
            .memberships
            .insert(caller_id.to_string(), community_id);
        Ok(())
    }
}

impl WorldReader for MemoryWorldStore {
    fn season_tiles(&self, season_id: SeasonId) -> Result<Vec<TileView>, StoreError> {
        Ok(self.tiles(season_id)?.iter().map(Tile::view).collect())
    }

    fn player_standings(
        &self,
        season_id: SeasonId,
        limit: usize,
    ) -> Result<Vec<PlayerStanding>, StoreError> {
        let inner = self.lock()?;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for tile in inner.tiles.values().filter(|t| t.season_id == season_id) {
            *counts.entry(tile.owner_id.as_str()).or_insert(0) += 1;
        }

        let mut standings: Vec<PlayerStanding> = counts
            .into_iter()
            .map(|(caller_id, tile_count)| {
                let player = inner.players.get(caller_id).cloned().unwrap_or_default();
                PlayerStanding {
                    caller_id: caller_id.to_string(),
                    address: player.address,
                    tile_count,
                    balance: player.balance,
                }
            })
            .collect();
        standings.sort_by(|a, b| {
            b.tile_count
                .cmp(&a.tile_count)
                .then_with(|| a.caller_id.cmp(&b.caller_id))
        });
        standings.truncate(limit);
        Ok(standings)
    }

    fn community_standings(
        &self,
        season_id: SeasonId,
        limit: usize,
    ) -> Result<Vec<CommunityStanding>, StoreError> {
        let inner = self.lock()?;
        let mut standings: Vec<CommunityStanding> = inner
            .communities
            .iter()
            .filter_map(|(id, community)| {
                let members: Vec<&str> = inner
                    .memberships
                    .iter()
                    .filter(|(_, member_of)| *member_of == id)
                    .map(|(caller_id, _)| caller_id.as_str())
                    .collect();
                if members.is_empty() {
                    return None;
                }
                let tile_count = inner
                    .tiles
                    .values()
                    .filter(|t| t.season_id == season_id && members.contains(&t.owner_id.as_str()))
                    .count() as u64;
                Some(CommunityStanding {
                    community_id: *id,
                    name: community.name.clone(),
                    reference_url: community.reference_url.clone(),
                    tile_count,
                    member_count: members.len() as u64,
                })
            })
            .collect();
        standings.sort_by(|a, b| {
            b.tile_count
                .cmp(&a.tile_count)
                .then_with(|| b.member_count.cmp(&a.member_count))
                .then_with(|| a.community_id.cmp(&b.community_id))
        });
        standings.truncate(limit);
        Ok(standings)
    }
}
