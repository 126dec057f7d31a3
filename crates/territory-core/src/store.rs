//! The narrow query surface the engine needs from the relation store.
//!
//! Every method is one atomic operation. The store's uniqueness constraint on
//! `(season_id, x, y)` and its conditional single-row updates are the only
//! concurrency control in the system.

use contracts::{
    CommunityId, CommunityStanding, PlayerStanding, Season, SeasonId, Tile, TileId, TileView,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A tile already exists at `(season_id, x, y)`.
    #[error("tile already exists at that coordinate")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// A conditional update lost against a concurrent writer.
    #[error("tile changed since it was read")]
    Stale,
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTile {
    pub season_id: SeasonId,
    pub x: u32,
    pub y: u32,
    pub owner_address: String,
    pub owner_id: String,
    pub color: String,
    pub health: u8,
    pub created_at_ms: i64,
}

/// Ownership transfer applied when a tile's health runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCapture {
    pub owner_address: String,
    pub owner_id: String,
    pub color: String,
    /// Health after capture; always the configured maximum.
    pub health: u8,
}

pub trait WorldStore: Send + Sync {
    fn active_season(&self) -> Result<Option<Season>, StoreError>;

    fn tile_at(&self, season_id: SeasonId, x: u32, y: u32) -> Result<Option<Tile>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the coordinate is taken, and
    /// never overwrites.
    fn insert_tile(&self, tile: NewTile) -> Result<Tile, StoreError>;

    /// Sets health only if it still equals `expected_health`.
    fn update_tile_health(
        &self,
        tile_id: TileId,
        expected_health: u8,
        new_health: u8,
    ) -> Result<(), StoreError>;

    /// Transfers ownership only if health still equals `expected_health`.
    fn capture_tile(
        &self,
        tile_id: TileId,
        expected_health: u8,
        capture: &TileCapture,
    ) -> Result<(), StoreError>;

    /// A random tile in the season not owned by `attacker_id`.
    fn random_attackable_tile(
        &self,
        season_id: SeasonId,
        attacker_id: &str,
    ) -> Result<Option<Tile>, StoreError>;

    /// The caller's most recently created tile in the season.
    fn latest_owned_tile(
        &self,
        season_id: SeasonId,
        owner_id: &str,
    ) -> Result<Option<Tile>, StoreError>;

    fn set_tile_image(&self, tile_id: TileId, image_url: &str) -> Result<(), StoreError>;

    fn upsert_player(&self, caller_id: &str, address: &str) -> Result<(), StoreError>;

    fn increment_player_balance(&self, caller_id: &str, amount: i64) -> Result<(), StoreError>;

    fn find_or_create_community(
        &self,
        name: &str,
        reference_url: &str,
    ) -> Result<CommunityId, StoreError>;

    /// Replaces any prior membership of `caller_id`.
    fn upsert_membership(&self, caller_id: &str, community_id: CommunityId)
        -> Result<(), StoreError>;
}

/// Read models for the renderer and the leaderboards.
pub trait WorldReader: Send + Sync {
    fn season_tiles(&self, season_id: SeasonId) -> Result<Vec<TileView>, StoreError>;

    fn player_standings(
        &self,
        season_id: SeasonId,
        limit: usize,
    ) -> Result<Vec<PlayerStanding>, StoreError>;

    fn community_standings(
        &self,
        season_id: SeasonId,
        limit: usize,
    ) -> Result<Vec<CommunityStanding>, StoreError>;
}
