use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use contracts::{
    CommunityId, CommunityStanding, PlayerStanding, Season, SeasonId, Tile, TileId, TileView,
};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use territory_core::{NewTile, StoreError, TileCapture, WorldReader, WorldStore};
use tracing::info;

const TILE_COLUMNS: &str =
    "id, season_id, x, y, owner_address, owner_id, color, health, image_url, created_at_ms";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("sqlite connection lock poisoned")]
    Poisoned,
}

/// World store over a single SQLite connection.
///
/// The `(season_id, x, y)` unique index arbitrates claims and every health
/// write is conditional on the health that was read.
#[derive(Debug)]
pub struct SqliteWorldStore {
    conn: Mutex<Connection>,
}

impl SqliteWorldStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Deactivates every season and activates a fresh one atomically.
    pub fn start_season(&self, label: &str) -> Result<Season, PersistenceError> {
        let mut conn = self.conn.lock().map_err(|_| PersistenceError::Poisoned)?;
        let tx = conn.transaction()?;

        tx.execute("UPDATE seasons SET is_active = 0 WHERE is_active = 1", [])?;
        tx.execute(
            "INSERT INTO seasons (label, is_active, created_at_ms) VALUES (?1, 1, ?2)",
            params![label, now_ms()],
        )?;
        let season_id = tx.last_insert_rowid();
        tx.commit()?;

        info!(season_id, label, "season.started");
        Ok(Season {
            season_id,
            label: label.to_string(),
            is_active: true,
        })
    }

    pub fn seasons(&self) -> Result<Vec<Season>, PersistenceError> {
        let conn = self.conn.lock().map_err(|_| PersistenceError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT id, label, is_active FROM seasons ORDER BY id ASC")?;
        let rows = stmt.query_map([], season_from_row)?;

        let mut seasons = Vec::new();
        for row in rows {
            seasons.push(row?);
        }
        Ok(seasons)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        let conn = self.conn.get_mut().map_err(|_| PersistenceError::Poisoned)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        let conn = self.conn.get_mut().map_err(|_| PersistenceError::Poisoned)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS seasons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                created_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                season_id INTEGER NOT NULL REFERENCES seasons(id),
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                owner_address TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                color TEXT NOT NULL,
                health INTEGER NOT NULL CHECK (health >= 0),
                image_url TEXT,
                created_at_ms INTEGER NOT NULL,
                UNIQUE (season_id, x, y)
            );

            CREATE TABLE IF NOT EXISTS players (
                caller_id TEXT PRIMARY KEY,
                address TEXT,
                balance INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS communities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                reference_url TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memberships (
                caller_id TEXT PRIMARY KEY,
                community_id INTEGER NOT NULL REFERENCES communities(id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_seasons_single_active
                ON seasons(is_active) WHERE is_active = 1;
            CREATE INDEX IF NOT EXISTS idx_tiles_season_owner ON tiles(season_id, owner_id);
            CREATE INDEX IF NOT EXISTS idx_memberships_community ON memberships(community_id);
            ",
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at_ms)
             VALUES(1, 'initial_v1', ?1)",
            params![now_ms()],
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

impl WorldStore for SqliteWorldStore {
    fn active_season(&self) -> Result<Option<Season>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, label, is_active FROM seasons WHERE is_active = 1 LIMIT 1",
            [],
            season_from_row,
        )
        .optional()
        .map_err(classify)
    }

    fn tile_at(&self, season_id: SeasonId, x: u32, y: u32) -> Result<Option<Tile>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {TILE_COLUMNS} FROM tiles WHERE season_id = ?1 AND x = ?2 AND y = ?3"),
            params![season_id, x, y],
            tile_from_row,
        )
        .optional()
        .map_err(classify)
    }

    fn insert_tile(&self, tile: NewTile) -> Result<Tile, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tiles (
                season_id, x, y, owner_address, owner_id, color, health, created_at_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tile.season_id,
                tile.x,
                tile.y,
                tile.owner_address,
                tile.owner_id,
                tile.color,
                tile.health,
                tile.created_at_ms,
            ],
        )
        .map_err(classify)?;

        Ok(Tile {
            tile_id: conn.last_insert_rowid(),
            season_id: tile.season_id,
            x: tile.x,
            y: tile.y,
            owner_address: tile.owner_address,
            owner_id: tile.owner_id,
            color: tile.color,
            health: tile.health,
            image_url: None,
            created_at_ms: tile.created_at_ms,
        })
    }

    fn update_tile_health(
        &self,
        tile_id: TileId,
        expected_health: u8,
        new_health: u8,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE tiles SET health = ?3 WHERE id = ?1 AND health = ?2",
                params![tile_id, expected_health, new_health],
            )
            .map_err(classify)?;
        settle_conditional(&conn, tile_id, changed)
    }

    fn capture_tile(
        &self,
        tile_id: TileId,
        expected_health: u8,
        capture: &TileCapture,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE tiles
                 SET owner_address = ?3, owner_id = ?4, color = ?5, health = ?6
                 WHERE id = ?1 AND health = ?2",
                params![
                    tile_id,
                    expected_health,
                    capture.owner_address,
                    capture.owner_id,
                    capture.color,
                    capture.health,
                ],
            )
            .map_err(classify)?;
        settle_conditional(&conn, tile_id, changed)
    }

    fn random_attackable_tile(
        &self,
        season_id: SeasonId,
        attacker_id: &str,
    ) -> Result<Option<Tile>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {TILE_COLUMNS} FROM tiles
                 WHERE season_id = ?1 AND owner_id <> ?2
                 ORDER BY RANDOM() LIMIT 1"
            ),
            params![season_id, attacker_id],
            tile_from_row,
        )
        .optional()
        .map_err(classify)
    }

    fn latest_owned_tile(
        &self,
        season_id: SeasonId,
        owner_id: &str,
    ) -> Result<Option<Tile>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {TILE_COLUMNS} FROM tiles
                 WHERE season_id = ?1 AND owner_id = ?2
                 ORDER BY created_at_ms DESC, id DESC LIMIT 1"
            ),
            params![season_id, owner_id],
            tile_from_row,
        )
        .optional()
        .map_err(classify)
    }

    fn set_tile_image(&self, tile_id: TileId, image_url: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE tiles SET image_url = ?2 WHERE id = ?1",
                params![tile_id, image_url],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn upsert_player(&self, caller_id: &str, address: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO players (caller_id, address, balance) VALUES (?1, ?2, 0)
             ON CONFLICT(caller_id) DO UPDATE SET address = excluded.address",
            params![caller_id, address],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn increment_player_balance(&self, caller_id: &str, amount: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO players (caller_id, address, balance) VALUES (?1, NULL, ?2)
             ON CONFLICT(caller_id) DO UPDATE SET balance = balance + excluded.balance",
            params![caller_id, amount],
        )
        .map_err(classify)?;
        Ok(())
    }

    fn find_or_create_community(
        &self,
        name: &str,
        reference_url: &str,
    ) -> Result<CommunityId, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO communities (name, reference_url) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, reference_url],
        )
        .map_err(classify)?;
        conn.query_row(
            "SELECT id FROM communities WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .map_err(classify)
    }

    fn upsert_membership(
        &self,
        caller_id: &str,
        community_id: CommunityId,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO memberships (caller_id, community_id) VALUES (?1, ?2)
             ON CONFLICT(caller_id) DO UPDATE SET community_id = excluded.community_id",
            params![caller_id, community_id],
        )
        .map_err(classify)?;
        Ok(())
    }
}

impl WorldReader for SqliteWorldStore {
    fn season_tiles(&self, season_id: SeasonId) -> Result<Vec<TileView>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT x, y, color, image_url, owner_address
                 FROM tiles WHERE season_id = ?1 ORDER BY id ASC",
            )
            .map_err(classify)?;
        let rows = stmt
            .query_map(params![season_id], |row| {
                Ok(TileView {
                    x: row.get(0)?,
                    y: row.get(1)?,
                    color: row.get(2)?,
                    image_url: row.get(3)?,
                    owner_address: row.get(4)?,
                })
            })
            .map_err(classify)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    fn player_standings(
        &self,
        season_id: SeasonId,
        limit: usize,
    ) -> Result<Vec<PlayerStanding>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT t.owner_id, p.address, COUNT(*) AS tile_count, COALESCE(p.balance, 0)
                 FROM tiles t
                 LEFT JOIN players p ON p.caller_id = t.owner_id
                 WHERE t.season_id = ?1
                 GROUP BY t.owner_id
                 ORDER BY tile_count DESC, t.owner_id ASC
                 LIMIT ?2",
            )
            .map_err(classify)?;
        let rows = stmt
            .query_map(params![season_id, sql_limit(limit)], |row| {
                Ok(PlayerStanding {
                    caller_id: row.get(0)?,
                    address: row.get(1)?,
                    tile_count: count_from(row.get(2)?),
                    balance: row.get(3)?,
                })
            })
            .map_err(classify)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    fn community_standings(
        &self,
        season_id: SeasonId,
        limit: usize,
    ) -> Result<Vec<CommunityStanding>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.name, c.reference_url,
                        (SELECT COUNT(*) FROM tiles t
                         JOIN memberships tm ON tm.caller_id = t.owner_id
                         WHERE tm.community_id = c.id AND t.season_id = ?1) AS tile_count,
                        COUNT(m.caller_id) AS member_count
                 FROM communities c
                 JOIN memberships m ON m.community_id = c.id
                 GROUP BY c.id
                 ORDER BY tile_count DESC, member_count DESC, c.id ASC
                 LIMIT ?2",
            )
            .map_err(classify)?;
        let rows = stmt
            .query_map(params![season_id, sql_limit(limit)], |row| {
                Ok(CommunityStanding {
                    community_id: row.get(0)?,
                    name: row.get(1)?,
                    reference_url: row.get(2)?,
                    tile_count: count_from(row.get(3)?),
                    member_count: count_from(row.get(4)?),
                })
            })
            .map_err(classify)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(classify)
    }
}

/// Zero rows changed means the tile is gone or its health moved on.
fn settle_conditional(
    conn: &Connection,
    tile_id: TileId,
    changed: usize,
) -> Result<(), StoreError> {
    if changed > 0 {
        return Ok(());
    }
    let exists = conn
        .query_row("SELECT 1 FROM tiles WHERE id = ?1", params![tile_id], |_| {
            Ok(())
        })
        .optional()
        .map_err(classify)?;
    Err(match exists {
        Some(()) => StoreError::Stale,
        None => StoreError::NotFound,
    })
}

fn classify(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StoreError::Conflict
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::NotFound,
            _ => {}
        }
    }
    StoreError::Backend(err.to_string())
}

fn season_from_row(row: &Row<'_>) -> rusqlite::Result<Season> {
    Ok(Season {
        season_id: row.get(0)?,
        label: row.get(1)?,
        is_active: row.get(2)?,
    })
}

fn tile_from_row(row: &Row<'_>) -> rusqlite::Result<Tile> {
    Ok(Tile {
        tile_id: row.get(0)?,
        season_id: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        owner_address: row.get(4)?,
        owner_id: row.get(5)?,
        color: row.get(6)?,
        health: row.get(7)?,
        image_url: row.get(8)?,
        created_at_ms: row.get(9)?,
    })
}

fn count_from(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
