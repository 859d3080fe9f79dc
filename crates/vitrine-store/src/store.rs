//! SQLite-backed record store, one row per showcase keyed by integer
//! block coordinates.

use std::fmt;
use std::path::Path;

use contracts::{BlockPos, ShowcaseRecord, WorldId};
use rusqlite::{params, Connection};

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct WorldStore {
    conn: Connection,
}

impl WorldStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Throwaway store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn save(
        &mut self,
        world: &WorldId,
        pos: BlockPos,
        record: &ShowcaseRecord,
        tick: u64,
    ) -> Result<(), PersistenceError> {
        let payload_json = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO showcases (world, x, y, z, kind, owner, payload_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(world, x, y, z) DO UPDATE SET
                kind = excluded.kind,
                owner = excluded.owner,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
            params![
                world.as_str(),
                pos.x,
                pos.y,
                pos.z,
                record.kind.to_string(),
                record.owner.as_str(),
                payload_json,
                tick_stamp(tick),
            ],
        )?;
        Ok(())
    }

    /// Delete a record. Returns whether a row existed.
    pub fn delete(&mut self, world: &WorldId, pos: BlockPos) -> Result<bool, PersistenceError> {
        let removed = self.conn.execute(
            "DELETE FROM showcases WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
            params![world.as_str(), pos.x, pos.y, pos.z],
        )?;
        Ok(removed > 0)
    }

    pub fn load_world(
        &self,
        world: &WorldId,
    ) -> Result<Vec<(BlockPos, ShowcaseRecord)>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT x, y, z, payload_json
             FROM showcases
             WHERE world = ?1
             ORDER BY x ASC, y ASC, z ASC",
        )?;

        let rows = stmt.query_map(params![world.as_str()], |row| {
            Ok((
                BlockPos::new(row.get(0)?, row.get(1)?, row.get(2)?),
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (pos, payload) = row?;
            records.push((pos, serde_json::from_str::<ShowcaseRecord>(&payload)?));
        }
        Ok(records)
    }

    /// Every world that has at least one persisted showcase.
    pub fn worlds(&self) -> Result<Vec<WorldId>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT world FROM showcases ORDER BY world ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut worlds = Vec::new();
        for row in rows {
            worlds.push(WorldId::new(row?));
        }
        Ok(worlds)
    }

    pub fn count(&self, world: &WorldId) -> Result<u64, PersistenceError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM showcases WHERE world = ?1",
            params![world.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS showcases (
                world TEXT NOT NULL,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                z INTEGER NOT NULL,
                kind TEXT NOT NULL,
                owner TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (world, x, y, z)
            );

            CREATE INDEX IF NOT EXISTS idx_showcases_world ON showcases(world);
            CREATE INDEX IF NOT EXISTS idx_showcases_owner ON showcases(world, owner);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'tick-000000')",
            [],
        )?;

        Ok(())
    }
}

fn tick_stamp(tick: u64) -> String {
    format!("tick-{tick:06}")
}
