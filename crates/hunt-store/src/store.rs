use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use uuid::Uuid;

use hunt_core::time::{now_iso8601, now_unix_millis};
use hunt_core::{GameSession, GameSettings, MapId, PersistenceError, ProgressStore, TreasureId};

use crate::error::{Result, StoreError};
use crate::schema;

const SETTINGS_KEY: &str = "settings";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Sessions ---

    /// Upsert the session row and add any new discoveries, atomically.
    /// Discoveries already stored keep their original timestamp.
    pub fn save_session(&self, session: &GameSession) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        // updated_at is strictly increasing so "latest" is well defined even
        // within one millisecond.
        tx.execute(
            "INSERT INTO sessions (id, map_id, started_at, total_points, is_active, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5,
                     MAX(?6, COALESCE((SELECT MAX(updated_at) FROM sessions), 0) + 1))
             ON CONFLICT(id) DO UPDATE SET
                 total_points = excluded.total_points,
                 is_active    = excluded.is_active,
                 updated_at   = excluded.updated_at",
            params![
                session.id.to_string(),
                session.map_id.as_str(),
                to_sql_int(session.started_at)?,
                session.total_points(),
                session.is_active,
                to_sql_int(now_unix_millis())?,
            ],
        )?;

        let now = now_iso8601();
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO discoveries (session_id, treasure_id, discovered_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for treasure in session.discovered() {
                insert.execute(params![session.id.to_string(), treasure.as_str(), now])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            session = %session.id,
            map = %session.map_id,
            points = session.total_points(),
            "saved session"
        );
        Ok(())
    }

    /// Most recently saved session for `map_id`.
    pub fn load_session(&self, map_id: &MapId) -> Result<Option<GameSession>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, started_at, total_points, is_active FROM sessions
                 WHERE map_id = ?1 ORDER BY updated_at DESC LIMIT 1",
                [map_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, started_at, total_points, is_active)) = row else {
            return Ok(None);
        };
        let discovered = self.load_discoveries(&id)?;
        Ok(Some(GameSession::restore(
            parse_uuid(&id)?,
            map_id.clone(),
            from_sql_int(started_at)?,
            discovered,
            total_points,
            is_active,
        )))
    }

    /// Every stored session, oldest update first.
    pub fn list_sessions(&self) -> Result<Vec<GameSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, map_id, started_at, total_points, is_active FROM sessions
             ORDER BY updated_at",
        )?;
        let rows: Vec<(String, String, i64, u32, bool)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(id, map_id, started_at, total_points, is_active)| {
                let discovered = self.load_discoveries(&id)?;
                Ok(GameSession::restore(
                    parse_uuid(&id)?,
                    MapId::new(map_id),
                    from_sql_int(started_at)?,
                    discovered,
                    total_points,
                    is_active,
                ))
            })
            .collect()
    }

    fn load_discoveries(&self, session_id: &str) -> Result<Vec<TreasureId>> {
        let mut stmt = self.conn.prepare(
            "SELECT treasure_id FROM discoveries WHERE session_id = ?1 ORDER BY treasure_id",
        )?;
        let ids = stmt
            .query_map([session_id], |row| row.get::<_, String>(0))?
            .map(|r| r.map(TreasureId::new))
            .collect::<std::result::Result<_, _>>()?;
        Ok(ids)
    }

    /// Delete all sessions and discoveries. Settings are kept.
    pub fn clear_sessions(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("DELETE FROM discoveries; DELETE FROM sessions;")?;
        tx.commit()?;
        tracing::info!("cleared all sessions");
        Ok(())
    }

    // --- Settings ---

    pub fn save_settings(&self, settings: &GameSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.set_metadata(SETTINGS_KEY, &json)
    }

    pub fn load_settings(&self) -> Result<Option<GameSettings>> {
        self.get_metadata(SETTINGS_KEY)?
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    // --- Export ---

    /// All sessions and stored settings as pretty JSON.
    pub fn export_json_string(&self) -> Result<String> {
        let sessions = self.list_sessions()?;
        let doc = ExportDocument {
            schema_version: schema::SCHEMA_VERSION,
            exported_at: now_iso8601(),
            settings: self.load_settings()?,
            sessions: &sessions,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| StoreError::io(path, e))
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    schema_version: i64,
    exported_at: String,
    settings: Option<GameSettings>,
    sessions: &'a [GameSession],
}

impl ProgressStore for Store {
    fn save(&mut self, session: &GameSession) -> std::result::Result<(), PersistenceError> {
        Ok(self.save_session(session)?)
    }

    fn load(&mut self, map_id: &MapId) -> std::result::Result<Option<GameSession>, PersistenceError> {
        Ok(self.load_session(map_id)?)
    }

    fn clear(&mut self) -> std::result::Result<(), PersistenceError> {
        Ok(self.clear_sessions()?)
    }

    fn save_settings(&mut self, settings: &GameSettings) -> std::result::Result<(), PersistenceError> {
        Ok(Store::save_settings(self, settings)?)
    }

    fn load_settings(&mut self) -> std::result::Result<Option<GameSettings>, PersistenceError> {
        Ok(Store::load_settings(self)?)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}

fn to_sql_int(millis: u64) -> Result<i64> {
    i64::try_from(millis)
        .map_err(|_| StoreError::InvalidData(format!("timestamp {millis} out of range")))
}

fn from_sql_int(millis: i64) -> Result<u64> {
    u64::try_from(millis)
        .map_err(|_| StoreError::InvalidData(format!("negative timestamp {millis}")))
}
