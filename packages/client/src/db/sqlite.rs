//! SQLite-backed storage.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::DbValue;
use crate::{error::StorageError, state::KnownRoom};

/// Schema migrations, applied in order. Never edit a released entry; append a
/// new one instead so older databases stay readable.
const MIGRATIONS: &[&str] = &[
    // v1
    "CREATE TABLE IF NOT EXISTS dict (
        key   TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS known_rooms (
        id           TEXT PRIMARY KEY NOT NULL,
        name         TEXT NOT NULL,
        secret       TEXT,
        starred      INTEGER,
        last_entered INTEGER NOT NULL
    );",
];

/// Schema version this build writes
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Durable store with a `dict` table (preference paths) and a `known_rooms`
/// table (roster of rooms keyed by id).
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!("Opened state database at {}", path.as_ref().display());
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StorageError> {
        migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Insert or replace a preference row
    pub fn put_dict(&self, key: &str, value: &DbValue) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO dict (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, encoded],
        )?;
        Ok(())
    }

    /// Delete a preference row
    pub fn delete_dict(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM dict WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// All preference rows.
    ///
    /// Rows whose value cannot be decoded are skipped with a warning.
    pub fn get_all_dict(&self) -> Result<Vec<(String, DbValue)>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM dict ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (key, encoded) in rows {
            match serde_json::from_str::<DbValue>(&encoded) {
                Ok(value) => items.push((key, value)),
                Err(e) => tracing::warn!("Undecodable value stored for key '{}': {}", key, e),
            }
        }
        Ok(items)
    }

    /// Insert or replace a known room
    pub fn put_known_room(&self, id: &str, room: &KnownRoom) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO known_rooms (id, name, secret, starred, last_entered)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                secret = excluded.secret,
                starred = excluded.starred,
                last_entered = excluded.last_entered",
            params![
                id,
                room.name,
                room.secret,
                room.starred,
                room.last_entered.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Delete a known room
    pub fn delete_known_room(&self, id: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM known_rooms WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// A single known room
    pub fn get_known_room(&self, id: &str) -> Result<Option<KnownRoom>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT name, secret, starred, last_entered FROM known_rooms WHERE id = ?1",
                params![id],
                row_to_known_room,
            )
            .optional()?)
    }

    /// All known rooms keyed by id
    pub fn get_all_known_rooms(&self) -> Result<BTreeMap<String, KnownRoom>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, secret, starred, last_entered FROM known_rooms")?;
        let rooms = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let room = KnownRoom {
                    name: row.get(1)?,
                    secret: row.get(2)?,
                    starred: row.get(3)?,
                    last_entered: millis_to_datetime(row.get(4)?),
                };
                Ok((id, room))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rooms)
    }
}

fn migrate(conn: &mut Connection) -> Result<(), StorageError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > SCHEMA_VERSION {
        tracing::warn!(
            "State database has schema v{} but this build knows v{}; reading additively",
            current,
            SCHEMA_VERSION
        );
        return Ok(());
    }

    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        let version = index as i64 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!("Migrated state database to schema v{}", version);
    }
    Ok(())
}

fn row_to_known_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnownRoom> {
    Ok(KnownRoom {
        name: row.get(0)?,
        secret: row.get(1)?,
        starred: row.get(2)?,
        last_entered: millis_to_datetime(row.get(3)?),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
