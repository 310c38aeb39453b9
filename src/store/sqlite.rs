//! SQLite-backed address store.
//!
//! A single connection behind a mutex; every query runs on the blocking pool
//! so request tasks never stall the runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::store::{clamp_limit, AddressStore, SavedAddress, StoreError, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS saved_addresses (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        address_text TEXT    NOT NULL,
        latitude     REAL,
        longitude    REAL,
        created_at   INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_saved_addresses_text
        ON saved_addresses (address_text, created_at);
";

const COLUMNS: &str = "id, address_text, latitude, longitude, created_at";

#[derive(Clone)]
pub struct SqliteAddressStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAddressStore {
    /// Open (or create) the database at `path` and initialise the schema.
    /// `":memory:"` opens a private in-memory database.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(Path::new(path))?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn
        };
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = %path, "Address store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn insert(
    conn: &Connection,
    address_text: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> StoreResult<SavedAddress> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO saved_addresses (address_text, latitude, longitude, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![address_text, latitude, longitude, created_at.timestamp_millis()],
    )?;

    Ok(SavedAddress {
        id: conn.last_insert_rowid(),
        address_text: address_text.to_string(),
        latitude,
        longitude,
        // Round-trip through millis so the returned row equals what a later read yields.
        created_at: millis_to_time(created_at.timestamp_millis())?,
    })
}

type RawRow = (i64, String, Option<f64>, Option<f64>, i64);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_address((id, address_text, latitude, longitude, created_at): RawRow) -> StoreResult<SavedAddress> {
    Ok(SavedAddress {
        id,
        address_text,
        latitude,
        longitude,
        created_at: millis_to_time(created_at)?,
    })
}

fn millis_to_time(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(StoreError::Timestamp(millis))
}

#[async_trait]
impl AddressStore for SqliteAddressStore {
    async fn find_resolved(&self, address_text: &str) -> StoreResult<Option<SavedAddress>> {
        let address_text = address_text.to_string();
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM saved_addresses \
                         WHERE address_text = ?1 \
                           AND latitude IS NOT NULL \
                           AND longitude IS NOT NULL \
                         ORDER BY created_at DESC, id DESC \
                         LIMIT 1"
                    ),
                    params![address_text],
                    read_row,
                )
                .optional()?;
            raw.map(into_address).transpose()
        })
        .await
    }

    async fn save(&self, address_text: &str, latitude: f64, longitude: f64) -> StoreResult<SavedAddress> {
        let address_text = address_text.to_string();
        self.with_conn(move |conn| insert(conn, &address_text, Some(latitude), Some(longitude)))
            .await
    }

    async fn record(&self, address_text: &str) -> StoreResult<SavedAddress> {
        let address_text = address_text.to_string();
        self.with_conn(move |conn| insert(conn, &address_text, None, None))
            .await
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<SavedAddress>> {
        let limit = clamp_limit(limit) as i64;
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {COLUMNS} FROM saved_addresses \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(into_address).collect()
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            let ok: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            if ok == 1 {
                Ok(())
            } else {
                Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
            }
        })
        .await
    }
}
