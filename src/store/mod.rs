//! Saved address persistence.
//!
//! # Data Flow
//! ```text
//! navigation::resolve_address
//!     → find_resolved(text)   (hit: reuse coordinates)
//!     → save(text, lat, lng)  (after a geocode miss)
//! http handlers
//!     → recent(limit), record(text), ping()
//! ```
//!
//! # Design Decisions
//! - Rows are append-only; duplicates of the same text are allowed and the
//!   newest resolved row wins on lookup
//! - Rows without coordinates never satisfy `find_resolved`
//! - The trait is the seam; `sqlite.rs` is the production backend

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use sqlite::SqliteAddressStore;

/// Bounds applied to listing queries.
pub const MIN_LIST_LIMIT: usize = 1;
pub const MAX_LIST_LIMIT: usize = 50;
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// A persisted address row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedAddress {
    pub id: i64,
    #[serde(rename = "address")]
    pub address_text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl SavedAddress {
    /// Coordinates when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates().is_some()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(String),

    #[error("stored timestamp {0} is out of range")]
    Timestamp(i64),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operations consumed by the navigation pipeline and HTTP layer.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Newest row for `address_text` that has both coordinates.
    async fn find_resolved(&self, address_text: &str) -> StoreResult<Option<SavedAddress>>;

    /// Insert a resolved row.
    async fn save(&self, address_text: &str, latitude: f64, longitude: f64) -> StoreResult<SavedAddress>;

    /// Insert a row without coordinates.
    async fn record(&self, address_text: &str) -> StoreResult<SavedAddress>;

    /// Newest rows first; `limit` is clamped to the list bounds.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<SavedAddress>>;

    async fn ping(&self) -> StoreResult<()>;
}

pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(MIN_LIST_LIMIT, MAX_LIST_LIMIT)
}
