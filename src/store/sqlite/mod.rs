//! SQLite storage backend
//!
//! Provides `SqliteStore` - a shared SQLite connection wrapper that
//! implements all store traits. Trait implementations live in submodules:
//! - `object` - ObjectStore impl
//! - `relationship` - RelationshipStore impl (edges + taxonomy)
//! - `sublink` - ContactStore impl and sub-link rows
//! - `compliance` - ComplianceStore impl (cascade records)
//!
//! Each submodule also exposes `pub(crate)` sync helpers over
//! `&rusqlite::Connection`, so the migration engine can compose them inside
//! a single transaction.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::catalog::TypeSource;
use crate::types::relationship::RelationshipType;

pub(crate) mod compliance;
pub(crate) mod object;
pub(crate) mod relationship;
pub(crate) mod sublink;

/// Shared SQLite connection wrapper
///
/// Create one store and share it via `Arc` across all components that need
/// database access. Implements `ObjectStore`, `RelationshipStore`,
/// `ContactStore` and `ComplianceStore`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(&path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get access to the connection (for trait implementations and the
    /// migration engine's unit of work)
    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        object::init_schema(&conn)?;
        relationship::init_schema(&conn)?;
        sublink::init_schema(&conn)?;
        compliance::init_schema(&conn)?;
        Ok(())
    }
}

impl TypeSource for SqliteStore {
    fn load_types(&self) -> Result<Vec<RelationshipType>> {
        let conn = self.conn.lock().unwrap();
        relationship::list_types_sync(&conn)
    }
}

/// Get current unix timestamp in milliseconds
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Dates are persisted as ISO-8601 TEXT (`YYYY-MM-DD`)
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(text: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
}
