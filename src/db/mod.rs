// src/db/mod.rs

//! Install database: which builds exist in the store
//!
//! A thin wrapper around a rusqlite connection. Opening runs pending
//! migrations; all queries go through InstallRecord.

pub mod models;
pub mod schema;

pub use models::{DepRef, InstallRecord};

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Handle to the install database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and run
    /// pending migrations
    pub fn open(path: &Path) -> Result<Database> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening install database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        schema::migrate(&conn)?;
        Ok(Database { conn })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Database> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Database { conn })
    }

    pub fn record_install(&self, record: &InstallRecord) -> Result<()> {
        record.insert(&self.conn)
    }

    pub fn find_by_hash(&self, hash: &str) -> Result<Option<InstallRecord>> {
        InstallRecord::find_by_hash(&self.conn, hash)
    }

    pub fn find_by_name(
        &self,
        name: &str,
        version_prefix: Option<&str>,
    ) -> Result<Vec<InstallRecord>> {
        InstallRecord::find_by_name(&self.conn, name, version_prefix)
    }

    pub fn all(&self) -> Result<Vec<InstallRecord>> {
        InstallRecord::all(&self.conn)
    }

    pub fn is_installed(&self, hash: &str) -> Result<bool> {
        InstallRecord::exists(&self.conn, hash)
    }

    pub fn remove(&self, hash: &str) -> Result<bool> {
        InstallRecord::delete(&self.conn, hash)
    }
}
