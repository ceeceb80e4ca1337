// src/db/models.rs

//! Data model for installed builds
//!
//! An InstallRecord mirrors one row of the installs table. Dependency
//! edges are stored as a JSON array of (name, hash) pairs so a record
//! can be read back without re-walking the store.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One installed build, keyed by its dependency hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRecord {
    pub hash: String,
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub installed_at: Option<String>,
    pub deps: Vec<DepRef>,
}

/// A dependency edge as stored in deps_json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepRef {
    pub name: String,
    pub hash: String,
}

impl InstallRecord {
    pub fn new(
        hash: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        path: PathBuf,
        deps: Vec<DepRef>,
    ) -> Self {
        Self {
            hash: hash.into(),
            name: name.into(),
            version: version.into(),
            path,
            installed_at: None,
            deps,
        }
    }

    /// Insert this record; fails if the hash is already present
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        let deps_json = serde_json::to_string(&self.deps)
            .map_err(|e| Error::Metadata(format!("failed to serialize dependencies: {}", e)))?;
        let installed_at = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO installs (hash, name, version, path, installed_at, deps_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.hash,
                &self.name,
                &self.version,
                self.path.to_string_lossy(),
                installed_at,
                deps_json,
            ],
        )?;
        Ok(())
    }

    /// Look up a record by its full hash
    pub fn find_by_hash(conn: &Connection, hash: &str) -> Result<Option<InstallRecord>> {
        conn.query_row(
            "SELECT hash, name, version, path, installed_at, deps_json
             FROM installs WHERE hash = ?1",
            [hash],
            Self::try_from_row,
        )
        .optional()?
        .transpose()
    }

    /// All records for a package name, optionally filtered by a
    /// version prefix, ordered by version then hash
    pub fn find_by_name(
        conn: &Connection,
        name: &str,
        version_prefix: Option<&str>,
    ) -> Result<Vec<InstallRecord>> {
        let mut stmt = conn.prepare(
            "SELECT hash, name, version, path, installed_at, deps_json
             FROM installs WHERE name = ?1 ORDER BY version, hash",
        )?;
        let rows = stmt.query_map([name], Self::try_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            let record = row??;
            if let Some(prefix) = version_prefix {
                if !record.version.starts_with(prefix) {
                    continue;
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    /// All installed records, ordered by name then version
    pub fn all(conn: &Connection) -> Result<Vec<InstallRecord>> {
        let mut stmt = conn.prepare(
            "SELECT hash, name, version, path, installed_at, deps_json
             FROM installs ORDER BY name, version, hash",
        )?;
        let rows = stmt.query_map([], Self::try_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    pub fn exists(conn: &Connection, hash: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM installs WHERE hash = ?1",
            [hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn delete(conn: &Connection, hash: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM installs WHERE hash = ?1", [hash])?;
        Ok(changed > 0)
    }

    // rusqlite row mapping cannot carry our error type, so decode
    // failures surface through the inner Result
    fn try_from_row(row: &Row<'_>) -> rusqlite::Result<Result<InstallRecord>> {
        let hash: String = row.get(0)?;
        let deps_json: String = row.get(5)?;
        let deps = match serde_json::from_str(&deps_json) {
            Ok(deps) => deps,
            Err(e) => {
                return Ok(Err(Error::DatabaseCorruption {
                    hash,
                    message: format!("malformed deps_json: {}", e),
                }));
            }
        };
        Ok(Ok(InstallRecord {
            hash,
            name: row.get(1)?,
            version: row.get(2)?,
            path: PathBuf::from(row.get::<_, String>(3)?),
            installed_at: row.get(4)?,
            deps,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn record(hash: &str, name: &str, version: &str) -> InstallRecord {
        InstallRecord::new(
            hash,
            name,
            version,
            PathBuf::from(format!("/store/{}-{}-{}", name, version, hash)),
            vec![],
        )
    }

    #[test]
    fn test_insert_and_find_by_hash() {
        let (_temp, conn) = create_test_db();
        let mut rec = record("aaa111", "zlib", "1.2.13");
        rec.deps.push(DepRef {
            name: "cmake".into(),
            hash: "bbb222".into(),
        });
        rec.insert(&conn).unwrap();

        let found = InstallRecord::find_by_hash(&conn, "aaa111").unwrap().unwrap();
        assert_eq!(found.name, "zlib");
        assert_eq!(found.version, "1.2.13");
        assert_eq!(found.deps.len(), 1);
        assert_eq!(found.deps[0].name, "cmake");
        assert!(found.installed_at.is_some());
    }

    #[test]
    fn test_find_by_hash_missing() {
        let (_temp, conn) = create_test_db();
        assert!(InstallRecord::find_by_hash(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_find_by_name_with_version_prefix() {
        let (_temp, conn) = create_test_db();
        record("a1", "zlib", "1.2.13").insert(&conn).unwrap();
        record("a2", "zlib", "1.3.1").insert(&conn).unwrap();
        record("a3", "openssl", "3.1.0").insert(&conn).unwrap();

        let all_zlib = InstallRecord::find_by_name(&conn, "zlib", None).unwrap();
        assert_eq!(all_zlib.len(), 2);

        let v12 = InstallRecord::find_by_name(&conn, "zlib", Some("1.2")).unwrap();
        assert_eq!(v12.len(), 1);
        assert_eq!(v12[0].hash, "a1");
    }

    #[test]
    fn test_exists_and_delete() {
        let (_temp, conn) = create_test_db();
        record("a1", "zlib", "1.2.13").insert(&conn).unwrap();

        assert!(InstallRecord::exists(&conn, "a1").unwrap());
        assert!(InstallRecord::delete(&conn, "a1").unwrap());
        assert!(!InstallRecord::exists(&conn, "a1").unwrap());
        assert!(!InstallRecord::delete(&conn, "a1").unwrap());
    }

    #[test]
    fn test_corrupt_deps_json_is_reported_per_record() {
        let (_temp, conn) = create_test_db();
        conn.execute(
            "INSERT INTO installs (hash, name, version, path, deps_json)
             VALUES ('bad1', 'zlib', '1.0', '/store/x', 'not json')",
            [],
        )
        .unwrap();

        let err = InstallRecord::find_by_hash(&conn, "bad1").unwrap_err();
        match err {
            Error::DatabaseCorruption { hash, .. } => assert_eq!(hash, "bad1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
