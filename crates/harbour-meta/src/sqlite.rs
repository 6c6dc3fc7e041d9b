//! SQLite-backed metadata store.
//!
//! Each record type has its own table and a hand-written mapping from rows
//! to records; there is no reflective column binding.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use harbour_types::{ObjectRecord, ObjectState, Oid, ProjectRecord, UserRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{MetaError, MetaResult};
use crate::traits::MetadataStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS objects (
        oid   TEXT PRIMARY KEY,
        size  INTEGER NOT NULL,
        state TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS object_refs (
        oid     TEXT NOT NULL,
        project TEXT NOT NULL,
        PRIMARY KEY (oid, project)
    );
    CREATE TABLE IF NOT EXISTS projects (
        name TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS project_objects (
        project TEXT NOT NULL,
        oid     TEXT NOT NULL,
        PRIMARY KEY (project, oid)
    );
    CREATE TABLE IF NOT EXISTS users (
        username      TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL
    );
";

impl From<rusqlite::Error> for MetaError {
    fn from(e: rusqlite::Error) -> Self {
        MetaError::Backend(format!("sqlite: {e}"))
    }
}

/// Metadata store persisted in a single SQLite database file.
pub struct SqliteMetaStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteMetaStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> MetaResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetaError::Backend(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.display(), "opened sqlite metadata store");
        Self::init(conn)
    }

    /// A private in-memory database; useful for tests.
    pub fn open_in_memory() -> MetaResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> MetaResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> MetaResult<T>) -> MetaResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| MetaError::Backend(format!("lock poisoned: {e}")))?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| MetaError::Backend("sqlite store is closed".into()))?;
        f(conn)
    }
}

// ---- row mapping ----

struct ObjectRow {
    oid: String,
    size: i64,
    state: String,
}

impl ObjectRow {
    const COLUMNS: &'static str = "oid, size, state";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            oid: row.get(0)?,
            size: row.get(1)?,
            state: row.get(2)?,
        })
    }

    fn into_record(self, projects: BTreeSet<String>) -> MetaResult<ObjectRecord> {
        let oid = parse_stored_oid(&self.oid)?;
        let state = self
            .state
            .parse::<ObjectState>()
            .map_err(|e| MetaError::Backend(format!("corrupt object row {}: {e}", self.oid)))?;
        Ok(ObjectRecord {
            oid,
            size: self.size,
            state,
            projects,
            existing: false,
        })
    }
}

fn parse_stored_oid(s: &str) -> MetaResult<Oid> {
    Oid::parse(s).map_err(|e| MetaError::Backend(format!("corrupt oid column {s:?}: {e}")))
}

fn object_projects(conn: &Connection, oid: &str) -> MetaResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT project FROM object_refs WHERE oid = ?1")?;
    let projects = stmt
        .query_map(params![oid], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(projects)
}

fn project_oids(conn: &Connection, name: &str) -> MetaResult<BTreeSet<Oid>> {
    let mut stmt = conn.prepare("SELECT oid FROM project_objects WHERE project = ?1")?;
    let rows = stmt
        .query_map(params![name], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.iter().map(|s| parse_stored_oid(s)).collect()
}

impl MetadataStore for SqliteMetaStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn read_object(&self, oid: &Oid) -> MetaResult<Option<ObjectRecord>> {
        let key = oid.to_hex();
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM objects WHERE oid = ?1", ObjectRow::COLUMNS),
                    params![key],
                    ObjectRow::from_row,
                )
                .optional()?;
            match row {
                Some(row) => {
                    let projects = object_projects(conn, &key)?;
                    row.into_record(projects).map(Some)
                }
                None => Ok(None),
            }
        })
    }

    fn insert_object(&self, record: &ObjectRecord) -> MetaResult<bool> {
        let key = record.oid.to_hex();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO objects (oid, size, state) VALUES (?1, ?2, ?3)",
                params![key, record.size, record.state.as_str()],
            )? == 1;
            if inserted {
                for project in &record.projects {
                    tx.execute(
                        "INSERT OR IGNORE INTO object_refs (oid, project) VALUES (?1, ?2)",
                        params![key, project],
                    )?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    fn set_object_state(&self, oid: &Oid, state: ObjectState) -> MetaResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE objects SET state = ?2 WHERE oid = ?1",
                params![oid.to_hex(), state.as_str()],
            )?;
            Ok(changed == 1)
        })
    }

    fn add_object_project(&self, oid: &Oid, project: &str) -> MetaResult<bool> {
        let key = oid.to_hex();
        self.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM objects WHERE oid = ?1", params![key], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(false);
            }
            conn.execute(
                "INSERT OR IGNORE INTO object_refs (oid, project) VALUES (?1, ?2)",
                params![key, project],
            )?;
            Ok(true)
        })
    }

    fn remove_object_project(&self, oid: &Oid, project: &str) -> MetaResult<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM object_refs WHERE oid = ?1 AND project = ?2",
                params![oid.to_hex(), project],
            )?;
            Ok(removed > 0)
        })
    }

    fn delete_object(&self, oid: &Oid) -> MetaResult<bool> {
        let key = oid.to_hex();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM objects WHERE oid = ?1", params![key])?;
            tx.execute("DELETE FROM object_refs WHERE oid = ?1", params![key])?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    fn list_objects(&self) -> MetaResult<Vec<ObjectRecord>> {
        self.with_conn(|conn| {
            let mut refs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            {
                let mut stmt = conn.prepare("SELECT oid, project FROM object_refs")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (oid, project) = row?;
                    refs.entry(oid).or_default().insert(project);
                }
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM objects ORDER BY oid ASC",
                ObjectRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([], ObjectRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|row| {
                    let projects = refs.remove(&row.oid).unwrap_or_default();
                    row.into_record(projects)
                })
                .collect()
        })
    }

    fn count_objects(&self) -> MetaResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    fn read_project(&self, name: &str) -> MetaResult<Option<ProjectRecord>> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT name FROM projects WHERE name = ?1", params![name], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            match found {
                Some(name) => {
                    let oids = project_oids(conn, &name)?;
                    Ok(Some(ProjectRecord { name, oids }))
                }
                None => Ok(None),
            }
        })
    }

    fn create_project(&self, name: &str) -> MetaResult<bool> {
        self.with_conn(|conn| {
            let inserted =
                conn.execute("INSERT OR IGNORE INTO projects (name) VALUES (?1)", params![name])?;
            Ok(inserted == 1)
        })
    }

    fn add_project_member(&self, name: &str, oid: &Oid) -> MetaResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("INSERT OR IGNORE INTO projects (name) VALUES (?1)", params![name])?;
            tx.execute(
                "INSERT OR IGNORE INTO project_objects (project, oid) VALUES (?1, ?2)",
                params![name, oid.to_hex()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn remove_project_member(&self, name: &str, oid: &Oid) -> MetaResult<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM project_objects WHERE project = ?1 AND oid = ?2",
                params![name, oid.to_hex()],
            )?;
            Ok(removed > 0)
        })
    }

    fn list_projects(&self) -> MetaResult<Vec<ProjectRecord>> {
        self.with_conn(|conn| {
            let mut projects: BTreeMap<String, BTreeSet<Oid>> = BTreeMap::new();
            {
                let mut stmt = conn.prepare("SELECT name FROM projects")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                for name in names {
                    projects.insert(name, BTreeSet::new());
                }
            }

            let mut stmt = conn.prepare("SELECT project, oid FROM project_objects")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (project, oid) in rows {
                projects
                    .entry(project)
                    .or_default()
                    .insert(parse_stored_oid(&oid)?);
            }

            Ok(projects
                .into_iter()
                .map(|(name, oids)| ProjectRecord { name, oids })
                .collect())
        })
    }

    fn read_user(&self, username: &str) -> MetaResult<Option<UserRecord>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT username, password_hash FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok(UserRecord {
                            username: row.get(0)?,
                            password_hash: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    fn insert_user(&self, record: &UserRecord) -> MetaResult<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
                params![record.username, record.password_hash],
            )?;
            Ok(inserted == 1)
        })
    }

    fn delete_user(&self, username: &str) -> MetaResult<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
            Ok(removed > 0)
        })
    }

    fn list_usernames(&self) -> MetaResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username ASC")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
    }

    fn close(&self) -> MetaResult<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| MetaError::Backend(format!("lock poisoned: {e}")))?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| MetaError::from(e))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteMetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMetaStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn conforms_to_store_contract() {
        testing::store_contract(&SqliteMetaStore::open_in_memory().unwrap());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta").join("harbour.db");
        let oid = testing::oid(3);
        {
            let store = SqliteMetaStore::open(&path).unwrap();
            let record = ObjectRecord::pending(oid, 42, "repo");
            assert!(store.insert_object(&record).unwrap());
            store.add_project_member("repo", &oid).unwrap();
            store.close().unwrap();
        }

        let store = SqliteMetaStore::open(&path).unwrap();
        let record = store.read_object(&oid).unwrap().expect("record persisted");
        assert_eq!(record.size, 42);
        assert!(record.projects.contains("repo"));
        assert!(store.read_project("repo").unwrap().unwrap().contains(&oid));
    }

    #[test]
    fn operations_after_close_are_backend_errors() {
        let store = SqliteMetaStore::open_in_memory().unwrap();
        store.close().unwrap();
        let err = store.read_object(&testing::oid(1)).unwrap_err();
        assert!(matches!(err, MetaError::Backend(_)));
        // Closing twice is harmless.
        store.close().unwrap();
    }

    #[test]
    fn corrupt_state_column_is_reported() {
        let store = SqliteMetaStore::open_in_memory().unwrap();
        let oid = testing::oid(4);
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO objects (oid, size, state) VALUES (?1, 1, 'limbo')",
                    params![oid.to_hex()],
                )?;
                Ok(())
            })
            .unwrap();
        let err = store.read_object(&oid).unwrap_err();
        assert!(matches!(err, MetaError::Backend(msg) if msg.contains("limbo")));
    }
}
