//! SQLite-backed key-value backend.
//!
//! Two tables: `kv_hash` holds record fields, `kv_set` holds index
//! members. Multi-row writes run in a transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::{FieldMap, KvBackend, KvWrite};
use crate::error::BackendError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv_hash (
    key   TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (key, field)
) WITHOUT ROWID;
CREATE TABLE IF NOT EXISTS kv_set (
    key    TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (key, member)
) WITHOUT ROWID;
";

pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BackendError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "sqlite store opened");
        Self::with_connection(conn)
    }

    /// A private database that lives as long as this value.
    pub fn in_memory() -> Result<Self, BackendError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, BackendError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.conn.lock().map_err(|_| BackendError::Poisoned)
    }
}

fn upsert_fields(tx: &Transaction<'_>, key: &str, fields: &FieldMap) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO kv_hash (key, field, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (key, field) DO UPDATE SET value = excluded.value",
    )?;
    for (field, value) in fields {
        stmt.execute(params![key, field, value])?;
    }
    Ok(())
}

fn delete_key(tx: &Transaction<'_>, key: &str) -> rusqlite::Result<usize> {
    Ok(tx.execute("DELETE FROM kv_hash WHERE key = ?1", params![key])?
        + tx.execute("DELETE FROM kv_set WHERE key = ?1", params![key])?)
}

impl KvBackend for SqliteKv {
    fn hash_get_all(&self, key: &str) -> Result<FieldMap, BackendError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT field, value FROM kv_hash WHERE key = ?1")?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let fields = rows.collect::<Result<FieldMap, _>>()?;
        Ok(fields)
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, BackendError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_hash WHERE key = ?1 AND field = ?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn hash_set(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        upsert_fields(&tx, key, fields)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = delete_key(&tx, key)?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.lock()?.execute(
            "INSERT OR IGNORE INTO kv_set (key, member) VALUES (?1, ?2)",
            params![key, member],
        )?;
        Ok(())
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.lock()?.execute(
            "DELETE FROM kv_set WHERE key = ?1 AND member = ?2",
            params![key, member],
        )?;
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare_cached("SELECT member FROM kv_set WHERE key = ?1 ORDER BY member")?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let members = rows.collect::<Result<Vec<String>, _>>()?;
        Ok(members)
    }

    fn write_batch(&self, writes: &[KvWrite]) -> Result<(), BackendError> {
        let mut conn = self.lock()?;
        // dropped without commit on the first error, which rolls back
        let tx = conn.transaction()?;
        for write in writes {
            match write {
                KvWrite::HashSet { key, fields } => upsert_fields(&tx, key, fields)?,
                KvWrite::Delete { key } => {
                    delete_key(&tx, key)?;
                }
                KvWrite::SetAdd { key, member } => {
                    tx.execute(
                        "INSERT OR IGNORE INTO kv_set (key, member) VALUES (?1, ?2)",
                        params![key, member],
                    )?;
                }
                KvWrite::SetRemove { key, member } => {
                    tx.execute(
                        "DELETE FROM kv_set WHERE key = ?1 AND member = ?2",
                        params![key, member],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
