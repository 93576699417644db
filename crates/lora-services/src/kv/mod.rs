//! Key-value backends for the persistent stores.
//!
//! The model is the one the stores are written against: a record is a flat
//! field→string map under a string key, and secondary indexes are string
//! sets under their own keys.

use std::collections::BTreeMap;

use crate::error::BackendError;

mod memory;
mod sqlite;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

/// Field name → encoded value.
pub type FieldMap = BTreeMap<String, String>;

/// One write in a [`KvBackend::write_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    HashSet { key: String, fields: FieldMap },
    Delete { key: String },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
}

pub trait KvBackend: Send + Sync {
    /// All fields of a record. Empty if the record does not exist.
    fn hash_get_all(&self, key: &str) -> Result<FieldMap, BackendError>;

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, BackendError>;

    /// Upsert the given fields, leaving other fields of the record untouched.
    fn hash_set(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError>;

    /// Remove a record. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, BackendError>;

    fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError>;

    fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError>;

    /// Members in ascending order.
    fn set_members(&self, key: &str) -> Result<Vec<String>, BackendError>;

    /// Apply `writes` in order, all or nothing.
    fn write_batch(&self, writes: &[KvWrite]) -> Result<(), BackendError>;
}
