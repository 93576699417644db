use std::collections::BTreeSet;

use dashmap::DashMap;

use super::{FieldMap, KvBackend, KvWrite};
use crate::error::BackendError;

/// Process-local key-value backend.
#[derive(Default)]
pub struct MemoryKv {
    hashes: DashMap<String, FieldMap>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryKv {
    fn hash_get_all(&self, key: &str) -> Result<FieldMap, BackendError> {
        Ok(self.hashes.get(key).map(|h| h.clone()).unwrap_or_default())
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, BackendError> {
        Ok(self.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    fn hash_set(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError> {
        let mut entry = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let hash = self.hashes.remove(key).is_some();
        let set = self.sets.remove(key).is_some();
        Ok(hash || set)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        // empty sets disappear, as in redis
        self.sets.remove_if_mut(key, |_, members| {
            members.remove(member);
            members.is_empty()
        });
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, BackendError> {
        Ok(self
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    // Every memory write succeeds, so applying in order is all-or-nothing.
    fn write_batch(&self, writes: &[KvWrite]) -> Result<(), BackendError> {
        for write in writes {
            match write {
                KvWrite::HashSet { key, fields } => self.hash_set(key, fields)?,
                KvWrite::Delete { key } => {
                    self.delete(key)?;
                }
                KvWrite::SetAdd { key, member } => self.set_add(key, member)?,
                KvWrite::SetRemove { key, member } => self.set_remove(key, member)?,
            }
        }
        Ok(())
    }
}
