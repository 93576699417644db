use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lora_core::config::{StoreBackend, StoreConfig};
use lora_core::{AppEui, DevAddr, DevEui, NwkSKey};

use super::{Device, DeviceField};
use crate::error::StoreError;
use crate::kv::SqliteKv;

/// Device records plus the DevAddr index over them.
///
/// After every successful call, `get_by_address(a)` returns exactly the
/// records whose stored address is `a`. Records with an empty address are
/// not indexed.
pub trait DeviceStore: Send + Sync {
    fn get(&self, app_eui: AppEui, dev_eui: DevEui) -> Result<Device, StoreError>;

    /// All devices currently holding `dev_addr`, ordered by (AppEUI, DevEUI).
    fn get_by_address(&self, dev_addr: DevAddr) -> Result<Vec<Device>, StoreError>;

    /// Upsert the named fields of `device` (all fields if `fields` is empty).
    /// Fields not named keep their stored values.
    fn set(&self, device: &Device, fields: &[DeviceField]) -> Result<(), StoreError>;

    fn delete(&self, app_eui: AppEui, dev_eui: DevEui) -> Result<(), StoreError>;

    /// Assign a new address and session key and reset both frame counters.
    /// Creates the device if it does not exist yet.
    fn activate(
        &self,
        app_eui: AppEui,
        dev_eui: DevEui,
        dev_addr: DevAddr,
        nwk_s_key: NwkSKey,
    ) -> Result<(), StoreError> {
        let device = Device {
            dev_addr,
            nwk_s_key,
            f_cnt_up: 0,
            f_cnt_down: 0,
            ..Device::new(app_eui, dev_eui)
        };
        self.set(&device, &DeviceField::ACTIVATION)
    }
}

/// Open the backend selected in config.
pub fn open_device_store(config: &StoreConfig) -> Result<Arc<dyn DeviceStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryDeviceStore::new())),
        StoreBackend::Sqlite => {
            let kv = SqliteKv::open(&config.sqlite_path)?;
            Ok(Arc::new(super::KvDeviceStore::new(Arc::new(kv))))
        }
    }
}

type DeviceKey = (AppEui, DevEui);

#[derive(Default)]
struct Tables {
    devices: HashMap<DeviceKey, Device>,
    by_address: HashMap<DevAddr, BTreeSet<DeviceKey>>,
}

impl Tables {
    fn unindex(&mut self, addr: DevAddr, key: &DeviceKey) {
        if let Some(bucket) = self.by_address.get_mut(&addr) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.by_address.remove(&addr);
            }
        }
    }
}

/// In-memory device store. Record and index share one lock, so a
/// reassignment is never observable half-done.
#[derive(Default)]
pub struct MemoryDeviceStore {
    tables: RwLock<Tables>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Mutations never panic while holding the lock, so a poisoned lock
    // still guards consistent tables.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn get(&self, app_eui: AppEui, dev_eui: DevEui) -> Result<Device, StoreError> {
        self.read()
            .devices
            .get(&(app_eui, dev_eui))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn get_by_address(&self, dev_addr: DevAddr) -> Result<Vec<Device>, StoreError> {
        let tables = self.read();
        let Some(bucket) = tables.by_address.get(&dev_addr) else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .iter()
            .filter_map(|key| tables.devices.get(key).cloned())
            .collect())
    }

    fn set(&self, device: &Device, fields: &[DeviceField]) -> Result<(), StoreError> {
        let key = (device.app_eui, device.dev_eui);
        let mut tables = self.write();

        let stored = tables
            .devices
            .entry(key)
            .or_insert_with(|| Device::new(device.app_eui, device.dev_eui));
        let old_addr = stored.dev_addr;
        for field in DeviceField::or_all(fields) {
            stored.copy_field(device, *field);
        }
        let new_addr = stored.dev_addr;

        if old_addr != new_addr && !old_addr.is_empty() {
            tables.unindex(old_addr, &key);
            tracing::debug!(
                app_eui = %key.0,
                dev_eui = %key.1,
                from = %old_addr,
                to = %new_addr,
                "device address reassigned"
            );
        }
        if !new_addr.is_empty() {
            tables.by_address.entry(new_addr).or_default().insert(key);
        }
        Ok(())
    }

    fn delete(&self, app_eui: AppEui, dev_eui: DevEui) -> Result<(), StoreError> {
        let key = (app_eui, dev_eui);
        let mut tables = self.write();
        let old = tables.devices.remove(&key).ok_or(StoreError::NotFound)?;
        if !old.dev_addr.is_empty() {
            tables.unindex(old.dev_addr, &key);
        }
        Ok(())
    }
}
