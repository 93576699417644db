//! Device store over a [`KvBackend`].
//!
//! Layout:
//!   device:<AppEUI>:<DevEUI>  → field map
//!   dev_addr:<DevAddr>        → set of device keys

use std::sync::{Arc, PoisonError, RwLock};

use lora_core::{AppEui, DevAddr, DevEui};

use super::{Device, DeviceField, DeviceStore};
use crate::error::StoreError;
use crate::kv::{KvBackend, KvWrite};

const DEVICE_PREFIX: &str = "device";
const DEV_ADDR_PREFIX: &str = "dev_addr";

fn device_key(app_eui: AppEui, dev_eui: DevEui) -> String {
    format!("{DEVICE_PREFIX}:{app_eui}:{dev_eui}")
}

fn address_key(encoded_addr: &str) -> String {
    format!("{DEV_ADDR_PREFIX}:{encoded_addr}")
}

pub struct KvDeviceStore {
    backend: Arc<dyn KvBackend>,
    // Serializes index maintenance: a mutation reads the stored address,
    // writes the record and moves the index entry as one step.
    guard: RwLock<()>,
}

impl KvDeviceStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            guard: RwLock::new(()),
        }
    }

    fn load(&self, key: &str) -> Result<Option<Device>, StoreError> {
        let map = self.backend.hash_get_all(key)?;
        if map.is_empty() {
            return Ok(None);
        }
        Device::from_field_map(&map).map(Some)
    }
}

impl DeviceStore for KvDeviceStore {
    fn get(&self, app_eui: AppEui, dev_eui: DevEui) -> Result<Device, StoreError> {
        let _read = self.guard.read().unwrap_or_else(PoisonError::into_inner);
        self.load(&device_key(app_eui, dev_eui))?
            .ok_or(StoreError::NotFound)
    }

    fn get_by_address(&self, dev_addr: DevAddr) -> Result<Vec<Device>, StoreError> {
        if dev_addr.is_empty() {
            return Ok(Vec::new());
        }
        let _read = self.guard.read().unwrap_or_else(PoisonError::into_inner);
        let keys = self.backend.set_members(&address_key(&dev_addr.to_string()))?;

        let mut devices = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load(&key) {
                Ok(Some(device)) => devices.push(device),
                Ok(None) => tracing::warn!(%key, %dev_addr, "address index points at missing device"),
                Err(StoreError::InvalidField { field, value }) => {
                    tracing::warn!(%key, %dev_addr, field, %value, "skipping undecodable device")
                }
                Err(e) => return Err(e),
            }
        }
        devices.sort_by_key(|d| (d.app_eui, d.dev_eui));
        Ok(devices)
    }

    fn set(&self, device: &Device, fields: &[DeviceField]) -> Result<(), StoreError> {
        let key = device_key(device.app_eui, device.dev_eui);
        let fields = DeviceField::or_all(fields);
        let touches_addr = fields.contains(&DeviceField::DevAddr);

        let _write = self.guard.write().unwrap_or_else(PoisonError::into_inner);

        let old_addr = if touches_addr {
            self.backend
                .hash_get(&key, DeviceField::DevAddr.name())?
                .unwrap_or_default()
        } else {
            String::new()
        };

        // The identity fields are always written so that a record created
        // by a partial set decodes back to the right key.
        let mut map = device.to_field_map(fields);
        for id_field in [DeviceField::AppEui, DeviceField::DevEui] {
            map.entry(id_field.name().to_string())
                .or_insert_with(|| device.encode_field(id_field));
        }

        // record and index change in one batch
        let mut writes = vec![KvWrite::HashSet {
            key: key.clone(),
            fields: map,
        }];
        let mut moved_from = None;
        if touches_addr {
            let new_addr = device.encode_field(DeviceField::DevAddr);
            if !new_addr.is_empty() {
                writes.push(KvWrite::SetAdd {
                    key: address_key(&new_addr),
                    member: key.clone(),
                });
            }
            if !old_addr.is_empty() && old_addr != new_addr {
                writes.push(KvWrite::SetRemove {
                    key: address_key(&old_addr),
                    member: key.clone(),
                });
                moved_from = Some((old_addr, new_addr));
            }
        }
        self.backend.write_batch(&writes)?;

        if let Some((from, to)) = moved_from {
            tracing::debug!(%key, %from, %to, "device address reassigned");
        }
        Ok(())
    }

    fn delete(&self, app_eui: AppEui, dev_eui: DevEui) -> Result<(), StoreError> {
        let key = device_key(app_eui, dev_eui);
        let _write = self.guard.write().unwrap_or_else(PoisonError::into_inner);

        let stored = self.backend.hash_get_all(&key)?;
        if stored.is_empty() {
            return Err(StoreError::NotFound);
        }
        let mut writes = vec![KvWrite::Delete { key: key.clone() }];
        if let Some(old_addr) = stored
            .get(DeviceField::DevAddr.name())
            .filter(|a| !a.is_empty())
        {
            writes.push(KvWrite::SetRemove {
                key: address_key(old_addr),
                member: key.clone(),
            });
        }
        self.backend.write_batch(&writes)?;
        Ok(())
    }
}
