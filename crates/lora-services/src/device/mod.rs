//! Device records and their flat field encoding.
//!
//! A device is keyed by (AppEUI, DevEUI). Persistent backends store it as a
//! field→string map; [`DeviceField`] is the closed set of field names, and
//! every encode/decode goes through an exhaustive match on it.

use chrono::{DateTime, SecondsFormat, Utc};
use lora_core::{AppEui, DevAddr, DevEui, NwkSKey};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::kv::FieldMap;

mod kv_store;
mod store;

pub use kv_store::KvDeviceStore;
pub use store::{open_device_store, DeviceStore, MemoryDeviceStore};

/// Per-device options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Disable frame counter check (insecure).
    pub disable_f_cnt_check: bool,
    /// Use 32-bit frame counters.
    pub uses_32bit_f_cnt: bool,
}

/// Traffic counters of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utilization {
    pub rx_frames: u64,
    pub tx_frames: u64,
}

/// State of a device as known to the network server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    pub dev_eui: DevEui,
    pub app_eui: AppEui,
    /// Empty until the device is activated.
    pub dev_addr: DevAddr,
    pub nwk_s_key: NwkSKey,
    pub f_cnt_up: u32,
    pub f_cnt_down: u32,
    pub last_seen: Option<DateTime<Utc>>,
    pub options: Options,
    pub utilization: Utilization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceField {
    DevEui,
    AppEui,
    DevAddr,
    NwkSKey,
    FCntUp,
    FCntDown,
    LastSeen,
    Options,
    Utilization,
}

impl DeviceField {
    pub const ALL: [DeviceField; 9] = [
        DeviceField::DevEui,
        DeviceField::AppEui,
        DeviceField::DevAddr,
        DeviceField::NwkSKey,
        DeviceField::FCntUp,
        DeviceField::FCntDown,
        DeviceField::LastSeen,
        DeviceField::Options,
        DeviceField::Utilization,
    ];

    /// The fields `activate` writes. Options, utilization and last-seen
    /// survive a re-activation.
    pub const ACTIVATION: [DeviceField; 6] = [
        DeviceField::DevEui,
        DeviceField::AppEui,
        DeviceField::DevAddr,
        DeviceField::NwkSKey,
        DeviceField::FCntUp,
        DeviceField::FCntDown,
    ];

    /// Stored field name.
    pub const fn name(self) -> &'static str {
        match self {
            DeviceField::DevEui => "dev_eui",
            DeviceField::AppEui => "app_eui",
            DeviceField::DevAddr => "dev_addr",
            DeviceField::NwkSKey => "nwk_s_key",
            DeviceField::FCntUp => "f_cnt_up",
            DeviceField::FCntDown => "f_cnt_down",
            DeviceField::LastSeen => "last_seen",
            DeviceField::Options => "options",
            DeviceField::Utilization => "utilization",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// `fields`, or every field when `fields` is empty.
    pub fn or_all(fields: &[DeviceField]) -> &[DeviceField] {
        if fields.is_empty() {
            &Self::ALL
        } else {
            fields
        }
    }
}

fn invalid(field: DeviceField, value: &str) -> StoreError {
    StoreError::InvalidField {
        field: field.name(),
        value: value.to_string(),
    }
}

impl Device {
    pub fn new(app_eui: AppEui, dev_eui: DevEui) -> Self {
        Self {
            app_eui,
            dev_eui,
            ..Default::default()
        }
    }

    /// Encode one field. Unset values (empty address, never seen) encode
    /// as the empty string.
    pub fn encode_field(&self, field: DeviceField) -> String {
        match field {
            DeviceField::DevEui => self.dev_eui.to_string(),
            DeviceField::AppEui => self.app_eui.to_string(),
            DeviceField::DevAddr if self.dev_addr.is_empty() => String::new(),
            DeviceField::DevAddr => self.dev_addr.to_string(),
            DeviceField::NwkSKey => self.nwk_s_key.to_string(),
            DeviceField::FCntUp => self.f_cnt_up.to_string(),
            DeviceField::FCntDown => self.f_cnt_down.to_string(),
            DeviceField::LastSeen => self
                .last_seen
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true))
                .unwrap_or_default(),
            DeviceField::Options => serde_json::to_string(&self.options).unwrap_or_default(),
            DeviceField::Utilization => {
                serde_json::to_string(&self.utilization).unwrap_or_default()
            }
        }
    }

    /// Decode one field into `self`. The empty string leaves the field at
    /// its default.
    pub fn decode_field(&mut self, field: DeviceField, value: &str) -> Result<(), StoreError> {
        if value.is_empty() {
            return Ok(());
        }
        let err = || invalid(field, value);
        match field {
            DeviceField::DevEui => self.dev_eui = value.parse().map_err(|_| err())?,
            DeviceField::AppEui => self.app_eui = value.parse().map_err(|_| err())?,
            DeviceField::DevAddr => self.dev_addr = value.parse().map_err(|_| err())?,
            DeviceField::NwkSKey => self.nwk_s_key = value.parse().map_err(|_| err())?,
            DeviceField::FCntUp => self.f_cnt_up = value.parse().map_err(|_| err())?,
            DeviceField::FCntDown => self.f_cnt_down = value.parse().map_err(|_| err())?,
            DeviceField::LastSeen => {
                let t = DateTime::parse_from_rfc3339(value).map_err(|_| err())?;
                self.last_seen = Some(t.with_timezone(&Utc));
            }
            DeviceField::Options => {
                self.options = serde_json::from_str(value).map_err(|_| err())?
            }
            DeviceField::Utilization => {
                self.utilization = serde_json::from_str(value).map_err(|_| err())?
            }
        }
        Ok(())
    }

    /// Copy one field from `other`.
    pub fn copy_field(&mut self, other: &Device, field: DeviceField) {
        match field {
            DeviceField::DevEui => self.dev_eui = other.dev_eui,
            DeviceField::AppEui => self.app_eui = other.app_eui,
            DeviceField::DevAddr => self.dev_addr = other.dev_addr,
            DeviceField::NwkSKey => self.nwk_s_key = other.nwk_s_key,
            DeviceField::FCntUp => self.f_cnt_up = other.f_cnt_up,
            DeviceField::FCntDown => self.f_cnt_down = other.f_cnt_down,
            DeviceField::LastSeen => self.last_seen = other.last_seen,
            DeviceField::Options => self.options = other.options,
            DeviceField::Utilization => self.utilization = other.utilization,
        }
    }

    pub fn to_field_map(&self, fields: &[DeviceField]) -> FieldMap {
        DeviceField::or_all(fields)
            .iter()
            .map(|f| (f.name().to_string(), self.encode_field(*f)))
            .collect()
    }

    /// Rebuild a device from stored fields. Unknown names are ignored.
    pub fn from_field_map(map: &FieldMap) -> Result<Self, StoreError> {
        let mut device = Device::default();
        for (name, value) in map {
            if let Some(field) = DeviceField::from_name(name) {
                device.decode_field(field, value)?;
            }
        }
        Ok(device)
    }
}
