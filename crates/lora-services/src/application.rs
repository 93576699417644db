//! Application store — which handler serves an application.

use std::sync::Arc;

use dashmap::DashMap;
use lora_core::AppEui;

use crate::error::StoreError;
use crate::kv::{FieldMap, KvBackend};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Application {
    pub app_eui: AppEui,
    pub handler_id: String,
    pub handler_net_address: String,
}

pub trait ApplicationStore: Send + Sync {
    fn get(&self, app_eui: AppEui) -> Result<Application, StoreError>;
    /// Insert or replace.
    fn set(&self, app: &Application) -> Result<(), StoreError>;
    fn delete(&self, app_eui: AppEui) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryApplicationStore {
    apps: DashMap<AppEui, Application>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationStore for MemoryApplicationStore {
    fn get(&self, app_eui: AppEui) -> Result<Application, StoreError> {
        self.apps
            .get(&app_eui)
            .map(|a| a.clone())
            .ok_or(StoreError::NotFound)
    }

    fn set(&self, app: &Application) -> Result<(), StoreError> {
        self.apps.insert(app.app_eui, app.clone());
        Ok(())
    }

    fn delete(&self, app_eui: AppEui) -> Result<(), StoreError> {
        self.apps
            .remove(&app_eui)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

// ── Key-value backed ──────────────────────────────────────────────────────────

const APP_EUI: &str = "app_eui";
const HANDLER_ID: &str = "handler_id";
const HANDLER_NET_ADDRESS: &str = "handler_net_address";

/// Applications as `application:<AppEUI>` records.
pub struct KvApplicationStore {
    backend: Arc<dyn KvBackend>,
}

impl KvApplicationStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    fn key(app_eui: AppEui) -> String {
        format!("application:{app_eui}")
    }
}

impl ApplicationStore for KvApplicationStore {
    fn get(&self, app_eui: AppEui) -> Result<Application, StoreError> {
        let mut map = self.backend.hash_get_all(&Self::key(app_eui))?;
        if map.is_empty() {
            return Err(StoreError::NotFound);
        }
        let stored_eui = map.remove(APP_EUI).unwrap_or_default();
        let app_eui = stored_eui.parse::<AppEui>().map_err(|_| StoreError::InvalidField {
            field: APP_EUI,
            value: stored_eui.clone(),
        })?;
        Ok(Application {
            app_eui,
            handler_id: map.remove(HANDLER_ID).unwrap_or_default(),
            handler_net_address: map.remove(HANDLER_NET_ADDRESS).unwrap_or_default(),
        })
    }

    fn set(&self, app: &Application) -> Result<(), StoreError> {
        let map = FieldMap::from([
            (APP_EUI.to_string(), app.app_eui.to_string()),
            (HANDLER_ID.to_string(), app.handler_id.clone()),
            (HANDLER_NET_ADDRESS.to_string(), app.handler_net_address.clone()),
        ]);
        self.backend.hash_set(&Self::key(app.app_eui), &map)?;
        Ok(())
    }

    fn delete(&self, app_eui: AppEui) -> Result<(), StoreError> {
        if self.backend.delete(&Self::key(app_eui))? {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}
