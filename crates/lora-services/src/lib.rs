//! lora-services — the stateful pieces shared by routers and brokers:
//! device and application stores with their key-value backends, stream
//! registries, gateway state and the peer directory.

pub mod application;
pub mod device;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod kv;
pub mod stream_registry;

pub use application::{Application, ApplicationStore, KvApplicationStore, MemoryApplicationStore};
pub use device::{
    open_device_store, Device, DeviceField, DeviceStore, KvDeviceStore, MemoryDeviceStore,
    Options, Utilization as DeviceUtilization,
};
pub use discovery::{Announcement, PeerDirectory, StaticDirectory};
pub use error::{BackendError, StoreError};
pub use gateway::{Gateway, GatewayError, StatusStore, Utilization};
pub use kv::{KvBackend, KvWrite, MemoryKv, SqliteKv};
pub use stream_registry::{RegistryError, StreamRegistry};
