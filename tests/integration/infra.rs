//! In-process network: brokers backed by real stores, a static directory
//! and a router wired to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Once};

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use lora_broker::Broker;
use lora_core::config::{BrokerConfig, RouterConfig};
use lora_core::message::{
    BrokerActivationRequest, BrokerActivationResponse, BrokerUplinkMessage, BrokerUplinkResponse,
    DeduplicatedUplinkMessage, DeviceActivationRequest, GatewayRxMetadata, GatewayStatus,
    RxMetadata, UplinkMessage,
};
use lora_core::{AppEui, DevAddr, DevAddrPrefix, DevEui, GatewayEui, NwkSKey};
use lora_router::{BrokerClient, BrokerConnector, Router};
use lora_services::{
    Announcement, Application, DeviceField, DeviceStore, MemoryApplicationStore,
    MemoryDeviceStore, StaticDirectory,
};

pub const GATEWAY: GatewayEui = GatewayEui([0, 1, 2, 3, 4, 5, 6, 7]);

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary. Honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// ── Broker ────────────────────────────────────────────────────────────────────

/// A broker with its own network server state: it accepts activations for
/// the applications it knows, assigns addresses inside its prefix and
/// forwards uplinks of its devices to the application's handler.
pub struct InProcessBroker {
    pub id: String,
    pub prefix: DevAddrPrefix,
    pub broker: Broker,
    pub devices: Arc<dyn DeviceStore>,
    next_addr: AtomicU8,
}

impl InProcessBroker {
    pub fn new(id: &str, prefix_byte: u8, devices: Arc<dyn DeviceStore>) -> Self {
        Self::with_config(id, prefix_byte, devices, &BrokerConfig::default())
    }

    pub fn with_config(
        id: &str,
        prefix_byte: u8,
        devices: Arc<dyn DeviceStore>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            id: id.to_string(),
            prefix: DevAddrPrefix::new(DevAddr([prefix_byte, 0, 0, 0]), 8),
            broker: Broker::new(config, Arc::new(MemoryApplicationStore::new())),
            devices,
            next_addr: AtomicU8::new(1),
        }
    }

    pub fn register_application(&self, app_eui: AppEui, handler_id: &str) {
        self.broker
            .applications()
            .set(&Application {
                app_eui,
                handler_id: handler_id.to_string(),
                handler_net_address: format!("{handler_id}:1904"),
            })
            .expect("memory application store");
    }

    pub fn announcement(&self) -> Announcement {
        Announcement {
            id: self.id.clone(),
            service_name: "broker".into(),
            net_address: format!("{}:1902", self.id),
            prefixes: vec![self.prefix],
        }
    }

    fn allocate_addr(&self) -> DevAddr {
        let n = self.next_addr.fetch_add(1, Ordering::SeqCst);
        DevAddr([self.prefix.addr.0[0], 0, 0, n])
    }

    async fn do_activate(&self, request: BrokerActivationRequest) -> Result<BrokerActivationResponse> {
        self.broker
            .applications()
            .get(request.app_eui)
            .map_err(|_| anyhow!("{}: unknown application {}", self.id, request.app_eui))?;

        let dev_addr = self.allocate_addr();
        self.devices
            .activate(request.app_eui, request.dev_eui, dev_addr, NwkSKey([0x2b; 16]))
            .context("store activation")?;

        let option = request
            .downlink_options
            .iter()
            .min_by_key(|o| o.score)
            .cloned()
            .context("no downlink option")?;
        Ok(BrokerActivationResponse {
            payload: Bytes::copy_from_slice(&dev_addr.0),
            downlink_option: Some(option),
        })
    }

    async fn do_uplink(&self, message: BrokerUplinkMessage) -> Result<BrokerUplinkResponse> {
        let dev_addr = DevAddr::from_mac_payload(&message.payload).context("short frame")?;
        let candidates = self.devices.get_by_address(dev_addr)?;
        let Some(mut device) = candidates.into_iter().next() else {
            bail!("{}: no device with address {dev_addr}", self.id);
        };

        device.f_cnt_up += 1;
        device.utilization.rx_frames += 1;
        self.devices
            .set(&device, &[DeviceField::FCntUp, DeviceField::Utilization])?;

        self.broker.send_uplink(DeduplicatedUplinkMessage {
            app_eui: device.app_eui,
            dev_eui: device.dev_eui,
            payload: message.payload,
            protocol_metadata: message.protocol_metadata,
            gateway_metadata: vec![message.gateway_metadata],
        })?;
        Ok(BrokerUplinkResponse { downlink: None })
    }
}

impl BrokerClient for InProcessBroker {
    fn activate(
        &self,
        request: BrokerActivationRequest,
    ) -> BoxFuture<'_, anyhow::Result<BrokerActivationResponse>> {
        self.do_activate(request).boxed()
    }

    fn uplink(
        &self,
        message: BrokerUplinkMessage,
    ) -> BoxFuture<'_, anyhow::Result<BrokerUplinkResponse>> {
        self.do_uplink(message).boxed()
    }
}

/// Resolves announcements to in-process brokers by id.
#[derive(Default)]
pub struct Connector {
    brokers: Mutex<HashMap<String, Arc<InProcessBroker>>>,
}

impl BrokerConnector for Connector {
    fn connect(&self, announcement: &Announcement) -> Result<Arc<dyn BrokerClient>> {
        let broker = self
            .brokers
            .lock()
            .map_err(|_| anyhow!("connector lock poisoned"))?
            .get(&announcement.id)
            .cloned()
            .with_context(|| format!("cannot reach {}", announcement.net_address))?;
        Ok(broker)
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

pub struct Network {
    pub router: Router,
    pub directory: Arc<StaticDirectory>,
    connector: Arc<Connector>,
}

impl Network {
    pub fn new(config: RouterConfig) -> Self {
        init_tracing();
        let directory = Arc::new(StaticDirectory::new());
        let connector = Arc::new(Connector::default());
        let router = Router::new(config, directory.clone(), connector.clone());
        Self {
            router,
            directory,
            connector,
        }
    }

    /// Announce a broker and make it reachable.
    pub fn add_broker(&self, broker: InProcessBroker) -> Arc<InProcessBroker> {
        let broker = Arc::new(broker);
        self.directory.announce(broker.announcement());
        self.connector
            .brokers
            .lock()
            .expect("connector lock")
            .insert(broker.id.clone(), broker.clone());
        broker
    }

    /// Announce a broker nobody can connect to.
    pub fn add_unreachable(&self, id: &str, prefix_byte: u8) {
        self.directory.announce(Announcement {
            id: id.to_string(),
            service_name: "broker".into(),
            net_address: format!("{id}:1902"),
            prefixes: vec![DevAddrPrefix::new(DevAddr([prefix_byte, 0, 0, 0]), 8)],
        });
    }

    pub fn gateway_reports(&self, region: &str) {
        self.router.handle_gateway_status(
            GATEWAY,
            GatewayStatus {
                region: region.to_string(),
                description: "integration gateway".into(),
                ..Default::default()
            },
        );
    }
}

pub fn memory_devices() -> Arc<dyn DeviceStore> {
    Arc::new(MemoryDeviceStore::new())
}

// ── Frames ────────────────────────────────────────────────────────────────────

fn rx_metadata() -> (RxMetadata, GatewayRxMetadata) {
    (
        RxMetadata {
            data_rate: "SF7BW125".into(),
            coding_rate: "4/5".into(),
            ..Default::default()
        },
        GatewayRxMetadata {
            timestamp: 1_000,
            frequency: 868_100_000,
            rssi: -40.0,
            snr: 7.5,
            ..Default::default()
        },
    )
}

pub fn join_request(app_eui: AppEui, dev_eui: DevEui) -> DeviceActivationRequest {
    let (protocol_metadata, gateway_metadata) = rx_metadata();
    DeviceActivationRequest {
        payload: Bytes::from_static(&[0u8; 23]),
        app_eui,
        dev_eui,
        protocol_metadata,
        gateway_metadata,
    }
}

/// Unconfirmed data up from `dev_addr` (DevAddr little-endian after MHDR).
pub fn data_up(dev_addr: DevAddr) -> UplinkMessage {
    let a = dev_addr.0;
    let (protocol_metadata, gateway_metadata) = rx_metadata();
    UplinkMessage {
        payload: Bytes::from(vec![0x40, a[3], a[2], a[1], a[0], 0x00, 0x01, 0x00, 0x01, 0xaa]),
        protocol_metadata,
        gateway_metadata,
    }
}
