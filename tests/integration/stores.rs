use std::sync::Arc;

use lora_core::config::{RouterConfig, StoreBackend, StoreConfig};
use lora_core::{AppEui, DevAddr, DevEui, NwkSKey};
use lora_services::{open_device_store, DeviceStore, KvDeviceStore, MemoryDeviceStore, MemoryKv};

use crate::*;

const APP: AppEui = AppEui([0, 0, 0, 0, 0, 0, 0, 1]);

fn sqlite_config(dir: &tempfile::TempDir) -> StoreConfig {
    StoreConfig {
        backend: StoreBackend::Sqlite,
        sqlite_path: dir.path().join("lora").join("store.db"),
    }
}

#[tokio::test]
async fn sqlite_backed_broker_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let dev = DevEui([0, 0, 0, 0, 0, 0, 0, 2]);

    let addr = {
        let net = Network::new(RouterConfig::default());
        net.gateway_reports("EU_863_870");
        let devices = open_device_store(&sqlite_config(&dir)).unwrap();
        let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, devices));
        a.register_application(APP, "handler-1");
        let mut gateway = net.router.subscribe_downlink(GATEWAY).unwrap();

        net.router
            .handle_activation(GATEWAY, join_request(APP, dev))
            .await
            .unwrap();
        gateway.recv().await.unwrap();
        a.devices.get(APP, dev).unwrap().dev_addr
    };

    // a fresh network on the same database still routes the device
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("EU_863_870");
    let devices = open_device_store(&sqlite_config(&dir)).unwrap();
    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, devices));
    a.register_application(APP, "handler-1");
    let mut handler = a.broker.activate_handler("handler-1").unwrap();

    net.router.handle_uplink(GATEWAY, data_up(addr)).await.unwrap();
    let delivered = handler.recv().await.unwrap();
    assert_eq!(delivered.dev_eui, dev);
}

/// Many devices joining and re-joining from parallel tasks leave every
/// backend with an index that matches the stored addresses.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reassignment_keeps_backends_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let backends: Vec<(&str, Arc<dyn DeviceStore>)> = vec![
        ("memory", Arc::new(MemoryDeviceStore::new()) as Arc<dyn DeviceStore>),
        (
            "kv-memory",
            Arc::new(KvDeviceStore::new(Arc::new(MemoryKv::new()))) as Arc<dyn DeviceStore>,
        ),
        ("sqlite", open_device_store(&sqlite_config(&dir)).unwrap()),
    ];
    let addrs = [DevAddr([0x26, 0, 0, 1]), DevAddr([0x26, 0, 0, 2]), DevAddr([0x26, 0, 0, 3])];

    for (name, store) in backends {
        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..6u8 {
            let store = store.clone();
            tasks.spawn_blocking(move || {
                for round in 0..20usize {
                    let addr = addrs[(usize::from(n) + round) % addrs.len()];
                    store
                        .activate(APP, DevEui([0, 0, 0, 0, 0, 0, 0, n]), addr, NwkSKey([n; 16]))
                        .unwrap();
                }
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        let mut indexed = 0;
        for addr in addrs {
            for device in store.get_by_address(addr).unwrap() {
                assert_eq!(device.dev_addr, addr, "{name}: stale index entry");
                indexed += 1;
            }
        }
        assert_eq!(indexed, 6, "{name}: every device indexed exactly once");
    }
}
