use std::time::Duration;

use lora_core::config::RouterConfig;
use lora_core::{AppEui, DevAddr, DevEui};
use lora_router::RouterError;

use crate::*;

const APP_A: AppEui = AppEui([0, 0, 0, 0, 0, 0, 0, 1]);
const APP_B: AppEui = AppEui([0, 0, 0, 0, 0, 0, 0, 9]);
const DEV: DevEui = DevEui([0, 0, 0, 0, 0, 0, 0, 2]);

#[tokio::test]
async fn join_is_accepted_by_the_broker_that_knows_the_application() {
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("EU_863_870");

    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    let b = net.add_broker(InProcessBroker::new("broker-b", 0x27, memory_devices()));
    a.register_application(APP_A, "handler-a");
    b.register_application(APP_B, "handler-b");

    let mut gateway = net.router.subscribe_downlink(GATEWAY).unwrap();
    net.router
        .handle_activation(GATEWAY, join_request(APP_A, DEV))
        .await
        .unwrap();

    let join_accept = gateway.recv().await.unwrap();
    let option = join_accept.downlink_option.unwrap();
    assert_eq!(option.gateway_eui, GATEWAY);
    // RX1, join-accept delay 1 after the uplink timestamp
    assert_eq!(option.timestamp, 1_000 + 5_000_000);
    assert_eq!(option.frequency, 868_100_000);

    let device = a.devices.get(APP_A, DEV).unwrap();
    assert_eq!(device.dev_addr, DevAddr([0x26, 0, 0, 1]));
    assert_eq!((device.f_cnt_up, device.f_cnt_down), (0, 0));
    assert_eq!(join_accept.payload.as_ref(), &device.dev_addr.0);
    assert!(b.devices.get(APP_A, DEV).unwrap_err().is_not_found());
}

#[tokio::test]
async fn join_for_unknown_application_is_not_accepted() {
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("EU_863_870");
    net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    let _gateway = net.router.subscribe_downlink(GATEWAY).unwrap();

    let err = net
        .router
        .handle_activation(GATEWAY, join_request(APP_B, DEV))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::NotAccepted(_)), "{err}");
}

#[tokio::test]
async fn unreachable_broker_does_not_block_the_join() {
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("EU_863_870");
    net.add_unreachable("broker-down", 0x25);
    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    a.register_application(APP_A, "handler-a");
    let mut gateway = net.router.subscribe_downlink(GATEWAY).unwrap();

    net.router
        .handle_activation(GATEWAY, join_request(APP_A, DEV))
        .await
        .unwrap();
    assert!(gateway.recv().await.is_some());
}

#[tokio::test]
async fn join_without_gateway_subscription_is_not_accepted() {
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("EU_863_870");
    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    a.register_application(APP_A, "handler-a");

    let err = net
        .router
        .handle_activation(GATEWAY, join_request(APP_A, DEV))
        .await
        .unwrap_err();
    assert!(err.is_not_accepted());
    // the broker still activated the device; only the join-accept was lost
    assert!(a.devices.get(APP_A, DEV).is_ok());
}

#[tokio::test]
async fn reactivation_moves_the_device_to_a_new_address() {
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("EU_863_870");
    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    a.register_application(APP_A, "handler-a");
    let mut gateway = net.router.subscribe_downlink(GATEWAY).unwrap();

    for _ in 0..2 {
        net.router
            .handle_activation(GATEWAY, join_request(APP_A, DEV))
            .await
            .unwrap();
        gateway.recv().await.unwrap();
    }

    let first = DevAddr([0x26, 0, 0, 1]);
    let second = DevAddr([0x26, 0, 0, 2]);
    assert!(a.devices.get_by_address(first).unwrap().is_empty());
    let holders = a.devices.get_by_address(second).unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].dev_eui, DEV);
}

#[tokio::test]
async fn unknown_region_is_rejected() {
    let net = Network::new(RouterConfig::default());
    net.gateway_reports("ATLANTIS");
    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    a.register_application(APP_A, "handler-a");

    let err = net
        .router
        .handle_activation(GATEWAY, join_request(APP_A, DEV))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::Band(_)));
    assert!(a.devices.get(APP_A, DEV).unwrap_err().is_not_found());
}

#[tokio::test]
async fn short_request_timeout_still_admits_prompt_brokers() {
    let net = Network::new(RouterConfig {
        request_timeout_ms: 50,
        ..Default::default()
    });
    net.gateway_reports("EU_863_870");
    let a = net.add_broker(InProcessBroker::new("broker-a", 0x26, memory_devices()));
    a.register_application(APP_A, "handler-a");
    let mut gateway = net.router.subscribe_downlink(GATEWAY).unwrap();

    let started = std::time::Instant::now();
    net.router
        .handle_activation(GATEWAY, join_request(APP_A, DEV))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(gateway.recv().await.is_some());
}
