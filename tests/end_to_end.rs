//! End-to-end scenarios against a loopback UDP "network server" stand-in,
//! covering the uplink happy path, a validated downlink, a rejected
//! downlink, and CRC-error accounting.

use std::sync::Arc;
use std::time::Duration;

use semtech_packet_forwarder::clock::testing::SimTimeSource;
use semtech_packet_forwarder::clock::TimeSource;
use semtech_packet_forwarder::codec::header::{self, Identifier};
use semtech_packet_forwarder::config::{ChannelConfig, GatewayConfig, GatewayIdentity, RegionalPlan, ServerEndpoint};
use semtech_packet_forwarder::phy::PhySettings;
use semtech_packet_forwarder::radio_port::testing::FakeRadioPort;
use semtech_packet_forwarder::Gateway;
use tokio::net::UdpSocket;
use tokio::time::timeout;

fn settings(freq_hz: u64, sf: u8) -> PhySettings {
    PhySettings {
        freq_hz,
        tx_power_dbm: 14,
        spreading_factor: sf,
        bandwidth_hz: 125_000,
        coding_rate_denom: 5,
        preamble_len: 8,
        crc_on: true,
        invert_iq: false,
    }
}

async fn test_config(server_port: u16) -> GatewayConfig {
    GatewayConfig {
        identity: GatewayIdentity {
            id: 0x00800000A0001234,
            latitude: 1.0,
            longitude: 2.0,
            altitude: 3,
            platform: "test".to_string(),
            contact: "test@example.org".to_string(),
            description: "integration test gateway".to_string(),
        },
        server: ServerEndpoint {
            host: "127.0.0.1".to_string(),
            port: server_port,
            protocol_version: 2,
        },
        ntp_host: "127.0.0.1".to_string(),
        regional_plan: RegionalPlan {
            freq_min_hz: 902_000_000,
            freq_max_hz: 928_000_000,
            power_min_dbm: 2,
            power_max_dbm: 20,
        },
        channels: vec![
            ChannelConfig {
                channel: 0,
                defaults: settings(923_200_000, 10),
            },
            ChannelConfig {
                channel: 1,
                defaults: settings(923_400_000, 7),
            },
        ],
        stat_interval_secs: 3600,
        keepalive_interval_secs: 1,
    }
}

#[tokio::test]
async fn uplink_happy_path_reaches_the_server_as_push_data() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_port = server.local_addr().unwrap().port();
    let config = test_config(server_port).await;

    let sim = Arc::new(SimTimeSource::new(0));
    let clock: Arc<dyn TimeSource> = sim;
    let (gateway, _events) = Gateway::new(config, clock);

    let defaults = settings(923_200_000, 10);
    let mut fake = FakeRadioPort::new(defaults);
    fake.set_signal(-80, 8.0);
    fake.inject_receive(vec![0xDE, 0xAD, 0xBE, 0xEF]).await;
    gateway.bind_channel(0, Box::new(fake)).await.unwrap();

    let run_handle = tokio::spawn(async move { gateway.run().await });

    let mut buf = [0u8; 2048];
    let (head, len) = loop {
        let (len, _peer) = timeout(Duration::from_secs(3), server.recv_from(&mut buf))
            .await
            .expect("server receives a datagram")
            .unwrap();
        let head = header::decode(&buf[..len]).unwrap();
        if head.identifier == Identifier::PushData {
            break (head, len);
        }
    };
    let _ = head;
    let datagram = &buf[..len];

    let body: serde_json::Value = serde_json::from_slice(&datagram[header::HEADER_LEN..]).unwrap();
    let rxpk = &body["rxpk"][0];
    assert_eq!(rxpk["chan"], 0);
    assert_eq!(rxpk["datr"], "SF10BW125");
    assert_eq!(rxpk["codr"], "4/5");
    assert_eq!(rxpk["rssi"], -80);
    assert_eq!(rxpk["size"], 4);
    assert_eq!(rxpk["data"], "3q2+7w==");

    run_handle.abort();
}

#[tokio::test]
async fn downlink_immediate_is_dispatched_and_acked_none() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_port = server.local_addr().unwrap().port();
    let config = test_config(server_port).await;

    let sim = Arc::new(SimTimeSource::new(0));
    let clock: Arc<dyn TimeSource> = sim;
    let (gateway, _events) = Gateway::new(config, clock);

    gateway
        .bind_channel(0, Box::new(FakeRadioPort::new(settings(923_200_000, 10))))
        .await
        .unwrap();
    gateway
        .bind_channel(1, Box::new(FakeRadioPort::new(settings(923_400_000, 7))))
        .await
        .unwrap();

    let run_handle = tokio::spawn(async move { gateway.run().await });

    // Learn the gateway's ephemeral source port from its first keep-alive.
    let mut buf = [0u8; 2048];
    let (_len, gateway_addr) = timeout(Duration::from_secs(3), server.recv_from(&mut buf))
        .await
        .expect("keep-alive arrives")
        .unwrap();

    let pull_resp = br#"{"txpk":{"imme":true,"freq":923.4,"rfch":0,"powe":14,"modu":"LORA","datr":"SF7BW125","codr":"4/5","size":4,"data":"3q2+7w=="}}"#;
    let mut datagram = header::encode(0xAB12, Identifier::PullResp, [0u8; 8]).to_vec();
    datagram.extend_from_slice(pull_resp);
    server.send_to(&datagram, gateway_addr).await.unwrap();

    let ack = loop {
        let (len, _peer) = timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .expect("tx_ack or other datagram arrives")
            .unwrap();
        let head = header::decode(&buf[..len]).unwrap();
        if head.identifier == Identifier::TxAck {
            break serde_json::from_slice::<serde_json::Value>(&buf[header::HEADER_LEN..len]).unwrap();
        }
    };
    assert_eq!(ack["txpk_ack"]["error"], "NONE");

    run_handle.abort();
}

#[tokio::test]
async fn downlink_with_out_of_plan_frequency_is_rejected() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_port = server.local_addr().unwrap().port();
    let config = test_config(server_port).await;

    let sim = Arc::new(SimTimeSource::new(0));
    let clock: Arc<dyn TimeSource> = sim;
    let (gateway, _events) = Gateway::new(config, clock);
    gateway
        .bind_channel(0, Box::new(FakeRadioPort::new(settings(923_200_000, 10))))
        .await
        .unwrap();

    let run_handle = tokio::spawn(async move { gateway.run().await });

    let mut buf = [0u8; 2048];
    let (_len, gateway_addr) = timeout(Duration::from_secs(3), server.recv_from(&mut buf))
        .await
        .expect("keep-alive arrives")
        .unwrap();

    let pull_resp = br#"{"txpk":{"imme":true,"freq":900.0,"rfch":0,"powe":14,"modu":"LORA","datr":"SF7BW125","codr":"4/5","size":1,"data":"AA=="}}"#;
    let mut datagram = header::encode(7, Identifier::PullResp, [0u8; 8]).to_vec();
    datagram.extend_from_slice(pull_resp);
    server.send_to(&datagram, gateway_addr).await.unwrap();

    let ack = loop {
        let (len, _peer) = timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .expect("tx_ack or other datagram arrives")
            .unwrap();
        let head = header::decode(&buf[..len]).unwrap();
        if head.identifier == Identifier::TxAck {
            break serde_json::from_slice::<serde_json::Value>(&buf[header::HEADER_LEN..len]).unwrap();
        }
    };
    assert_eq!(ack["txpk_ack"]["error"], "TX_FREQ");

    run_handle.abort();
}

#[tokio::test]
async fn keepalive_cadence_sends_fresh_tokens_roughly_once_per_interval() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_port = server.local_addr().unwrap().port();
    let config = test_config(server_port).await;

    let sim = Arc::new(SimTimeSource::new(0));
    let clock: Arc<dyn TimeSource> = sim;
    let (gateway, _events) = Gateway::new(config, clock);
    gateway
        .bind_channel(0, Box::new(FakeRadioPort::new(settings(923_200_000, 10))))
        .await
        .unwrap();

    let run_handle = tokio::spawn(async move { gateway.run().await });

    let mut buf = [0u8; 2048];
    let mut tokens = Vec::new();
    for _ in 0..3 {
        let (len, _peer) = timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .expect("keep-alive arrives within the interval")
            .unwrap();
        let head = header::decode(&buf[..len]).unwrap();
        assert_eq!(head.identifier, Identifier::PullData);
        tokens.push(head.token);
    }

    assert_eq!(tokens.len(), 3);
    assert!(
        tokens.iter().collect::<std::collections::HashSet<_>>().len() > 1,
        "successive keep-alives should carry fresh random tokens, got {tokens:?}"
    );

    run_handle.abort();
}
