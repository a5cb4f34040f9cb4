//! Concurrent LoRa-to-LoRaWAN-network-server bridge speaking the Semtech
//! UDP protocol (§1, §2). The crate wires together the Radio Port trait
//! (C1, platform-supplied), the MAC Registry (C2), the codec (C3/C4), the
//! Session Driver (C5), the Downlink Scheduler (C6), and the Supervisor
//! (C7) that starts and reconnects the whole pipeline.

pub mod clock;
pub mod codec;
pub mod config;
pub mod counters;
pub mod downlink;
pub mod error;
pub mod events;
pub mod mac_registry;
pub mod phy;
pub mod radio_port;
pub mod rxpacket;
pub mod scheduler;
pub mod session;
pub mod supervisor;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use clock::TimeSource;
use config::GatewayConfig;
use counters::SessionCounters;
use error::RadioError;
use events::GatewayEvent;
use mac_registry::MacRegistry;
use phy::PhySettings;
use radio_port::RadioPort;
use rxpacket::RxPacket;
use supervisor::Supervisor;

/// Depth of `rxQ`, the queue from the MAC Registry's per-channel forwarding
/// tasks to the uplink worker (§5).
pub const RX_QUEUE_DEPTH: usize = 64;

/// Depth of the gateway event channel handed to callers.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Syncword used when binding a channel, matching the regional plan's
/// public network convention.
pub const DEFAULT_SYNCWORD: u8 = 0x34;

/// Everything needed to run one gateway instance: the MAC Registry (for
/// binding Radio Ports), the Supervisor (for running the pipeline), and an
/// event receiver the embedding application drains for `Connect`/`Uplink`/
/// `Downlink` notifications.
pub struct Gateway {
    config: GatewayConfig,
    registry: MacRegistry,
    supervisor: Supervisor,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Gateway {
    /// Build a gateway from its config and clock. Does not bind any radio
    /// channels or open the UDP socket yet — call `bind_channel` for each
    /// configured channel, then `run`.
    pub fn new(config: GatewayConfig, clock: Arc<dyn TimeSource>) -> (Self, mpsc::Receiver<GatewayEvent>) {
        let (rx_tx, rx_rx) = mpsc::channel::<RxPacket>(RX_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel::<GatewayEvent>(EVENT_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let registry = MacRegistry::new(rx_tx, clock.clone());
        let counters = Arc::new(SessionCounters::new());
        let supervisor = Supervisor::new(config.clone(), clock, counters, event_tx, rx_rx);

        (
            Self {
                config,
                registry,
                supervisor,
                shutdown_tx,
                shutdown_rx,
            },
            event_rx,
        )
    }

    /// Bind a platform-supplied Radio Port to `channel`, using the default
    /// `PhySettings` from config for that channel (§4.2).
    pub async fn bind_channel(&self, channel: u8, port: Box<dyn RadioPort>) -> Result<(), RadioError> {
        let defaults = self.channel_defaults(channel)?;
        self.registry.bind(channel, port, defaults, DEFAULT_SYNCWORD).await
    }

    fn channel_defaults(&self, channel: u8) -> Result<PhySettings, RadioError> {
        self.config
            .channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.defaults)
            .ok_or(RadioError::ChannelUnbound(channel))
    }

    /// Run the pipeline until `shutdown` is called. Reconnects the session
    /// with backoff on transport loss; does not return until shutdown.
    pub async fn run(&self) {
        self.supervisor.run(self.registry.clone(), self.shutdown_rx.clone()).await;
    }

    /// Signal every worker to stop at its next poll.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
