//! Supervisor (C7, §4.7): spawns the five workers, owns `rxQ`/`txQ`/
//! `scheduleQ`, and reconnects the session with capped exponential backoff
//! on transport loss.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::clock::{format_unix_time, TimeSource};
use crate::codec::downstream;
use crate::codec::rxpk::{PushData, RxPk};
use crate::config::GatewayConfig;
use crate::counters::SessionCounters;
use crate::downlink::{self, ScheduleItem, TxAckError};
use crate::error::TransportError;
use crate::events::GatewayEvent;
use crate::mac_registry::MacRegistry;
use crate::rxpacket::{RxOutcome, RxPacket};
use crate::scheduler::Scheduler;
use crate::session::Session;

const TX_QUEUE_DEPTH: usize = 16;
const SCHEDULE_QUEUE_DEPTH: usize = 16;
const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(50);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Owns the rxQ consumer across reconnects (the MAC Registry keeps
/// forwarding received frames onto it whether or not the session is up)
/// plus the config/clock/counters every worker cycle needs.
pub struct Supervisor {
    config: GatewayConfig,
    clock: Arc<dyn TimeSource>,
    counters: Arc<SessionCounters>,
    event_tx: mpsc::Sender<GatewayEvent>,
    rx_rx: Mutex<mpsc::Receiver<RxPacket>>,
}

impl Supervisor {
    pub fn new(
        config: GatewayConfig,
        clock: Arc<dyn TimeSource>,
        counters: Arc<SessionCounters>,
        event_tx: mpsc::Sender<GatewayEvent>,
        rx_rx: mpsc::Receiver<RxPacket>,
    ) -> Self {
        Self {
            config,
            clock,
            counters,
            event_tx,
            rx_rx: Mutex::new(rx_rx),
        }
    }

    /// Run until `shutdown` reports `true`, reconnecting the session with
    /// backoff whenever the transport is lost (§4.7).
    pub async fn run(&self, registry: MacRegistry, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.run_once(&registry, shutdown.clone()).await {
                Ok(()) => return,
                Err(err) => {
                    let _ = self.event_tx.try_send(GatewayEvent::Disconnected);
                    warn!(%err, backoff_secs = backoff.as_secs(), "transport lost, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => if *shutdown.borrow() { return; },
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    /// One connect-and-run cycle: returns `Ok(())` on clean shutdown, or the
    /// `TransportError` that ended the cycle (triggering a reconnect).
    async fn run_once(&self, registry: &MacRegistry, shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        let (downstream_tx, mut downstream_rx) = mpsc::channel::<Vec<u8>>(TX_QUEUE_DEPTH);
        let (schedule_tx, schedule_rx) = mpsc::channel::<ScheduleItem>(SCHEDULE_QUEUE_DEPTH);

        let session = Session::connect(
            &self.config.server.host,
            self.config.server.port,
            self.config.identity.clone(),
            self.counters.clone(),
            self.clock.clone(),
            self.event_tx.clone(),
            downstream_tx,
        )
        .await?;
        let session = Arc::new(session);
        let _ = self.event_tx.try_send(GatewayEvent::Connected);
        info!("session connected");

        let scheduler = Scheduler::new(registry.clone(), self.clock.clone(), schedule_rx);

        let recv_session = session.clone();
        let mut recv_stop = shutdown.clone();
        let recv_fut = async {
            loop {
                tokio::select! {
                    _ = recv_stop.changed() => { if *recv_stop.borrow() { return Ok(()); } }
                    result = recv_session.recv_dispatch() => { result?; }
                }
            }
        };

        let status_session = session.clone();
        let stat_interval = Duration::from_secs(self.config.stat_interval_secs);
        let mut status_stop = shutdown.clone();
        let status_fut = async {
            loop {
                tokio::select! {
                    _ = status_stop.changed() => { if *status_stop.borrow() { return Ok(()); } }
                    _ = tokio::time::sleep(stat_interval) => {
                        status_session.send_stat().await?;
                    }
                }
            }
        };

        let keepalive_session = session.clone();
        let keepalive_interval = Duration::from_secs(self.config.keepalive_interval_secs);
        let mut keepalive_stop = shutdown.clone();
        let keepalive_fut = async {
            loop {
                tokio::select! {
                    _ = keepalive_stop.changed() => { if *keepalive_stop.borrow() { return Ok(()); } }
                    _ = tokio::time::sleep(keepalive_interval) => {
                        keepalive_session.keep_alive().await?;
                    }
                }
            }
        };

        let mut rx_rx = self.rx_rx.lock().await;
        let mut uplink_stop = shutdown.clone();
        let uplink_fut = async {
            loop {
                tokio::select! {
                    _ = uplink_stop.changed() => { if *uplink_stop.borrow() { return Ok(()); } }
                    next = tokio::time::timeout(QUEUE_POLL_TIMEOUT, rx_rx.recv()) => {
                        if let Ok(Some(packet)) = next {
                            forward_uplink(&session, &self.counters, self.clock.as_ref(), &self.event_tx, packet).await?;
                        }
                    }
                }
            }
        };

        let mut downlink_stop = shutdown.clone();
        let downlink_fut = async {
            loop {
                tokio::select! {
                    _ = downlink_stop.changed() => { if *downlink_stop.borrow() { return Ok(()); } }
                    next = tokio::time::timeout(QUEUE_POLL_TIMEOUT, downstream_rx.recv()) => {
                        if let Ok(Some(datagram)) = next {
                            handle_downlink(
                                &session,
                                &self.event_tx,
                                self.clock.as_ref(),
                                &self.config.regional_plan,
                                &self.config,
                                &schedule_tx,
                                datagram,
                            )
                            .await?;
                        }
                    }
                }
            }
        };

        let scheduler_stop = shutdown.clone();
        let scheduler_fut = async {
            scheduler.run(scheduler_stop).await;
            Ok(())
        };

        let outcome: Result<(), TransportError> = tokio::select! {
            r = recv_fut => r,
            r = status_fut => r,
            r = keepalive_fut => r,
            r = uplink_fut => r,
            r = downlink_fut => r,
            r = scheduler_fut => r,
        };

        drop(rx_rx);
        session.disconnect();
        outcome
    }
}

async fn forward_uplink(
    session: &Session,
    counters: &SessionCounters,
    clock: &dyn TimeSource,
    events: &mpsc::Sender<GatewayEvent>,
    packet: RxPacket,
) -> Result<(), TransportError> {
    match packet.outcome {
        RxOutcome::Received => {
            counters.inc_rxnb();
            counters.inc_rxok();
            counters.inc_rxfw();
            let (secs, _) = clock.utc_now();
            let size = packet.size();
            let channel = packet.channel;
            let rxpk = RxPk::from_packet(&packet, Some(format_unix_time(secs)));
            session
                .send_rxpk(PushData {
                    rxpk: Some(vec![rxpk]),
                    stat: None,
                })
                .await?;
            let _ = events.try_send(GatewayEvent::Uplink { channel, size });
        }
        RxOutcome::CrcFailed => {
            counters.inc_rxnb();
        }
        RxOutcome::TransmitCompleted => {
            debug!(channel = packet.channel, "radio reported transmit completed");
        }
    }
    Ok(())
}

async fn handle_downlink(
    session: &Session,
    events: &mpsc::Sender<GatewayEvent>,
    clock: &dyn TimeSource,
    regional_plan: &crate::config::RegionalPlan,
    config: &GatewayConfig,
    schedule_tx: &mpsc::Sender<ScheduleItem>,
    datagram: Vec<u8>,
) -> Result<(), TransportError> {
    let request = match downstream::decode(&datagram) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "dropping malformed PULL_RESP");
            return Ok(());
        }
    };
    let token = request.token;
    let enqueued_tmst = clock.now_tmst();

    let outcome =
        downlink::validate(&request, regional_plan, enqueued_tmst).and_then(|()| downlink::channel_for_request(&request, config));

    match outcome {
        Ok(channel) => {
            session.send_tx_ack(TxAckError::None).await?;
            let item = ScheduleItem {
                channel,
                immediate: request.immediate,
                target_tmst: request.target_tmst,
                enqueued_tmst,
                settings: request.settings,
                payload: request.payload,
            };
            if schedule_tx.try_send(item).is_err() {
                warn!(channel, "scheduleQ full, dropping downlink request");
            }
            let _ = events.try_send(GatewayEvent::Downlink {
                token,
                result: TxAckError::None,
            });
        }
        Err(validation_err) => {
            let ack_err: TxAckError = validation_err.into();
            session.send_tx_ack(ack_err).await?;
            let _ = events.try_send(GatewayEvent::Downlink { token, result: ack_err });
        }
    }
    Ok(())
}
