//! Session Driver (C5, §4.5): the one UDP socket to the network server,
//! token bookkeeping, and datagram dispatch by header identifier.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::clock::{format_unix_time, TimeSource};
use crate::codec::header::{self, Identifier};
use crate::codec::rxpk::{PushData, Stat};
use crate::codec::upstream::{encode_push_data, encode_tx_ack, random_token};
use crate::config::GatewayIdentity;
use crate::counters::SessionCounters;
use crate::downlink::TxAckError;
use crate::error::TransportError;
use crate::events::GatewayEvent;

pub struct Session {
    socket: Mutex<UdpSocket>,
    gateway_eui: [u8; 8],
    identity: GatewayIdentity,
    counters: Arc<SessionCounters>,
    clock: Arc<dyn TimeSource>,
    pending_tx_ack_token: Mutex<Option<u16>>,
    event_tx: mpsc::Sender<GatewayEvent>,
    downstream_tx: mpsc::Sender<Vec<u8>>,
    closed: AtomicBool,
}

impl Session {
    /// Resolve `host:port`, bind an ephemeral local socket, and connect it
    /// (§4.5: started after hostname resolution, a `TransportError` if
    /// resolution or connect fails).
    pub async fn connect(
        host: &str,
        port: u16,
        identity: GatewayIdentity,
        counters: Arc<SessionCounters>,
        clock: Arc<dyn TimeSource>,
        event_tx: mpsc::Sender<GatewayEvent>,
        downstream_tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<Self, TransportError> {
        let mut addrs = lookup_host((host, port))
            .await
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                source,
            })?;
        let addr: SocketAddr = addrs.next().ok_or_else(|| TransportError::NoAddress(host.to_string()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(TransportError::Bind)?;
        socket.connect(addr).await.map_err(TransportError::Connect)?;

        let gateway_eui = identity.eui_bytes();
        Ok(Self {
            socket: Mutex::new(socket),
            gateway_eui,
            identity,
            counters,
            clock,
            pending_tx_ack_token: Mutex::new(None),
            event_tx,
            downstream_tx,
            closed: AtomicBool::new(false),
        })
    }

    /// Replace the event sink (§4.5 `register_event_handler`).
    pub fn register_event_handler(&mut self, event_tx: mpsc::Sender<GatewayEvent>) {
        self.event_tx = event_tx;
    }

    async fn send_raw(&self, datagram: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Send(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "session is disconnected",
            )));
        }
        let socket = self.socket.lock().await;
        socket.send(datagram).await.map_err(TransportError::Send)?;
        Ok(())
    }

    /// Send one PUSH_DATA datagram carrying `rxpk` and/or `stat` (§4.3).
    pub async fn send_rxpk(&self, body: PushData) -> Result<(), TransportError> {
        let token = random_token();
        let datagram = encode_push_data(token, self.gateway_eui, &body);
        self.send_raw(&datagram).await?;
        self.counters.inc_txnb();
        Ok(())
    }

    /// Send a `stat`-only PUSH_DATA built from the current counter snapshot
    /// (§4.7 `status-emitter`).
    pub async fn send_stat(&self) -> Result<(), TransportError> {
        let (secs, _micros) = self.clock.utc_now();
        let snapshot = self.counters.snapshot();
        let stat = Stat {
            time: format_unix_time(secs),
            lati: self.identity.latitude,
            long: self.identity.longitude,
            alti: self.identity.altitude,
            rxnb: snapshot.rxnb,
            rxok: snapshot.rxok,
            rxfw: snapshot.rxfw,
            ackr: snapshot.ack_rate_pct(),
            dwnb: snapshot.dwnb,
            txnb: snapshot.txnb,
            pfrm: self.identity.platform.clone(),
            mail: self.identity.contact.clone(),
            desc: self.identity.description.clone(),
        };
        self.send_rxpk(PushData {
            rxpk: None,
            stat: Some(stat),
        })
        .await
    }

    /// Send PULL_DATA: header only, fresh random token, no JSON body
    /// (§4.7 `keep-alive`).
    pub async fn keep_alive(&self) -> Result<(), TransportError> {
        let token = random_token();
        let datagram = header::encode(token, Identifier::PullData, self.gateway_eui);
        self.send_raw(&datagram).await
    }

    /// Send a TX_ACK for the most recently received PULL_RESP (§4.5: MUST
    /// use the last-remembered token, never a random one).
    pub async fn send_tx_ack(&self, error: TxAckError) -> Result<(), TransportError> {
        let token = self.pending_tx_ack_token.lock().await.take().unwrap_or(0);
        let datagram = encode_tx_ack(token, self.gateway_eui, error);
        self.send_raw(&datagram).await
    }

    /// Receive and dispatch exactly one incoming datagram (§4.5 dispatch
    /// table). Intended to be called in a loop by the supervisor.
    pub async fn recv_dispatch(&self) -> Result<(), TransportError> {
        let mut buf = [0u8; 2048];
        let len = {
            let socket = self.socket.lock().await;
            socket.recv(&mut buf).await.map_err(TransportError::Recv)?
        };
        let datagram = &buf[..len];

        if len < header::HEADER_LEN {
            debug!(len, "truncated datagram, ignoring");
            return Ok(());
        }
        let head = match header::decode(datagram) {
            Ok(h) => h,
            Err(err) => {
                debug!(%err, "malformed header, ignoring");
                return Ok(());
            }
        };

        match head.identifier {
            Identifier::PushAck => {
                self.counters.inc_ackn();
                let _ = self.event_tx.try_send(GatewayEvent::RecvAck);
            }
            Identifier::PullAck => {
                let _ = self.event_tx.try_send(GatewayEvent::RecvAck);
            }
            Identifier::PullResp => {
                self.counters.inc_dwnb();
                *self.pending_tx_ack_token.lock().await = Some(head.token);
                if self.downstream_tx.try_send(datagram.to_vec()).is_err() {
                    debug!("txQ full, dropping newest PULL_RESP");
                }
            }
            Identifier::TxAck => {
                debug!("unexpected TX_ACK from server, ignoring");
            }
            Identifier::PushData | Identifier::PullData => {
                debug!(identifier = ?head.identifier, "unexpected gateway-direction identifier from server, ignoring");
            }
        }
        Ok(())
    }

    /// Close the socket; the supervisor drains `txQ` before dropping queues.
    pub fn disconnect(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    // Session has no independent logic worth unit-testing beyond what
    // mac_registry.rs and clock.rs already cover end to end; see
    // crate::clock::tests for the `format_unix_time` cases.
}
