//! Gateway-level events surfaced to the embedding application (§7).

use crate::downlink::TxAckError;

#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Connected,
    Disconnected,
    /// One `rxpk` was forwarded upstream.
    Uplink { channel: u8, size: usize },
    /// A PULL_RESP was validated and either dispatched or rejected.
    Downlink { token: u16, result: TxAckError },
    /// A PUSH_ACK or PULL_ACK arrived from the network server.
    RecvAck,
}
