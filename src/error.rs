//! Error taxonomy for the forwarder (§7).
//!
//! Each variant family maps to one of the policies in the spec: transport
//! errors trigger reconnect, decode errors drop the datagram, validation
//! errors become a `TX_ACK` error code, and resource exhaustion drops the
//! offending item without ever blocking its producer.

use std::net::AddrParseError;

use thiserror::Error;

use crate::downlink::TxAckError;

/// Failures of the UDP session to the network server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve network server host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid server address: {0}")]
    Addr(#[from] AddrParseError),
    #[error("no addresses found for host {0}")]
    NoAddress(String),
    #[error("failed to bind local UDP socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to connect UDP socket: {0}")]
    Connect(#[source] std::io::Error),
    #[error("socket write failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("socket read failed: {0}")]
    Recv(#[source] std::io::Error),
}

/// Failures parsing a datagram payload into a typed value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("PULL_RESP JSON is missing the \"txpk\" root object")]
    MissingTxpk,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid coding rate string {0:?}, expected \"4/N\"")]
    CodingRate(String),
    #[error("invalid data rate string {0:?}, expected \"SF<sf>BW<bw>\"")]
    DataRate(String),
    #[error("datagram shorter than the 12-byte Semtech header")]
    ShortHeader,
}

/// Validation failures for a downlink request, each maps 1:1 to a TX_ACK code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("frequency outside the configured regional plan")]
    TxFreq,
    #[error("tx power outside the configured power range")]
    TxPower,
    #[error("timestamp already elapsed, or unsupported modulation parameters")]
    TooLate,
    #[error("timestamp too far in the future")]
    TooEarly,
}

impl From<ValidationError> for TxAckError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::TxFreq => TxAckError::TxFreq,
            ValidationError::TxPower => TxAckError::TxPower,
            ValidationError::TooLate => TxAckError::TooLate,
            ValidationError::TooEarly => TxAckError::TooEarly,
        }
    }
}

/// A bounded resource was full, or an allocation could not be satisfied.
/// Never surfaced to the producer as a reason to block; always a drop.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResourceExhaustion {
    #[error("rx queue full, dropping newest rx event")]
    RxQueueFull,
    #[error("tx queue full, dropping newest downlink datagram")]
    TxQueueFull,
    #[error("schedule queue full, dropping downlink request")]
    ScheduleQueueFull,
}

/// Radio Port / MAC Registry level failures (§4.1, §4.2).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    #[error("channel {0} is out of range (must be 0..=7)")]
    ChannelOutOfRange(u8),
    #[error("channel {0} already has a bound radio port")]
    ChannelAlreadyBound(u8),
    #[error("channel {0} has no bound radio port")]
    ChannelUnbound(u8),
    #[error("radio port failed to acknowledge a known version register during init")]
    InitFailed,
    #[error("no channel is configured with frequency {0} Hz")]
    NoChannelAtFrequency(u64),
    #[error("frequency {freq_hz} Hz collides with channel {existing} already at that frequency")]
    DuplicateFrequency { freq_hz: u64, existing: u8 },
}
