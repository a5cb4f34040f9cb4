//! Downstream Decoder (C4, §5): turns a PULL_RESP datagram into a
//! `TxRequest`, with no knowledge of validation, scheduling, or transport.

use super::fields::{parse_coding_rate, parse_data_rate};
use super::header::{self, Identifier};
use super::txpk::PullResp;
use crate::downlink::TxRequest;
use crate::error::DecodeError;
use crate::phy::PhySettings;

/// Preamble length the wire format does not carry; the gateway's own
/// regional default applies (§4.4 `txpk.prea` is optional).
pub const DEFAULT_PREAMBLE_LEN: u16 = 8;

/// Parse a full PULL_RESP datagram (header + JSON body) into a `TxRequest`.
/// Returns `DecodeError::MissingTxpk` if the identifier byte isn't
/// PULL_RESP, even though the header decodes cleanly — the session driver
/// is expected to dispatch by identifier first, but this keeps the
/// function safe to call standalone (as the tests do).
pub fn decode(datagram: &[u8]) -> Result<TxRequest, DecodeError> {
    let head = header::decode(datagram)?;
    if head.identifier != Identifier::PullResp {
        return Err(DecodeError::MissingTxpk);
    }
    let body = &datagram[header::HEADER_LEN..];
    let pull_resp: PullResp = serde_json::from_slice(body)?;
    txpk_to_request(head.token, pull_resp)
}

fn txpk_to_request(token: u16, pull_resp: PullResp) -> Result<TxRequest, DecodeError> {
    let txpk = pull_resp.txpk;
    let (spreading_factor, bandwidth_hz_khz) = parse_data_rate(&txpk.datr)?;
    let coding_rate_denom = parse_coding_rate(&txpk.codr)?;

    let settings = PhySettings {
        freq_hz: (txpk.freq * 1_000_000.0).round() as u64,
        tx_power_dbm: txpk.powe,
        spreading_factor,
        bandwidth_hz: bandwidth_hz_khz * 1000,
        coding_rate_denom,
        preamble_len: txpk.prea.unwrap_or(DEFAULT_PREAMBLE_LEN),
        crc_on: !txpk.ncrc.unwrap_or(false),
        invert_iq: txpk.ipol,
    };

    Ok(TxRequest {
        token,
        immediate: txpk.imme,
        target_tmst: txpk.tmst.unwrap_or(0),
        modu: txpk.modu,
        settings,
        payload: txpk.data,
    })
}
