//! Upstream Encoder (C3, §5): builds the gateway->server datagrams —
//! PUSH_DATA (rxpk/stat) and TX_ACK.

use serde::Serialize;

use super::header::{self, Identifier};
use super::rxpk::PushData;
use crate::downlink::TxAckError;

/// A fresh random token for a gateway->server datagram (§6: the token
/// ties an ack to the request that triggered it).
pub fn random_token() -> u16 {
    rand::random()
}

pub fn encode_push_data(token: u16, gateway_eui: [u8; 8], body: &PushData) -> Vec<u8> {
    let mut datagram = header::encode(token, Identifier::PushData, gateway_eui).to_vec();
    datagram.extend_from_slice(&serde_json::to_vec(body).expect("PushData always serializes"));
    datagram
}

#[derive(Debug, Serialize)]
struct TxpkAckBody {
    error: &'static str,
}

#[derive(Debug, Serialize)]
struct TxAckEnvelope {
    txpk_ack: TxpkAckBody,
}

/// Build a TX_ACK datagram reporting whether a PULL_RESP was accepted
/// (§4.6 step 4, §6).
pub fn encode_tx_ack(token: u16, gateway_eui: [u8; 8], error: TxAckError) -> Vec<u8> {
    let mut datagram = header::encode(token, Identifier::TxAck, gateway_eui).to_vec();
    let envelope = TxAckEnvelope {
        txpk_ack: TxpkAckBody {
            error: error.as_wire_str(),
        },
    };
    datagram.extend_from_slice(&serde_json::to_vec(&envelope).expect("TxAckEnvelope always serializes"));
    datagram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rxpk::RxPk;

    #[test]
    fn push_data_datagram_has_correct_header_and_body() {
        let eui = [1, 2, 3, 4, 5, 6, 7, 8];
        let rxpk = RxPk {
            chan: 0,
            rfch: 0,
            freq: 923.2,
            stat: 1,
            modu: "LORA".to_string(),
            datr: "SF10BW125".to_string(),
            codr: "4/5".to_string(),
            rssi: -80,
            lsnr: 8.0,
            size: 4,
            data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            tmst: 42,
            time: None,
            tmms: None,
        };
        let body = PushData {
            rxpk: Some(vec![rxpk]),
            stat: None,
        };
        let datagram = encode_push_data(0x1234, eui, &body);
        let decoded = header::decode(&datagram).unwrap();
        assert_eq!(decoded.token, 0x1234);
        assert_eq!(decoded.identifier, Identifier::PushData);
        assert_eq!(decoded.gateway_eui, Some(eui));
        let parsed: PushData = serde_json::from_slice(&datagram[header::HEADER_LEN..]).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn tx_ack_encodes_the_wire_error_string() {
        let eui = [0u8; 8];
        let datagram = encode_tx_ack(7, eui, TxAckError::TooEarly);
        let json: serde_json::Value = serde_json::from_slice(&datagram[header::HEADER_LEN..]).unwrap();
        assert_eq!(json["txpk_ack"]["error"], "TOO_EARLY");
    }
}
