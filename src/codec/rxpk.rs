//! Wire JSON shapes for the uplink path: `rxpk` and `stat`, carried inside a
//! PUSH_DATA payload (§6).

use serde::{Deserialize, Serialize};

use super::fields::{base64_payload, format_coding_rate, format_data_rate};
use crate::rxpacket::RxPacket;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RxPk {
    pub chan: u8,
    pub rfch: u8,
    pub freq: f64,
    pub stat: i8,
    pub modu: String,
    pub datr: String,
    pub codr: String,
    pub rssi: i32,
    pub lsnr: f32,
    pub size: u32,
    #[serde(with = "base64_payload")]
    pub data: Vec<u8>,
    pub tmst: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmms: Option<u64>,
}

impl RxPk {
    /// Build the wire record for one successfully received frame. `time` is
    /// the caller's wall-clock reading (§9 open question 3: `tmst` and wall
    /// clock are independent sources).
    pub fn from_packet(packet: &RxPacket, time: Option<String>) -> Self {
        let payload = packet.payload.clone().unwrap_or_default();
        RxPk {
            chan: packet.channel,
            rfch: packet.rf_chain,
            freq: packet.freq_mhz,
            stat: 1,
            modu: "LORA".to_string(),
            datr: format_data_rate(packet.spreading_factor, packet.bandwidth_khz),
            codr: format_coding_rate(packet.coding_rate_denom),
            rssi: packet.rssi,
            lsnr: packet.snr,
            size: payload.len() as u32,
            data: payload,
            tmst: packet.tmst,
            time,
            tmms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stat {
    pub time: String,
    pub lati: f64,
    pub long: f64,
    pub alti: i32,
    pub rxnb: u32,
    pub rxok: u32,
    pub rxfw: u32,
    pub ackr: f64,
    pub dwnb: u32,
    pub txnb: u32,
    pub pfrm: String,
    pub mail: String,
    pub desc: String,
}

/// The PUSH_DATA JSON body: `{"rxpk": [...], "stat": {...}}`, either key
/// optional (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PushData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rxpk: Option<Vec<RxPk>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<Stat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rxpacket::RxOutcome;

    #[test]
    fn from_packet_matches_end_to_end_scenario_1() {
        let packet = RxPacket {
            channel: 0,
            rf_chain: 0,
            freq_mhz: 923.2,
            outcome: RxOutcome::Received,
            spreading_factor: 10,
            bandwidth_khz: 125,
            coding_rate_denom: 5,
            rssi: -80,
            snr: 8.0,
            payload: Some(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            tmst: 42,
        };
        let rxpk = RxPk::from_packet(&packet, None);
        assert_eq!(rxpk.chan, 0);
        assert_eq!(rxpk.datr, "SF10BW125");
        assert_eq!(rxpk.codr, "4/5");
        assert_eq!(rxpk.rssi, -80);
        assert_eq!(rxpk.lsnr, 8.0);
        assert_eq!(rxpk.size, 4);
        let json = serde_json::to_value(&rxpk).unwrap();
        assert_eq!(json["data"], "3q2+7w==");
    }

    #[test]
    fn push_data_omits_absent_keys() {
        let data = PushData::default();
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, "{}");
    }
}
