//! Small string <-> value codecs shared by `rxpk` and `txpk` (§4.3, §4.4,
//! §8 round-trip laws): the `"4/N"` coding-rate string, the
//! `"SF<sf>BW<bw>"` data-rate string, and the Base64 payload field.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecodeError;

pub fn format_coding_rate(denom: u8) -> String {
    format!("4/{denom}")
}

pub fn parse_coding_rate(s: &str) -> Result<u8, DecodeError> {
    s.strip_prefix("4/")
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| DecodeError::CodingRate(s.to_string()))
}

pub fn format_data_rate(sf: u8, bandwidth_khz: u32) -> String {
    format!("SF{sf}BW{bandwidth_khz}")
}

pub fn parse_data_rate(s: &str) -> Result<(u8, u32), DecodeError> {
    let rest = s.strip_prefix("SF").ok_or_else(|| DecodeError::DataRate(s.to_string()))?;
    let bw_pos = rest.find("BW").ok_or_else(|| DecodeError::DataRate(s.to_string()))?;
    let sf = rest[..bw_pos].parse::<u8>().map_err(|_| DecodeError::DataRate(s.to_string()))?;
    let bw = rest[bw_pos + 2..]
        .parse::<u32>()
        .map_err(|_| DecodeError::DataRate(s.to_string()))?;
    Ok((sf, bw))
}

/// `serde(with = "base64_payload")`: (de)serializes a `Vec<u8>` as standard
/// Base64 with padding, matching the wire contract in §6.
pub mod base64_payload {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        s.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
