//! Wire JSON shape for the downlink path: `txpk`, carried inside a
//! PULL_RESP payload (§6).

use serde::{Deserialize, Serialize};

use super::fields::base64_payload;

fn default_powe() -> i32 {
    14
}

fn default_modu() -> String {
    "LORA".to_string()
}

fn default_datr() -> String {
    "SF7BW125".to_string()
}

fn default_codr() -> String {
    "4/5".to_string()
}

/// Every field here is optional on the wire (§4.4/§6): a PULL_RESP may omit
/// any of them and still decode, falling back to the documented default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxPk {
    #[serde(default)]
    pub imme: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmst: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmms: Option<u64>,
    #[serde(default)]
    pub freq: f64,
    #[serde(default)]
    pub rfch: u8,
    #[serde(default = "default_powe")]
    pub powe: i32,
    #[serde(default = "default_modu")]
    pub modu: String,
    #[serde(default = "default_datr")]
    pub datr: String,
    #[serde(default = "default_codr")]
    pub codr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fdev: Option<u32>,
    #[serde(default)]
    pub ipol: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prea: Option<u16>,
    #[serde(default)]
    pub size: u32,
    #[serde(default, with = "base64_payload")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncrc: Option<bool>,
}

/// The PULL_RESP JSON body: `{"txpk": {...}}` (§4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullResp {
    pub txpk: TxPk,
}
