//! Data model (§3) and Config surface (§6).
//!
//! `GatewayConfig` is the typed aggregate everything else in the crate is
//! built from; it is loaded once at startup via the `config` crate (TOML
//! file, overlaid with `SPF_`-prefixed environment variables) and never
//! touched again on the hot path.

use serde::Deserialize;

use crate::phy::PhySettings;

/// Immutable gateway identity advertised in every `stat` datagram.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayIdentity {
    /// 64-bit gateway EUI.
    #[serde(with = "eui_hex")]
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub platform: String,
    pub contact: String,
    pub description: String,
}

impl GatewayIdentity {
    pub fn eui_bytes(&self) -> [u8; 8] {
        self.id.to_be_bytes()
    }
}

mod eui_hex {
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(d)?;
        let trimmed = raw.trim_start_matches("0x").trim_start_matches("0X");
        u64::from_str_radix(trimmed, 16).map_err(D::Error::custom)
    }
}

/// Network server UDP endpoint (immutable after init).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u8,
}

fn default_port() -> u16 {
    1700
}

fn default_protocol_version() -> u8 {
    2
}

/// Regional constraints the Downlink Scheduler validates against (§4.6 step 1/2).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegionalPlan {
    pub freq_min_hz: u64,
    pub freq_max_hz: u64,
    pub power_min_dbm: i32,
    pub power_max_dbm: i32,
}

impl RegionalPlan {
    pub fn freq_in_range(&self, freq_hz: u64) -> bool {
        (self.freq_min_hz..=self.freq_max_hz).contains(&freq_hz)
    }

    pub fn power_in_range(&self, power_dbm: i32) -> bool {
        (self.power_min_dbm..=self.power_max_dbm).contains(&power_dbm)
    }
}

/// Per-channel default PHY settings plus its place in the 8-slot table (§3 `ChannelId`).
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub channel: u8,
    pub defaults: PhySettings,
}

/// Everything the gateway needs at startup; deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub identity: GatewayIdentity,
    pub server: ServerEndpoint,
    pub ntp_host: String,
    pub regional_plan: RegionalPlan,
    pub channels: Vec<ChannelConfig>,
    #[serde(default = "default_stat_interval")]
    pub stat_interval_secs: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
}

fn default_stat_interval() -> u64 {
    60
}

fn default_keepalive_interval() -> u64 {
    15
}

impl GatewayConfig {
    /// Load from a TOML file, overlaid with `SPF_`-prefixed environment
    /// variables (e.g. `SPF_SERVER__HOST=ns.example.org`).
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SPF").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eui_parses_hex_string() {
        let toml = r#"
            id = "0x00800000A0001234"
            latitude = 1.0
            longitude = 2.0
            altitude = 3
            platform = "p"
            contact = "c"
            description = "d"
        "#;
        let identity: GatewayIdentity = toml::from_str(toml).expect("parse");
        assert_eq!(identity.id, 0x0080_0000_A000_1234);
    }

    #[test]
    fn regional_plan_bounds_are_inclusive() {
        let plan = RegionalPlan {
            freq_min_hz: 923_000_000,
            freq_max_hz: 925_000_000,
            power_min_dbm: 2,
            power_max_dbm: 20,
        };
        assert!(plan.freq_in_range(923_000_000));
        assert!(plan.freq_in_range(925_000_000));
        assert!(!plan.freq_in_range(922_999_999));
        assert!(plan.power_in_range(2));
        assert!(plan.power_in_range(20));
        assert!(!plan.power_in_range(21));
    }
}
