//! PHY settings and events shared by the Radio Port (C1) and MAC Registry (C2).

use serde::Deserialize;

/// LoRa modulation parameters that must match between transmitter and
/// receiver (§3 `PhySettings`). The MAC Registry keeps one of these per
/// channel as the default; downlinks may apply a transient override.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PhySettings {
    /// Center frequency, Hz.
    pub freq_hz: u64,
    /// Tx power, dBm, valid range 2..=20.
    pub tx_power_dbm: i32,
    /// Spreading factor, valid range 7..=12.
    pub spreading_factor: u8,
    /// Bandwidth, Hz (e.g. 125_000).
    pub bandwidth_hz: u32,
    /// Coding rate denominator of "4/N", valid range 5..=8.
    pub coding_rate_denom: u8,
    pub preamble_len: u16,
    pub crc_on: bool,
    pub invert_iq: bool,
}

impl PhySettings {
    pub fn bandwidth_khz(&self) -> u32 {
        self.bandwidth_hz / 1000
    }
}

/// Event emitted by a Radio Port (§3 `PhyEvent`, §4.1).
#[derive(Debug, Clone)]
pub enum PhyEvent {
    TransmitCompleted,
    /// `len` bytes are buffered inside the port; `drain` retrieves them.
    ReceiveCompleted { len: usize },
    CrcError,
}
