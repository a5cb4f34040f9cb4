//! `RxPacket`, the MAC Registry's (C2) output record (§3).

/// What kind of PHY event produced this record. Only `Received` carries a
/// payload and becomes an `rxpk` entry; the other two exist purely so the
/// uplink worker can account for them in `SessionCounters` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// Valid CRC, payload present.
    Received,
    /// `len == 0` or a `CrcError` event: counts toward `rxnb` but not `rxok`.
    CrcFailed,
    /// A `TransmitCompleted` event, reported here so the uplink worker can
    /// bump `rxfw` without a separate channel.
    TransmitCompleted,
}

#[derive(Debug, Clone)]
pub struct RxPacket {
    pub channel: u8,
    pub rf_chain: u8,
    pub freq_mhz: f64,
    pub outcome: RxOutcome,
    pub spreading_factor: u8,
    pub bandwidth_khz: u32,
    pub coding_rate_denom: u8,
    pub rssi: i32,
    pub snr: f32,
    /// `None` for `CrcFailed` / `TransmitCompleted` records.
    pub payload: Option<Vec<u8>>,
    /// Internal clock reading at the "RX finished" instant.
    pub tmst: u32,
}

impl RxPacket {
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.len())
    }
}
