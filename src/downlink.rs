//! Downlink request validation and scheduling types (§4.4, §4.6).

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::clock::signed_delta;
use crate::config::{GatewayConfig, RegionalPlan};
use crate::error::ValidationError;
use crate::phy::PhySettings;

/// TX_ACK error codes (§6): `None` means the downlink was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum TxAckError {
    None = 0,
    TooLate = 1,
    TooEarly = 2,
    TxPower = 3,
    TxFreq = 4,
}

impl TxAckError {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            TxAckError::None => "NONE",
            TxAckError::TooLate => "TOO_LATE",
            TxAckError::TooEarly => "TOO_EARLY",
            TxAckError::TxPower => "TX_POWER",
            TxAckError::TxFreq => "TX_FREQ",
        }
    }
}

/// A decoded PULL_RESP, ready for validation against the regional plan and
/// the current clock (§4.4).
#[derive(Debug, Clone)]
pub struct TxRequest {
    /// Token copied from the PULL_RESP header, echoed in the TX_ACK.
    pub token: u16,
    pub immediate: bool,
    pub target_tmst: u32,
    /// `txpk.modu`; only `"LORA"` is accepted (§4.6 rule 3).
    pub modu: String,
    pub settings: PhySettings,
    pub payload: Vec<u8>,
}

impl TxRequest {
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// A validated request waiting in the Downlink Scheduler's per-channel
/// queue (§4.6, §5 C6).
#[derive(Debug, Clone)]
pub struct ScheduleItem {
    pub channel: u8,
    pub immediate: bool,
    pub target_tmst: u32,
    /// `tmst` at the moment the item was enqueued, used for the "too late"
    /// check at dispatch time even if the scheduler is running behind.
    pub enqueued_tmst: u32,
    pub settings: PhySettings,
    pub payload: Vec<u8>,
}

/// How far in the past (radio clock ticks) a scheduled `target_tmst` may
/// already lie before it's rejected as `TOO_LATE` rather than enqueued
/// (§4.6 rule 4). A generous one second grace covers validation/enqueue
/// latency on an already-due item.
pub const TOO_LATE_TOLERANCE_US: u32 = 1_000_000;

/// How far in the future (radio clock ticks) a scheduled `target_tmst` may
/// lie before it's rejected as `TOO_EARLY` rather than enqueued (§4.6 rule
/// 4; §9 open question 2 — one second, matching the Semtech reference
/// forwarder's scheduling horizon).
pub const TOO_EARLY_HORIZON_US: u32 = 1_000_000;

/// Validate a decoded request against the regional plan, gateway config,
/// and the clock (§4.4, §4.6). `now_tmst` is the scheduler's clock reading
/// at enqueue time; timing is only checked for scheduled (non-`immediate`)
/// requests, since an immediate request transmits as soon as it's dispatched
/// regardless of `target_tmst`.
pub fn validate(request: &TxRequest, plan: &RegionalPlan, now_tmst: u32) -> Result<(), ValidationError> {
    if !plan.freq_in_range(request.settings.freq_hz) {
        return Err(ValidationError::TxFreq);
    }
    if !plan.power_in_range(request.settings.tx_power_dbm) {
        return Err(ValidationError::TxPower);
    }
    if request.modu != "LORA" {
        return Err(ValidationError::TooLate);
    }
    if !(7..=12).contains(&request.settings.spreading_factor) {
        return Err(ValidationError::TooLate);
    }
    if !(5..=8).contains(&request.settings.coding_rate_denom) {
        return Err(ValidationError::TooLate);
    }
    if !request.immediate {
        let delta = signed_delta(request.target_tmst, now_tmst);
        if delta < 0 && delta.unsigned_abs() > TOO_LATE_TOLERANCE_US {
            return Err(ValidationError::TooLate);
        }
        if delta > 0 && (delta as u32) > TOO_EARLY_HORIZON_US {
            return Err(ValidationError::TooEarly);
        }
    }
    Ok(())
}

/// Resolve the channel to schedule on: the one whose configured frequency
/// matches the request (§4.6).
pub fn channel_for_request(request: &TxRequest, config: &GatewayConfig) -> Result<u8, ValidationError> {
    config
        .channels
        .iter()
        .find(|c| c.defaults.freq_hz == request.settings.freq_hz)
        .map(|c| c.channel)
        .ok_or(ValidationError::TxFreq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionalPlan;

    fn settings(freq_hz: u64, tx_power_dbm: i32) -> PhySettings {
        PhySettings {
            freq_hz,
            tx_power_dbm,
            spreading_factor: 10,
            bandwidth_hz: 125_000,
            coding_rate_denom: 5,
            preamble_len: 8,
            crc_on: true,
            invert_iq: true,
        }
    }

    fn plan() -> RegionalPlan {
        RegionalPlan {
            freq_min_hz: 902_000_000,
            freq_max_hz: 928_000_000,
            power_min_dbm: 2,
            power_max_dbm: 20,
        }
    }

    fn request(target_tmst: u32, immediate: bool, freq_hz: u64, tx_power_dbm: i32) -> TxRequest {
        TxRequest {
            token: 1,
            immediate,
            target_tmst,
            modu: "LORA".to_string(),
            settings: settings(freq_hz, tx_power_dbm),
            payload: vec![],
        }
    }

    #[test]
    fn rejects_frequency_outside_the_plan() {
        let req = request(0, true, 800_000_000, 14);
        assert_eq!(validate(&req, &plan(), 0), Err(ValidationError::TxFreq));
    }

    #[test]
    fn rejects_power_outside_the_plan() {
        let req = request(0, true, 915_000_000, 30);
        assert_eq!(validate(&req, &plan(), 0), Err(ValidationError::TxPower));
    }

    #[test]
    fn rejects_non_lora_modulation() {
        let mut req = request(0, true, 915_000_000, 14);
        req.modu = "FSK".to_string();
        assert_eq!(validate(&req, &plan(), 0), Err(ValidationError::TooLate));
    }

    #[test]
    fn accepts_a_request_within_plan_bounds() {
        let req = request(0, true, 915_000_000, 14);
        assert_eq!(validate(&req, &plan(), 0), Ok(()));
    }

    #[test]
    fn immediate_requests_skip_the_timing_check_entirely() {
        // An immediate item's target_tmst is meaningless (the scheduler
        // ignores it and transmits right away), so a wildly stale value
        // must not trip TOO_LATE.
        let req = request(0, true, 915_000_000, 14);
        assert_eq!(validate(&req, &plan(), 10_000_000), Ok(()));
    }

    #[test]
    fn rejects_a_scheduled_target_too_far_in_the_past() {
        let req = request(0, false, 915_000_000, 14);
        assert_eq!(
            validate(&req, &plan(), TOO_LATE_TOLERANCE_US + 1),
            Err(ValidationError::TooLate)
        );
    }

    #[test]
    fn accepts_a_scheduled_target_just_within_the_late_tolerance() {
        let req = request(0, false, 915_000_000, 14);
        assert_eq!(validate(&req, &plan(), TOO_LATE_TOLERANCE_US), Ok(()));
    }

    #[test]
    fn rejects_a_scheduled_target_beyond_the_early_horizon() {
        let req = request(TOO_EARLY_HORIZON_US + 1, false, 915_000_000, 14);
        assert_eq!(validate(&req, &plan(), 0), Err(ValidationError::TooEarly));
    }

    #[test]
    fn accepts_a_scheduled_target_just_within_the_early_horizon() {
        let req = request(TOO_EARLY_HORIZON_US, false, 915_000_000, 14);
        assert_eq!(validate(&req, &plan(), 0), Ok(()));
    }
}
