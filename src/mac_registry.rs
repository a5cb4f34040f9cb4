//! MAC Registry (C2, §4.2): the 8-slot channel table, binding, settings
//! swaps, and translation of `PhyEvent`s into `RxPacket`s on `rxQ`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::clock::TimeSource;
use crate::error::RadioError;
use crate::phy::{PhyEvent, PhySettings};
use crate::radio_port::RadioPort;
use crate::rxpacket::{RxOutcome, RxPacket};

pub const NUM_CHANNELS: usize = 8;

struct ChannelSlot {
    port: Box<dyn RadioPort>,
    defaults: PhySettings,
    /// Last settings actually written to the port — equal to `defaults` at
    /// rest, and whatever `apply_settings`/`transmit` last pushed while a
    /// transient override is active (§4.2, §3 invariant I-4).
    current: PhySettings,
}

type SlotTable = Vec<Mutex<Option<ChannelSlot>>>;

/// Owns the 8-slot table of channel -> Radio Port. The table itself lives
/// behind an `Arc` so the per-channel event-forwarding tasks spawned by
/// `bind` can share it with the registry handles held by the scheduler and
/// the uplink worker.
#[derive(Clone)]
pub struct MacRegistry {
    slots: Arc<SlotTable>,
    rx_tx: mpsc::Sender<RxPacket>,
    clock: Arc<dyn TimeSource>,
}

impl MacRegistry {
    pub fn new(rx_tx: mpsc::Sender<RxPacket>, clock: Arc<dyn TimeSource>) -> Self {
        let mut slots = Vec::with_capacity(NUM_CHANNELS);
        for _ in 0..NUM_CHANNELS {
            slots.push(Mutex::new(None));
        }
        Self {
            slots: Arc::new(slots),
            rx_tx,
            clock,
        }
    }

    fn check_channel(channel: u8) -> Result<usize, RadioError> {
        if (channel as usize) < NUM_CHANNELS {
            Ok(channel as usize)
        } else {
            Err(RadioError::ChannelOutOfRange(channel))
        }
    }

    /// Bind a Radio Port to `channel` with its default settings: sets
    /// syncword, default frequency/SF/BW/CR, and enters continuous receive
    /// (§4.2). Spawns the task that forwards the port's `PhyEvent`s onto
    /// `rxQ` as `RxPacket`s.
    pub async fn bind(
        &self,
        channel: u8,
        mut port: Box<dyn RadioPort>,
        defaults: PhySettings,
        syncword: u8,
    ) -> Result<(), RadioError> {
        let idx = Self::check_channel(channel)?;

        for slot in self.slots.iter() {
            let guard = slot.lock().await;
            if let Some(slot) = guard.as_ref() {
                if slot.defaults.freq_hz == defaults.freq_hz {
                    return Err(RadioError::DuplicateFrequency {
                        freq_hz: defaults.freq_hz,
                        existing: 0,
                    });
                }
            }
        }

        let mut guard = self.slots[idx].lock().await;
        if guard.is_some() {
            return Err(RadioError::ChannelAlreadyBound(channel));
        }

        if !port.init().await {
            return Err(RadioError::InitFailed);
        }
        port.set_syncword(syncword).await.map_err(|_| RadioError::InitFailed)?;
        port.apply_settings(&defaults).await.map_err(|_| RadioError::InitFailed)?;
        port.enter_continuous_receive().await.map_err(|_| RadioError::InitFailed)?;

        let mut events = port.take_event_receiver();
        *guard = Some(ChannelSlot {
            port,
            defaults,
            current: defaults,
        });
        drop(guard);

        let slots = self.slots.clone();
        let rx_tx = self.rx_tx.clone();
        let clock = self.clock.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                forward_event(channel, &slots, event, &rx_tx, clock.as_ref()).await;
            }
            debug!(channel, "radio port event channel closed");
        });

        Ok(())
    }

    /// Apply a transient override to `channel`, serialized against transmit
    /// and against any other settings swap on the same channel (§3 invariant).
    pub async fn apply_settings(&self, channel: u8, settings: &PhySettings) -> Result<(), RadioError> {
        let idx = Self::check_channel(channel)?;
        let mut guard = self.slots[idx].lock().await;
        let slot = guard.as_mut().ok_or(RadioError::ChannelUnbound(channel))?;
        slot.port.apply_settings(settings).await.map_err(|_| RadioError::InitFailed)?;
        slot.current = *settings;
        Ok(())
    }

    /// Revert `channel` to its bound-time default settings.
    pub async fn restore_defaults(&self, channel: u8) -> Result<(), RadioError> {
        let idx = Self::check_channel(channel)?;
        let mut guard = self.slots[idx].lock().await;
        let slot = guard.as_mut().ok_or(RadioError::ChannelUnbound(channel))?;
        let defaults = slot.defaults;
        slot.port.apply_settings(&defaults).await.map_err(|_| RadioError::InitFailed)?;
        slot.current = defaults;
        Ok(())
    }

    /// `apply_settings` -> `transmit` -> `restore_defaults` as one
    /// channel-serialized unit, which is what the Downlink Scheduler (C6)
    /// calls for every dispatched `ScheduleItem`.
    pub async fn transmit(
        &self,
        channel: u8,
        settings: &PhySettings,
        payload: &[u8],
    ) -> Result<(), RadioError> {
        let idx = Self::check_channel(channel)?;
        let mut guard = self.slots[idx].lock().await;
        let slot = guard.as_mut().ok_or(RadioError::ChannelUnbound(channel))?;
        let defaults = slot.defaults;

        slot.port.apply_settings(settings).await.map_err(|_| RadioError::InitFailed)?;
        slot.current = *settings;
        let tx_result = slot.port.transmit(payload).await;
        let restore_result = slot.port.apply_settings(&defaults).await;
        slot.current = defaults;

        tx_result.map_err(|_| RadioError::InitFailed)?;
        restore_result.map_err(|_| RadioError::InitFailed)
    }

    /// First channel slot whose *default* frequency matches `freq_hz`
    /// (§4.2 channel-by-frequency lookup).
    pub async fn channel_by_frequency(&self, freq_hz: u64) -> Option<u8> {
        for (idx, slot) in self.slots.iter().enumerate() {
            let guard = slot.lock().await;
            if let Some(slot) = guard.as_ref() {
                if slot.defaults.freq_hz == freq_hz {
                    return Some(idx as u8);
                }
            }
        }
        None
    }

    /// Currently active PHY settings on `channel`: the bound-time default at
    /// rest, or the last override applied by `apply_settings`/`transmit`
    /// while one is in effect. For diagnostics and the apply/restore-pairing
    /// test assertions (§3 invariant I-4).
    pub async fn current_settings(&self, channel: u8) -> Result<PhySettings, RadioError> {
        let idx = Self::check_channel(channel)?;
        let guard = self.slots[idx].lock().await;
        let slot = guard.as_ref().ok_or(RadioError::ChannelUnbound(channel))?;
        Ok(slot.current)
    }
}

/// Turn one `PhyEvent` into an `RxPacket`, locking the owning slot just long
/// enough to drain the port's buffered payload and read its last signal
/// quality and current PHY settings (§4.2).
async fn forward_event(
    channel: u8,
    slots: &Arc<SlotTable>,
    event: PhyEvent,
    rx_tx: &mpsc::Sender<RxPacket>,
    clock: &dyn TimeSource,
) {
    let tmst = clock.now_tmst();
    let idx = channel as usize;

    let packet = match event {
        PhyEvent::ReceiveCompleted { len } if len > 0 => {
            let mut guard = slots[idx].lock().await;
            let Some(slot) = guard.as_mut() else {
                return;
            };
            let mut payload = Vec::new();
            let drained = slot.port.drain(&mut payload);
            if drained == 0 {
                return;
            }
            let settings = slot.current;
            RxPacket {
                channel,
                rf_chain: 0,
                freq_mhz: settings.freq_hz as f64 / 1_000_000.0,
                outcome: RxOutcome::Received,
                spreading_factor: settings.spreading_factor,
                bandwidth_khz: settings.bandwidth_khz(),
                coding_rate_denom: settings.coding_rate_denom,
                rssi: slot.port.last_packet_rssi(),
                snr: slot.port.last_packet_snr(),
                payload: Some(payload),
                tmst,
            }
        }
        PhyEvent::ReceiveCompleted { .. } | PhyEvent::CrcError => RxPacket {
            channel,
            rf_chain: 0,
            freq_mhz: 0.0,
            outcome: RxOutcome::CrcFailed,
            spreading_factor: 0,
            bandwidth_khz: 0,
            coding_rate_denom: 0,
            rssi: 0,
            snr: 0.0,
            payload: None,
            tmst,
        },
        PhyEvent::TransmitCompleted => RxPacket {
            channel,
            rf_chain: 0,
            freq_mhz: 0.0,
            outcome: RxOutcome::TransmitCompleted,
            spreading_factor: 0,
            bandwidth_khz: 0,
            coding_rate_denom: 0,
            rssi: 0,
            snr: 0.0,
            payload: None,
            tmst,
        },
    };

    if rx_tx.try_send(packet).is_err() {
        warn!(channel, "rxQ full, dropping newest rx event (§4.2 drop-newest policy)");
    }
}
