//! Radio Port (C1, §4.1): the capability set a LoRa modem driver must
//! implement, kept polymorphic so the MAC Registry can be driven against a
//! pure-software fake. A concrete implementation that drives a real modem's
//! registers is an external collaborator this crate does not ship (§1).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RadioError;
use crate::phy::{PhyEvent, PhySettings};

/// Depth of the per-port event channel. One slot is enough for the producer
/// (an interrupt-like context) to never block; the consumer task drains it
/// promptly (§9 design note 1).
pub const EVENT_CHANNEL_DEPTH: usize = 8;

#[async_trait]
pub trait RadioPort: Send {
    /// Probe the chip; `false` if it does not acknowledge a known version
    /// register. The MAC Registry must refuse to bind on `false`.
    async fn init(&mut self) -> bool;

    async fn shutdown(&mut self);

    async fn set_syncword(&mut self, syncword: u8) -> Result<(), RadioError>;
    async fn set_frequency(&mut self, freq_hz: u64) -> Result<(), RadioError>;
    async fn set_tx_power(&mut self, dbm: i32) -> Result<(), RadioError>;
    async fn set_spreading_factor(&mut self, sf: u8) -> Result<(), RadioError>;
    async fn set_bandwidth(&mut self, bw_hz: u32) -> Result<(), RadioError>;
    async fn set_coding_rate(&mut self, denom: u8) -> Result<(), RadioError>;
    async fn set_preamble(&mut self, len: u16) -> Result<(), RadioError>;
    async fn enable_crc(&mut self, on: bool) -> Result<(), RadioError>;
    async fn enable_invert_iq(&mut self, on: bool) -> Result<(), RadioError>;

    async fn enter_continuous_receive(&mut self) -> Result<(), RadioError>;

    async fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    fn last_packet_rssi(&self) -> i32;
    fn last_packet_snr(&self) -> f32;

    /// Copy the payload buffered by the last `ReceiveCompleted` event into
    /// `dst` and return its length. Only valid to call once per event.
    fn drain(&mut self, dst: &mut Vec<u8>) -> usize;

    /// Hand the MAC Registry the receive end of this port's event channel.
    /// Called exactly once, at bind time.
    fn take_event_receiver(&mut self) -> mpsc::Receiver<PhyEvent>;

    /// Apply a full `PhySettings` in one call. The default implementation
    /// sequences the granular setters; a concrete driver may override this
    /// to batch the underlying register writes.
    async fn apply_settings(&mut self, settings: &PhySettings) -> Result<(), RadioError> {
        self.set_frequency(settings.freq_hz).await?;
        self.set_tx_power(settings.tx_power_dbm).await?;
        self.set_spreading_factor(settings.spreading_factor).await?;
        self.set_bandwidth(settings.bandwidth_hz).await?;
        self.set_coding_rate(settings.coding_rate_denom).await?;
        self.set_preamble(settings.preamble_len).await?;
        self.enable_crc(settings.crc_on).await?;
        self.enable_invert_iq(settings.invert_iq).await?;
        Ok(())
    }
}

/// Software test doubles, also used by integration tests outside this crate.
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// A pure-software Radio Port: no chip, just state the test can inspect
    /// and events the test can inject (§4.1 "tested against a pure-software
    /// fake").
    pub struct FakeRadioPort {
        pub initialized: bool,
        pub current: PhySettings,
        pub last_tx: Mutex<Option<Vec<u8>>>,
        pub apply_calls: Mutex<Vec<PhySettings>>,
        rx_buf: Option<Vec<u8>>,
        events_tx: mpsc::Sender<PhyEvent>,
        events_rx: Option<mpsc::Receiver<PhyEvent>>,
        rssi: i32,
        snr: f32,
        init_should_fail: bool,
    }

    impl FakeRadioPort {
        pub fn new(defaults: PhySettings) -> Self {
            let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
            Self {
                initialized: false,
                current: defaults,
                last_tx: Mutex::new(None),
                apply_calls: Mutex::new(Vec::new()),
                rx_buf: None,
                events_tx,
                events_rx: Some(events_rx),
                rssi: -80,
                snr: 8.0,
                init_should_fail: false,
            }
        }

        pub fn failing_init(defaults: PhySettings) -> Self {
            let mut port = Self::new(defaults);
            port.init_should_fail = true;
            port
        }

        pub fn set_signal(&mut self, rssi: i32, snr: f32) {
            self.rssi = rssi;
            self.snr = snr;
        }

        /// Simulate the chip delivering a frame: buffers the payload and
        /// pushes `ReceiveCompleted` onto the event channel, as real drivers
        /// do (§4.1 receive path).
        pub async fn inject_receive(&mut self, payload: Vec<u8>) {
            let len = payload.len();
            self.rx_buf = Some(payload);
            let _ = self.events_tx.send(PhyEvent::ReceiveCompleted { len }).await;
        }

        pub async fn inject_crc_error(&mut self) {
            self.rx_buf = None;
            let _ = self.events_tx.send(PhyEvent::CrcError).await;
        }

        pub async fn inject_tx_done(&mut self) {
            let _ = self.events_tx.send(PhyEvent::TransmitCompleted).await;
        }
    }

    #[async_trait]
    impl RadioPort for FakeRadioPort {
        async fn init(&mut self) -> bool {
            self.initialized = !self.init_should_fail;
            self.initialized
        }

        async fn shutdown(&mut self) {
            self.initialized = false;
        }

        async fn set_syncword(&mut self, _syncword: u8) -> Result<(), RadioError> {
            Ok(())
        }

        async fn set_frequency(&mut self, freq_hz: u64) -> Result<(), RadioError> {
            self.current.freq_hz = freq_hz;
            Ok(())
        }

        async fn set_tx_power(&mut self, dbm: i32) -> Result<(), RadioError> {
            self.current.tx_power_dbm = dbm;
            Ok(())
        }

        async fn set_spreading_factor(&mut self, sf: u8) -> Result<(), RadioError> {
            self.current.spreading_factor = sf;
            Ok(())
        }

        async fn set_bandwidth(&mut self, bw_hz: u32) -> Result<(), RadioError> {
            self.current.bandwidth_hz = bw_hz;
            Ok(())
        }

        async fn set_coding_rate(&mut self, denom: u8) -> Result<(), RadioError> {
            self.current.coding_rate_denom = denom;
            Ok(())
        }

        async fn set_preamble(&mut self, len: u16) -> Result<(), RadioError> {
            self.current.preamble_len = len;
            Ok(())
        }

        async fn enable_crc(&mut self, on: bool) -> Result<(), RadioError> {
            self.current.crc_on = on;
            Ok(())
        }

        async fn enable_invert_iq(&mut self, on: bool) -> Result<(), RadioError> {
            self.current.invert_iq = on;
            Ok(())
        }

        async fn enter_continuous_receive(&mut self) -> Result<(), RadioError> {
            Ok(())
        }

        async fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError> {
            *self.last_tx.lock().unwrap() = Some(payload.to_vec());
            Ok(())
        }

        fn last_packet_rssi(&self) -> i32 {
            self.rssi
        }

        fn last_packet_snr(&self) -> f32 {
            self.snr
        }

        fn drain(&mut self, dst: &mut Vec<u8>) -> usize {
            match self.rx_buf.take() {
                Some(buf) => {
                    let len = buf.len();
                    *dst = buf;
                    len
                }
                None => 0,
            }
        }

        fn take_event_receiver(&mut self) -> mpsc::Receiver<PhyEvent> {
            self.events_rx.take().expect("event receiver already taken")
        }

        async fn apply_settings(&mut self, settings: &PhySettings) -> Result<(), RadioError> {
            self.current = *settings;
            self.apply_calls.lock().unwrap().push(*settings);
            Ok(())
        }
    }
}
