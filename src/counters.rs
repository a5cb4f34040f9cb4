//! `SessionCounters` (§3): monotonic, atomically-updated gateway statistics.
//!
//! Written from multiple workers at once (§5): `txnb` by the uplink worker,
//! `ackn`/`dwnb` by the session receive task, `rxfw`/`rxok`/`rxnb` by the
//! uplink worker as it drains `rxQ`. Relaxed atomics are enough — `stat` is
//! advisory and may observe a torn snapshot across fields.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct SessionCounters {
    rxnb: AtomicU32,
    rxok: AtomicU32,
    rxfw: AtomicU32,
    dwnb: AtomicU32,
    txnb: AtomicU32,
    ackn: AtomicU32,
}

/// A point-in-time, possibly torn, read of all six counters for a `stat` datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSnapshot {
    pub rxnb: u32,
    pub rxok: u32,
    pub rxfw: u32,
    pub dwnb: u32,
    pub txnb: u32,
    pub ackn: u32,
}

impl CounterSnapshot {
    /// `ackn / txnb` as a percentage in `[0, 100]`; `0.0` when nothing has
    /// been sent yet.
    pub fn ack_rate_pct(&self) -> f64 {
        if self.txnb == 0 {
            0.0
        } else {
            (self.ackn as f64 / self.txnb as f64) * 100.0
        }
    }
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_rxnb(&self) {
        self.rxnb.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rxok(&self) {
        self.rxok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rxfw(&self) {
        self.rxfw.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dwnb(&self) {
        self.dwnb.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_txnb(&self) {
        self.txnb.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ackn(&self) {
        self.ackn.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            rxnb: self.rxnb.load(Ordering::Relaxed),
            rxok: self.rxok.load(Ordering::Relaxed),
            rxfw: self.rxfw.load(Ordering::Relaxed),
            dwnb: self.dwnb.load(Ordering::Relaxed),
            txnb: self.txnb.load(Ordering::Relaxed),
            ackn: self.ackn.load(Ordering::Relaxed),
        }
    }
}
