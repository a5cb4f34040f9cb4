//! Downlink Scheduler (C6, §4.6): a single cooperative worker that polls
//! `scheduleQ`, re-enqueueing items that aren't due yet.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use crate::clock::{due, TimeSource};
use crate::downlink::ScheduleItem;
use crate::mac_registry::MacRegistry;

/// How often the scheduler wakes to check the backlog when nothing is due
/// (§5: suspension points use a short poll timeout).
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct Scheduler {
    registry: MacRegistry,
    clock: Arc<dyn TimeSource>,
    inbox: Mutex<mpsc::Receiver<ScheduleItem>>,
    backlog: Mutex<VecDeque<ScheduleItem>>,
}

impl Scheduler {
    pub fn new(registry: MacRegistry, clock: Arc<dyn TimeSource>, inbox: mpsc::Receiver<ScheduleItem>) -> Self {
        Self {
            registry,
            clock,
            inbox: Mutex::new(inbox),
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    /// Drive the scheduling loop until `stop` reports `true`.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
            self.drain_inbox().await;
            self.dispatch_due_items().await;
        }
        info!("scheduler stopped");
    }

    async fn drain_inbox(&self) {
        let mut inbox = self.inbox.lock().await;
        let mut backlog = self.backlog.lock().await;
        while let Ok(item) = inbox.try_recv() {
            backlog.push_back(item);
        }
    }

    async fn dispatch_due_items(&self) {
        let now = self.clock.now_tmst();
        let pending: Vec<ScheduleItem> = {
            let mut backlog = self.backlog.lock().await;
            std::mem::take(&mut *backlog).into_iter().collect()
        };

        let mut still_waiting = VecDeque::new();
        for item in pending {
            if item.immediate || self.is_due(&item, now) {
                self.dispatch(item).await;
            } else {
                still_waiting.push_back(item);
            }
        }
        self.backlog.lock().await.extend(still_waiting);
    }

    fn is_due(&self, item: &ScheduleItem, now: u32) -> bool {
        let delay = item.target_tmst.wrapping_sub(item.enqueued_tmst);
        due(now, item.enqueued_tmst, delay)
    }

    async fn dispatch(&self, item: ScheduleItem) {
        let result = self
            .registry
            .transmit(item.channel, &item.settings, &item.payload)
            .await;
        if let Err(err) = result {
            warn!(channel = item.channel, %err, "scheduled transmit failed");
        }
    }
}
