//! Epoch committee watcher
//!
//! Background loop that re-reads the committee on a fixed interval and logs
//! when this validator joins or leaves it. Only for observability: the
//! attestation path asks the epoch cache directly.

use crate::epoch_cache::{EpochCache, EpochSelector};
use l2_types::Address;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Membership observed at an epoch change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitteeTransition {
    pub epoch: u64,
    pub in_committee: bool,
}

/// State shared between the watcher handle and its task
struct Tracker {
    epoch_cache: Arc<dyn EpochCache>,
    address: Address,
    last_epoch: RwLock<Option<u64>>,
}

impl Tracker {
    async fn handle_epoch_committee_update(&self) -> Option<CommitteeTransition> {
        let info = match self.epoch_cache.get_committee(EpochSelector::Now).await {
            Ok(info) => info,
            Err(e) => {
                tracing::error!("Error updating epoch committee: {}", e);
                return None;
            }
        };

        if *self.last_epoch.read() == Some(info.epoch) {
            return None;
        }

        let in_committee = info.contains(&self.address);
        if in_committee {
            tracing::info!(
                "Validator {} is on the validator committee for epoch {}",
                self.address,
                info.epoch
            );
        } else {
            tracing::debug!(
                "Validator {} not on the validator committee for epoch {}",
                self.address,
                info.epoch
            );
        }
        *self.last_epoch.write() = Some(info.epoch);

        Some(CommitteeTransition {
            epoch: info.epoch,
            in_committee,
        })
    }
}

/// Handle to the committee refresh loop
pub struct EpochCommitteeWatcher {
    tracker: Arc<Tracker>,
    interval: Duration,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl EpochCommitteeWatcher {
    pub fn new(epoch_cache: Arc<dyn EpochCache>, address: Address, interval: Duration) -> Self {
        Self {
            tracker: Arc::new(Tracker {
                epoch_cache,
                address,
                last_epoch: RwLock::new(None),
            }),
            interval,
            running: Mutex::new(None),
        }
    }

    /// Last epoch the loop observed
    pub fn last_epoch(&self) -> Option<u64> {
        *self.tracker.last_epoch.read()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Run one refresh. Returns the transition if the epoch changed.
    pub async fn refresh(&self) -> Option<CommitteeTransition> {
        self.tracker.handle_epoch_committee_update().await
    }

    /// Spawn the loop. A second call while running is ignored.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::warn!("Epoch committee watcher already running");
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tracker = self.tracker.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        tracker.handle_epoch_committee_update().await;
                    }
                }
            }
            tracing::debug!("Epoch committee watcher stopped");
        });

        *running = Some((token, handle));
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some((token, handle)) = running else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            tracing::warn!("Epoch committee watcher task failed: {}", e);
        }
    }
}
