//! Online/offline tracking and the drain trigger bound to it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::sync::{SyncOutcome, Synchronizer};

/// Shared online/offline flag. Clones observe and update the same state.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Record the current state. Returns `true` when this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    /// Receiver woken on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Starts a drain whenever connectivity comes back.
pub struct ConnectivityMonitor {
    synchronizer: Arc<Synchronizer>,
    receiver: watch::Receiver<bool>,
    poll_interval: Option<Duration>,
}

impl ConnectivityMonitor {
    pub fn new(synchronizer: Arc<Synchronizer>, signal: &ConnectivitySignal) -> Self {
        Self {
            synchronizer,
            receiver: signal.subscribe(),
            poll_interval: None,
        }
    }

    /// Also drain periodically while online.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// React to transitions until every [`ConnectivitySignal`] clone is dropped.
    pub async fn run(mut self) {
        let mut ticker = self.poll_interval.map(|period| {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            tokio::select! {
                changed = self.receiver.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Connectivity signal closed, stopping monitor");
                        return;
                    }
                    let online = *self.receiver.borrow_and_update();
                    self.handle_transition(online).await;
                }
                () = next_tick(ticker.as_mut()) => {
                    if *self.receiver.borrow() {
                        tracing::debug!("Periodic sync tick");
                        self.synchronizer.sync_pending_operations().await;
                    }
                }
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn handle_transition(&self, online: bool) {
        if !online {
            tracing::info!("Offline, changes will be queued locally");
            return;
        }

        tracing::info!("Back online, syncing pending operations");
        if let SyncOutcome::Drained(summary) = self.synchronizer.sync_pending_operations().await {
            if summary.failed > 0 {
                tracing::warn!("{} operations failed to sync after reconnect", summary.failed);
            }
        }
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Feed `signal` from `probe`, checking every `interval`. Runs until aborted.
pub async fn watch_reachability<F, Fut>(signal: ConnectivitySignal, probe: F, interval: Duration)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    loop {
        let online = probe().await;
        if signal.set_online(online) {
            tracing::info!(
                "Server is {}",
                if online { "reachable" } else { "unreachable" }
            );
        }
        time::sleep(interval).await;
    }
}
