//! Time-window throttling: at most one admission per fingerprint per window.
//!
//! [`WindowCache`] holds the admission state and is purely synchronous.
//! [`TimeWindowThrottle`] owns a cache plus the background task that prunes
//! it on a fixed period.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{ProxyError, ProxyResult};
use crate::fingerprint::Fingerprint;
use crate::throttle::Decision;

pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(5);

/// Last admission time per fingerprint, plus the current window length.
#[derive(Debug)]
pub struct WindowCache {
    window_ms: AtomicU64,
    entries: DashMap<Fingerprint, u64>,
}

impl WindowCache {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: AtomicU64::new(window_ms),
            entries: DashMap::new(),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms.load(Ordering::Acquire)
    }

    pub fn set_window(&self, window_ms: u64) {
        self.window_ms.store(window_ms, Ordering::Release);
    }

    /// Admits `fingerprint` if it has no entry or its entry is older than the
    /// window, recording `now` as the new admission time.
    ///
    /// The lookup and the write happen under the entry's shard lock, so two
    /// concurrent callers with the same fingerprint can never both be
    /// admitted inside one window. A rejection leaves the stored time alone.
    pub fn decide(&self, fingerprint: Fingerprint, now: u64) -> Decision {
        let window = self.window_ms();
        match self.entries.entry(fingerprint) {
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                Decision::Admit
            }
            Entry::Occupied(mut occupied) => {
                if now.saturating_sub(*occupied.get()) > window {
                    occupied.insert(now);
                    Decision::Admit
                } else {
                    Decision::Reject
                }
            }
        }
    }

    /// Removes entries older than the window at `now` and returns how many
    /// were removed.
    ///
    /// An entry is only removed if its timestamp still matches the one seen
    /// while scanning; an admission that refreshed it in between wins.
    pub fn prune(&self, now: u64) -> usize {
        let window = self.window_ms();
        let stale: Vec<(Fingerprint, u64)> = self
            .entries
            .iter()
            .filter(|entry| now.saturating_sub(*entry.value()) > window)
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        stale
            .into_iter()
            .filter(|(fingerprint, seen)| {
                self.entries
                    .remove_if(fingerprint, |_, current| current == seen)
                    .is_some()
            })
            .count()
    }

    pub fn last_admitted(&self, fingerprint: &Fingerprint) -> Option<u64> {
        self.entries.get(fingerprint).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Throttle rule admitting each distinct request at most once per window.
///
/// Construction spawns the pruning task on the current Tokio runtime. The
/// task stops when [`TimeWindowThrottle::shutdown`] is called or when the
/// throttle is dropped.
#[derive(Debug)]
pub struct TimeWindowThrottle {
    cache: Arc<WindowCache>,
    shutdown: watch::Sender<bool>,
    pruner: Mutex<Option<JoinHandle<()>>>,
}

impl TimeWindowThrottle {
    pub fn new(window_ms: u64, prune_interval: Duration, clock: Clock) -> ProxyResult<Self> {
        let handle = Handle::try_current().map_err(|_| {
            ProxyError::ConfigurationError(
                "time window throttles must be created inside a Tokio runtime".to_string(),
            )
        })?;

        let cache = Arc::new(WindowCache::new(window_ms));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let period = prune_interval.max(Duration::from_millis(1));
        let pruner = handle.spawn(run_pruner(cache.clone(), clock, period, shutdown_rx));

        info!(window_ms, prune_interval = ?period, "launched throttle pruning task");

        Ok(Self {
            cache,
            shutdown,
            pruner: Mutex::new(Some(pruner)),
        })
    }

    pub fn decide(&self, path: &str, query: Option<&str>, now: u64) -> Decision {
        let fingerprint = Fingerprint::compute(path, query);
        let decision = self.cache.decide(fingerprint, now);
        debug!(%fingerprint, ?decision, now, "time window decision");
        decision
    }

    pub fn window_ms(&self) -> u64 {
        self.cache.window_ms()
    }

    /// Applies to every later decision and pruning pass. Stored entries are
    /// not re-evaluated.
    pub fn set_window(&self, window_ms: u64) {
        let previous = self.cache.window_ms();
        self.cache.set_window(window_ms);
        info!(previous, window_ms, "time window updated");
    }

    pub fn cache(&self) -> &WindowCache {
        &self.cache
    }

    pub fn is_pruning(&self) -> bool {
        self.pruner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops the pruning task and waits for it to exit.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self
            .pruner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "throttle pruning task ended abnormally");
            }
        }
    }
}

async fn run_pruner(
    cache: Arc<WindowCache>,
    clock: Clock,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now_millis();
                match std::panic::catch_unwind(AssertUnwindSafe(|| cache.prune(now))) {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, remaining = cache.len(), "pruned expired throttle entries"),
                    Err(_) => error!("throttle pruning pass panicked, next pass still scheduled"),
                }
            }
            changed = shutdown.changed() => {
                // Err means the owning throttle was dropped.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("throttle pruning task stopped");
}
