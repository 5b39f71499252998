//! Network availability tracking.
//!
//! `NetworkStatus` is the flag the coordinator consults before every remote
//! call. `ConnectivityMonitor` carries availability edges from a source
//! (manual switch or TCP probe) to the listener that flips the flag and
//! triggers drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::sync::Coordinator;

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared online/offline flag.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    online: Arc<AtomicBool>,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Store a new value, returning the previous one.
    pub fn set(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::SeqCst)
    }
}

/// Broadcasts availability changes. Repeated identical readings are dropped.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(available: bool) -> Self {
        let (tx, _) = watch::channel(available);
        Self { tx: Arc::new(tx) }
    }

    /// Record a reading. Returns `true` when it was an edge.
    pub fn report(&self, available: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == available {
                false
            } else {
                *current = available;
                true
            }
        });
        if changed {
            tracing::debug!("Connectivity changed: available={available}");
        }
        changed
    }

    pub fn is_available(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// A connectivity source driven by explicit calls.
#[derive(Debug, Clone)]
pub struct ManualConnectivity {
    monitor: ConnectivityMonitor,
}

impl ManualConnectivity {
    pub fn new(available: bool) -> Self {
        Self {
            monitor: ConnectivityMonitor::new(available),
        }
    }

    pub fn set_available(&self, available: bool) -> bool {
        self.monitor.report(available)
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }
}

/// Periodic TCP reachability check against a single `host:port`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: String,
    interval: Duration,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether a TCP connection to the target opens within the timeout.
    pub async fn probe_once(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await,
            Ok(Ok(_))
        )
    }

    /// Probe forever, reporting each reading to `monitor`. Abort the handle to stop.
    pub fn spawn(self, monitor: ConnectivityMonitor) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let available = self.probe_once().await;
                if monitor.report(available) {
                    tracing::info!(
                        "Probe {} reports {}",
                        self.target,
                        if available { "available" } else { "unavailable" }
                    );
                }
            }
        })
    }
}

/// Feed availability edges from `monitor` into `coordinator`.
///
/// The current state is applied first. Every edge updates the network status,
/// and every "available" reading (the initial one included) queues a drain on
/// the coordinator's background jobs. The listener ends once every monitor
/// handle is dropped.
pub fn spawn_listener(coordinator: Coordinator, monitor: &ConnectivityMonitor) -> JoinHandle<()> {
    let mut rx = monitor.subscribe();
    tokio::spawn(async move {
        let mut available = *rx.borrow_and_update();
        loop {
            coordinator.set_network_status(available);
            if available {
                tracing::info!("Connectivity available, draining pending mutations");
                coordinator.spawn_drain();
            } else {
                tracing::info!("Connectivity lost, working offline");
            }

            if rx.changed().await.is_err() {
                break;
            }
            available = *rx.borrow_and_update();
        }
    })
}
