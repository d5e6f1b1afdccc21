// ─── Server Status ───
// Background service keeping the pack's game server status fresh for the
// UI: current player counts, MOTD and latency, refreshed periodically and
// on demand. Failures degrade to an offline status, never to an error
// surfaced at the caller.

pub mod ping;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use self::ping::{ping_server, PingOutcome};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub online: bool,
    pub players_online: Option<u32>,
    pub players_max: Option<u32>,
    pub motd: String,
    pub ping_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerStatus {
    /// Initial state before the first ping has answered.
    pub fn loading() -> Self {
        Self {
            online: false,
            players_online: None,
            players_max: None,
            motd: String::new(),
            ping_ms: None,
            error: None,
        }
    }

    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            online: false,
            players_online: None,
            players_max: None,
            motd: String::new(),
            ping_ms: None,
            error: Some(error.into()),
        }
    }

    fn from_ping(outcome: PingOutcome) -> Self {
        Self {
            online: true,
            players_online: outcome.players_online,
            players_max: outcome.players_max,
            motd: outcome.motd,
            ping_ms: Some(outcome.ping_ms),
            error: None,
        }
    }
}

/// Watches one server. The latest status lives in a watch channel;
/// refreshes are single-flight, a request arriving while a ping is in
/// flight is dropped rather than queued.
pub struct ServerStatusService {
    inner: Arc<StatusInner>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

struct StatusInner {
    host: String,
    port: u16,
    refreshing: AtomicBool,
    status: watch::Sender<ServerStatus>,
}

impl ServerStatusService {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (status, _) = watch::channel(ServerStatus::loading());
        Self {
            inner: Arc::new(StatusInner {
                host: host.into(),
                port,
                refreshing: AtomicBool::new(false),
                status,
            }),
            ticker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.inner.status.subscribe()
    }

    pub fn current(&self) -> ServerStatus {
        self.inner.status.borrow().clone()
    }

    /// Ping once now. A refresh already in flight makes this a no-op.
    pub async fn refresh_now(&self) {
        self.inner.refresh().await;
    }

    /// Spawn a background task pinging every `period`; the first tick
    /// fires immediately. Calling again replaces the previous task.
    pub fn start_periodic_refresh(&self, period: Duration) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                inner.refresh().await;
            }
        });

        if let Some(old) = self.ticker_slot().replace(handle) {
            old.abort();
        }
    }

    /// Stop the background refresh task.
    pub fn close(&self) {
        if let Some(handle) = self.ticker_slot().take() {
            handle.abort();
        }
    }

    fn ticker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ServerStatusService {
    fn drop(&mut self) {
        self.close();
    }
}

impl StatusInner {
    async fn refresh(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Status refresh already in flight, skipping");
            return;
        }

        debug!("Pinging {}:{}", self.host, self.port);
        let next = match ping_server(&self.host, self.port).await {
            Ok(outcome) => ServerStatus::from_ping(outcome),
            Err(e) => {
                warn!(
                    "Server status ping failed for {}:{}: {}",
                    self.host, self.port, e
                );
                ServerStatus::offline(e.to_string())
            }
        };
        self.status.send_replace(next);

        self.refreshing.store(false, Ordering::SeqCst);
    }
}
