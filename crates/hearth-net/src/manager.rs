//! Realtime connection manager.
//!
//! One driver task owns the transport. The [`ConnectionManager`] handle talks
//! to it through a control channel and a shared outbox, mirroring the
//! command/notification split used for the rest of the networking layer:
//!
//! - `send` never waits on the network; frames go to the outbox and the
//!   driver flushes them in order while connected.
//! - A dropped link triggers reconnection with exponential backoff using the
//!   last credential; `setup` is re-sent before the outbox is replayed.
//! - Inbound frames are dispatched from the driver task, one at a time, in
//!   arrival order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use hearth_shared::constants::{
    DEFAULT_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS,
};
use hearth_shared::protocol::{ClientFrame, EventKind, ServerFrame};
use hearth_shared::types::{ConnectionStatus, Credential};

use crate::backoff::Backoff;
use crate::error::NetError;
use crate::subscriptions::{Registry, SharedRegistry, Subscription};
use crate::transport::{Connector, Link};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What happens to frames sent while the link is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Queue while disconnected and replay in order after reconnecting.
    /// A frame whose write fails is retried on the next link.
    AtLeastOnce,
    /// Drop frames sent while disconnected; a failed write is not retried.
    AtMostOnce,
}

impl std::str::FromStr for DeliveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "at-least-once" | "at_least_once" | "replay" => Ok(Self::AtLeastOnce),
            "at-most-once" | "at_most_once" | "drop" => Ok(Self::AtMostOnce),
            other => Err(format!("unknown delivery policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Realtime server URL.
    pub url: String,
    pub delivery: DeliveryPolicy,
    /// First reconnect delay; doubles per failed attempt.
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    /// Consecutive failed attempts before the status becomes `Failed`.
    pub max_attempts: u32,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delivery: DeliveryPolicy::AtLeastOnce,
            reconnect_base: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            reconnect_max: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Control {
    /// The outbox has new frames.
    Flush,
    Shutdown,
}

struct Driver {
    ctl_tx: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    registry: SharedRegistry,
    outbox: Mutex<VecDeque<ClientFrame>>,
    status_tx: watch::Sender<ConnectionStatus>,
    credential: Mutex<Option<Credential>>,
    driver: Mutex<Option<Driver>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            debug!(from = ?previous, to = ?status, "Connection status changed");
        }
    }

    fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn credential(&self) -> Option<Credential> {
        lock(&self.credential).clone()
    }

    fn queued(&self) -> usize {
        lock(&self.outbox).len()
    }

    fn pop_outbox(&self) -> Option<ClientFrame> {
        lock(&self.outbox).pop_front()
    }

    fn requeue_front(&self, frame: ClientFrame) {
        lock(&self.outbox).push_front(frame);
    }

    fn dispatch(&self, text: &str) {
        let frame = match ServerFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Skipping undecodable inbound frame");
                return;
            }
        };

        let handlers = Registry::handlers_for(&self.registry, frame.kind());
        debug!(kind = ?frame.kind(), handlers = handlers.len(), "Dispatching inbound frame");
        for handler in handlers {
            handler(&frame);
        }
    }
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// Handle to the single realtime connection. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                registry: SharedRegistry::default(),
                outbox: Mutex::new(VecDeque::new()),
                status_tx,
                credential: Mutex::new(None),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Open the connection. A no-op while a driver is already running; a
    /// driver that gave up (`Failed`) is replaced.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, credential: Credential) {
        let mut driver = lock(&self.inner.driver);
        if let Some(running) = driver.as_ref() {
            let gave_up = self.inner.status() == ConnectionStatus::Failed;
            if !running.task.is_finished() && !gave_up {
                debug!("connect() while already connected, ignoring");
                return;
            }
        }

        *lock(&self.inner.credential) = Some(credential);

        let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            run_driver(inner, ctl_rx).await;
        });

        info!(url = %self.inner.config.url, "Realtime connection driver started");
        *driver = Some(Driver { ctl_tx, task });
    }

    /// Tear down the connection and release every subscription.
    ///
    /// Safe to call unconditionally, including when never connected.
    pub async fn disconnect(&self) {
        let driver = lock(&self.inner.driver).take();

        if let Some(driver) = driver {
            let _ = driver.ctl_tx.send(Control::Shutdown);
            if let Err(e) = driver.task.await {
                warn!(error = %e, "Connection driver ended abnormally");
            }
        }

        let released = Registry::clear(&self.inner.registry);
        let dropped = {
            let mut outbox = lock(&self.inner.outbox);
            let n = outbox.len();
            outbox.clear();
            n
        };
        *lock(&self.inner.credential) = None;
        self.inner.set_status(ConnectionStatus::Disconnected);

        info!(released, dropped, "Realtime connection closed");
    }

    /// Register `handler` for every inbound frame of `kind`.
    ///
    /// Handlers run on the driver task, sequentially, in arrival order; they
    /// must not block.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ServerFrame) + Send + Sync + 'static,
    {
        Registry::insert(&self.inner.registry, kind, Arc::new(handler))
    }

    /// Fire-and-forget send. Confirmation, if any, arrives as an inbound frame.
    pub fn send(&self, frame: ClientFrame) {
        let connected = self.inner.status() == ConnectionStatus::Connected;

        if !connected && self.inner.config.delivery == DeliveryPolicy::AtMostOnce {
            warn!(status = ?self.inner.status(), "Dropping frame sent while disconnected");
            return;
        }

        lock(&self.inner.outbox).push_back(frame);

        if let Some(driver) = lock(&self.inner.driver).as_ref() {
            let _ = driver.ctl_tx.send(Control::Flush);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn delivery(&self) -> DeliveryPolicy {
        self.inner.config.delivery
    }

    /// Frames waiting for a live link.
    pub fn queued(&self) -> usize {
        self.inner.queued()
    }

    pub fn subscriber_count(&self) -> usize {
        Registry::len(&self.inner.registry)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum SessionEnd {
    Shutdown,
    Dropped(NetError),
}

async fn run_driver(inner: Arc<Inner>, mut ctl_rx: mpsc::UnboundedReceiver<Control>) {
    let config = &inner.config;
    let mut backoff = Backoff::new(config.reconnect_base, config.reconnect_max, config.max_attempts);

    loop {
        let Some(credential) = inner.credential() else {
            warn!("Connection driver has no credential, stopping");
            inner.set_status(ConnectionStatus::Disconnected);
            return;
        };

        inner.set_status(ConnectionStatus::Connecting);

        match inner.connector.connect(&config.url).await {
            Ok(mut link) => {
                backoff.reset();
                match run_session(&inner, link.as_mut(), credential, &mut ctl_rx).await {
                    SessionEnd::Shutdown => {
                        link.close().await;
                        inner.set_status(ConnectionStatus::Disconnected);
                        info!("Connection driver shut down");
                        return;
                    }
                    SessionEnd::Dropped(e) => {
                        warn!(error = %e, queued = inner.queued(), "Realtime link dropped");
                    }
                }
            }
            Err(e) => {
                warn!(url = %config.url, attempt = backoff.attempts() + 1, error = %e, "Connect failed");
            }
        }

        inner.set_status(ConnectionStatus::Disconnected);

        let Some(delay) = backoff.next_delay() else {
            error!(
                attempts = backoff.attempts(),
                "Reconnect attempts exhausted, giving up"
            );
            inner.set_status(ConnectionStatus::Failed);
            return;
        };

        debug!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
        if wait_or_shutdown(&mut ctl_rx, delay).await {
            info!("Connection driver shut down while reconnecting");
            return;
        }
    }
}

/// Sleep for `delay`; returns `true` if a shutdown arrived first.
async fn wait_or_shutdown(ctl_rx: &mut mpsc::UnboundedReceiver<Control>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            ctl = ctl_rx.recv() => match ctl {
                // Frames stay in the outbox until the next link.
                Some(Control::Flush) => continue,
                Some(Control::Shutdown) | None => return true,
            },
        }
    }
}

async fn run_session(
    inner: &Inner,
    link: &mut dyn Link,
    credential: Credential,
    ctl_rx: &mut mpsc::UnboundedReceiver<Control>,
) -> SessionEnd {
    let setup = match ClientFrame::Setup(credential).encode() {
        Ok(text) => text,
        Err(e) => return SessionEnd::Dropped(e.into()),
    };
    if let Err(e) = link.send(setup).await {
        return SessionEnd::Dropped(e);
    }

    inner.set_status(ConnectionStatus::Connected);
    info!("Realtime channel connected");

    if let Err(e) = flush_outbox(inner, link).await {
        return SessionEnd::Dropped(e);
    }

    loop {
        tokio::select! {
            ctl = ctl_rx.recv() => match ctl {
                Some(Control::Flush) => {
                    if let Err(e) = flush_outbox(inner, link).await {
                        return SessionEnd::Dropped(e);
                    }
                }
                Some(Control::Shutdown) | None => return SessionEnd::Shutdown,
            },
            incoming = link.recv() => match incoming {
                Some(Ok(text)) => inner.dispatch(&text),
                Some(Err(e)) => return SessionEnd::Dropped(e),
                None => return SessionEnd::Dropped(NetError::Closed),
            },
        }
    }
}

/// Write queued frames in order. On a failed write the frame is put back
/// (at-least-once) or discarded (at-most-once).
async fn flush_outbox(inner: &Inner, link: &mut dyn Link) -> Result<(), NetError> {
    while let Some(frame) = inner.pop_outbox() {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Dropping unencodable frame");
                continue;
            }
        };

        if let Err(e) = link.send(text).await {
            match inner.config.delivery {
                DeliveryPolicy::AtLeastOnce => inner.requeue_front(frame),
                DeliveryPolicy::AtMostOnce => warn!("Frame lost on failed write"),
            }
            return Err(e);
        }
    }
    Ok(())
}
