//! In-process transport.
//!
//! [`MemoryConnector`] hands out links whose far end is a [`MemoryPeer`]
//! delivered through [`MemoryServer::accept`]. Used to drive the connection
//! manager without sockets: scripted echoes, dropped links, refused connects.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use hearth_shared::protocol::{ClientFrame, ServerFrame};

use crate::error::NetError;
use crate::transport::{Connector, Link};

#[derive(Debug, Default)]
struct Gate {
    offline: bool,
    refuse: u32,
    attempts: u32,
}

/// Client side: implements [`Connector`].
#[derive(Clone)]
pub struct MemoryConnector {
    gate: Arc<Mutex<Gate>>,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Server side: accepts links opened by the paired [`MemoryConnector`].
pub struct MemoryServer {
    gate: Arc<Mutex<Gate>>,
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryConnector {
    pub fn pair() -> (MemoryConnector, MemoryServer) {
        let gate = Arc::new(Mutex::new(Gate::default()));
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            MemoryConnector {
                gate: gate.clone(),
                accept_tx,
            },
            MemoryServer { gate, accept_rx },
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>, NetError> {
        {
            let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            gate.attempts += 1;
            if gate.offline {
                return Err(NetError::Connect(format!("{url}: offline")));
            }
            if gate.refuse > 0 {
                gate.refuse -= 1;
                return Err(NetError::Connect(format!("{url}: refused")));
            }
        }

        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();

        self.accept_tx
            .send(MemoryPeer {
                rx: to_server_rx,
                tx: to_client_tx,
            })
            .map_err(|_| NetError::Connect(format!("{url}: server gone")))?;

        Ok(Box::new(MemoryLink {
            tx: to_server_tx,
            rx: to_client_rx,
        }))
    }
}

impl MemoryServer {
    /// Wait for the next link the client opens.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// While offline every connect attempt fails.
    pub fn set_offline(&self, offline: bool) {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner).offline = offline;
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: u32) {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner).refuse = n;
    }

    /// Total connect attempts seen, successful or not.
    pub fn attempts(&self) -> u32 {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner).attempts
    }
}

/// Server end of one link. Dropping it closes the link from the server side.
pub struct MemoryPeer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

impl MemoryPeer {
    /// Next raw frame the client sent.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Next frame the client sent, decoded.
    pub async fn recv_frame(&mut self) -> Option<ClientFrame> {
        let text = self.rx.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Stop accepting client frames while keeping the server-to-client
    /// direction open. The client's next write fails.
    pub fn stop_reading(&mut self) {
        self.rx.close();
    }

    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    pub fn send_frame(&self, frame: &ServerFrame) -> bool {
        match serde_json::to_string(frame) {
            Ok(text) => self.send_raw(text),
            Err(_) => false,
        }
    }
}

struct MemoryLink {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Link for MemoryLink {
    async fn send(&mut self, text: String) -> Result<(), NetError> {
        self.tx.send(text).map_err(|_| NetError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, NetError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
