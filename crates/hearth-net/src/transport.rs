//! Transport abstraction for the realtime channel.
//!
//! The connection driver only needs "open a link" and "send/receive text
//! frames", so the concrete socket sits behind [`Connector`] / [`Link`].
//! [`WsConnector`] is the production WebSocket transport.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::NetError;

/// Opens links to the realtime server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>, NetError>;
}

/// One open, bidirectional text-frame connection.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, text: String) -> Result<(), NetError>;

    /// Next inbound text frame. `None` means the peer closed the link.
    /// Must be cancel-safe: the driver polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, NetError>>;

    async fn close(&mut self);
}

/// WebSocket transport (plain `ws://`).
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>, NetError> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        info!(url = %url, status = %response.status(), "WebSocket connected");
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, text: String) -> Result<(), NetError> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, NetError>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!(len = data.len(), "Skipping non-UTF-8 binary frame"),
                },
                Ok(WsMessage::Close(frame)) => {
                    debug!(frame = ?frame, "WebSocket close frame received");
                    return None;
                }
                // Ping/Pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}
