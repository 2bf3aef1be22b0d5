use thiserror::Error;

/// Errors raised by the realtime transport layer.
///
/// These never reach callers of `ConnectionManager::send`; the driver turns
/// them into reconnect attempts.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Frame codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
