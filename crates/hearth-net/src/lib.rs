// Realtime channel: one persistent connection, reconnecting transparently.

pub mod backoff;
pub mod error;
pub mod manager;
pub mod memory;
pub mod subscriptions;
pub mod transport;

pub use backoff::Backoff;
pub use error::NetError;
pub use manager::{ConnectionConfig, ConnectionManager, DeliveryPolicy};
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};
pub use subscriptions::Subscription;
pub use transport::{Connector, Link, WsConnector};
