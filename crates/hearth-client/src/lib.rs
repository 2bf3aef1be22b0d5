//! # hearth-client
//!
//! Client core for the Hearth social network: session, realtime chat,
//! feed pagination, notifications, friends and profile settings. Rendering
//! is left to whatever embeds this crate; it observes [`events::UiEvent`]s
//! and calls into [`state::AppState`].

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod feed;
pub mod friends;
pub mod http;
pub mod messenger;
pub mod notifications;
pub mod profile;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::ClientError;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("hearth_client=debug,hearth_net=debug,hearth_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
