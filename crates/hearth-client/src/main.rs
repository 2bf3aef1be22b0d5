//! # hearth
//!
//! Headless client: restores the stored session, goes online, loads the
//! first feed page and the notifications, and logs realtime traffic until
//! Ctrl+C.

use std::sync::Arc;

use tracing::{error, info, warn};

use hearth_client::config::ClientConfig;
use hearth_client::events::UiEvent;
use hearth_client::http::HttpBackend;
use hearth_client::session::SessionStore;
use hearth_client::state::AppState;
use hearth_net::WsConnector;
use hearth_shared::constants::APP_NAME;
use hearth_shared::time::time_ago;
use hearth_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    hearth_client::init_tracing();

    info!("Starting {} client v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Restore the session
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let session = SessionStore::open(db)?;

    let Some(identity) = session.identity() else {
        warn!("No stored session; sign in from a full client first");
        return Ok(());
    };
    info!(user = %identity.user_id, name = %identity.display_name, "Session restored");

    // -----------------------------------------------------------------------
    // 4. Wire components and go online
    // -----------------------------------------------------------------------
    let backend = Arc::new(HttpBackend::new(config.api_url.clone(), session.clone())?);
    let state = AppState::new(config, session, backend, Arc::new(WsConnector));
    let mut events = state.events.subscribe();

    state.start()?;

    // -----------------------------------------------------------------------
    // 5. Initial loads (failures are logged, not fatal)
    // -----------------------------------------------------------------------
    if let Err(e) = state.profile.refresh().await {
        warn!(error = %e, "Could not refresh profile");
    }

    match state.friends.refresh_friends().await {
        Ok(friends) => info!(count = friends.len(), "Friends loaded"),
        Err(e) => warn!(error = %e, "Could not load friends"),
    }

    match state.friends.refresh_all_friends().await {
        Ok(all) => info!(count = all.len(), "Friends tab loaded"),
        Err(e) => warn!(error = %e, "Could not load friends tab"),
    }

    match state.feed.load_next().await {
        Ok(added) => {
            let now = chrono::Utc::now();
            for post in state.feed.items().iter().take(added) {
                info!(
                    author = %post.author_name,
                    likes = post.like_count,
                    comments = post.comment_count,
                    when = %time_ago(post.created_at, now),
                    "{}",
                    post.text
                );
            }
        }
        Err(e) => warn!(error = %e, "Could not load feed"),
    }

    match state.feed.load_my_posts().await {
        Ok(count) => info!(count, "Own posts loaded"),
        Err(e) => warn!(error = %e, "Could not load own posts"),
    }

    match state.notifications.load().await {
        Ok(_) => info!(unread = state.notifications.unread_count(), "Notifications loaded"),
        Err(e) => warn!(error = %e, "Could not load notifications"),
    }

    // -----------------------------------------------------------------------
    // 6. Log events until Ctrl+C
    // -----------------------------------------------------------------------
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(UiEvent::ConversationUpdated { peer_id }) => {
                    if let Some(last) = state.messenger.messages(&peer_id).last() {
                        info!(peer = %peer_id, from = %last.sender_id, state = ?last.delivery, "{}", last.content);
                    }
                }
                Ok(UiEvent::Error { context, message }) => {
                    error!(context, "{message}");
                }
                Ok(event) => info!(event = event.name(), ?event, "Event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event log lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    state.messenger.detach();
    state.connection.disconnect().await;

    Ok(())
}
