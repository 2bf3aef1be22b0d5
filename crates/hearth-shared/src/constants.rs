/// Application name
pub const APP_NAME: &str = "Hearth";

/// Default REST base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Default realtime channel URL
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000/ws";

/// Messages fetched per history backfill
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Posts requested per feed page
pub const DEFAULT_FEED_PAGE_SIZE: u32 = 10;

/// Seconds a sent message may stay pending before it is marked failed
pub const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 15;

/// Reconnect attempts before the realtime channel reports failure
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// First reconnect delay in milliseconds (doubles per attempt)
pub const RECONNECT_BASE_DELAY_MS: u64 = 500;

/// Upper bound on the reconnect delay in milliseconds
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Minimum accepted length for a new password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Characters kept from a post when shown inside a notification
pub const EXCERPT_CHARS: usize = 80;

/// Clock skew tolerated when matching a stored server copy to a local send
pub const RECONCILE_SKEW_SECS: i64 = 120;
