use chrono::{DateTime, Utc};

/// Relative label for a timestamp: "just now", "5 min ago", "3 hour(s) ago",
/// "2 day(s) ago". Timestamps in the future are treated as "just now".
pub fn time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let minutes = elapsed.num_minutes();

    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} min ago");
    }

    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours} hour(s) ago");
    }

    format!("{} day(s) ago", elapsed.num_days())
}
