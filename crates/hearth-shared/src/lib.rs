//! Types shared by every Hearth crate: ids, domain models, the REST wire
//! format, the realtime protocol, validation errors and defaults.

pub mod api;
pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod time;
pub mod types;
