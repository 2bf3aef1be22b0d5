//! # hearth-store
//!
//! Persisted client state for Hearth, backed by SQLite.
//!
//! Only what must survive a restart lives here: the bearer credential and the
//! cached profile fields of the signed-in user. The crate exposes a
//! synchronous [`Database`] handle wrapping a `rusqlite::Connection` with
//! typed helpers.

pub mod database;
pub mod migrations;
pub mod session;

mod error;

pub use database::Database;
pub use error::StoreError;
