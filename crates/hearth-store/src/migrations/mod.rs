//! Schema upgrades, keyed by `PRAGMA user_version`.
//!
//! [`STEPS`] lists every upgrade in order. Each pending step runs in its own
//! transaction together with the version bump, so a failure leaves the file
//! at the last fully applied version.

pub mod v001_initial;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

struct Step {
    version: u32,
    name: &'static str,
    up: fn(&Connection) -> rusqlite::Result<()>,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    name: "v001_initial",
    up: v001_initial::up,
}];

/// Highest version this build knows how to produce.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |s| s.version)
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` up to [`latest_version`]. A file written by a newer build is
/// refused rather than guessed at.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let found = schema_version(conn)?;
    let latest = latest_version();

    if found > latest {
        return Err(StoreError::Migration(format!(
            "schema version {found} is newer than supported version {latest}"
        )));
    }
    if found == latest {
        debug!(version = found, "Schema up to date");
        return Ok(());
    }

    for step in STEPS.iter().filter(|s| s.version > found) {
        info!(step = step.name, version = step.version, "Applying schema step");
        let tx = conn.unchecked_transaction()?;
        (step.up)(&*tx).map_err(|e| StoreError::Migration(format!("{}: {e}", step.name)))?;
        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
    }

    Ok(())
}
