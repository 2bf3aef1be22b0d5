//! The session database handle.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::migrations;

const DB_FILE: &str = "hearth.db";

pub struct Database {
    conn: Connection,
}

/// `<platform data dir>/hearth.db`, e.g. `~/.local/share/hearth/hearth.db`
/// on Linux.
pub fn default_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "hearth", "hearth").ok_or(StoreError::NoDataDir)?;
    Ok(dirs.data_dir().join(DB_FILE))
}

impl Database {
    /// Open the database at [`default_path`].
    pub fn new() -> Result<Self> {
        Self::open_at(&default_path()?)
    }

    /// Open (creating parent directories and the file as needed) and migrate.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!(path = %path.display(), "Session database opened");
        Self::ready(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::ready(Connection::open_in_memory()?)
    }

    fn ready(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `None` for in-memory databases.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}
