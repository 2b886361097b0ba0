#![warn(missing_docs)]
//! Pairbench SQLite Store
//!
//! File-backed SQLite implementation of the pairbench store interface.
//!
//! Every pooled session is its own `rusqlite::Connection` on the same
//! database file, opened in WAL mode so readers do not block the writer.
//! SQLite still admits a single writer at a time; concurrent writers wait on
//! the configured busy timeout.
//!
//! `:memory:` is not supported: each connection would see a private
//! database.

mod session;

pub use session::SqliteSession;

use pairbench_core::{ConnectionManager, StoreError};
use rusqlite::{Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time a connection waits for a competing writer.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens connections to one SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteManager {
    /// Manager for the database at `path`. The file is created on first
    /// connect; its parent directory must exist.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Override the busy timeout applied to every connection.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn configure(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )
    }
}

impl ConnectionManager for SqliteManager {
    type Session = SqliteSession;

    fn connect(&self) -> Result<Self::Session, StoreError> {
        let conn = Connection::open(&self.path).map_err(|e| {
            StoreError::Unavailable(format!("opening {}: {e}", self.path.display()))
        })?;
        self.configure(&conn).map_err(|e| {
            StoreError::Unavailable(format!("configuring {}: {e}", self.path.display()))
        })?;
        tracing::trace!(path = %self.path.display(), "opened sqlite connection");
        Ok(SqliteSession::new(conn))
    }

    fn describe(&self) -> String {
        format!("sqlite ({})", self.path.display())
    }
}

/// Classify a rusqlite error into the store taxonomy.
pub(crate) fn store_error(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(err.to_string()),
        Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}
