//! Database connectors
//!
//! A connector hands out scoped connections: acquire, run the work, release
//! on every exit path. The engine is written against the [`Connector`]
//! capability so a pooled remote backend can slot in; the embedded SQLite
//! implementation ships here.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Scoped-connection capability consumed by the engine.
pub trait Connector: Send + Sync {
    /// Acquire a connection, run `work`, and release the connection on
    /// every exit path.
    fn with_connection(&self, work: &mut dyn FnMut(&mut Connection) -> Result<()>) -> Result<()>;

    /// Release all pooled resources. Safe to call more than once.
    fn close(&self);
}

/// Connector backed by an embedded SQLite database.
pub struct SqliteConnector {
    conn: Mutex<Option<Connection>>,
}

impl SqliteConnector {
    /// Open a database file (creates if it doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

impl Connector for SqliteConnector {
    fn with_connection(&self, work: &mut dyn FnMut(&mut Connection) -> Result<()>) -> Result<()> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(conn) => work(conn),
            None => Err(Error::Connection("connector is closed".to_string())),
        }
    }

    fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            tracing::debug!("sqlite connector closed");
        }
    }
}
