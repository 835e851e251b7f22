//! # Chestvault - Cache-backed container persistence
//!
//! Keeps an in-memory map of container entities ("chests") synchronized with
//! a relational store through asynchronous write-behind operations.
//!
//! Chestvault provides:
//! - A lock-guarded entity cache that is the source of truth for reads
//! - Write-behind persistence over a bounded background worker pool
//! - Versioned, idempotent schema migrations applied at startup
//! - Dense identifier allocation that reuses freed ids
//! - Pluggable connector, tier-resolution, and item-codec seams

pub mod alloc;
pub mod cache;
pub mod chest;
pub mod config;
pub mod connector;
pub mod item;
pub mod migration;
pub mod storage;
pub mod tier;
pub mod worker;

// Re-exports for convenient access
pub use cache::ChestStore;
pub use chest::{Chest, ChestId, Location};
pub use connector::{Connector, SqliteConnector};
pub use item::{Item, ItemCodec, JsonItemCodec};
pub use tier::{Tier, TierCatalog};

/// Result type alias for chestvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chestvault operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection unavailable: {0}")]
    Connection(String),

    #[error("Migration {revision} failed: {source}")]
    Schema {
        revision: u32,
        source: rusqlite::Error,
    },

    #[error("Item codec error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
