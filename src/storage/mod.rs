//! Storage layer - relational persistence for chest entities
//!
//! System of record is SQL with tables under a configurable name prefix:
//! - `<prefix>chests(chestID, tier, x, y, z, world)`
//! - `<prefix>items(chestID, item)` - one row per item, many per chest
//! - `<prefix>migrations(revision)` - internal migration bookkeeping
//!
//! No foreign keys are assumed; cascading deletes are issued explicitly.

pub mod rows;
pub mod schema;

pub use rows::StoreStats;
