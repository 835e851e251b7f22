//! Tier references
//!
//! Tiers are classification values owned by an external catalog. The engine
//! stores only the numeric id and resolves it back through [`TierCatalog`]
//! when rebuilding entities from rows.

use serde::{Deserialize, Serialize};

/// An opaque tier reference, identified by its numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tier {
    pub id: i64,
}

impl Tier {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

/// Resolves tier ids back to tier values.
pub trait TierCatalog: Send + Sync {
    fn resolve(&self, tier_id: i64) -> Tier;
}

/// Catalog that maps every id onto a bare tier handle.
///
/// Stands in wherever no richer catalog is wired up (tests, CLI tooling).
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCatalog;

impl TierCatalog for IdentityCatalog {
    fn resolve(&self, tier_id: i64) -> Tier {
        Tier::new(tier_id)
    }
}
